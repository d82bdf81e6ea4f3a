//! `theraforge` command-line client.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tokio::sync::mpsc;

use theraforge_client::api::types::{DownloadFileRequest, LoginRequest};
use theraforge_client::sse::Completion;
use theraforge_client::{ApiError, AuthToken, CloudClient, Configuration, SecretStore, Transport};

#[derive(Parser, Debug)]
#[command(name = "theraforge", about = "TheraForge cloud client")]
struct Cli {
    /// Backend root URL
    #[arg(long, env = "THERAFORGE_API_URL")]
    api_url: String,

    /// Application API key
    #[arg(long, env = "THERAFORGE_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Request timeout in seconds
    #[arg(long, env = "THERAFORGE_REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    timeout_secs: u64,

    /// Allow TLS versions below 1.3 (local development servers)
    #[arg(long)]
    no_tls13_pin: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "THERAFORGE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Exchange the stored refresh token for a new pair
    Refresh,
    /// Sign out and clear the stored session
    Logout,
    /// Show the stored user and token expiry
    Whoami,
    /// Download an attachment
    Download {
        attachment_id: String,
        #[arg(long, short)]
        output: PathBuf,
        #[arg(long, default_value = "true")]
        meta: String,
    },
    /// Stream server-sent events until interrupted
    Watch {
        /// Follow the document change feed instead of the user subscription
        #[arg(long)]
        changes: bool,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not logged in")]
    NotLoggedIn,
}

#[cfg(feature = "keychain")]
fn secret_store() -> theraforge_client::KeyringStore {
    theraforge_client::KeyringStore::new()
}

#[cfg(not(feature = "keychain"))]
fn secret_store() -> theraforge_client::MemoryStore {
    log::warn!("Built without keychain support; the session is not persisted");
    theraforge_client::MemoryStore::new()
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        log::error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = Configuration::parse(&cli.api_url, cli.api_key)?
        .with_request_timeout(Duration::from_secs(cli.timeout_secs))
        .with_tls13_pin(!cli.no_tls13_pin);
    let client = CloudClient::with_store(config, secret_store())?;

    match cli.command {
        Command::Login { email, password } => {
            let resp = client.login(&LoginRequest { email, password }).await?;
            println!("Logged in as {} ({})", resp.data.email, resp.data.id);
        }
        Command::Refresh => {
            let resp = client.refresh_token().await?;
            println!("Token valid until {}", resp.access_token.expires_at);
        }
        Command::Logout => {
            let resp = client.sign_out().await?;
            println!("{}", resp.message);
        }
        Command::Whoami => {
            let token = client.current_auth().await?.ok_or(CliError::NotLoggedIn)?;
            match client.session().user().map_err(ApiError::from)? {
                Some(user) => println!("{} ({})", user.email, user.id),
                None => println!("(no stored profile)"),
            }
            let status = if token.is_valid() { "valid" } else { "expired" };
            println!("Token {} until {}", status, token.expires_at);
        }
        Command::Download {
            attachment_id,
            output,
            meta,
        } => {
            let file = client
                .download_file(&DownloadFileRequest {
                    attachment_id,
                    meta,
                })
                .await?;
            tokio::fs::write(&output, &file.data).await?;
            println!("Wrote {} bytes to {}", file.data.len(), output.display());
        }
        Command::Watch { changes } => watch(&client, changes).await?,
    }
    Ok(())
}

/// Stream events, reconnecting while the server asks for it.
async fn watch<T: Transport, S: SecretStore>(
    client: &CloudClient<T, S>,
    changes: bool,
) -> Result<(), CliError> {
    loop {
        let auth = usable_token(client).await?;
        let source = if changes {
            client.observe_change_events(&auth).await?
        } else {
            client.observe_server_sent_events(&auth).await?
        };

        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
        source.on_message(|event| println!("{}", event.raw));
        source.on_complete(move |completion| {
            let _ = done_tx.send(completion.clone());
        });
        source.connect(None);

        let completion = tokio::select! {
            completion = done_rx.recv() => completion,
            _ = tokio::signal::ctrl_c() => {
                source.disconnect();
                return Ok(());
            }
        };

        match completion {
            Some(c) if c.should_reconnect => {
                log::info!("Reconnecting in {:?}", source.retry_time());
                tokio::time::sleep(source.retry_time()).await;
            }
            Some(Completion { error: Some(e), .. }) => return Err(e.into()),
            _ => return Ok(()),
        }
    }
}

async fn usable_token<T: Transport, S: SecretStore>(
    client: &CloudClient<T, S>,
) -> Result<AuthToken, CliError> {
    let token = client.current_auth().await?.ok_or(CliError::NotLoggedIn)?;
    if token.is_valid() {
        return Ok(token);
    }
    Ok(client.refresh_token().await?.access_token)
}
