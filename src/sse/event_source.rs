//! Long-lived SSE connection with explicit reconnect decisions.
//!
//! State machine: `Closed -> Connecting -> Open -> Closed`. The source never
//! reconnects by itself; the completion callback reports whether a
//! reconnect is appropriate and the owner calls [`EventSource::connect`]
//! again.
//!
//! Two tasks per connection: the I/O task reads chunks in order and the
//! delivery task runs user callbacks one at a time, so a slow callback
//! never stalls the socket and events are delivered in arrival order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::LOCATION;
use reqwest::{Client, Response, Url};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::event::{parse_chunk, Event};
use crate::config::{Configuration, SSE_CONNECT_TIMEOUT};
use crate::error::{ApiError, TransportError};

/// Default server retry hint (milliseconds).
pub const DEFAULT_RETRY_TIME: Duration = Duration::from_millis(3000);

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closed,
}

pub type OpenCallback = Arc<dyn Fn() + Send + Sync>;
pub type MessageCallback = Arc<dyn Fn(&Event) + Send + Sync>;
pub type CompleteCallback = Arc<dyn Fn(&Completion) + Send + Sync>;

/// How a connection ended.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// `None` when no HTTP response was received.
    pub status_code: Option<u16>,
    pub should_reconnect: bool,
    pub error: Option<ApiError>,
}

/// Reconnect only on a 2xx other than 200; everything else is final.
pub fn should_reconnect(status_code: u16) -> bool {
    status_code > 200 && status_code < 300
}

/// Decode one chunk, logging and dropping anything unparseable.
pub fn handle_chunk(chunk: &[u8]) -> Option<Event> {
    match parse_chunk(chunk)? {
        Ok(event) => Some(event),
        Err(e) => {
            log::error!("SSE parsing error: {}", e);
            None
        }
    }
}

#[derive(Clone, Default)]
struct Callbacks {
    on_open: Option<OpenCallback>,
    on_message: Option<MessageCallback>,
    on_complete: Option<CompleteCallback>,
    listeners: HashMap<String, MessageCallback>,
}

enum Delivery {
    Open,
    Message(Event),
    Complete(Completion),
}

pub struct EventSource {
    url: String,
    headers: Vec<(String, String)>,
    client: Client,
    retry_time: Duration,
    state: Arc<RwLock<ReadyState>>,
    callbacks: Arc<RwLock<Callbacks>>,
    last_event_id: RwLock<Option<String>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Cancellation flag of the current connection. Each `connect` gets a
    /// fresh one so a stale delivery task never fires into a new connection.
    cancelled: Mutex<Arc<AtomicBool>>,
}

impl EventSource {
    /// Create a closed source for `url`. `headers` are sent on connect and
    /// re-applied on every redirect.
    pub fn new(
        url: impl Into<String>,
        headers: Vec<(String, String)>,
        config: &Configuration,
    ) -> Result<Self, ApiError> {
        let builder = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(SSE_CONNECT_TIMEOUT);
        let client = crate::api::transport::pin_tls(builder, config)
            .build()
            .map_err(TransportError::from)?;
        Ok(Self::with_client(url, headers, client))
    }

    /// Use a prepared client. It must not follow redirects on its own,
    /// otherwise the custom headers are not re-applied.
    pub fn with_client(url: impl Into<String>, headers: Vec<(String, String)>, client: Client) -> Self {
        Self {
            url: url.into(),
            headers,
            client,
            retry_time: DEFAULT_RETRY_TIME,
            state: Arc::new(RwLock::new(ReadyState::Closed)),
            callbacks: Arc::new(RwLock::new(Callbacks::default())),
            last_event_id: RwLock::new(None),
            tasks: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Arc::new(AtomicBool::new(true))),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn retry_time(&self) -> Duration {
        self.retry_time
    }

    pub fn ready_state(&self) -> ReadyState {
        *read(&self.state)
    }

    pub fn last_event_id(&self) -> Option<String> {
        read(&self.last_event_id).clone()
    }

    pub fn on_open(&self, callback: impl Fn() + Send + Sync + 'static) {
        write(&self.callbacks).on_open = Some(Arc::new(callback));
    }

    pub fn on_message(&self, callback: impl Fn(&Event) + Send + Sync + 'static) {
        write(&self.callbacks).on_message = Some(Arc::new(callback));
    }

    pub fn on_complete(&self, callback: impl Fn(&Completion) + Send + Sync + 'static) {
        write(&self.callbacks).on_complete = Some(Arc::new(callback));
    }

    /// Handler for events whose `type` equals `event`. Runs after the
    /// generic message callback.
    pub fn add_event_listener(&self, event: &str, handler: impl Fn(&Event) + Send + Sync + 'static) {
        write(&self.callbacks)
            .listeners
            .insert(event.to_string(), Arc::new(handler));
    }

    pub fn remove_event_listener(&self, event: &str) {
        write(&self.callbacks).listeners.remove(event);
    }

    /// Event names with a registered listener.
    pub fn events(&self) -> Vec<String> {
        read(&self.callbacks).listeners.keys().cloned().collect()
    }

    /// Open the stream. Any previous connection is cancelled first.
    ///
    /// Outside a Tokio runtime nothing is spawned: the source stays
    /// `Closed` and the completion callback reports the failure.
    pub fn connect(&self, last_event_id: Option<&str>) {
        self.abort_tasks();
        *write(&self.last_event_id) = last_event_id.map(str::to_string);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::error!("SSE connect to {} called outside a Tokio runtime", self.url);
            *write(&self.state) = ReadyState::Closed;
            let completion = Completion {
                status_code: None,
                should_reconnect: false,
                error: Some(ApiError::new(
                    None,
                    Some("No Runtime"),
                    "EventSource::connect requires a Tokio runtime",
                )),
            };
            let on_complete = read(&self.callbacks).on_complete.clone();
            if let Some(on_complete) = on_complete {
                on_complete(&completion);
            }
            return;
        };

        *write(&self.state) = ReadyState::Connecting;
        let cancelled = Arc::new(AtomicBool::new(false));
        *lock(&self.cancelled) = Arc::clone(&cancelled);

        let headers = self.request_headers(last_event_id);
        let (tx, rx) = mpsc::unbounded_channel();

        let delivery = runtime.spawn(deliver(rx, Arc::clone(&self.callbacks), cancelled));
        let io = runtime.spawn(run_stream(
            self.client.clone(),
            self.url.clone(),
            headers,
            Arc::clone(&self.state),
            tx,
        ));

        let mut tasks = lock(&self.tasks);
        tasks.push(io);
        tasks.push(delivery);
        log::info!("SSE connecting to {}", self.url);
    }

    /// Close immediately. No callback runs after this returns.
    pub fn disconnect(&self) {
        *write(&self.state) = ReadyState::Closed;
        self.abort_tasks();
        log::info!("SSE disconnected from {}", self.url);
    }

    fn abort_tasks(&self) {
        // Set before aborting: abort only lands at the delivery task's next
        // yield, and deliveries already queued must not run.
        lock(&self.cancelled).store(true, Ordering::SeqCst);
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
    }

    fn request_headers(&self, last_event_id: Option<&str>) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .filter(|(name, _)| {
                !name.eq_ignore_ascii_case("Accept") && !name.eq_ignore_ascii_case("Cache-Control")
            })
            .cloned()
            .collect();
        if let Some(id) = last_event_id {
            headers.push(("Last-Event-Id".to_string(), id.to_string()));
        }
        headers.push(("Accept".to_string(), "text/event-stream".to_string()));
        headers.push(("Cache-Control".to_string(), "no-cache".to_string()));
        headers
    }
}

impl Drop for EventSource {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

/// I/O task: open (following redirects), stream chunks, report completion.
async fn run_stream(
    client: Client,
    url: String,
    headers: Vec<(String, String)>,
    state: Arc<RwLock<ReadyState>>,
    tx: mpsc::UnboundedSender<Delivery>,
) {
    let response = match open(&client, &url, &headers).await {
        Ok(response) => response,
        Err(error) => {
            log::error!("SSE connection failed: {}", error);
            *write(&state) = ReadyState::Closed;
            let _ = tx.send(Delivery::Complete(Completion {
                status_code: None,
                should_reconnect: false,
                error: Some(error),
            }));
            return;
        }
    };

    let status = response.status().as_u16();
    *write(&state) = ReadyState::Open;
    log::info!("SSE opened connection to server (status {})", status);
    let _ = tx.send(Delivery::Open);

    let mut stream = response.bytes_stream();
    let mut error = None;
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                if *read(&state) != ReadyState::Open {
                    continue;
                }
                if let Some(event) = handle_chunk(&bytes) {
                    log::debug!("SSE received event {}", event.event_type);
                    let _ = tx.send(Delivery::Message(event));
                }
            }
            Err(e) => {
                error = Some(ApiError::from(TransportError::from(e)));
                break;
            }
        }
    }

    *write(&state) = ReadyState::Closed;
    let completion = Completion {
        status_code: Some(status),
        should_reconnect: error.is_none() && should_reconnect(status),
        error,
    };
    log::info!(
        "SSE completed with status {} (reconnect: {})",
        status,
        completion.should_reconnect
    );
    let _ = tx.send(Delivery::Complete(completion));
}

/// GET `url`, following redirects by hand so `headers` go on every hop.
async fn open(client: &Client, url: &str, headers: &[(String, String)]) -> Result<Response, ApiError> {
    let mut current = Url::parse(url).map_err(|_| TransportError::InvalidUrl(url.to_string()))?;

    for _ in 0..=MAX_REDIRECTS {
        let mut request = client.get(current.clone());
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send().await.map_err(TransportError::from)?;

        if !response.status().is_redirection() {
            return Ok(response);
        }
        let Some(location) = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
        else {
            return Ok(response);
        };
        let next = current
            .join(location)
            .map_err(|_| TransportError::InvalidUrl(location.to_string()))?;
        log::debug!("SSE following redirect {} -> {}", current, next);
        current = next;
    }

    Err(TransportError::NoResponse.into())
}

/// Delivery task: invoke callbacks serially in arrival order until the
/// connection is cancelled.
async fn deliver(
    mut rx: mpsc::UnboundedReceiver<Delivery>,
    callbacks: Arc<RwLock<Callbacks>>,
    cancelled: Arc<AtomicBool>,
) {
    let is_cancelled = || cancelled.load(Ordering::SeqCst);

    while let Some(delivery) = rx.recv().await {
        if is_cancelled() {
            return;
        }
        let current = read(&callbacks).clone();
        match delivery {
            Delivery::Open => {
                if let Some(on_open) = current.on_open {
                    on_open();
                }
            }
            Delivery::Message(event) => {
                if let Some(on_message) = current.on_message {
                    on_message(&event);
                }
                if is_cancelled() {
                    return;
                }
                if let Some(listener) = current.listeners.get(&event.event_type) {
                    listener(&event);
                }
            }
            Delivery::Complete(completion) => {
                if let Some(on_complete) = current.on_complete {
                    on_complete(&completion);
                }
            }
        }
    }
}

// Callbacks never run while a lock is held, so poisoning only follows a
// panic inside this module; the guarded data is still consistent.
fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
