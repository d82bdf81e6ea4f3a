//! Request and response types for the TheraForge backend API.
//!
//! Most structs use camelCase serialization to match the API's JSON format.
//! A few signup fields are snake_case on the wire and are renamed explicitly.

use serde::{Deserialize, Serialize};

use super::token::AuthToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Doctor,
    Patient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenderType {
    Male,
    Female,
    Other,
}

/// Storage bucket for uploaded attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachmentLocation {
    Profile,
    Documents,
    ConsentForm,
    Settings,
}

impl AttachmentLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentLocation::Profile => "Profile",
            AttachmentLocation::Documents => "Documents",
            AttachmentLocation::ConsentForm => "ConsentForm",
            AttachmentLocation::Settings => "Settings",
        }
    }
}

// ── Requests ────────────────────────────────────────────────────────────

/// Body for POST /auth/login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body for POST /auth/signup.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(rename = "first_name")]
    pub first_name: String,
    #[serde(rename = "last_name")]
    pub last_name: String,
    #[serde(rename = "type")]
    pub user_type: UserType,
    pub dob: String,
    pub gender: String,
    pub phone_no: String,
    pub encrypted_master_key: String,
    pub public_key: String,
    pub encrypted_default_storage_key: String,
    pub encrypted_confidential_storage_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialType {
    Gmail,
    Apple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialAuthType {
    Login,
    Signup,
}

/// Body for POST /auth/social-login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialLoginRequest {
    pub user_type: UserType,
    pub social_type: SocialType,
    pub request_type: SocialAuthType,
    pub identity_token: String,
}

/// Body for POST /auth/logout and POST /auth/refresh-token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub email: String,
    pub password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

/// Profile picture upload, sent as a raw multipart body.
#[derive(Debug, Clone)]
pub struct UploadProfileRequest {
    pub user_id: String,
    pub location: AttachmentLocation,
    pub file: Vec<u8>,
}

/// Encrypted file download. Both values travel as headers.
#[derive(Debug, Clone)]
pub struct DownloadFileRequest {
    pub attachment_id: String,
    pub meta: String,
}

/// Encrypted file upload: header parameters plus the raw encrypted payload.
#[derive(Debug, Clone)]
pub struct UploadFileRequest {
    pub data: Vec<u8>,
    pub file_name: String,
    pub location: AttachmentLocation,
    pub meta: String,
    pub encrypted_file_key: Option<String>,
    pub hash_file_key: String,
}

// ── Responses ───────────────────────────────────────────────────────────

/// User profile as returned by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<GenderType>,
    /// `dd-mm-yyyy`.
    pub dob: Option<String>,
    #[serde(rename = "type")]
    pub user_type: UserType,
}

impl User {
    pub fn date_of_birth(&self) -> Option<chrono::NaiveDate> {
        self.dob
            .as_deref()
            .and_then(|dob| chrono::NaiveDate::parse_from_str(dob, "%d-%m-%Y").ok())
    }
}

/// Response of login, signup, social login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub error: bool,
    pub message: Option<String>,
    pub data: User,
    pub access_token: AuthToken,
}

/// Plain `{ "message": ... }` acknowledgement used by several endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

pub type LogoutResponse = MessageResponse;
pub type ChangePasswordResponse = MessageResponse;
pub type ForgotPasswordResponse = MessageResponse;
pub type DeleteAccountResponse = MessageResponse;
pub type DeleteFileResponse = MessageResponse;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProfileResponse {
    pub message: Option<String>,
    #[serde(rename = "attachmentID")]
    pub attachment_id: Option<String>,
}

/// Metadata segment of a multipart file download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(rename = "attachmentID", default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(rename = "type", default)]
    pub location: Option<String>,
    #[serde(default)]
    pub meta: Option<String>,
    #[serde(default)]
    pub encrypted_file_key: Option<String>,
    #[serde(default)]
    pub hash_file_key: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub rev: Option<String>,
}

/// Decoded multipart download: metadata plus the encrypted attachment bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct FileResponse {
    pub metadata: Metadata,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    #[serde(rename = "attachmentID", default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionResponse {
    #[serde(rename = "attachmentID", default)]
    pub attachment_id: Option<String>,
    pub rev: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_response_decodes() {
        let json = r#"{
            "error": false,
            "message": null,
            "data": {
                "id": "u1",
                "email": "a@b.c",
                "firstName": "Ada",
                "lastName": null,
                "gender": "female",
                "dob": "08-07-1997",
                "type": "patient"
            },
            "accessToken": {
                "token": "t",
                "refreshToken": "r",
                "expiresAt": "2030-01-01T00:00:00Z"
            }
        }"#;
        let resp: LoginResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.data.email, "a@b.c");
        assert_eq!(resp.data.user_type, UserType::Patient);
        assert_eq!(resp.data.gender, Some(GenderType::Female));
        assert_eq!(
            resp.data.date_of_birth(),
            chrono::NaiveDate::from_ymd_opt(1997, 7, 8)
        );
        assert_eq!(resp.access_token.refresh_token, "r");
    }

    #[test]
    fn test_signup_wire_names() {
        let req = SignUpRequest {
            email: "a@b.c".into(),
            password: "pw".into(),
            first_name: "Ada".into(),
            last_name: "L".into(),
            user_type: UserType::Doctor,
            dob: "01-01-1990".into(),
            gender: "female".into(),
            phone_no: "(111) 111-1111".into(),
            encrypted_master_key: "emk".into(),
            public_key: "pk".into(),
            encrypted_default_storage_key: "eds".into(),
            encrypted_confidential_storage_key: "ecs".into(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["first_name"], "Ada");
        assert_eq!(value["type"], "doctor");
        assert_eq!(value["phoneNo"], "(111) 111-1111");
        assert_eq!(value["encryptedConfidentialStorageKey"], "ecs");
    }

    #[test]
    fn test_social_login_wire_names() {
        let req = SocialLoginRequest {
            user_type: UserType::Patient,
            social_type: SocialType::Apple,
            request_type: SocialAuthType::Login,
            identity_token: "jwt".into(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["socialType"], "apple");
        assert_eq!(value["requestType"], "login");
        assert_eq!(value["identityToken"], "jwt");
    }
}
