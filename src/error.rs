//! Error types for the admin console.
//!
//! One enum per concern. Messages on `ValidationError` are shown to the
//! operator verbatim, so they are written as sentences.

use thiserror::Error;

use crate::models::EntityKind;

/// Submit-time validation failures. Raised before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{kind} is missing required fields: {}", .fields.join(", "))]
    MissingFields {
        kind: EntityKind,
        fields: Vec<&'static str>,
    },

    #[error("Name, email, and speciality are required!")]
    DoctorIdentityRequired,

    #[error("Password is required for new doctors!")]
    PasswordRequired,

    #[error("Invalid date and time: '{0}'")]
    InvalidDateTime(String),

    #[error("'{0}' does not exist in the local timezone")]
    NonexistentLocalTime(String),

    #[error("Invalid date: '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("Invalid time: '{0}' (expected HH:MM)")]
    InvalidTime(String),

    #[error("End time must be after start time")]
    EndBeforeStart,
}

/// Field-level edit failures on a working copy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("{kind} has no field named '{field}'")]
    UnknownField { kind: EntityKind, field: String },

    #[error("Field '{field}' expects {expected}")]
    WrongValueKind {
        field: String,
        expected: &'static str,
    },
}

/// Failures talking to the backend over HTTP.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Response parsing error: {0}")]
    Decode(String),

    #[error("Token store error: {0}")]
    Token(#[from] TokenStoreError),
}

/// Failures reported by an entity store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: i64 },

    #[error("Cannot update a {kind} without an id")]
    MissingId { kind: EntityKind },

    #[error("{0}")]
    Rejected(String),
}

/// Failures while calling the authentication backend. Rejected credentials
/// are not an error; see `AuthService::login`.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Could not reach the server: {0}")]
    Network(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Failures of the login flow itself.
#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Email and password are required")]
    MissingCredentials,

    #[error("Login failed, please check your credentials.")]
    InvalidCredentials,

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Failures of admin panel operations.
#[derive(Error, Debug)]
pub enum PanelError {
    #[error("The {0} form is not open")]
    NotOpen(EntityKind),

    #[error(transparent)]
    Form(#[from] FormError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures of the persistent token store.
#[derive(Error, Debug)]
pub enum TokenStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Invalid configuration values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid backend URL '{0}': must start with http:// or https://")]
    InvalidBackendUrl(String),
}
