//! Admin console for the easyappoint booking backend.
//!
//! Doctors log in, get redirected to the admin panel, and maintain the three
//! collections the clinic runs on: appointments ("dates"), doctors and
//! availability slots.

pub mod api;
pub mod auth;
pub mod config;
pub mod editor;
pub mod error;
pub mod login;
pub mod models;
pub mod panel;
pub mod store;
pub mod token_store;
pub mod ui;

pub use api::{ApiClient, RestStore, UserDirectory};
pub use auth::{AuthProfile, AuthService, RestAuthService, Role, StaticAuthService};
pub use config::AdminConfig;
pub use editor::EditSession;
pub use error::{
    ApiError, AuthError, ConfigError, FormError, LoginError, PanelError, StoreError,
    TokenStoreError, ValidationError,
};
pub use login::{LoginFlow, LoginForm, LoginState};
pub use models::{
    Appointment, AvailabilitySlot, Doctor, Entity, EntityId, EntityKind, FieldValue, Mode,
    UserSummary,
};
pub use panel::{ActiveModal, AdminPanel, PanelEntity};
pub use store::{EntityStore, MemoryStore, StoreSnapshot};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use ui::{Navigator, Notifier, Route};
