use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use shared::{
    domain::{Session, SessionProfileUpdate},
    error::{AuthError, AuthErrorCode},
};

pub use storage::DocumentFields;

mod app;
pub mod auth;
pub mod firebase;
mod hub;
pub mod local;
pub mod products;
pub mod profile;
pub mod session;
pub mod view;

pub use app::AppShell;
pub use auth::{LoginForm, RegisterForm};
pub use firebase::{FirebaseConfig, FirebaseIdentity, FirestoreStore};
pub use hub::SessionHub;
pub use local::LocalIdentity;
pub use products::ProductLister;
pub use profile::{ProfileDraft, ProfileSynchronizer, SyncError, DEFAULT_PROFILE_COLLECTION};
pub use session::SessionObserver;
pub use view::{route, AuthMode, View, ViewState, ViewStore};

/// Ordered session notifications; the first item is the session held at subscribe time.
pub type SessionStream = BoxStream<'static, Option<Session>>;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn observe_session(&self) -> SessionStream;
    fn current_session(&self) -> Option<Session>;
    async fn sign_in_anonymously(&self) -> Result<Session, AuthError>;
    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> Result<Session, AuthError>;
    async fn create_user_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError>;
    async fn update_session_profile(
        &self,
        update: SessionProfileUpdate,
    ) -> Result<Session, AuthError>;
    async fn sign_out(&self) -> Result<(), AuthError>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_doc(&self, collection: &str, doc_id: &str) -> Result<Option<DocumentFields>>;
    async fn set_doc(&self, collection: &str, doc_id: &str, fields: &DocumentFields) -> Result<()>;
    async fn update_doc(
        &self,
        collection: &str,
        doc_id: &str,
        partial: &DocumentFields,
    ) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Photo,
    Video,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickOptions {
    pub media_type: MediaType,
    pub include_base64: bool,
    pub max_width: u32,
    pub max_height: u32,
}

impl PickOptions {
    pub fn profile_photo() -> Self {
        Self {
            media_type: MediaType::Photo,
            include_base64: false,
            max_width: 2000,
            max_height: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    Cancelled,
    Error(String),
    Asset { uri: String },
}

#[async_trait]
pub trait MediaPicker: Send + Sync {
    async fn pick(&self, options: PickOptions) -> PickOutcome;
}

pub struct MissingMediaPicker;

#[async_trait]
impl MediaPicker for MissingMediaPicker {
    async fn pick(&self, _options: PickOptions) -> PickOutcome {
        PickOutcome::Error("media picker is unavailable".to_string())
    }
}

/// Blocking, user-visible notice raised by the profile flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            title: "Error".to_string(),
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            title: "Success".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    Alert(Alert),
    ProfileUpdated(ProfileDraft),
}

pub(crate) fn no_session_error() -> AuthError {
    AuthError::new(AuthErrorCode::NoSession, "no user is currently signed in")
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
