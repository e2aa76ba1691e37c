use std::sync::Arc;

use serde_json::Value;
use shared::{
    domain::{
        ProfileField, ProfileRecord, SaveTarget, Session, SessionId, SessionProfileUpdate,
        UnknownField, PHOTO_DOCUMENT_KEY, PLACEHOLDER_IMAGE,
    },
    error::AuthError,
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

use crate::{
    Alert, ClientEvent, DocumentFields, DocumentStore, IdentityProvider, MediaPicker,
    PickOptions, PickOutcome,
};

pub const DEFAULT_PROFILE_COLLECTION: &str = "users";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to load profile {session_id}: {source}")]
    Load {
        session_id: SessionId,
        source: anyhow::Error,
    },
    #[error("failed to save {target:?}: {}", describe_failures(.display_name.as_ref(), .store.as_ref()))]
    Save {
        target: SaveTarget,
        display_name: Option<AuthError>,
        store: Option<anyhow::Error>,
    },
    #[error("failed to pick image: {0}")]
    Pick(String),
    #[error("failed to update profile picture: {}", describe_failures(.identity.as_ref(), .store.as_ref()))]
    Photo {
        identity: Option<AuthError>,
        store: Option<anyhow::Error>,
    },
    #[error("failed to sign out: {0}")]
    SignOut(AuthError),
    #[error(transparent)]
    UnknownField(#[from] UnknownField),
}

impl SyncError {
    /// Generic alert shown to the user; the detailed error is only logged.
    pub fn alert(&self) -> Option<Alert> {
        let message = match self {
            SyncError::Load { .. } => "Failed to load profile data",
            SyncError::Save { .. } => "Failed to update profile",
            SyncError::Pick(_) => "Failed to pick image",
            SyncError::Photo { .. } => "Failed to update profile picture",
            SyncError::SignOut(_) => "Failed to sign out",
            SyncError::UnknownField(_) => return None,
        };
        Some(Alert::error(message))
    }
}

fn describe_failures(identity: Option<&AuthError>, store: Option<&anyhow::Error>) -> String {
    match (identity, store) {
        (Some(identity), Some(store)) => format!("identity: {identity}; store: {store:#}"),
        (Some(identity), None) => format!("identity: {identity}"),
        (None, Some(store)) => format!("store: {store:#}"),
        (None, None) => "no failure recorded".to_string(),
    }
}

/// Local copy of the profile as the profile view shows and edits it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDraft {
    pub record: ProfileRecord,
    pub photo: String,
    pub email: Option<String>,
    pub editing: Option<ProfileField>,
}

impl Default for ProfileDraft {
    fn default() -> Self {
        Self {
            record: ProfileRecord::default(),
            photo: PLACEHOLDER_IMAGE.to_string(),
            email: None,
            editing: None,
        }
    }
}

impl ProfileDraft {
    fn for_session(session: &Session) -> Self {
        Self {
            photo: session
                .photo_ref
                .clone()
                .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
            email: session.email.clone(),
            ..Self::default()
        }
    }

    /// Text shown for a field outside edit mode.
    pub fn shown_value(&self, field: ProfileField) -> &str {
        let value = self.record.value(field);
        if value.is_empty() {
            "Not set"
        } else {
            value
        }
    }
}

pub fn default_profile_fields() -> DocumentFields {
    ProfileField::ALL
        .iter()
        .map(|field| (field.document_key().to_string(), Value::String(String::new())))
        .collect()
}

/// Lenient read: missing or non-string fields become empty strings.
pub fn profile_from_fields(fields: &DocumentFields) -> ProfileRecord {
    let text = |key: &str| {
        fields
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    ProfileRecord {
        first_name: text(ProfileField::FirstName.document_key()),
        last_name: text(ProfileField::LastName.document_key()),
        location: text(ProfileField::Location.document_key()),
        bio: text(ProfileField::Bio.document_key()),
        photo_ref: fields
            .get(PHOTO_DOCUMENT_KEY)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    }
}

pub struct ProfileSynchronizer {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    picker: Arc<dyn MediaPicker>,
    collection: String,
    draft: Mutex<ProfileDraft>,
    events: broadcast::Sender<ClientEvent>,
}

impl ProfileSynchronizer {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        picker: Arc<dyn MediaPicker>,
        collection: impl Into<String>,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            identity,
            store,
            picker,
            collection: collection.into(),
            draft: Mutex::new(ProfileDraft::default()),
            events,
        }
    }

    pub async fn draft(&self) -> ProfileDraft {
        self.draft.lock().await.clone()
    }

    fn emit(&self, event: ClientEvent) {
        // Nobody listening is fine in headless use.
        let _ = self.events.send(event);
    }

    fn raise(&self, err: &SyncError) {
        if let Some(alert) = err.alert() {
            self.emit(ClientEvent::Alert(alert));
        }
    }

    async fn publish_draft(&self) {
        let draft = self.draft().await;
        self.emit(ClientEvent::ProfileUpdated(draft));
    }

    /// Resets local state for the signed-in session and loads its record.
    /// Without a session this logs and does nothing.
    pub async fn mount(&self) -> Result<Option<ProfileRecord>, SyncError> {
        let Some(session) = self.identity.current_session() else {
            info!("No user is currently signed in");
            return Ok(None);
        };
        *self.draft.lock().await = ProfileDraft::for_session(&session);
        self.load_profile(&session.id).await.map(Some)
    }

    /// Fetches the record, creating it with empty defaults when absent.
    pub async fn load_profile(&self, session_id: &SessionId) -> Result<ProfileRecord, SyncError> {
        match self.fetch_or_create(session_id).await {
            Ok(record) => {
                {
                    let mut draft = self.draft.lock().await;
                    draft.record = record.clone();
                }
                self.publish_draft().await;
                Ok(record)
            }
            Err(source) => {
                error!(%session_id, error = %format!("{source:#}"), "Error fetching user profile");
                let err = SyncError::Load {
                    session_id: session_id.clone(),
                    source,
                };
                self.raise(&err);
                Err(err)
            }
        }
    }

    async fn fetch_or_create(&self, session_id: &SessionId) -> anyhow::Result<ProfileRecord> {
        if let Some(fields) = self
            .store
            .get_doc(&self.collection, session_id.as_str())
            .await?
        {
            return Ok(profile_from_fields(&fields));
        }

        info!(%session_id, collection = %self.collection, "creating default profile record");
        let defaults = default_profile_fields();
        self.store
            .set_doc(&self.collection, session_id.as_str(), &defaults)
            .await?;
        Ok(profile_from_fields(&defaults))
    }

    pub async fn begin_edit(&self, field: ProfileField) {
        self.draft.lock().await.editing = Some(field);
        self.publish_draft().await;
    }

    pub async fn cancel_edit(&self) {
        self.draft.lock().await.editing = None;
        self.publish_draft().await;
    }

    /// Local-only change; nothing is written until [`Self::save_field`].
    pub async fn set_draft_value(&self, field: ProfileField, value: impl Into<String>) {
        *self.draft.lock().await.record.value_mut(field) = value.into();
    }

    /// Writes one field, or the composite name, from the local draft.
    pub async fn save_field(&self, target: SaveTarget) -> Result<(), SyncError> {
        let Some(session) = self.identity.current_session() else {
            info!(?target, "no session; skipping profile save");
            return Ok(());
        };
        let record = self.draft().await.record;

        let mut update = DocumentFields::new();
        let mut display_name_failure = None;
        match target {
            SaveTarget::Name => {
                for field in [ProfileField::FirstName, ProfileField::LastName] {
                    update.insert(
                        field.document_key().to_string(),
                        Value::String(record.value(field).to_string()),
                    );
                }
                let display_name = record.display_name();
                if let Err(err) = self
                    .identity
                    .update_session_profile(SessionProfileUpdate {
                        display_name: Some(display_name),
                        photo_ref: None,
                    })
                    .await
                {
                    error!(session_id = %session.id, error = %err, "failed to update display name");
                    display_name_failure = Some(err);
                }
            }
            SaveTarget::Field(field) => {
                update.insert(
                    field.document_key().to_string(),
                    Value::String(record.value(field).to_string()),
                );
            }
        }

        // The store write is attempted even when the display-name update
        // failed; the record may then be ahead of the session.
        let store_failure = match self
            .store
            .update_doc(&self.collection, session.id.as_str(), &update)
            .await
        {
            Ok(()) => None,
            Err(err) => {
                error!(session_id = %session.id, error = %format!("{err:#}"), "Error updating profile");
                Some(err)
            }
        };

        if display_name_failure.is_none() && store_failure.is_none() {
            info!(session_id = %session.id, ?target, "Field updated");
            self.draft.lock().await.editing = None;
            self.publish_draft().await;
            self.emit(ClientEvent::Alert(Alert::success(
                "Profile updated successfully",
            )));
            return Ok(());
        }

        let err = SyncError::Save {
            target,
            display_name: display_name_failure,
            store: store_failure,
        };
        self.raise(&err);
        Err(err)
    }

    /// Same as [`Self::save_field`] for a field named as the store names it,
    /// plus the composite `name`.
    pub async fn save_named_field(&self, name: &str) -> Result<(), SyncError> {
        let target = name.parse::<SaveTarget>().map_err(|err| {
            error!(field = name, "Unknown field");
            SyncError::from(err)
        })?;
        self.save_field(target).await
    }

    pub async fn set_and_save(
        &self,
        field: ProfileField,
        value: impl Into<String>,
    ) -> Result<(), SyncError> {
        self.set_draft_value(field, value).await;
        self.save_field(SaveTarget::Field(field)).await
    }

    /// Picks an image and applies it optimistically. Remote failures are
    /// reported but never roll back the local photo.
    pub async fn change_photo(&self) -> Result<Option<String>, SyncError> {
        let uri = match self.picker.pick(PickOptions::profile_photo()).await {
            PickOutcome::Cancelled => {
                info!("User cancelled image picker");
                return Ok(None);
            }
            PickOutcome::Error(reason) => {
                warn!(%reason, "ImagePicker Error");
                let err = SyncError::Pick(reason);
                self.raise(&err);
                return Err(err);
            }
            PickOutcome::Asset { uri } => uri,
        };

        self.draft.lock().await.photo = uri.clone();
        self.publish_draft().await;

        let Some(session) = self.identity.current_session() else {
            info!("no session; photo kept locally only");
            return Ok(Some(uri));
        };

        let identity_failure = self
            .identity
            .update_session_profile(SessionProfileUpdate {
                display_name: None,
                photo_ref: Some(uri.clone()),
            })
            .await
            .err();

        let mut update = DocumentFields::new();
        update.insert(PHOTO_DOCUMENT_KEY.to_string(), Value::String(uri.clone()));
        let store_failure = self
            .store
            .update_doc(&self.collection, session.id.as_str(), &update)
            .await
            .err();

        if identity_failure.is_none() && store_failure.is_none() {
            info!(session_id = %session.id, "profile photo updated");
            return Ok(Some(uri));
        }

        let err = SyncError::Photo {
            identity: identity_failure,
            store: store_failure,
        };
        error!(session_id = %session.id, error = %err, "Error updating profile picture");
        self.raise(&err);
        Err(err)
    }

    pub async fn sign_out(&self) -> Result<(), SyncError> {
        match self.identity.sign_out().await {
            Ok(()) => {
                *self.draft.lock().await = ProfileDraft::default();
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "Error signing out");
                let err = SyncError::SignOut(err);
                self.raise(&err);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/profile_tests.rs"]
mod tests;
