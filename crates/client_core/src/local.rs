//! Identity and documents served from the local SQLite database.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use shared::{
    domain::{Session, SessionId, SessionProfileUpdate},
    error::{AuthError, AuthErrorCode},
};
use storage::{NewAccount, Storage, StoredAccount};
use tracing::{debug, info, warn};

use crate::{no_session_error, DocumentFields, DocumentStore, IdentityProvider, SessionHub, SessionStream};

const MIN_PASSWORD_LEN: usize = 6;

pub struct LocalIdentity {
    storage: Storage,
    hub: SessionHub,
}

impl LocalIdentity {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            hub: SessionHub::new(),
        }
    }

    /// Opens the provider and republishes the session remembered by the
    /// last run, if its account still exists and is enabled.
    pub async fn restore(storage: Storage) -> Result<Self> {
        let identity = Self::new(storage);
        let Some(saved) = identity.storage.load_current_session().await? else {
            return Ok(identity);
        };
        match identity.storage.account_by_uid(&saved.uid).await? {
            Some(account) if !account.disabled => {
                info!(session_id = %account.uid, anonymous = account.is_anonymous, "restored saved session");
                identity
                    .hub
                    .publish(Some(Self::session_from_account(&account)));
            }
            _ => {
                info!(session_id = %saved.uid, "saved session is no longer usable");
                identity.storage.clear_current_session().await?;
            }
        }
        Ok(identity)
    }

    fn session_from_account(account: &StoredAccount) -> Session {
        Session {
            id: account.uid.clone(),
            display_name: account.display_name.clone(),
            email: account.email.clone(),
            photo_ref: account.photo_ref.clone(),
            is_anonymous: account.is_anonymous,
            issued_at: chrono::Utc::now(),
        }
    }

    async fn sign_in(&self, account: &StoredAccount) -> Session {
        let session = Self::session_from_account(account);
        // The sign-in stands even if it cannot be remembered for the next run.
        if let Err(err) = self.storage.save_current_session(&account.uid, None).await {
            warn!(session_id = %account.uid, error = %format!("{err:#}"), "failed to remember session");
        }
        self.hub.publish(Some(session.clone()));
        session
    }
}

fn storage_error(err: anyhow::Error) -> AuthError {
    AuthError::unknown(format!("{err:#}"))
}

fn password_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub(crate) fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_ascii_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if valid && !email.contains(char::is_whitespace) {
        Ok(email)
    } else {
        Err(AuthError::new(
            AuthErrorCode::InvalidEmail,
            "the email address is badly formatted",
        ))
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    fn observe_session(&self) -> SessionStream {
        self.hub.subscribe()
    }

    fn current_session(&self) -> Option<Session> {
        self.hub.current()
    }

    async fn sign_in_anonymously(&self) -> Result<Session, AuthError> {
        let account = self
            .storage
            .insert_account(&NewAccount {
                uid: SessionId::random(),
                email: None,
                password_digest: None,
                password_salt: None,
                is_anonymous: true,
            })
            .await
            .map_err(storage_error)?;
        debug!(session_id = %account.uid, "anonymous account created");
        Ok(self.sign_in(&account).await)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let email = normalize_email(email)?;
        let account = self
            .storage
            .account_by_email(&email)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| AuthError::new(AuthErrorCode::UserNotFound, "no account for email"))?;
        if account.disabled {
            return Err(AuthError::new(
                AuthErrorCode::UserDisabled,
                "the account has been disabled",
            ));
        }
        let matches = match (&account.password_salt, &account.password_digest) {
            (Some(salt), Some(digest)) => password_digest(salt, password) == *digest,
            _ => false,
        };
        if !matches {
            return Err(AuthError::new(
                AuthErrorCode::WrongPassword,
                "the password is invalid",
            ));
        }
        info!(session_id = %account.uid, "password sign-in");
        Ok(self.sign_in(&account).await)
    }

    async fn create_user_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::new(
                AuthErrorCode::WeakPassword,
                "password should be at least 6 characters",
            ));
        }
        if self
            .storage
            .account_by_email(&email)
            .await
            .map_err(storage_error)?
            .is_some()
        {
            return Err(AuthError::new(
                AuthErrorCode::EmailAlreadyInUse,
                "the email address is already in use by another account",
            ));
        }

        let salt = uuid::Uuid::new_v4().simple().to_string();
        let account = self
            .storage
            .insert_account(&NewAccount {
                uid: SessionId::random(),
                email: Some(email),
                password_digest: Some(password_digest(&salt, password)),
                password_salt: Some(salt),
                is_anonymous: false,
            })
            .await
            .map_err(storage_error)?;
        info!(session_id = %account.uid, "account created");
        Ok(self.sign_in(&account).await)
    }

    async fn update_session_profile(
        &self,
        update: SessionProfileUpdate,
    ) -> Result<Session, AuthError> {
        let current = self.hub.current().ok_or_else(no_session_error)?;
        let account = self
            .storage
            .update_account_profile(
                &current.id,
                update.display_name.as_deref(),
                update.photo_ref.as_deref(),
            )
            .await
            .map_err(storage_error)?;
        let session = Session {
            issued_at: current.issued_at,
            ..Self::session_from_account(&account)
        };
        self.hub.refresh(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(session) = self.hub.current() {
            info!(session_id = %session.id, "signing out");
        }
        if let Err(err) = self.storage.clear_current_session().await {
            warn!(error = %format!("{err:#}"), "failed to forget saved session");
        }
        self.hub.publish(None);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for Storage {
    async fn get_doc(&self, collection: &str, doc_id: &str) -> Result<Option<DocumentFields>> {
        Storage::get_doc(self, collection, doc_id).await
    }

    async fn set_doc(&self, collection: &str, doc_id: &str, fields: &DocumentFields) -> Result<()> {
        Storage::set_doc(self, collection, doc_id, fields).await
    }

    async fn update_doc(
        &self,
        collection: &str,
        doc_id: &str,
        partial: &DocumentFields,
    ) -> Result<()> {
        Storage::update_doc(self, collection, doc_id, partial).await
    }
}

#[cfg(test)]
#[path = "tests/local_tests.rs"]
mod tests;
