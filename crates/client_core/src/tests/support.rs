//! In-test collaborators shared by the core's unit tests.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{Session, SessionId, SessionProfileUpdate},
    error::{AuthError, AuthErrorCode},
};
use tokio::sync::Mutex;

use crate::{
    view::{route, View, ViewStore},
    DocumentFields, DocumentStore, IdentityProvider, MediaPicker, PickOptions, PickOutcome,
    SessionHub, SessionStream,
};

#[derive(Default)]
pub(crate) struct FakeIdentity {
    pub hub: SessionHub,
    pub fail_anonymous: AtomicBool,
    pub fail_profile_update: AtomicBool,
    pub fail_sign_out: AtomicBool,
    pub password_error: Mutex<Option<AuthError>>,
    pub calls: Mutex<Vec<String>>,
    pub profile_updates: Mutex<Vec<SessionProfileUpdate>>,
    next_id: AtomicUsize,
}

impl FakeIdentity {
    pub fn signed_in(id: &str) -> Self {
        let identity = Self::default();
        identity
            .hub
            .publish(Some(Session::anonymous(SessionId::from(id))));
        identity
    }

    pub async fn call_count(&self, name: &str) -> usize {
        self.calls.lock().await.iter().filter(|c| *c == name).count()
    }

    async fn record(&self, name: &str) {
        self.calls.lock().await.push(name.to_string());
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    fn observe_session(&self) -> SessionStream {
        self.hub.subscribe()
    }

    fn current_session(&self) -> Option<Session> {
        self.hub.current()
    }

    async fn sign_in_anonymously(&self) -> Result<Session, AuthError> {
        self.record("sign_in_anonymously").await;
        if self.fail_anonymous.load(Ordering::SeqCst) {
            return Err(AuthError::network("simulated network error"));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let session = Session::anonymous(SessionId(format!("anon-{n}")));
        self.hub.publish(Some(session.clone()));
        Ok(session)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        _password: &str,
    ) -> Result<Session, AuthError> {
        self.record("sign_in_with_password").await;
        if let Some(err) = self.password_error.lock().await.clone() {
            return Err(err);
        }
        let mut session = Session::anonymous(SessionId(format!("pw-{email}")));
        session.is_anonymous = false;
        session.email = Some(email.to_string());
        self.hub.publish(Some(session.clone()));
        Ok(session)
    }

    async fn create_user_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        self.record("create_user_with_password").await;
        if password.len() < 6 {
            return Err(AuthError::new(AuthErrorCode::WeakPassword, "too short"));
        }
        let mut session = Session::anonymous(SessionId(format!("new-{email}")));
        session.is_anonymous = false;
        session.email = Some(email.to_string());
        self.hub.publish(Some(session.clone()));
        Ok(session)
    }

    async fn update_session_profile(
        &self,
        update: SessionProfileUpdate,
    ) -> Result<Session, AuthError> {
        self.record("update_session_profile").await;
        self.profile_updates.lock().await.push(update.clone());
        if self.fail_profile_update.load(Ordering::SeqCst) {
            return Err(AuthError::network("simulated profile update failure"));
        }
        let mut session = self.hub.current().ok_or_else(crate::no_session_error)?;
        if let Some(name) = update.display_name {
            session.display_name = Some(name);
        }
        if let Some(photo) = update.photo_ref {
            session.photo_ref = Some(photo);
        }
        self.hub.refresh(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.record("sign_out").await;
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(AuthError::unknown("simulated sign out failure"));
        }
        self.hub.publish(None);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeStore {
    pub docs: Mutex<HashMap<(String, String), DocumentFields>>,
    pub fail_get: AtomicBool,
    pub fail_update: AtomicBool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeStore {
    pub async fn doc(&self, collection: &str, doc_id: &str) -> Option<DocumentFields> {
        self.docs
            .lock()
            .await
            .get(&(collection.to_string(), doc_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl DocumentStore for FakeStore {
    async fn get_doc(&self, collection: &str, doc_id: &str) -> Result<Option<DocumentFields>> {
        self.calls.lock().await.push("get_doc".into());
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(anyhow!("simulated store outage"));
        }
        Ok(self.doc(collection, doc_id).await)
    }

    async fn set_doc(&self, collection: &str, doc_id: &str, fields: &DocumentFields) -> Result<()> {
        self.calls.lock().await.push("set_doc".into());
        self.docs
            .lock()
            .await
            .insert((collection.to_string(), doc_id.to_string()), fields.clone());
        Ok(())
    }

    async fn update_doc(
        &self,
        collection: &str,
        doc_id: &str,
        partial: &DocumentFields,
    ) -> Result<()> {
        self.calls.lock().await.push("update_doc".into());
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(anyhow!("simulated store write failure"));
        }
        let mut docs = self.docs.lock().await;
        let doc = docs
            .get_mut(&(collection.to_string(), doc_id.to_string()))
            .ok_or_else(|| anyhow!("document {collection}/{doc_id} does not exist"))?;
        for (key, value) in partial {
            doc.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

pub(crate) struct FakePicker {
    pub outcome: PickOutcome,
    pub requests: Mutex<Vec<PickOptions>>,
}

impl FakePicker {
    pub fn returning(outcome: PickOutcome) -> Self {
        Self {
            outcome,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MediaPicker for FakePicker {
    async fn pick(&self, options: PickOptions) -> PickOutcome {
        self.requests.lock().await.push(options);
        self.outcome.clone()
    }
}

pub(crate) async fn wait_for_view(views: &ViewStore, expected: View) {
    let mut rx = views.subscribe();
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if route(&rx.borrow_and_update()) == expected {
                return;
            }
            rx.changed().await.expect("view store alive");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("view never became {expected:?}; now {:?}", views.view()));
}
