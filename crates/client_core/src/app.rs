use std::sync::{Arc, Mutex};

use shared::domain::{ProductEntry, ProfileRecord};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::warn;

use crate::{
    auth::{LoginForm, RegisterForm},
    products::ProductLister,
    profile::{ProfileSynchronizer, SyncError, DEFAULT_PROFILE_COLLECTION},
    session::SessionObserver,
    view::{View, ViewState, ViewStore},
    ClientEvent, DocumentStore, IdentityProvider, MediaPicker, MissingMediaPicker,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Application root: owns the view state, the session subscription and the
/// profile synchronizer.
pub struct AppShell {
    identity: Arc<dyn IdentityProvider>,
    views: Arc<ViewStore>,
    profile: Arc<ProfileSynchronizer>,
    events: broadcast::Sender<ClientEvent>,
    observer: Mutex<Option<JoinHandle<()>>>,
}

impl AppShell {
    pub fn new(identity: Arc<dyn IdentityProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self::new_with_dependencies(
            identity,
            store,
            Arc::new(MissingMediaPicker),
            DEFAULT_PROFILE_COLLECTION,
        )
    }

    pub fn new_with_dependencies(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        picker: Arc<dyn MediaPicker>,
        profile_collection: &str,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let profile = Arc::new(ProfileSynchronizer::new(
            Arc::clone(&identity),
            store,
            picker,
            profile_collection,
            events.clone(),
        ));
        Self {
            identity,
            views: Arc::new(ViewStore::new()),
            profile,
            events,
            observer: Mutex::new(None),
        }
    }

    /// Subscribes to session changes. Only the first call has an effect.
    pub fn start(&self) {
        let mut observer = self
            .observer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if observer.is_some() {
            warn!("session observer already running");
            return;
        }
        *observer = Some(
            SessionObserver::new(Arc::clone(&self.identity), Arc::clone(&self.views)).spawn(),
        );
    }

    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    pub fn views(&self) -> &Arc<ViewStore> {
        &self.views
    }

    pub fn view(&self) -> View {
        self.views.view()
    }

    pub fn view_state(&self) -> ViewState {
        self.views.snapshot()
    }

    pub fn profile(&self) -> &Arc<ProfileSynchronizer> {
        &self.profile
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn products(&self) -> Vec<ProductEntry> {
        ProductLister::entries()
    }

    pub fn switch_to_register(&self) {
        self.views.set_registering(true);
    }

    pub fn switch_to_login(&self) {
        self.views.set_registering(false);
    }

    pub fn show_products(&self) {
        self.views.set_show_profile(false);
    }

    /// Switches to the profile view and mounts it, loading the record.
    pub async fn show_profile(&self) -> Result<Option<ProfileRecord>, SyncError> {
        self.views.set_show_profile(true);
        self.profile.mount().await
    }

    pub async fn sign_in(&self, form: &mut LoginForm) -> bool {
        form.submit(self.identity.as_ref()).await.is_some()
    }

    /// A successful registration returns the auth screen to login mode.
    pub async fn register(&self, form: &mut RegisterForm) -> bool {
        let registered = form.submit(self.identity.as_ref()).await.is_some();
        if registered {
            self.views.set_registering(false);
        }
        registered
    }
}

impl Drop for AppShell {
    fn drop(&mut self) {
        let observer = self
            .observer
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(task) = observer.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/app_tests.rs"]
mod tests;
