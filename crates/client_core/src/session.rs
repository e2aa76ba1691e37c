use std::sync::Arc;

use futures::StreamExt;
use shared::domain::Session;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::{view::ViewStore, IdentityProvider};

/// Single subscription to the provider's session changes; the only writer
/// of the session slot in [`ViewStore`].
pub struct SessionObserver {
    identity: Arc<dyn IdentityProvider>,
    views: Arc<ViewStore>,
}

impl SessionObserver {
    pub fn new(identity: Arc<dyn IdentityProvider>, views: Arc<ViewStore>) -> Self {
        Self { identity, views }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let mut sessions = self.identity.observe_session();
        while let Some(session) = sessions.next().await {
            self.handle(session);
        }
        info!("session stream closed");
    }

    fn handle(&self, session: Option<Session>) {
        let session_id = session.as_ref().map(|s| s.id.clone());
        let anonymous = session.as_ref().is_some_and(|s| s.is_anonymous);
        let applied = self.views.apply_session(session);
        if applied.first_notification {
            debug!("first session notification received; initialization complete");
        }

        match session_id {
            Some(session_id) => info!(%session_id, anonymous, "session active"),
            None => {
                info!("no session; requesting anonymous sign-in");
                self.request_anonymous_session();
            }
        }
    }

    /// Fire-and-forget: the new session, if any, arrives through the stream.
    fn request_anonymous_session(&self) {
        let identity = Arc::clone(&self.identity);
        tokio::spawn(async move {
            match identity.sign_in_anonymously().await {
                Ok(session) => debug!(session_id = %session.id, "anonymous sign-in issued"),
                Err(err) => error!(code = err.code.as_str(), error = %err, "anonymous sign in error"),
            }
        });
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
