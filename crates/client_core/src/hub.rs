use std::sync::{Arc, Mutex, MutexGuard};

use futures::{future, stream, StreamExt};
use shared::domain::Session;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::warn;

use crate::SessionStream;

pub(crate) const SESSION_CHANNEL_CAPACITY: usize = 64;

/// Holds the provider's current session and fans out changes in emission order.
pub struct SessionHub {
    current: Arc<Mutex<Option<Session>>>,
    tx: broadcast::Sender<Option<Session>>,
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SESSION_CHANNEL_CAPACITY);
        Self {
            current: Arc::new(Mutex::new(None)),
            tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        lock_session(&self.current)
    }

    pub fn current(&self) -> Option<Session> {
        self.lock().clone()
    }

    /// Replays the current session first, then every later `publish`. A
    /// subscriber that falls behind gets the current session in place of the
    /// notifications it missed.
    pub fn subscribe(&self) -> SessionStream {
        // Subscribing under the lock keeps a concurrent publish from slipping
        // between the replayed value and the live stream.
        let guard = self.lock();
        let rx = self.tx.subscribe();
        let initial = guard.clone();
        drop(guard);

        let current = Arc::clone(&self.current);
        let updates = BroadcastStream::new(rx).map(move |item| match item {
            Ok(session) => session,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "session subscriber lagged behind provider");
                lock_session(&current).clone()
            }
        });
        stream::once(future::ready(initial)).chain(updates).boxed()
    }

    pub fn publish(&self, session: Option<Session>) {
        let mut guard = self.lock();
        *guard = session.clone();
        // No receivers is fine: nobody observes yet.
        let _ = self.tx.send(session);
    }

    /// Refreshes attributes of the held session without a state-change notification.
    pub fn refresh(&self, session: Session) {
        let mut guard = self.lock();
        if guard.as_ref().is_some_and(|held| held.id == session.id) {
            *guard = Some(session);
        }
    }
}

fn lock_session(current: &Mutex<Option<Session>>) -> MutexGuard<'_, Option<Session>> {
    current
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
