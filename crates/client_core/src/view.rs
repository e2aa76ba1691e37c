//! Local view state and the router that maps it to exactly one screen.

use shared::domain::Session;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Register,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Loading,
    Auth(AuthMode),
    Products,
    Profile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub initializing: bool,
    pub session: Option<Session>,
    pub show_profile: bool,
    pub is_registering: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            initializing: true,
            session: None,
            show_profile: false,
            is_registering: false,
        }
    }
}

impl ViewState {
    pub fn view(&self) -> View {
        route(self)
    }
}

pub fn route(state: &ViewState) -> View {
    if state.initializing {
        return View::Loading;
    }
    match (&state.session, state.show_profile, state.is_registering) {
        (None, _, false) => View::Auth(AuthMode::Login),
        (None, _, true) => View::Auth(AuthMode::Register),
        (Some(_), false, _) => View::Products,
        (Some(_), true, _) => View::Profile,
    }
}

/// What a session notification changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SessionApplied {
    pub first_notification: bool,
    pub signed_in: bool,
}

/// Owner of the view state. The session slot is written only by the
/// session observer; the two toggles are plain local transitions.
pub struct ViewStore {
    tx: watch::Sender<ViewState>,
}

impl Default for ViewStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ViewState::default());
        Self { tx }
    }

    pub fn snapshot(&self) -> ViewState {
        self.tx.borrow().clone()
    }

    pub fn view(&self) -> View {
        route(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.tx.subscribe()
    }

    pub(crate) fn apply_session(&self, session: Option<Session>) -> SessionApplied {
        let mut applied = SessionApplied {
            first_notification: false,
            signed_in: session.is_some(),
        };
        self.tx.send_modify(|state| {
            applied.first_notification = state.initializing;
            state.initializing = false;
            if session.is_some() {
                state.show_profile = false;
            }
            state.session = session;
        });
        applied
    }

    pub fn set_show_profile(&self, show: bool) {
        self.tx.send_if_modified(|state| {
            let changed = state.show_profile != show;
            state.show_profile = show;
            changed
        });
    }

    pub fn set_registering(&self, registering: bool) {
        self.tx.send_if_modified(|state| {
            let changed = state.is_registering != registering;
            state.is_registering = registering;
            changed
        });
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
