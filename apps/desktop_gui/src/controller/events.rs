//! Backend-to-UI events and error modeling for the desktop GUI.

use client_core::{Alert, ProfileDraft, ViewState};

pub enum UiEvent {
    Info(String),
    ViewChanged(ViewState),
    ProfileUpdated(ProfileDraft),
    Alert(Alert),
    SignInFailed(String),
    RegisterFailed(String),
    Registered,
    Error(UiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Config,
    Storage,
    Transport,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    General,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        let category = if lower.contains("config")
            || lower.contains("api_key")
            || lower.contains("project_id")
            || lower.contains("unknown backend")
        {
            UiErrorCategory::Config
        } else if lower.contains("sqlite") || lower.contains("database") {
            UiErrorCategory::Storage
        } else if lower.contains("timeout")
            || lower.contains("connection")
            || lower.contains("network")
            || lower.contains("disconnected")
        {
            UiErrorCategory::Transport
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    /// Startup failures leave no working backend; the app cannot recover.
    pub fn is_fatal(&self) -> bool {
        self.context == UiErrorContext::BackendStartup
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub fn err_label(category: UiErrorCategory) -> &'static str {
    match category {
        UiErrorCategory::Config => "Configuration",
        UiErrorCategory::Storage => "Storage",
        UiErrorCategory::Transport => "Connection",
        UiErrorCategory::Unknown => "Error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_missing_firebase_credentials_as_config() {
        let err = UiError::from_message(
            UiErrorContext::BackendStartup,
            "firebase backend selected but APP__FIREBASE_API_KEY / firebase_api_key is not set",
        );
        assert_eq!(err.category(), UiErrorCategory::Config);
        assert!(err.is_fatal());
    }

    #[test]
    fn classifies_database_open_failure_as_storage() {
        let err = UiError::from_message(
            UiErrorContext::BackendStartup,
            "failed to open database sqlite://./data/app.db",
        );
        assert_eq!(err.category(), UiErrorCategory::Storage);
        assert_eq!(err_label(err.category()), "Storage");
    }

    #[test]
    fn classifies_command_processor_disconnect_as_transport() {
        let err = UiError::from_message(
            UiErrorContext::General,
            "Backend command processor disconnected",
        );
        assert_eq!(err.category(), UiErrorCategory::Transport);
        assert!(!err.is_fatal());
        assert_eq!(err.context(), UiErrorContext::General);
    }
}
