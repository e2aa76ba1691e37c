use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthErrorCode {
    InvalidEmail,
    UserDisabled,
    UserNotFound,
    WrongPassword,
    NetworkRequestFailed,
    EmailAlreadyInUse,
    WeakPassword,
    NoSession,
    Unknown,
}

impl AuthErrorCode {
    /// Accepts both `auth/invalid-email` and bare `invalid-email` forms.
    pub fn from_code(code: &str) -> Self {
        let code = code.trim();
        let code = code.strip_prefix("auth/").unwrap_or(code);
        match code {
            "invalid-email" => Self::InvalidEmail,
            "user-disabled" => Self::UserDisabled,
            "user-not-found" => Self::UserNotFound,
            "wrong-password" => Self::WrongPassword,
            "network-request-failed" => Self::NetworkRequestFailed,
            "email-already-in-use" => Self::EmailAlreadyInUse,
            "weak-password" => Self::WeakPassword,
            "no-current-user" => Self::NoSession,
            _ => Self::Unknown,
        }
    }

    /// Maps the identity toolkit REST error message (`EMAIL_NOT_FOUND`,
    /// `WEAK_PASSWORD : Password should be ...`) to a code.
    pub fn from_rest_message(message: &str) -> Self {
        let head = message.split(':').next().unwrap_or_default().trim();
        match head {
            "INVALID_EMAIL" | "MISSING_EMAIL" => Self::InvalidEmail,
            "USER_DISABLED" => Self::UserDisabled,
            "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => Self::UserNotFound,
            "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "MISSING_PASSWORD" => {
                Self::WrongPassword
            }
            "EMAIL_EXISTS" => Self::EmailAlreadyInUse,
            "WEAK_PASSWORD" => Self::WeakPassword,
            "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "USER_MISMATCH" => Self::NoSession,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidEmail => "auth/invalid-email",
            Self::UserDisabled => "auth/user-disabled",
            Self::UserNotFound => "auth/user-not-found",
            Self::WrongPassword => "auth/wrong-password",
            Self::NetworkRequestFailed => "auth/network-request-failed",
            Self::EmailAlreadyInUse => "auth/email-already-in-use",
            Self::WeakPassword => "auth/weak-password",
            Self::NoSession => "auth/no-current-user",
            Self::Unknown => "auth/unknown",
        }
    }

    /// Fixed user-facing text shown under the login and register forms.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::InvalidEmail => "Invalid email address.",
            Self::UserDisabled => "This user account has been disabled.",
            Self::UserNotFound | Self::WrongPassword => "Invalid email or password.",
            Self::NetworkRequestFailed => "Network error. Please check your internet connection.",
            Self::EmailAlreadyInUse => "That email address is already in use.",
            Self::WeakPassword => "Password should be at least 6 characters.",
            Self::NoSession | Self::Unknown => "An unexpected error occurred. Please try again.",
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{}: {message}", code.as_str())]
pub struct AuthError {
    pub code: AuthErrorCode,
    pub message: String,
}

impl AuthError {
    pub fn new(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::NetworkRequestFailed, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::Unknown, message)
    }

    pub fn user_message(&self) -> &'static str {
        self.code.user_message()
    }
}
