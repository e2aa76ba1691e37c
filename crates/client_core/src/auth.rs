//! Email/password forms shown on the auth screens.

use shared::domain::Session;
use tracing::{error, info};

use crate::IdentityProvider;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub error: Option<String>,
}

impl LoginForm {
    /// On failure `error` holds the user-facing message; the raw error is logged.
    pub async fn submit(&mut self, identity: &dyn IdentityProvider) -> Option<Session> {
        match identity
            .sign_in_with_password(self.email.trim(), &self.password)
            .await
        {
            Ok(session) => {
                info!(session_id = %session.id, "User signed in successfully!");
                self.error = None;
                Some(session)
            }
            Err(err) => {
                error!(code = err.code.as_str(), error = %err, "sign in failed");
                self.error = Some(err.user_message().to_string());
                None
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub error: Option<String>,
}

impl RegisterForm {
    /// Checks that need no network round trip.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.email.trim().is_empty() {
            return Err("Please enter an email address.");
        }
        if self.password.is_empty() {
            return Err("Please enter a password.");
        }
        if self.password != self.confirm_password {
            return Err("Passwords do not match.");
        }
        Ok(())
    }

    pub async fn submit(&mut self, identity: &dyn IdentityProvider) -> Option<Session> {
        if let Err(message) = self.validate() {
            self.error = Some(message.to_string());
            return None;
        }
        match identity
            .create_user_with_password(self.email.trim(), &self.password)
            .await
        {
            Ok(session) => {
                info!(session_id = %session.id, "User account created");
                self.error = None;
                Some(session)
            }
            Err(err) => {
                error!(code = err.code.as_str(), error = %err, "registration failed");
                self.error = Some(err.user_message().to_string());
                None
            }
        }
    }
}
