//! Hosted backend over the identity toolkit and Firestore REST APIs.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{Session, SessionId, SessionProfileUpdate},
    error::{AuthError, AuthErrorCode},
    protocol::{
        AuthTokenResponse, FirestoreDocument, LookupRequest, LookupResponse, RefreshTokenRequest,
        RefreshTokenResponse, RestErrorEnvelope, SignInWithPasswordRequest, SignUpRequest,
        UpdateAccountRequest, UpdateAccountResponse,
    },
};
use storage::Storage;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::{no_session_error, DocumentFields, DocumentStore, IdentityProvider, SessionHub, SessionStream};

pub const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1/";
pub const FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1/";
pub const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/";

/// Tokens this close to expiry are exchanged before use.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub project_id: String,
    pub identity_base_url: Url,
    pub firestore_base_url: Url,
    pub secure_token_base_url: Url,
}

impl FirebaseConfig {
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Result<Self> {
        Self::with_endpoints(api_key, project_id, IDENTITY_TOOLKIT_URL, FIRESTORE_URL)
    }

    pub fn with_endpoints(
        api_key: impl Into<String>,
        project_id: impl Into<String>,
        identity_base_url: &str,
        firestore_base_url: &str,
    ) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            identity_base_url: parse_base(identity_base_url)?,
            firestore_base_url: parse_base(firestore_base_url)?,
            secure_token_base_url: parse_base(SECURE_TOKEN_URL)?,
        })
    }

    pub fn with_secure_token_endpoint(mut self, secure_token_base_url: &str) -> Result<Self> {
        self.secure_token_base_url = parse_base(secure_token_base_url)?;
        Ok(self)
    }

    fn token_url(&self) -> Url {
        let mut url = self.secure_token_base_url.clone();
        let path = format!("{}token", url.path());
        url.set_path(&path);
        url.query_pairs_mut().append_pair("key", &self.api_key);
        url
    }

    fn accounts_url(&self, method: &str) -> Url {
        let mut url = self.identity_base_url.clone();
        let path = format!("{}accounts:{method}", url.path());
        url.set_path(&path);
        url.query_pairs_mut().append_pair("key", &self.api_key);
        url
    }

    fn document_url(&self, collection: &str, doc_id: &str) -> Result<Url> {
        let mut url = self.firestore_base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("firestore base url cannot carry a path"))?
            .pop_if_empty()
            .extend([
                "projects",
                self.project_id.as_str(),
                "databases",
                "(default)",
                "documents",
                collection,
                doc_id,
            ]);
        Ok(url)
    }
}

fn parse_base(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).with_context(|| format!("invalid base url '{raw}'"))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

struct TokenState {
    session: Session,
    id_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

pub struct FirebaseIdentity {
    http: Client,
    config: FirebaseConfig,
    hub: SessionHub,
    tokens: Mutex<Option<TokenState>>,
    cache: Option<Storage>,
}

impl FirebaseIdentity {
    pub fn new(config: FirebaseConfig) -> Arc<Self> {
        Arc::new(Self::build(config, None))
    }

    /// Provider that remembers its refresh token in `cache` and resumes the
    /// remembered session before anyone subscribes.
    pub async fn restore(config: FirebaseConfig, cache: Storage) -> Arc<Self> {
        let identity = Self::build(config, Some(cache));
        identity.resume().await;
        Arc::new(identity)
    }

    fn build(config: FirebaseConfig, cache: Option<Storage>) -> Self {
        Self {
            http: Client::new(),
            config,
            hub: SessionHub::new(),
            tokens: Mutex::new(None),
            cache,
        }
    }

    pub fn config(&self) -> &FirebaseConfig {
        &self.config
    }

    /// Bearer token for document requests, if signed in. An expired token is
    /// exchanged first; if the exchange fails the stale token is returned and
    /// the request reports the rejection.
    pub async fn id_token(&self) -> Option<String> {
        let (session_id, refresh_token) = {
            let tokens = self.tokens.lock().await;
            let state = tokens.as_ref()?;
            if state.expires_at > Utc::now() + Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS) {
                return Some(state.id_token.clone());
            }
            if state.refresh_token.is_empty() {
                warn!(session_id = %state.session.id, "id token expired and no refresh token is held");
                return Some(state.id_token.clone());
            }
            (state.session.id.clone(), state.refresh_token.clone())
        };

        let fresh = match self.exchange_refresh_token(&refresh_token).await {
            Ok(fresh) => fresh,
            Err(err) => {
                warn!(%session_id, code = err.code.as_str(), error = %err, "id token refresh failed");
                return self.tokens.lock().await.as_ref().map(|s| s.id_token.clone());
            }
        };

        let mut tokens = self.tokens.lock().await;
        // Signed out or switched accounts while the exchange was in flight.
        let state = tokens.as_mut()?;
        if state.session.id != session_id {
            return Some(state.id_token.clone());
        }
        state.id_token = fresh.id_token;
        if !fresh.refresh_token.is_empty() {
            state.refresh_token = fresh.refresh_token;
        }
        state.expires_at = Utc::now() + Duration::seconds(token_lifetime(&fresh.expires_in));
        let id_token = state.id_token.clone();
        let refresh_token = state.refresh_token.clone();
        drop(tokens);

        debug!(%session_id, "id token refreshed");
        self.remember(&session_id, &refresh_token).await;
        Some(id_token)
    }

    pub async fn has_refresh_token(&self) -> bool {
        self.tokens
            .lock()
            .await
            .as_ref()
            .is_some_and(|state| !state.refresh_token.is_empty())
    }

    async fn call<Req, Resp>(&self, method: &str, body: &Req) -> Result<Resp, AuthError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned + Send,
    {
        let res = self
            .http
            .post(self.config.accounts_url(method))
            .json(body)
            .send()
            .await
            .map_err(|err| AuthError::network(err.to_string()))?;

        let status = res.status();
        if status.is_success() {
            return res
                .json::<Resp>()
                .await
                .map_err(|err| AuthError::unknown(format!("malformed {method} response: {err}")));
        }

        let text = res.text().await.unwrap_or_default();
        Err(rejection(method, status, &text))
    }

    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshTokenResponse, AuthError> {
        let res = self
            .http
            .post(self.config.token_url())
            .form(&RefreshTokenRequest::new(refresh_token))
            .send()
            .await
            .map_err(|err| AuthError::network(err.to_string()))?;

        let status = res.status();
        if status.is_success() {
            return res
                .json::<RefreshTokenResponse>()
                .await
                .map_err(|err| AuthError::unknown(format!("malformed token response: {err}")));
        }
        let text = res.text().await.unwrap_or_default();
        Err(rejection("token", status, &text))
    }

    /// Exchanges the remembered refresh token and republishes its account.
    /// Rejected tokens are forgotten; network failures keep them for the next run.
    async fn resume(&self) {
        let Some(cache) = &self.cache else {
            return;
        };
        let saved = match cache.load_current_session().await {
            Ok(Some(saved)) => saved,
            Ok(None) => return,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed to read saved session");
                return;
            }
        };
        let Some(refresh_token) = saved.refresh_token.filter(|t| !t.is_empty()) else {
            self.forget().await;
            return;
        };

        match self.resume_with(&refresh_token).await {
            Ok(session) => info!(session_id = %session.id, "restored saved session"),
            Err(err) => {
                warn!(session_id = %saved.uid, code = err.code.as_str(), error = %err, "could not restore saved session");
                if err.code != AuthErrorCode::NetworkRequestFailed {
                    self.forget().await;
                }
            }
        }
    }

    async fn resume_with(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let fresh = self.exchange_refresh_token(refresh_token).await?;
        let lookup: LookupResponse = self
            .call(
                "lookup",
                &LookupRequest {
                    id_token: fresh.id_token.clone(),
                },
            )
            .await?;
        let account = lookup
            .users
            .into_iter()
            .find(|user| user.local_id == fresh.user_id)
            .ok_or_else(|| {
                AuthError::new(AuthErrorCode::UserNotFound, "saved account no longer exists")
            })?;
        let is_anonymous = account.email.as_deref().is_none_or(str::is_empty);
        let response = AuthTokenResponse {
            id_token: fresh.id_token,
            refresh_token: fresh.refresh_token,
            expires_in: fresh.expires_in,
            local_id: fresh.user_id,
            email: account.email,
            display_name: account.display_name,
            photo_url: account.photo_url,
        };
        Ok(self.accept(response, is_anonymous).await)
    }

    async fn remember(&self, session_id: &SessionId, refresh_token: &str) {
        if let Some(cache) = &self.cache {
            if let Err(err) = cache.save_current_session(session_id, Some(refresh_token)).await {
                warn!(%session_id, error = %format!("{err:#}"), "failed to remember session");
            }
        }
    }

    async fn forget(&self) {
        if let Some(cache) = &self.cache {
            if let Err(err) = cache.clear_current_session().await {
                warn!(error = %format!("{err:#}"), "failed to forget saved session");
            }
        }
    }

    async fn accept(&self, response: AuthTokenResponse, is_anonymous: bool) -> Session {
        let lifetime = token_lifetime(&response.expires_in);
        let session = Session {
            id: SessionId(response.local_id),
            display_name: response.display_name.filter(|s| !s.is_empty()),
            email: response.email.filter(|s| !s.is_empty()),
            photo_ref: response.photo_url.filter(|s| !s.is_empty()),
            is_anonymous,
            issued_at: Utc::now(),
        };
        *self.tokens.lock().await = Some(TokenState {
            session: session.clone(),
            id_token: response.id_token,
            refresh_token: response.refresh_token.clone(),
            expires_at: session.issued_at + Duration::seconds(lifetime),
        });
        self.remember(&session.id, &response.refresh_token).await;
        self.hub.publish(Some(session.clone()));
        session
    }
}

fn token_lifetime(expires_in: &str) -> i64 {
    expires_in
        .trim()
        .parse::<i64>()
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)
}

fn rejection(method: &str, status: StatusCode, text: &str) -> AuthError {
    let err = match serde_json::from_str::<RestErrorEnvelope>(text) {
        Ok(envelope) => AuthError::new(
            AuthErrorCode::from_rest_message(&envelope.error.message),
            envelope.error.message,
        ),
        Err(_) => AuthError::unknown(format!("{method} failed with {status}: {text}")),
    };
    debug!(method, %status, code = err.code.as_str(), "identity call rejected");
    err
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    fn observe_session(&self) -> SessionStream {
        self.hub.subscribe()
    }

    fn current_session(&self) -> Option<Session> {
        self.hub.current()
    }

    async fn sign_in_anonymously(&self) -> Result<Session, AuthError> {
        let response: AuthTokenResponse = self
            .call(
                "signUp",
                &SignUpRequest {
                    email: None,
                    password: None,
                    return_secure_token: true,
                },
            )
            .await?;
        Ok(self.accept(response, true).await)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let response: AuthTokenResponse = self
            .call(
                "signInWithPassword",
                &SignInWithPasswordRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                    return_secure_token: true,
                },
            )
            .await?;
        info!(session_id = %response.local_id, "password sign-in");
        Ok(self.accept(response, false).await)
    }

    async fn create_user_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let response: AuthTokenResponse = self
            .call(
                "signUp",
                &SignUpRequest {
                    email: Some(email.to_string()),
                    password: Some(password.to_string()),
                    return_secure_token: true,
                },
            )
            .await?;
        Ok(self.accept(response, false).await)
    }

    async fn update_session_profile(
        &self,
        update: SessionProfileUpdate,
    ) -> Result<Session, AuthError> {
        let id_token = self.id_token().await.ok_or_else(no_session_error)?;
        let response: UpdateAccountResponse = self
            .call(
                "update",
                &UpdateAccountRequest {
                    id_token,
                    display_name: update.display_name,
                    photo_url: update.photo_ref,
                    return_secure_token: false,
                },
            )
            .await?;

        let mut tokens = self.tokens.lock().await;
        let state = tokens.as_mut().ok_or_else(no_session_error)?;
        if state.session.id.as_str() != response.local_id {
            return Err(AuthError::new(
                AuthErrorCode::NoSession,
                "session changed while updating profile",
            ));
        }
        state.session.display_name = response.display_name.filter(|s| !s.is_empty());
        state.session.photo_ref = response.photo_url.filter(|s| !s.is_empty());
        if let Some(email) = response.email.filter(|s| !s.is_empty()) {
            state.session.email = Some(email);
        }
        let session = state.session.clone();
        drop(tokens);

        self.hub.refresh(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        *self.tokens.lock().await = None;
        self.forget().await;
        self.hub.publish(None);
        Ok(())
    }
}

/// Documents addressed as `projects/{project}/databases/(default)/documents/{collection}/{id}`.
pub struct FirestoreStore {
    http: Client,
    identity: Arc<FirebaseIdentity>,
}

impl FirestoreStore {
    pub fn new(identity: Arc<FirebaseIdentity>) -> Self {
        Self {
            http: Client::new(),
            identity,
        }
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.identity.id_token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn patch(
        &self,
        collection: &str,
        doc_id: &str,
        fields: &DocumentFields,
        mask: Option<Vec<&str>>,
    ) -> Result<()> {
        let mut url = self.identity.config().document_url(collection, doc_id)?;
        if let Some(mask) = mask {
            let mut query = url.query_pairs_mut();
            for key in mask {
                query.append_pair("updateMask.fieldPaths", key);
            }
            query.append_pair("currentDocument.exists", "true");
        }

        let request = self
            .http
            .patch(url)
            .json(&FirestoreDocument::from_fields(fields));
        let res = self
            .authorized(request)
            .await
            .send()
            .await
            .with_context(|| format!("failed to reach document store for {collection}/{doc_id}"))?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            if status == StatusCode::NOT_FOUND {
                return Err(anyhow!("document {collection}/{doc_id} does not exist"));
            }
            return Err(anyhow!(
                "document write {collection}/{doc_id} failed with {status}: {text}"
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get_doc(&self, collection: &str, doc_id: &str) -> Result<Option<DocumentFields>> {
        let url = self.identity.config().document_url(collection, doc_id)?;
        let res = self
            .authorized(self.http.get(url))
            .await
            .send()
            .await
            .with_context(|| format!("failed to reach document store for {collection}/{doc_id}"))?;
        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow!(
                "document read {collection}/{doc_id} failed with {status}: {text}"
            ));
        }
        let document: FirestoreDocument = res
            .json()
            .await
            .with_context(|| format!("malformed document {collection}/{doc_id}"))?;
        Ok(Some(document.into_fields()))
    }

    async fn set_doc(&self, collection: &str, doc_id: &str, fields: &DocumentFields) -> Result<()> {
        self.patch(collection, doc_id, fields, None).await
    }

    async fn update_doc(
        &self,
        collection: &str,
        doc_id: &str,
        partial: &DocumentFields,
    ) -> Result<()> {
        let mask = partial.keys().map(String::as_str).collect();
        self.patch(collection, doc_id, partial, Some(mask)).await
    }
}

#[cfg(test)]
#[path = "tests/firebase_tests.rs"]
mod tests;
