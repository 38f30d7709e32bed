use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    config::StaticToken,
    error::{AppError, TOKEN_INVALID},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedUser {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    /// Set when the provider signs the new user in as part of registration.
    /// Providers that need a separate sign-in step leave it `None`.
    pub access_token: Option<String>,
}

/// The external identity service. Rejections come back as `Unauthorized`
/// (tokens) or `BadRequest` (signup/reset); transport trouble as a 500-class
/// error.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<AuthenticatedUser, AppError>;

    async fn create_user(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<CreatedUser, AppError>;

    async fn send_password_reset(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), AppError>;
}

/// Talks to a GoTrue-compatible auth API (`{base}/auth/v1/...`).
pub struct GoTrueIdentity {
    http: Client,
    base: Url,
    service_key: String,
}

#[derive(Deserialize)]
struct GoTrueUser {
    id: String,
    email: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Default)]
struct GoTrueError {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl GoTrueError {
    fn into_message(self) -> Option<String> {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
    }
}

impl GoTrueIdentity {
    pub fn new(mut base: Url, service_key: String) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self {
            http: Client::new(),
            base,
            service_key,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        self.base
            .join(path)
            .map_err(|err| AppError::Config(format!("invalid auth endpoint {path}: {err}")))
    }

    fn with_key(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("apikey", &self.service_key)
    }

    async fn rejection_message(response: Response) -> String {
        let status = response.status();
        response
            .json::<GoTrueError>()
            .await
            .ok()
            .and_then(GoTrueError::into_message)
            .unwrap_or_else(|| format!("identity provider rejected the request ({status})"))
    }
}

#[async_trait]
impl IdentityProvider for GoTrueIdentity {
    async fn verify_token(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let response = self
            .with_key(self.http.get(self.endpoint("auth/v1/user")?))
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let user: GoTrueUser = response.json().await?;
                Ok(AuthenticatedUser {
                    id: user.id,
                    email: user.email,
                })
            }
            status if status.is_client_error() => Err(AppError::Unauthorized(TOKEN_INVALID)),
            status => Err(AppError::Identity(format!("token check failed with {status}"))),
        }
    }

    async fn create_user(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<CreatedUser, AppError> {
        let response = self
            .with_key(self.http.post(self.endpoint("auth/v1/admin/users")?))
            .bearer_auth(&self.service_key)
            .json(&json!({
                "email": email,
                "password": password,
                "email_confirm": true,
                "user_metadata": {
                    "name": name,
                    "app": "kerala-travel-tracker",
                    "created_at": Utc::now(),
                },
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let message = Self::rejection_message(response).await;
            warn!(email, "registration rejected: {message}");
            return Err(AppError::BadRequest(message));
        }
        if !status.is_success() {
            return Err(AppError::Identity(format!("user creation failed with {status}")));
        }

        let user: GoTrueUser = response.json().await?;
        Ok(CreatedUser {
            id: user.id,
            email: user.email.unwrap_or_else(|| email.to_string()),
            created_at: user.created_at.unwrap_or_else(Utc::now),
            access_token: None,
        })
    }

    async fn send_password_reset(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), AppError> {
        let mut url = self.endpoint("auth/v1/recover")?;
        if let Some(redirect_to) = redirect_to {
            url.query_pairs_mut().append_pair("redirect_to", redirect_to);
        }
        let response = self
            .with_key(self.http.post(url))
            .json(&json!({ "email": email }))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::TOO_MANY_REQUESTS => Err(AppError::BadRequest(
                "Too many reset requests, try again later".into(),
            )),
            status if status.is_client_error() => {
                let message = Self::rejection_message(response).await;
                warn!(email, "password reset rejected: {message}");
                Err(AppError::BadRequest(message))
            }
            status => Err(AppError::Identity(format!("password reset failed with {status}"))),
        }
    }
}

/// In-process token table. Useful for local runs and tests.
///
/// Registration issues a `static_…` token for the new user straight away,
/// since there is no separate sign-in endpoint to obtain one.
#[derive(Default)]
pub struct StaticIdentity {
    tokens: DashMap<String, AuthenticatedUser>,
    users: DashMap<String, CreatedUser>,
}

impl StaticIdentity {
    pub fn new(tokens: &[StaticToken]) -> Self {
        let identity = Self::default();
        for entry in tokens {
            identity.issue_token(&entry.token, &entry.user_id, &entry.email);
        }
        identity
    }

    pub fn issue_token(&self, token: &str, user_id: &str, email: &str) {
        self.tokens.insert(
            token.to_string(),
            AuthenticatedUser {
                id: user_id.to_string(),
                email: Some(email.to_string()),
            },
        );
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn verify_token(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        self.tokens
            .get(token)
            .map(|entry| entry.value().clone())
            .ok_or(AppError::Unauthorized(TOKEN_INVALID))
    }

    async fn create_user(
        &self,
        email: &str,
        _password: &str,
        _name: &str,
    ) -> Result<CreatedUser, AppError> {
        let key = email.to_lowercase();
        let user = match self.users.entry(key) {
            Entry::Occupied(_) => {
                return Err(AppError::BadRequest(
                    "A user with this email address has already been registered".into(),
                ))
            }
            Entry::Vacant(slot) => {
                let token = format!("static_{}", Uuid::new_v4().simple());
                let user = CreatedUser {
                    id: Uuid::new_v4().to_string(),
                    email: email.to_string(),
                    created_at: Utc::now(),
                    access_token: Some(token),
                };
                slot.insert(user.clone());
                user
            }
        };
        if let Some(token) = &user.access_token {
            self.issue_token(token, &user.id, &user.email);
        }
        Ok(user)
    }

    async fn send_password_reset(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), AppError> {
        info!(email, redirect_to, "password reset requested");
        Ok(())
    }
}
