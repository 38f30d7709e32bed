use std::{env, net::SocketAddr};

use url::Url;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub identity: IdentityConfig,
}

/// Where bearer tokens get verified.
#[derive(Debug, Clone)]
pub enum IdentityConfig {
    /// GoTrue-compatible auth API (`/auth/v1/...`).
    Remote { url: Url, service_key: String },
    /// In-process token table, for local development.
    Static { tokens: Vec<StaticToken> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticToken {
    pub token: String,
    pub user_id: String,
    pub email: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://trips.db?mode=rwc".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let identity = match env::var("AUTH_URL") {
            Ok(raw) => {
                let url = Url::parse(&raw)
                    .map_err(|err| AppError::Config(format!("invalid AUTH_URL: {err}")))?;
                let service_key = env::var("AUTH_SERVICE_KEY").map_err(|_| {
                    AppError::Config("AUTH_SERVICE_KEY is required when AUTH_URL is set".into())
                })?;
                IdentityConfig::Remote { url, service_key }
            }
            Err(_) => {
                let raw = env::var("STATIC_AUTH_TOKENS").unwrap_or_default();
                IdentityConfig::Static {
                    tokens: parse_static_tokens(&raw)?,
                }
            }
        };

        Ok(Self {
            database_url,
            listen_addr,
            identity,
        })
    }
}

/// Parses `token:user_id:email` entries separated by commas.
pub fn parse_static_tokens(raw: &str) -> Result<Vec<StaticToken>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.splitn(3, ':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(token), Some(user_id), Some(email))
                    if !token.is_empty() && !user_id.is_empty() =>
                {
                    Ok(StaticToken {
                        token: token.to_string(),
                        user_id: user_id.to_string(),
                        email: email.to_string(),
                    })
                }
                _ => Err(AppError::Config(format!(
                    "invalid STATIC_AUTH_TOKENS entry `{entry}`, expected token:user_id:email"
                ))),
            }
        })
        .collect()
}
