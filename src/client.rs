//! HTTP client for the trips API.
//!
//! The access token lives in an explicit [`Session`] that callers create at
//! sign-in and drop at sign-out; every call takes it as an argument.
//! [`SyncQueue`] keeps trips whose save failed for transient reasons and
//! replays them later.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    models::{
        export::DataExport,
        trip::{TripDetails, TripInsights, TripRecord},
        user::UserProfile,
    },
    routes::trips::{SavedTrip, TripList},
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api error {status}: {message}")]
    Api { status: StatusCode, message: String },
}

impl ClientError {
    /// Worth retrying later: the server was unreachable or failed itself.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Api { status, .. } => status.is_server_error(),
            ClientError::Url(_) => false,
        }
    }
}

/// Bearer credential for one signed-in user.
#[derive(Clone)]
pub struct Session {
    access_token: String,
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct ProfileBody {
    user: UserProfile,
}

#[derive(Clone)]
pub struct TripsClient {
    http: Client,
    base: Url,
}

impl TripsClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            base,
        })
    }

    pub async fn save_trip(
        &self,
        session: &Session,
        details: &TripDetails,
    ) -> Result<TripRecord, ClientError> {
        let request = self.http.post(self.base.join("trips")?).json(details);
        let saved: SavedTrip = self.send(request, session).await?;
        Ok(saved.trip)
    }

    pub async fn list_trips(&self, session: &Session) -> Result<TripList, ClientError> {
        let request = self.http.get(self.base.join("trips")?);
        self.send(request, session).await
    }

    pub async fn delete_trip(&self, session: &Session, trip_id: &str) -> Result<(), ClientError> {
        let mut url = self.base.join("trips/")?;
        url.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push(trip_id);
        let _: serde_json::Value = self.send(self.http.delete(url), session).await?;
        Ok(())
    }

    pub async fn insights(&self, session: &Session) -> Result<TripInsights, ClientError> {
        let request = self.http.get(self.base.join("trips/insights")?);
        self.send(request, session).await
    }

    pub async fn profile(&self, session: &Session) -> Result<UserProfile, ClientError> {
        let request = self.http.get(self.base.join("user/profile")?);
        let body: ProfileBody = self.send(request, session).await?;
        Ok(body.user)
    }

    pub async fn export(&self, session: &Session) -> Result<DataExport, ClientError> {
        let request = self.http.get(self.base.join("user/export")?);
        self.send(request, session).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        session: &Session,
    ) -> Result<T, ClientError> {
        let response = request.bearer_auth(session.access_token()).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let raw = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&raw)
            .map(|body| body.error)
            .unwrap_or(raw);
        Err(ClientError::Api { status, message })
    }
}

/// A trip waiting to reach the server, shown to the user under `temp_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTrip {
    pub temp_id: String,
    pub details: TripDetails,
    pub queued_at: DateTime<Utc>,
}

impl PendingTrip {
    fn new(details: TripDetails) -> Self {
        let now = Utc::now();
        let entropy = Uuid::new_v4().simple().to_string();
        Self {
            temp_id: format!(
                "temp_{}_{}",
                now.timestamp_millis(),
                entropy.get(..6).unwrap_or(&entropy)
            ),
            details,
            queued_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(TripRecord),
    Pending(PendingTrip),
}

/// A pending trip that has now been stored under a server id.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncedTrip {
    pub temp_id: String,
    pub trip: TripRecord,
}

/// Pending-write log for trip saves.
pub struct SyncQueue {
    client: TripsClient,
    pending: Mutex<VecDeque<PendingTrip>>,
}

impl SyncQueue {
    pub fn new(client: TripsClient) -> Self {
        Self {
            client,
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Saves now, or queues the trip when the failure is transient.
    /// Client errors (bad input, bad credentials) are returned as-is.
    pub async fn save_or_queue(
        &self,
        session: &Session,
        details: TripDetails,
    ) -> Result<SaveOutcome, ClientError> {
        match self.client.save_trip(session, &details).await {
            Ok(trip) => Ok(SaveOutcome::Saved(trip)),
            Err(err) if err.is_retryable() => {
                let pending = PendingTrip::new(details);
                warn!(temp_id = %pending.temp_id, "trip save deferred: {err}");
                self.pending.lock().await.push_back(pending.clone());
                Ok(SaveOutcome::Pending(pending))
            }
            Err(err) => Err(err),
        }
    }

    /// Replays queued saves in order. Stops at the first transient failure,
    /// leaving it and everything behind it queued; entries the server
    /// rejects outright are dropped.
    pub async fn flush(&self, session: &Session) -> Vec<SyncedTrip> {
        let mut pending = self.pending.lock().await;
        let mut synced = Vec::new();
        while let Some(entry) = pending.pop_front() {
            match self.client.save_trip(session, &entry.details).await {
                Ok(trip) => synced.push(SyncedTrip {
                    temp_id: entry.temp_id,
                    trip,
                }),
                Err(err) if err.is_retryable() => {
                    warn!(temp_id = %entry.temp_id, "sync halted: {err}");
                    pending.push_front(entry);
                    break;
                }
                Err(err) => {
                    warn!(temp_id = %entry.temp_id, "dropping rejected trip: {err}");
                }
            }
        }
        if !synced.is_empty() {
            info!(synced = synced.len(), remaining = pending.len(), "pending trips synced");
        }
        synced
    }

    pub async fn pending(&self) -> Vec<PendingTrip> {
        self.pending.lock().await.iter().cloned().collect()
    }
}
