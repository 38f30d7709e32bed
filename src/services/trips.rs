use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::{
    error::AppError,
    models::trip::{TripDetails, TripInsights, TripRecord},
    services::{locks::UserLocks, profiles::ProfileStore, storage::KvStore},
};

pub const TRIP_NOT_FOUND: &str = "Trip not found or access denied";

pub fn trip_key(trip_id: &str) -> String {
    format!("trip:{trip_id}")
}

pub fn user_trips_key(user_id: &str) -> String {
    format!("user_trips:{user_id}")
}

/// Trip records (`trip:{id}`), the per-user id index (`user_trips:{user}`)
/// and the profile's `trip_count`.
///
/// Saves and deletes for one user run under that user's lock, so the index is
/// never lost to an interleaved read-modify-write and `trip_count` always
/// equals the index length once an operation returns `Ok`.
#[derive(Clone)]
pub struct TripStore {
    kv: Arc<dyn KvStore>,
    profiles: ProfileStore,
    locks: UserLocks,
}

impl TripStore {
    pub fn new(kv: Arc<dyn KvStore>, profiles: ProfileStore, locks: UserLocks) -> Self {
        Self {
            kv,
            profiles,
            locks,
        }
    }

    pub async fn save_trip(
        &self,
        user_id: &str,
        details: TripDetails,
    ) -> Result<TripRecord, AppError> {
        details.validate()?;
        let _guard = self.locks.acquire(user_id).await;

        let mut index = self.load_index(user_id).await?;
        let trip = TripRecord::new(user_id, details);
        self.kv.set_json(&trip_key(&trip.id), &trip).await?;

        index.push(trip.id.clone());
        if let Err(err) = self.kv.set_json(&user_trips_key(user_id), &index).await {
            self.discard_record(&trip.id).await;
            return Err(err);
        }

        if let Err(err) = self.profiles.sync_trip_count(user_id, index.len()).await {
            index.pop();
            match self.kv.set_json(&user_trips_key(user_id), &index).await {
                Ok(()) => self.discard_record(&trip.id).await,
                Err(restore) => {
                    warn!(user_id, trip_id = %trip.id, "could not restore trip index: {restore}")
                }
            }
            return Err(err);
        }

        info!(user_id, trip_id = %trip.id, trip_count = index.len(), "trip saved");
        Ok(trip)
    }

    /// Newest first. Index entries whose record is gone are skipped.
    pub async fn list_trips(&self, user_id: &str) -> Result<Vec<TripRecord>, AppError> {
        let index = self.load_index(user_id).await?;
        let mut trips = Vec::with_capacity(index.len());
        for (position, trip_id) in index.iter().enumerate() {
            match self.kv.get_json::<TripRecord>(&trip_key(trip_id)).await? {
                Some(trip) if trip.user_id == user_id => trips.push((position, trip)),
                Some(_) => warn!(user_id, trip_id = %trip_id, "index references a foreign trip"),
                None => debug!(user_id, trip_id = %trip_id, "skipping dangling trip reference"),
            }
        }

        trips.sort_by(|(pos_a, a), (pos_b, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| pos_b.cmp(pos_a))
        });
        Ok(trips.into_iter().map(|(_, trip)| trip).collect())
    }

    /// Missing trips and trips owned by someone else yield the same
    /// `NotFound`.
    pub async fn delete_trip(&self, user_id: &str, trip_id: &str) -> Result<(), AppError> {
        let _guard = self.locks.acquire(user_id).await;

        match self.kv.get_json::<TripRecord>(&trip_key(trip_id)).await? {
            Some(trip) if trip.user_id == user_id => {}
            _ => return Err(AppError::NotFound(TRIP_NOT_FOUND)),
        }

        // Unindex before deleting so the index never points at a removed record.
        let mut index = self.load_index(user_id).await?;
        index.retain(|id| id != trip_id);
        self.kv.set_json(&user_trips_key(user_id), &index).await?;
        self.kv.delete(&trip_key(trip_id)).await?;

        self.profiles.sync_trip_count(user_id, index.len()).await?;
        info!(user_id, trip_id, trip_count = index.len(), "trip deleted");
        Ok(())
    }

    pub async fn insights(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<TripInsights, AppError> {
        let trips = self.list_trips(user_id).await?;
        Ok(TripInsights::from_trips(&trips, today))
    }

    /// Best-effort removal of a record that never made it into a committed save.
    async fn discard_record(&self, trip_id: &str) {
        if let Err(err) = self.kv.delete(&trip_key(trip_id)).await {
            warn!(trip_id, "could not remove unindexed trip record: {err}");
        }
    }

    async fn load_index(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        Ok(self
            .kv
            .get_json::<Vec<String>>(&user_trips_key(user_id))
            .await?
            .unwrap_or_default())
    }
}
