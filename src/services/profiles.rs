use std::sync::Arc;

use chrono::Utc;

use crate::{
    error::AppError,
    models::user::{ProfileUpdate, UserProfile},
    services::{locks::UserLocks, storage::KvStore},
};

pub const PROFILE_NOT_FOUND: &str = "User profile not found";

pub fn profile_key(user_id: &str) -> String {
    format!("user_profile:{user_id}")
}

#[derive(Clone)]
pub struct ProfileStore {
    kv: Arc<dyn KvStore>,
    locks: UserLocks,
}

impl ProfileStore {
    pub fn new(kv: Arc<dyn KvStore>, locks: UserLocks) -> Self {
        Self { kv, locks }
    }

    pub async fn create(&self, profile: &UserProfile) -> Result<(), AppError> {
        self.kv.set_json(&profile_key(&profile.id), profile).await
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        self.kv.get_json(&profile_key(user_id)).await
    }

    pub async fn update(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<UserProfile, AppError> {
        let _guard = self.locks.acquire(user_id).await;
        let mut profile = self
            .get(user_id)
            .await?
            .ok_or(AppError::NotFound(PROFILE_NOT_FOUND))?;
        profile.apply(update);
        self.kv.set_json(&profile_key(user_id), &profile).await?;
        Ok(profile)
    }

    /// Writes `trip_count`. Callers must already hold the user's lock.
    /// Users without a profile are left alone.
    pub(crate) async fn sync_trip_count(
        &self,
        user_id: &str,
        count: usize,
    ) -> Result<(), AppError> {
        let Some(mut profile) = self.get(user_id).await? else {
            return Ok(());
        };
        profile.trip_count = count;
        profile.updated_at = Some(Utc::now());
        self.kv.set_json(&profile_key(user_id), &profile).await
    }
}
