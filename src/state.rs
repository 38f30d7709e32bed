use std::sync::Arc;

use crate::services::{
    identity::IdentityProvider, locks::UserLocks, profiles::ProfileStore, storage::KvStore,
    trips::TripStore,
};

#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub profiles: ProfileStore,
    pub trips: TripStore,
}

impl AppState {
    pub fn new(kv: Arc<dyn KvStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        let locks = UserLocks::default();
        let profiles = ProfileStore::new(kv.clone(), locks.clone());
        let trips = TripStore::new(kv, profiles.clone(), locks);
        Self {
            identity,
            profiles,
            trips,
        }
    }
}
