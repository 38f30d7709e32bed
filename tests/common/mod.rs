#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Context;
use kerala_trips::{
    db::{init_pool, run_migrations},
    models::{
        trip::{TravelMode, TripDetails, TripStatus},
        user::UserProfile,
    },
    services::{identity::StaticIdentity, storage::SqliteKvStore},
    state::AppState,
};
use tempfile::TempDir;

pub const ALICE_TOKEN: &str = "alice-token";
pub const ALICE_ID: &str = "user-alice";
pub const BOB_TOKEN: &str = "bob-token";
pub const BOB_ID: &str = "user-bob";

pub struct TestApp {
    pub state: AppState,
    pub identity: Arc<StaticIdentity>,
    _root: TempDir,
}

impl TestApp {
    pub async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir")?;
        let db_path = root.path().join("trips.sqlite");
        let pool = init_pool(&format!("sqlite://{}", db_path.to_string_lossy())).await?;
        run_migrations(&pool).await?;

        let identity = Arc::new(StaticIdentity::default());
        identity.issue_token(ALICE_TOKEN, ALICE_ID, "alice@example.com");
        identity.issue_token(BOB_TOKEN, BOB_ID, "bob@example.com");

        let state = AppState::new(Arc::new(SqliteKvStore::new(pool)), identity.clone());
        for (id, email, name) in [
            (ALICE_ID, "alice@example.com", "Alice"),
            (BOB_ID, "bob@example.com", "Bob"),
        ] {
            state
                .profiles
                .create(&UserProfile::new(id, email, name))
                .await?;
        }
        Ok(Self {
            state,
            identity,
            _root: root,
        })
    }
}

pub fn kochi_to_alappuzha() -> TripDetails {
    TripDetails {
        origin: "Kochi".into(),
        destination: "Alappuzha".into(),
        date: "15 Dec 2024".into(),
        mode: TravelMode::Boat,
        distance: "53 km".into(),
        carbon_footprint: "4.2 kg".into(),
        status: TripStatus::Completed,
    }
}
