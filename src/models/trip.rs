use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Boat,
    Auto,
    Bus,
    Train,
    Car,
    Bike,
    Walk,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Completed,
    Ongoing,
    Planned,
}

/// Fields a client supplies when logging a trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripDetails {
    pub origin: String,
    pub destination: String,
    pub date: String,
    pub mode: TravelMode,
    pub distance: String,
    #[serde(rename = "carbonFootprint")]
    pub carbon_footprint: String,
    pub status: TripStatus,
}

impl TripDetails {
    pub fn validate(&self) -> Result<(), AppError> {
        let fields = [
            ("origin", &self.origin),
            ("destination", &self.destination),
            ("date", &self.date),
            ("distance", &self.distance),
            ("carbonFootprint", &self.carbon_footprint),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(AppError::BadRequest(format!("{name} is required")));
            }
        }
        Ok(())
    }

    pub fn distance_km(&self) -> f64 {
        leading_number(&self.distance)
    }

    pub fn carbon_kg(&self) -> f64 {
        leading_number(&self.carbon_footprint)
    }

    /// Parses the free-text trip date (`15 Dec 2024`, `2024-12-15`, `Dec 15, 2024`).
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        let raw = self.date.trim();
        ["%d %b %Y", "%Y-%m-%d", "%b %d, %Y", "%d %B %Y"]
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripRecord {
    pub id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub details: TripDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TripRecord {
    pub fn new(user_id: impl Into<String>, details: TripDetails) -> Self {
        let now = Utc::now();
        Self {
            id: new_trip_id(now),
            user_id: user_id.into(),
            details,
            created_at: now,
            updated_at: now,
        }
    }
}

/// `trip_{unix_millis}_{9 random chars}`: sortable by creation, collision resistant.
pub fn new_trip_id(now: DateTime<Utc>) -> String {
    let entropy = Uuid::new_v4().simple().to_string();
    format!(
        "trip_{}_{}",
        now.timestamp_millis(),
        entropy.get(..9).unwrap_or(&entropy)
    )
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TripInsights {
    pub total_trips: usize,
    pub total_distance_km: f64,
    pub total_carbon_kg: f64,
    pub trips_this_month: usize,
    pub carbon_saved_kg: f64,
}

impl TripInsights {
    pub fn from_trips(trips: &[TripRecord], today: NaiveDate) -> Self {
        let total_distance_km = trips.iter().map(|t| t.details.distance_km()).sum();
        let total_carbon_kg: f64 = trips.iter().map(|t| t.details.carbon_kg()).sum();
        let trips_this_month = trips
            .iter()
            .filter_map(|t| t.details.parsed_date())
            .filter(|date| date.year() == today.year() && date.month() == today.month())
            .count();

        Self {
            total_trips: trips.len(),
            total_distance_km,
            total_carbon_kg,
            trips_this_month,
            carbon_saved_kg: (total_carbon_kg * 0.3 * 10.0).round() / 10.0,
        }
    }
}

fn leading_number(raw: &str) -> f64 {
    let numeric: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    numeric.parse().unwrap_or(0.0)
}
