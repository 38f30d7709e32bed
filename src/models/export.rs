use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    trip::{TripDetails, TripInsights, TripRecord},
    user::UserProfile,
};

pub const EXPORT_VERSION: &str = "1.0";
pub const EXPORT_SECTIONS: [&str; 4] = ["profile", "trips", "preferences", "analytics"];

/// Everything stored for one user, as a single downloadable document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataExport {
    pub profile: UserProfile,
    pub trips: Vec<ExportedTrip>,
    pub analytics: TripInsights,
    pub export_info: ExportInfo,
}

/// A trip as the user entered it, without server bookkeeping fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportedTrip {
    pub id: String,
    #[serde(flatten)]
    pub details: TripDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportInfo {
    pub export_date: DateTime<Utc>,
    pub export_version: String,
    pub sections: Vec<String>,
}

impl DataExport {
    /// `trips` is expected newest first, as `TripStore::list_trips` returns it.
    pub fn new(profile: UserProfile, trips: Vec<TripRecord>, now: DateTime<Utc>) -> Self {
        let analytics = TripInsights::from_trips(&trips, now.date_naive());
        Self {
            profile,
            trips: trips
                .into_iter()
                .map(|trip| ExportedTrip {
                    id: trip.id,
                    details: trip.details,
                })
                .collect(),
            analytics,
            export_info: ExportInfo {
                export_date: now,
                export_version: EXPORT_VERSION.to_string(),
                sections: EXPORT_SECTIONS.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    /// `kerala-travel-data-YYYY-MM-DD.json`
    pub fn file_name(&self) -> String {
        format!(
            "kerala-travel-data-{}.json",
            self.export_info.export_date.format("%Y-%m-%d")
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::trip::{TravelMode, TripStatus};

    fn backwater_trip() -> TripDetails {
        TripDetails {
            origin: "Kochi".into(),
            destination: "Kumarakom".into(),
            date: "02 Mar 2025".into(),
            mode: TravelMode::Boat,
            distance: "40 km".into(),
            carbon_footprint: "3.0 kg".into(),
            status: TripStatus::Completed,
        }
    }

    #[test]
    fn export_strips_bookkeeping_and_summarises() {
        let now = Utc.with_ymd_and_hms(2025, 3, 20, 8, 0, 0).unwrap();
        let profile = UserProfile::new("u1", "u1@example.com", "Anu");
        let trip = TripRecord::new("u1", backwater_trip());

        let export = DataExport::new(profile.clone(), vec![trip.clone()], now);
        assert_eq!(export.profile, profile);
        assert_eq!(export.analytics.total_trips, 1);
        assert_eq!(export.analytics.trips_this_month, 1);
        assert_eq!(export.file_name(), "kerala-travel-data-2025-03-20.json");

        let value = serde_json::to_value(&export).unwrap();
        let exported = &value["trips"][0];
        assert_eq!(exported["id"], trip.id.as_str());
        assert_eq!(exported["carbonFootprint"], "3.0 kg");
        assert!(exported.get("user_id").is_none());
        assert!(exported.get("created_at").is_none());
        assert_eq!(value["export_info"]["export_version"], EXPORT_VERSION);
    }
}
