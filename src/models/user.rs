use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preferences {
    pub language: String,
    pub theme: String,
    pub currency: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            language: "english".into(),
            theme: "light".into(),
            currency: "INR".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    pub state: String,
    pub country: String,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            state: "Kerala".into(),
            country: "India".into(),
        }
    }
}

/// Profile record kept next to the trips. `trip_count` mirrors the length of
/// the user's trip index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub location: Location,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trip_count: usize,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
            preferences: Preferences::default(),
            location: Location::default(),
            created_at: Utc::now(),
            updated_at: None,
            trip_count: 0,
        }
    }

    pub fn apply(&mut self, update: ProfileUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(preferences) = update.preferences {
            self.preferences = preferences;
        }
        if let Some(location) = update.location {
            self.location = location;
        }
        self.updated_at = Some(Utc::now());
    }
}

/// Client-editable subset of a profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub preferences: Option<Preferences>,
    pub location: Option<Location>,
}
