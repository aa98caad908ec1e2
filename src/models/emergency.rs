use serde::{Deserialize, Serialize};

use super::enums::EmergencyState;

/// Seconds the user has to cancel a triggered SOS.
pub const COUNTDOWN_SECS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub relation: String,
}

impl EmergencyContact {
    pub fn new(name: &str, phone: &str, relation: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            phone: phone.trim().to_string(),
            relation: relation.trim().to_string(),
        }
    }
}

/// Public helpline returned alongside a triggered alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Helpline {
    pub name: String,
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyEvent {
    pub emergency_id: Option<String>,
    pub state: EmergencyState,
    pub countdown_secs: u32,
    /// 0..=100, advanced by the hold gesture.
    pub hold_progress: u8,
    pub contacts_notified: Vec<EmergencyContact>,
    pub helplines: Vec<Helpline>,
}

impl Default for EmergencyEvent {
    fn default() -> Self {
        Self {
            emergency_id: None,
            state: EmergencyState::Idle,
            countdown_secs: COUNTDOWN_SECS,
            hold_progress: 0,
            contacts_notified: Vec::new(),
            helplines: Vec::new(),
        }
    }
}

/// Lat/lng pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    /// New Delhi; used whenever the device cannot report a position.
    pub const FALLBACK: Coordinates = Coordinates { lat: 28.6139, lng: 77.209 };

    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}
