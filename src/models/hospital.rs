use serde::{Deserialize, Serialize};

use super::emergency::Coordinates;
use super::enums::{HospitalFilter, HospitalType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub distance_km: f64,
    #[serde(rename = "type")]
    pub kind: HospitalType,
    #[serde(default)]
    pub emergency: bool,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Default for HospitalFilter {
    fn default() -> Self {
        Self::All
    }
}

impl Hospital {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }

    pub fn matches(&self, filter: HospitalFilter) -> bool {
        match filter {
            HospitalFilter::All => true,
            HospitalFilter::Emergency => self.emergency,
            HospitalFilter::Clinic => self.kind == HospitalType::Clinic,
            HospitalFilter::Government => self.kind == HospitalType::Government,
        }
    }

    /// `tel:` link for the dialer, whitespace stripped.
    pub fn tel_uri(&self) -> Option<String> {
        let phone: String = self
            .phone
            .as_deref()?
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        (!phone.is_empty()).then(|| format!("tel:{phone}"))
    }
}
