use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::TimeSlot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: String,
    pub name: String,
    pub dosage: String,
    pub times: Vec<TimeSlot>,
    #[serde(default)]
    pub taken_today: bool,
    #[serde(default)]
    pub last_taken: Option<NaiveDate>,
    /// Id the backend knows this record by. `None` until a create call
    /// has been acknowledged; only synced records are marked taken remotely.
    #[serde(default)]
    pub remote_id: Option<String>,
}

impl Medication {
    /// A record minted on this device, not yet known to the backend.
    pub fn new_local(name: &str, dosage: &str, times: Vec<TimeSlot>) -> Self {
        let mut times = times;
        times.sort();
        times.dedup();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            dosage: dosage.trim().to_string(),
            times,
            taken_today: false,
            last_taken: None,
            remote_id: None,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.remote_id.is_some()
    }

    /// Clear yesterday's taken flag.
    pub fn roll_over(&mut self, today: NaiveDate) {
        if self.last_taken != Some(today) {
            self.taken_today = false;
        }
    }
}

/// Reference information returned by the medicine checker.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MedicineInfo {
    pub name: Option<String>,
    pub what_it_is: String,
    pub uses: String,
    pub side_effects: String,
    pub interactions: String,
    pub safe_for_conditions: String,
    pub disclaimer: String,
}

impl MedicineInfo {
    pub fn unavailable(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            what_it_is: "Could not fetch medicine information.".to_string(),
            uses: "Please try again or consult your pharmacist.".to_string(),
            disclaimer: "Always consult your doctor or pharmacist.".to_string(),
            ..Default::default()
        }
    }
}

/// One line read off a prescription image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannedMedicine {
    pub name: String,
    pub dosage: String,
    pub timing: String,
}

impl ScannedMedicine {
    pub fn unreadable() -> Self {
        Self {
            name: "Could not read prescription".to_string(),
            dosage: String::new(),
            timing: "Please try a clearer image".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_local_dedups_and_orders_slots() {
        let med = Medication::new_local(
            " Metformin ",
            "500mg",
            vec![TimeSlot::Night, TimeSlot::Morning, TimeSlot::Night],
        );
        assert_eq!(med.name, "Metformin");
        assert_eq!(med.times, vec![TimeSlot::Morning, TimeSlot::Night]);
        assert!(!med.is_synced());
    }

    #[test]
    fn roll_over_resets_flag_from_previous_day() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let mut med = Medication::new_local("Aspirin", "75mg", vec![TimeSlot::Morning]);
        med.taken_today = true;
        med.last_taken = NaiveDate::from_ymd_opt(2026, 3, 1);
        med.roll_over(today);
        assert!(!med.taken_today);

        med.taken_today = true;
        med.last_taken = Some(today);
        med.roll_over(today);
        assert!(med.taken_today);
    }

    #[test]
    fn scanned_medicine_tolerates_missing_fields() {
        let scanned: ScannedMedicine = serde_json::from_str(r#"{"name":"Paracetamol"}"#).unwrap();
        assert_eq!(scanned.name, "Paracetamol");
        assert!(scanned.timing.is_empty());
    }
}
