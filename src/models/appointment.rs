use serde::{Deserialize, Serialize};

use super::enums::CallStatus;

/// What the user fills in to have the AI agent call a clinic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingForm {
    pub doctor_name: String,
    pub clinic_phone: String,
    pub patient_name: String,
    pub patient_phone: String,
    #[serde(default)]
    pub preferred_time: String,
    #[serde(default)]
    pub symptoms: String,
}

impl BookingForm {
    /// Empty form with the patient name taken from the profile.
    pub fn for_patient(patient_name: Option<&str>) -> Self {
        Self {
            patient_name: patient_name.unwrap_or_default().to_string(),
            ..Default::default()
        }
    }

    /// First required field that is blank, by its wire name.
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("doctorName", &self.doctor_name),
            ("clinicPhone", &self.clinic_phone),
            ("patientName", &self.patient_name),
            ("patientPhone", &self.patient_phone),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }

    pub fn apply(&mut self, prefill: &BookingPrefill) {
        if !prefill.doctor_name.is_empty() {
            self.doctor_name = prefill.doctor_name.clone();
        }
        if !prefill.preferred_time.is_empty() {
            self.preferred_time = prefill.preferred_time.clone();
        }
        if !prefill.patient_phone.is_empty() {
            self.patient_phone = prefill.patient_phone.clone();
        }
    }
}

/// Booking details the voice assistant pulled out of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingPrefill {
    pub doctor_name: String,
    pub preferred_time: String,
    pub patient_phone: String,
}

/// Local view of an outbound AI-placed call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSession {
    pub call_id: Option<String>,
    pub status: CallStatus,
    pub duration_secs: u64,
    pub last_error: Option<String>,
}

impl Default for CallStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl CallSession {
    /// `m:ss`
    pub fn duration_display(&self) -> String {
        format!("{}:{:02}", self.duration_secs / 60, self.duration_secs % 60)
    }
}
