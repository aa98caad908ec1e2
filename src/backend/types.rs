//! Request and response bodies. Field names follow the backend's camelCase.

use serde::{Deserialize, Serialize};

use crate::models::{
    BookingPrefill, Coordinates, EmergencyContact, Helpline, Medication, MedicineInfo,
    ScannedMedicine, TimeSlot,
};

// ═══════════════════════════════════════════════════════════
// Medications
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMedication {
    pub medication_id: String,
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    /// Free strings on the server; anything outside the fixed slots is dropped.
    #[serde(default)]
    pub times: Vec<String>,
    #[serde(default)]
    pub taken_today: bool,
}

impl RemoteMedication {
    pub fn into_local(self, today: chrono::NaiveDate) -> Medication {
        let mut times: Vec<TimeSlot> = self
            .times
            .iter()
            .filter_map(|t| t.parse().ok())
            .collect();
        times.sort();
        times.dedup();
        Medication {
            id: self.medication_id.clone(),
            name: self.name,
            dosage: self.dosage,
            times,
            taken_today: self.taken_today,
            last_taken: self.taken_today.then_some(today),
            remote_id: Some(self.medication_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMedication {
    pub name: String,
    pub dosage: String,
    pub times: Vec<TimeSlot>,
}

impl From<&Medication> for NewMedication {
    fn from(med: &Medication) -> Self {
        Self {
            name: med.name.clone(),
            dosage: med.dosage.clone(),
            times: med.times.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MedicationList {
    #[serde(default)]
    pub medications: Vec<RemoteMedication>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MedicationCreated {
    pub medication_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MedicineCheckReply {
    pub info: MedicineInfo,
}

/// Scan results arrive either flat or nested under `scan`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct MedicineScanReply {
    #[serde(default)]
    pub medicines: Vec<ScannedMedicine>,
    #[serde(default)]
    pub scan: Option<MedicineScanReplyInner>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MedicineScanReplyInner {
    #[serde(default)]
    pub medicines: Vec<ScannedMedicine>,
}

impl MedicineScanReply {
    pub fn into_medicines(self) -> Vec<ScannedMedicine> {
        if !self.medicines.is_empty() {
            return self.medicines;
        }
        self.scan.map(|s| s.medicines).unwrap_or_default()
    }
}

// ═══════════════════════════════════════════════════════════
// Health log
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub(crate) struct HealthLogList {
    #[serde(default)]
    pub logs: Vec<crate::models::HealthLogEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HealthLogCreated {
    pub log: crate::models::HealthLogEntry,
}

// ═══════════════════════════════════════════════════════════
// Voice
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceRequest {
    pub text: String,
    pub language: String,
    pub session_id: String,
    pub user_conditions: Vec<String>,
    pub user_name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VoiceReply {
    pub response_text: String,
    /// Base64 MP3.
    pub audio_content: Option<String>,
    pub intent: Option<String>,
    pub session_id: Option<String>,
    pub booking_data: Option<BookingPrefill>,
}

// ═══════════════════════════════════════════════════════════
// Appointments
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingAccepted {
    pub call_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStatusReply {
    pub status: String,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

// ═══════════════════════════════════════════════════════════
// Emergency
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmergencyLocation {
    pub lat: f64,
    pub lng: f64,
    pub address: String,
}

impl EmergencyLocation {
    pub fn at(coords: Coordinates, address: &str) -> Self {
        Self {
            lat: coords.lat,
            lng: coords.lng,
            address: address.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyTrigger {
    pub symptoms: String,
    pub location: EmergencyLocation,
    pub contacts: Vec<EmergencyContact>,
    pub patient_name: String,
    pub patient_phone: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyTriggered {
    pub emergency_id: String,
    #[serde(default)]
    pub contacts_notified: u32,
    #[serde(default)]
    pub sms_sent: Vec<EmergencyContact>,
    #[serde(default)]
    pub helplines: Vec<Helpline>,
    #[serde(default)]
    pub message: Option<String>,
}

// ═══════════════════════════════════════════════════════════
// Hospitals
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub(crate) struct HospitalList {
    #[serde(default)]
    pub hospitals: Vec<crate::models::Hospital>,
}

/// Error body shape shared by every endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorReply {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn remote_medication_drops_unknown_slots() {
        let json = r#"{"medicationId":"m-1","name":"Metformin","dosage":"500mg",
                       "times":["Night (9 PM)","Bedtime","Morning (8 AM)"],"takenToday":true}"#;
        let remote: RemoteMedication = serde_json::from_str(json).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let med = remote.into_local(today);
        assert_eq!(med.times, vec![TimeSlot::Morning, TimeSlot::Night]);
        assert_eq!(med.remote_id.as_deref(), Some("m-1"));
        assert_eq!(med.last_taken, Some(today));
    }

    #[test]
    fn voice_request_is_camel_case() {
        let req = VoiceRequest {
            text: "hello".into(),
            language: "en".into(),
            session_id: "session-1".into(),
            user_conditions: vec!["Asthma".into()],
            user_name: "Asha".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["sessionId"], "session-1");
        assert_eq!(json["userConditions"][0], "Asthma");
    }

    #[test]
    fn voice_reply_tolerates_nulls() {
        let json = r#"{"responseText":"Namaste","audioContent":null,"intent":"booking",
                       "bookingData":{"doctorName":"Rao","preferredTime":"","patientPhone":"9876543210"}}"#;
        let reply: VoiceReply = serde_json::from_str(json).unwrap();
        assert!(reply.audio_content.is_none());
        assert_eq!(reply.booking_data.unwrap().doctor_name, "Rao");
    }

    #[test]
    fn scan_reply_reads_nested_medicines() {
        let json = r#"{"scan":{"medicines":[{"name":"Amoxicillin","dosage":"250mg","timing":"thrice"}]}}"#;
        let reply: MedicineScanReply = serde_json::from_str(json).unwrap();
        let meds = reply.into_medicines();
        assert_eq!(meds.len(), 1);
        assert_eq!(meds[0].name, "Amoxicillin");
    }

    #[test]
    fn emergency_triggered_defaults() {
        let reply: EmergencyTriggered =
            serde_json::from_str(r#"{"emergencyId":"e-1","status":"active"}"#).unwrap();
        assert_eq!(reply.contacts_notified, 0);
        assert!(reply.helplines.is_empty());
    }
}
