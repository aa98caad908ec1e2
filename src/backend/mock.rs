//! Scriptable in-process backend for component tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::types::*;
use super::{Backend, BackendError};
use crate::models::{
    BookingForm, Coordinates, HealthLogEntry, Hospital, MedicineInfo, ScannedMedicine, UserProfile,
};

/// One recorded request.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SaveProfile(UserProfile),
    ListMedications,
    CreateMedication(NewMedication),
    MarkTaken(String),
    CheckMedicine(String),
    ScanPrescription { image_type: String, bytes: usize },
    HealthLogs,
    CreateHealthLog { description: String, severity: u8 },
    Voice(VoiceRequest),
    Book(BookingForm),
    CallStatus(String),
    Trigger(EmergencyTrigger),
    Cancel(String),
    Hospitals(Coordinates, f64),
}

struct Script {
    profile: Result<(), BackendError>,
    medications: Result<Vec<RemoteMedication>, BackendError>,
    created_medication: Result<String, BackendError>,
    mark_taken: Result<(), BackendError>,
    medicine_info: Result<MedicineInfo, BackendError>,
    scanned: Result<Vec<ScannedMedicine>, BackendError>,
    logs: Result<Vec<HealthLogEntry>, BackendError>,
    create_log: Option<BackendError>,
    voice: Result<VoiceReply, BackendError>,
    booking: Result<BookingAccepted, BackendError>,
    /// Served in order; once empty every poll reports `calling`.
    statuses: VecDeque<Result<CallStatusReply, BackendError>>,
    trigger: Result<EmergencyTriggered, BackendError>,
    hospitals: Result<Vec<Hospital>, BackendError>,
    delay: Duration,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            profile: Ok(()),
            medications: Ok(Vec::new()),
            created_medication: Ok("srv-med-1".into()),
            mark_taken: Ok(()),
            medicine_info: Ok(MedicineInfo::default()),
            scanned: Ok(Vec::new()),
            logs: Ok(Vec::new()),
            create_log: None,
            voice: Ok(VoiceReply {
                response_text: "Namaste".into(),
                intent: Some("general".into()),
                ..Default::default()
            }),
            booking: Ok(BookingAccepted {
                call_id: "call-1".into(),
                status: Some("calling".into()),
                message: None,
            }),
            statuses: VecDeque::new(),
            trigger: Ok(EmergencyTriggered {
                emergency_id: "emg-1".into(),
                contacts_notified: 0,
                sms_sent: Vec::new(),
                helplines: Vec::new(),
                message: None,
            }),
            hospitals: Ok(Vec::new()),
            delay: Duration::ZERO,
        }
    }
}

#[derive(Default)]
pub struct MockBackend {
    script: Mutex<Script>,
    calls: Mutex<Vec<Call>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request sleeps this long (virtual time under a paused clock).
    pub fn with_delay(self, delay: Duration) -> Self {
        self.script.lock().unwrap().delay = delay;
        self
    }

    pub fn with_booking(self, result: Result<BookingAccepted, BackendError>) -> Self {
        self.script.lock().unwrap().booking = result;
        self
    }

    pub fn with_voice(self, result: Result<VoiceReply, BackendError>) -> Self {
        self.script.lock().unwrap().voice = result;
        self
    }

    pub fn with_trigger(self, result: Result<EmergencyTriggered, BackendError>) -> Self {
        self.script.lock().unwrap().trigger = result;
        self
    }

    pub fn with_hospitals(self, result: Result<Vec<Hospital>, BackendError>) -> Self {
        self.script.lock().unwrap().hospitals = result;
        self
    }

    pub fn with_medications(self, result: Result<Vec<RemoteMedication>, BackendError>) -> Self {
        self.script.lock().unwrap().medications = result;
        self
    }

    pub fn with_created_medication(self, result: Result<String, BackendError>) -> Self {
        self.script.lock().unwrap().created_medication = result;
        self
    }

    pub fn with_medicine_info(self, result: Result<MedicineInfo, BackendError>) -> Self {
        self.script.lock().unwrap().medicine_info = result;
        self
    }

    pub fn with_scan(self, result: Result<Vec<ScannedMedicine>, BackendError>) -> Self {
        self.script.lock().unwrap().scanned = result;
        self
    }

    pub fn with_logs(self, result: Result<Vec<HealthLogEntry>, BackendError>) -> Self {
        self.script.lock().unwrap().logs = result;
        self
    }

    pub fn with_create_log_error(self, err: BackendError) -> Self {
        self.script.lock().unwrap().create_log = Some(err);
        self
    }

    pub fn with_profile(self, result: Result<(), BackendError>) -> Self {
        self.script.lock().unwrap().profile = result;
        self
    }

    /// Queue the next reply of the status endpoint.
    pub fn push_status(&self, status: &str) {
        self.script
            .lock()
            .unwrap()
            .statuses
            .push_back(Ok(CallStatusReply { status: status.into(), result: None }));
    }

    pub fn push_status_error(&self, err: BackendError) {
        self.script.lock().unwrap().statuses.push_back(Err(err));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    async fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
        let delay = self.script.lock().unwrap().delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn with_script<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        f(&mut self.script.lock().unwrap())
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn save_profile(&self, profile: &UserProfile) -> Result<(), BackendError> {
        self.record(Call::SaveProfile(profile.clone())).await;
        self.with_script(|s| s.profile.clone())
    }

    async fn list_medications(&self) -> Result<Vec<RemoteMedication>, BackendError> {
        self.record(Call::ListMedications).await;
        self.with_script(|s| s.medications.clone())
    }

    async fn create_medication(&self, med: &NewMedication) -> Result<String, BackendError> {
        self.record(Call::CreateMedication(med.clone())).await;
        self.with_script(|s| s.created_medication.clone())
    }

    async fn mark_medication_taken(
        &self,
        remote_id: &str,
        _taken_at: DateTime<Utc>,
    ) -> Result<(), BackendError> {
        self.record(Call::MarkTaken(remote_id.to_string())).await;
        self.with_script(|s| s.mark_taken.clone())
    }

    async fn check_medicine(
        &self,
        name: &str,
        _conditions: &[String],
    ) -> Result<MedicineInfo, BackendError> {
        self.record(Call::CheckMedicine(name.to_string())).await;
        self.with_script(|s| s.medicine_info.clone())
    }

    async fn scan_prescription(
        &self,
        image_base64: &str,
        image_type: &str,
        _conditions: &[String],
    ) -> Result<Vec<ScannedMedicine>, BackendError> {
        self.record(Call::ScanPrescription {
            image_type: image_type.to_string(),
            bytes: image_base64.len(),
        })
        .await;
        self.with_script(|s| s.scanned.clone())
    }

    async fn health_logs(&self) -> Result<Vec<HealthLogEntry>, BackendError> {
        self.record(Call::HealthLogs).await;
        self.with_script(|s| s.logs.clone())
    }

    async fn create_health_log(
        &self,
        description: &str,
        severity: u8,
    ) -> Result<HealthLogEntry, BackendError> {
        self.record(Call::CreateHealthLog {
            description: description.to_string(),
            severity,
        })
        .await;
        if let Some(err) = self.with_script(|s| s.create_log.clone()) {
            return Err(err);
        }
        Ok(HealthLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            description: description.to_string(),
            severity,
            timestamp: Utc::now(),
        })
    }

    async fn process_voice(&self, request: &VoiceRequest) -> Result<VoiceReply, BackendError> {
        self.record(Call::Voice(request.clone())).await;
        self.with_script(|s| s.voice.clone())
    }

    async fn book_appointment(&self, form: &BookingForm) -> Result<BookingAccepted, BackendError> {
        self.record(Call::Book(form.clone())).await;
        self.with_script(|s| s.booking.clone())
    }

    async fn call_status(&self, call_id: &str) -> Result<CallStatusReply, BackendError> {
        self.record(Call::CallStatus(call_id.to_string())).await;
        self.with_script(|s| {
            s.statuses.pop_front().unwrap_or_else(|| {
                Ok(CallStatusReply { status: "calling".into(), result: None })
            })
        })
    }

    async fn trigger_emergency(
        &self,
        request: &EmergencyTrigger,
    ) -> Result<EmergencyTriggered, BackendError> {
        self.record(Call::Trigger(request.clone())).await;
        self.with_script(|s| s.trigger.clone())
    }

    async fn cancel_emergency(&self, emergency_id: &str) -> Result<(), BackendError> {
        self.record(Call::Cancel(emergency_id.to_string())).await;
        Ok(())
    }

    async fn nearby_hospitals(
        &self,
        at: Coordinates,
        radius_km: f64,
    ) -> Result<Vec<Hospital>, BackendError> {
        self.record(Call::Hospitals(at, radius_km)).await;
        self.with_script(|s| s.hospitals.clone())
    }
}
