//! Remote API collaborator.
//!
//! The backend owns speech, intent classification, telephony, SMS and
//! geocoding. This crate only needs the effect of each call on local state,
//! so every endpoint is one method on [`Backend`]. [`HttpBackend`] is the
//! production implementation; tests use `mock::MockBackend`.

pub mod http;
#[cfg(test)]
pub mod mock;
pub mod types;

pub use http::HttpBackend;
pub use types::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    BookingForm, Coordinates, HealthLogEntry, Hospital, MedicineInfo, ScannedMedicine, UserProfile,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Cannot reach backend at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed backend response: {0}")]
    ResponseParsing(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl BackendError {
    /// Message the server itself put in its `error` field, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } if !message.is_empty() => Some(message),
            _ => None,
        }
    }
}

/// Every endpoint the client core talks to. The configured user id is
/// attached by the implementation, not passed per call.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn save_profile(&self, profile: &UserProfile) -> Result<(), BackendError>;

    async fn list_medications(&self) -> Result<Vec<RemoteMedication>, BackendError>;

    /// Returns the id the server assigned.
    async fn create_medication(&self, med: &NewMedication) -> Result<String, BackendError>;

    async fn mark_medication_taken(
        &self,
        remote_id: &str,
        taken_at: DateTime<Utc>,
    ) -> Result<(), BackendError>;

    async fn check_medicine(
        &self,
        name: &str,
        conditions: &[String],
    ) -> Result<MedicineInfo, BackendError>;

    async fn scan_prescription(
        &self,
        image_base64: &str,
        image_type: &str,
        conditions: &[String],
    ) -> Result<Vec<ScannedMedicine>, BackendError>;

    async fn health_logs(&self) -> Result<Vec<HealthLogEntry>, BackendError>;

    async fn create_health_log(
        &self,
        description: &str,
        severity: u8,
    ) -> Result<HealthLogEntry, BackendError>;

    async fn process_voice(&self, request: &VoiceRequest) -> Result<VoiceReply, BackendError>;

    async fn book_appointment(&self, form: &BookingForm) -> Result<BookingAccepted, BackendError>;

    async fn call_status(&self, call_id: &str) -> Result<CallStatusReply, BackendError>;

    async fn trigger_emergency(
        &self,
        request: &EmergencyTrigger,
    ) -> Result<EmergencyTriggered, BackendError>;

    async fn cancel_emergency(&self, emergency_id: &str) -> Result<(), BackendError>;

    async fn nearby_hospitals(
        &self,
        at: Coordinates,
        radius_km: f64,
    ) -> Result<Vec<Hospital>, BackendError>;
}
