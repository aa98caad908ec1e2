use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::types::*;
use super::{Backend, BackendError};
use crate::config::ApiConfig;
use crate::models::{
    BookingForm, Coordinates, HealthLogEntry, Hospital, MedicineInfo, ScannedMedicine, UserProfile,
};

/// REST client for the companion backend.
pub struct HttpBackend {
    base_url: String,
    user_id: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

/// Request body with the user id merged in at the top level.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WithUser<'a, T: Serialize> {
    user_id: &'a str,
    #[serde(flatten)]
    body: &'a T,
}

impl HttpBackend {
    pub fn new(config: &ApiConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_id: config.user_id.clone(),
            client,
            timeout_secs: config.timeout.as_secs(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_send_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_connect() {
            BackendError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            BackendError::Timeout(self.timeout_secs)
        } else {
            BackendError::HttpClient(e.to_string())
        }
    }

    async fn send<R: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<R, BackendError> {
        let response = request.send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorReply>(&body)
                .map(|r| r.error)
                .unwrap_or(body);
            return Err(BackendError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| BackendError::ResponseParsing(e.to_string()))
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, BackendError> {
        tracing::debug!(path, "POST");
        let payload = WithUser {
            user_id: &self.user_id,
            body,
        };
        self.send(self.client.post(self.url(path)).json(&payload)).await
    }

    async fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<R, BackendError> {
        tracing::debug!(path, "GET");
        self.send(self.client.get(self.url(path)).query(query)).await
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn save_profile(&self, profile: &UserProfile) -> Result<(), BackendError> {
        let _: serde_json::Value = self.post("/profile", profile).await?;
        Ok(())
    }

    async fn list_medications(&self) -> Result<Vec<RemoteMedication>, BackendError> {
        let list: MedicationList = self
            .get("/medications", &[("userId", self.user_id.clone())])
            .await?;
        Ok(list.medications)
    }

    async fn create_medication(&self, med: &NewMedication) -> Result<String, BackendError> {
        let created: MedicationCreated = self.post("/medications", med).await?;
        Ok(created.medication_id)
    }

    async fn mark_medication_taken(
        &self,
        remote_id: &str,
        taken_at: DateTime<Utc>,
    ) -> Result<(), BackendError> {
        let body = serde_json::json!({
            "userId": self.user_id,
            "takenAt": taken_at.to_rfc3339(),
        });
        let url = self.url(&format!("/medications/{remote_id}/taken"));
        let _: serde_json::Value = self.send(self.client.put(url).json(&body)).await?;
        Ok(())
    }

    async fn check_medicine(
        &self,
        name: &str,
        conditions: &[String],
    ) -> Result<MedicineInfo, BackendError> {
        let body = serde_json::json!({
            "medicineName": name,
            "userConditions": conditions,
        });
        let reply: MedicineCheckReply = self.post("/medicine/check", &body).await?;
        Ok(reply.info)
    }

    async fn scan_prescription(
        &self,
        image_base64: &str,
        image_type: &str,
        conditions: &[String],
    ) -> Result<Vec<ScannedMedicine>, BackendError> {
        let body = serde_json::json!({
            "image": image_base64,
            "imageType": image_type,
            "userConditions": conditions,
        });
        let reply: MedicineScanReply = self.post("/medicine/scan", &body).await?;
        Ok(reply.into_medicines())
    }

    async fn health_logs(&self) -> Result<Vec<HealthLogEntry>, BackendError> {
        let list: HealthLogList = self
            .get("/health/logs", &[("userId", self.user_id.clone())])
            .await?;
        Ok(list.logs)
    }

    async fn create_health_log(
        &self,
        description: &str,
        severity: u8,
    ) -> Result<HealthLogEntry, BackendError> {
        let body = serde_json::json!({
            "type": "symptom",
            "description": description,
            "severity": severity,
        });
        let created: HealthLogCreated = self.post("/health/logs", &body).await?;
        Ok(created.log)
    }

    async fn process_voice(&self, request: &VoiceRequest) -> Result<VoiceReply, BackendError> {
        self.post("/voice/process", request).await
    }

    async fn book_appointment(&self, form: &BookingForm) -> Result<BookingAccepted, BackendError> {
        self.post("/appointments/book", form).await
    }

    async fn call_status(&self, call_id: &str) -> Result<CallStatusReply, BackendError> {
        self.get(&format!("/appointments/status/{call_id}"), &[]).await
    }

    async fn trigger_emergency(
        &self,
        request: &EmergencyTrigger,
    ) -> Result<EmergencyTriggered, BackendError> {
        self.post("/emergency/trigger", request).await
    }

    async fn cancel_emergency(&self, emergency_id: &str) -> Result<(), BackendError> {
        let body = serde_json::json!({ "emergencyId": emergency_id });
        let _: serde_json::Value = self.post("/emergency/cancel", &body).await?;
        Ok(())
    }

    async fn nearby_hospitals(
        &self,
        at: Coordinates,
        radius_km: f64,
    ) -> Result<Vec<Hospital>, BackendError> {
        let list: HospitalList = self
            .get(
                "/hospitals/nearby",
                &[
                    ("lat", at.lat.to_string()),
                    ("lng", at.lng.to_string()),
                    ("radius", radius_km.to_string()),
                ],
            )
            .await?;
        Ok(list.hospitals)
    }
}
