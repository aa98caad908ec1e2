//! Appointment booking through an AI-placed phone call.
//!
//! The user submits a booking form; the backend places the call and hands
//! back a call id. From then on three owned timers run until the call
//! reaches a terminal state:
//!
//! - a 1 s ticker accumulating the visible call duration,
//! - a 3 s status poll against `GET /appointments/status/{id}`,
//! - a 180 s ceiling that forces `failed` if nothing terminal arrived.
//!
//! Timer tasks only hold a weak reference to the session, so dropping the
//! orchestrator tears every timer down.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use thiserror::Error;

use crate::backend::Backend;
use crate::models::{BookingForm, BookingPrefill, CallSession, CallStatus};
use crate::timers::{is_running, TimerHandle};

pub const POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const CALL_CEILING: Duration = Duration::from_secs(180);
pub const DURATION_TICK: Duration = Duration::from_secs(1);

pub const TIMEOUT_MESSAGE: &str = "Timed out waiting for call result.";
pub const BOOKING_FAILED_MESSAGE: &str = "Failed to initiate call. Try again.";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppointmentError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("A call is already in progress. Start over to book again.")]
    AlreadyInProgress,
}

struct CallInner {
    session: CallSession,
    form: BookingForm,
    patient_name: Option<String>,
    ticker: Option<TimerHandle>,
    poll: Option<TimerHandle>,
    ceiling: Option<TimerHandle>,
    /// Bumped on reset so a booking reply that lands afterwards is ignored.
    generation: u64,
}

impl CallInner {
    fn stop_timers(&mut self) {
        self.ticker = None;
        self.poll = None;
        self.ceiling = None;
    }
}

fn lock(inner: &Mutex<CallInner>) -> MutexGuard<'_, CallInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct CallOrchestrator {
    backend: Arc<dyn Backend>,
    inner: Arc<Mutex<CallInner>>,
}

impl CallOrchestrator {
    pub fn new(backend: Arc<dyn Backend>, patient_name: Option<&str>) -> Self {
        let patient_name = patient_name.map(str::to_string);
        Self {
            backend,
            inner: Arc::new(Mutex::new(CallInner {
                session: CallSession::default(),
                form: BookingForm::for_patient(patient_name.as_deref()),
                patient_name,
                ticker: None,
                poll: None,
                ceiling: None,
                generation: 0,
            })),
        }
    }

    pub fn snapshot(&self) -> CallSession {
        lock(&self.inner).session.clone()
    }

    pub fn form(&self) -> BookingForm {
        lock(&self.inner).form.clone()
    }

    pub fn set_form(&self, form: BookingForm) {
        lock(&self.inner).form = form;
    }

    /// Merge booking details extracted by the voice assistant into the form.
    pub fn prefill(&self, prefill: &BookingPrefill) {
        lock(&self.inner).form.apply(prefill);
    }

    /// Seeds the form now if its patient name is blank, and on every `reset`.
    pub fn set_patient_name(&self, name: Option<&str>) {
        let mut inner = lock(&self.inner);
        inner.patient_name = name.map(str::to_string);
        if inner.form.patient_name.trim().is_empty() {
            inner.form.patient_name = name.unwrap_or_default().to_string();
        }
    }

    pub fn has_active_timers(&self) -> bool {
        let inner = lock(&self.inner);
        is_running(&inner.ticker) || is_running(&inner.poll) || is_running(&inner.ceiling)
    }

    /// Ask the backend to call the clinic. Accepted only from `idle`.
    pub async fn submit(&self, form: BookingForm) -> Result<CallSession, AppointmentError> {
        if let Some(field) = form.missing_field() {
            return Err(AppointmentError::MissingField(field));
        }

        let generation = {
            let mut inner = lock(&self.inner);
            if inner.session.status != CallStatus::Idle {
                return Err(AppointmentError::AlreadyInProgress);
            }
            inner.form = form.clone();
            inner.session = CallSession {
                status: CallStatus::Initiating,
                ..Default::default()
            };
            inner.generation
        };

        tracing::info!(doctor = %form.doctor_name, "Requesting AI booking call");
        let result = self.backend.book_appointment(&form).await;

        let mut inner = lock(&self.inner);
        if inner.generation != generation {
            tracing::debug!("Booking reply arrived after reset, discarding");
            return Ok(inner.session.clone());
        }

        match result {
            Ok(accepted) => {
                tracing::info!(call_id = %accepted.call_id, "Clinic call started");
                inner.session.call_id = Some(accepted.call_id.clone());
                inner.session.status = CallStatus::Calling;

                let weak = Arc::downgrade(&self.inner);
                inner.ticker = Some(start_ticker(weak.clone()));
                inner.poll = Some(start_poll(
                    weak.clone(),
                    Arc::clone(&self.backend),
                    accepted.call_id,
                ));
                inner.ceiling = Some(start_ceiling(weak));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Booking request failed");
                inner.session.status = CallStatus::Failed;
                inner.session.last_error = Some(
                    e.server_message()
                        .unwrap_or(BOOKING_FAILED_MESSAGE)
                        .to_string(),
                );
            }
        }
        Ok(inner.session.clone())
    }

    /// Stop every timer and return to an empty form.
    pub fn reset(&self) {
        let mut inner = lock(&self.inner);
        inner.stop_timers();
        inner.generation += 1;
        inner.session = CallSession::default();
        inner.form = BookingForm::for_patient(inner.patient_name.as_deref());
    }
}

fn start_ticker(weak: Weak<Mutex<CallInner>>) -> TimerHandle {
    TimerHandle::every(DURATION_TICK, move || {
        let weak = weak.clone();
        async move {
            let Some(inner) = weak.upgrade() else {
                return false;
            };
            let mut inner = lock(&inner);
            if !inner.session.status.is_live() {
                return false;
            }
            inner.session.duration_secs += 1;
            true
        }
    })
}

fn start_poll(
    weak: Weak<Mutex<CallInner>>,
    backend: Arc<dyn Backend>,
    call_id: String,
) -> TimerHandle {
    TimerHandle::every(POLL_INTERVAL, move || {
        let weak = weak.clone();
        let backend = Arc::clone(&backend);
        let call_id = call_id.clone();
        async move {
            let live = weak
                .upgrade()
                .is_some_and(|inner| lock(&inner).session.status.is_live());
            if !live {
                return false;
            }

            let reply = backend.call_status(&call_id).await;

            let Some(inner) = weak.upgrade() else {
                return false;
            };
            let mut inner = lock(&inner);
            match reply {
                Ok(reply) => match CallStatus::from_remote(&reply.status) {
                    Some(status) => {
                        inner.session.status = status;
                        if status.is_terminal() {
                            tracing::info!(%call_id, %status, "Clinic call finished");
                            inner.ticker = None;
                            inner.ceiling = None;
                            return false;
                        }
                    }
                    None => tracing::debug!(%call_id, status = %reply.status, "Ignoring call status"),
                },
                Err(e) => tracing::warn!(%call_id, error = %e, "Call status poll failed"),
            }
            true
        }
    })
}

fn start_ceiling(weak: Weak<Mutex<CallInner>>) -> TimerHandle {
    TimerHandle::after(CALL_CEILING, async move {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let mut inner = lock(&inner);
        if inner.session.status.is_live() {
            tracing::warn!("No call result after {}s", CALL_CEILING.as_secs());
            inner.session.status = CallStatus::Failed;
            inner.session.last_error = Some(TIMEOUT_MESSAGE.to_string());
        }
        inner.poll = None;
        inner.ticker = None;
    })
}
