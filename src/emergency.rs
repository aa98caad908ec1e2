//! Emergency SOS.
//!
//! A press-and-hold gesture guards the trigger: progress climbs 5 % every
//! 100 ms and the alert fires once it reaches 100 %. Releasing earlier
//! resets progress with no side effect. Once active, a 30 s countdown gives
//! the user a window to cancel; the remote alert is sent in the background
//! and never holds the countdown up.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use thiserror::Error;

use crate::backend::{Backend, EmergencyLocation, EmergencyTrigger};
use crate::capabilities::{locate, Geolocator, GEOLOCATION_TIMEOUT};
use crate::models::{
    Coordinates, EmergencyContact, EmergencyEvent, EmergencyState, COUNTDOWN_SECS,
};
use crate::timers::{is_running, TimerHandle};

pub const HOLD_TICK: Duration = Duration::from_millis(100);
pub const HOLD_STEP: u8 = 5;
pub const COUNTDOWN_TICK: Duration = Duration::from_secs(1);
/// How long `cancelled` stays visible before returning to idle.
pub const CANCELLED_DISPLAY: Duration = Duration::from_secs(2);

const SOS_SYMPTOMS: &str = "Emergency SOS triggered";
const LOCATION_LABEL: &str = "Current Location";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmergencyError {
    #[error("Contact name and phone are required")]
    InvalidContact,

    #[error("No contact at position {0}")]
    NoSuchContact(usize),

    #[error("No active emergency to cancel")]
    NotActive,
}

struct SosInner {
    event: EmergencyEvent,
    contacts: Vec<EmergencyContact>,
    patient_name: String,
    patient_phone: String,
    hold: Option<TimerHandle>,
    countdown: Option<TimerHandle>,
    back_to_idle: Option<TimerHandle>,
    /// In-flight trigger requests. Not cut short by cancel, so a late id
    /// can still be withdrawn.
    alerts: Vec<TimerHandle>,
    /// One per activation; a trigger reply only lands on its own event.
    activation: u64,
}

fn lock(inner: &Mutex<SosInner>) -> MutexGuard<'_, SosInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
struct Services {
    backend: Arc<dyn Backend>,
    geolocator: Arc<dyn Geolocator>,
}

pub struct SosController {
    services: Services,
    inner: Arc<Mutex<SosInner>>,
}

impl SosController {
    pub fn new(backend: Arc<dyn Backend>, geolocator: Arc<dyn Geolocator>) -> Self {
        Self {
            services: Services { backend, geolocator },
            inner: Arc::new(Mutex::new(SosInner {
                event: EmergencyEvent::default(),
                contacts: Vec::new(),
                patient_name: String::new(),
                patient_phone: String::new(),
                hold: None,
                countdown: None,
                back_to_idle: None,
                alerts: Vec::new(),
                activation: 0,
            })),
        }
    }

    pub fn snapshot(&self) -> EmergencyEvent {
        lock(&self.inner).event.clone()
    }

    pub fn set_patient(&self, name: &str, phone: &str) {
        let mut inner = lock(&self.inner);
        inner.patient_name = name.to_string();
        inner.patient_phone = phone.to_string();
    }

    pub fn contacts(&self) -> Vec<EmergencyContact> {
        lock(&self.inner).contacts.clone()
    }

    pub fn add_contact(&self, contact: EmergencyContact) -> Result<(), EmergencyError> {
        if contact.name.is_empty() || contact.phone.is_empty() {
            return Err(EmergencyError::InvalidContact);
        }
        lock(&self.inner).contacts.push(contact);
        Ok(())
    }

    pub fn remove_contact(&self, index: usize) -> Result<EmergencyContact, EmergencyError> {
        let mut inner = lock(&self.inner);
        if index >= inner.contacts.len() {
            return Err(EmergencyError::NoSuchContact(index));
        }
        Ok(inner.contacts.remove(index))
    }

    pub fn is_counting_down(&self) -> bool {
        is_running(&lock(&self.inner).countdown)
    }

    /// Start the hold gesture. Ignored unless idle and not already held.
    pub fn press(&self) {
        let mut inner = lock(&self.inner);
        if inner.event.state != EmergencyState::Idle || is_running(&inner.hold) {
            return;
        }
        inner.event.hold_progress = 0;

        let weak = Arc::downgrade(&self.inner);
        let services = self.services.clone();
        inner.hold = Some(TimerHandle::every(HOLD_TICK, move || {
            let weak = weak.clone();
            let services = services.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return false;
                };
                let mut guard = lock(&inner);
                if guard.event.state != EmergencyState::Idle {
                    return false;
                }
                guard.event.hold_progress = (guard.event.hold_progress + HOLD_STEP).min(100);
                if guard.event.hold_progress < 100 {
                    return true;
                }
                activate(&mut guard, Arc::downgrade(&inner), services);
                false
            }
        }));
    }

    /// End the hold gesture. Before completion this resets progress; after
    /// activation it has no effect.
    pub fn release(&self) {
        let mut inner = lock(&self.inner);
        if inner.event.state == EmergencyState::Idle {
            inner.hold = None;
            inner.event.hold_progress = 0;
        }
    }

    /// Stop the countdown and withdraw the alert.
    pub async fn cancel(&self) -> Result<(), EmergencyError> {
        let emergency_id = {
            let mut inner = lock(&self.inner);
            if inner.event.state != EmergencyState::Active {
                return Err(EmergencyError::NotActive);
            }
            inner.countdown = None;
            inner.event.state = EmergencyState::Cancelled;

            let weak = Arc::downgrade(&self.inner);
            inner.back_to_idle = Some(TimerHandle::after(CANCELLED_DISPLAY, async move {
                if let Some(inner) = weak.upgrade() {
                    let mut inner = lock(&inner);
                    if inner.event.state == EmergencyState::Cancelled {
                        inner.event = EmergencyEvent::default();
                    }
                }
            }));
            inner.event.emergency_id.clone()
        };

        tracing::info!(emergency_id = ?emergency_id, "Emergency cancelled by user");
        if let Some(id) = emergency_id {
            if let Err(e) = self.services.backend.cancel_emergency(&id).await {
                tracing::warn!(%id, error = %e, "Failed to withdraw emergency alert");
            }
        }
        Ok(())
    }
}

/// `idle → active`: start the countdown and send the alert.
fn activate(inner: &mut SosInner, weak: Weak<Mutex<SosInner>>, services: Services) {
    tracing::warn!(contacts = inner.contacts.len(), "Emergency SOS triggered");
    inner.activation += 1;
    inner.event = EmergencyEvent {
        state: EmergencyState::Active,
        countdown_secs: COUNTDOWN_SECS,
        hold_progress: 100,
        ..Default::default()
    };
    inner.back_to_idle = None;
    inner.countdown = Some(start_countdown(weak.clone()));

    let request = EmergencyTrigger {
        symptoms: SOS_SYMPTOMS.to_string(),
        location: EmergencyLocation::at(Coordinates::FALLBACK, LOCATION_LABEL),
        contacts: inner.contacts.clone(),
        patient_name: inner.patient_name.clone(),
        patient_phone: inner.patient_phone.clone(),
    };
    inner.alerts.retain(TimerHandle::is_active);
    inner
        .alerts
        .push(TimerHandle::spawn(send_alert(weak, services, request, inner.activation)));
}

fn start_countdown(weak: Weak<Mutex<SosInner>>) -> TimerHandle {
    TimerHandle::every(COUNTDOWN_TICK, move || {
        let weak = weak.clone();
        async move {
            let Some(inner) = weak.upgrade() else {
                return false;
            };
            let mut inner = lock(&inner);
            if inner.event.state != EmergencyState::Active {
                return false;
            }
            inner.event.countdown_secs = inner.event.countdown_secs.saturating_sub(1);
            inner.event.countdown_secs > 0
        }
    })
}

async fn send_alert(
    weak: Weak<Mutex<SosInner>>,
    services: Services,
    mut request: EmergencyTrigger,
    activation: u64,
) {
    let position = match locate(services.geolocator.as_ref(), GEOLOCATION_TIMEOUT).await {
        Ok(position) => position,
        Err(e) => {
            tracing::info!(error = %e, "No position fix, sending fallback location");
            Coordinates::FALLBACK
        }
    };
    request.location = EmergencyLocation::at(position, LOCATION_LABEL);

    let reply = match services.backend.trigger_emergency(&request).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(error = %e, "Emergency alert failed, countdown continues");
            return;
        }
    };

    let late = match weak.upgrade() {
        Some(inner) => {
            let mut inner = lock(&inner);
            if inner.activation == activation && inner.event.state == EmergencyState::Active {
                tracing::info!(
                    emergency_id = %reply.emergency_id,
                    notified = reply.contacts_notified,
                    "Emergency alert delivered"
                );
                inner.event.emergency_id = Some(reply.emergency_id.clone());
                inner.event.helplines = reply.helplines.clone();
                inner.event.contacts_notified = request
                    .contacts
                    .iter()
                    .take(reply.contacts_notified as usize)
                    .cloned()
                    .collect();
                false
            } else {
                true
            }
        }
        None => true,
    };

    if late {
        tracing::info!(emergency_id = %reply.emergency_id, "Withdrawing alert that arrived after cancel");
        if let Err(e) = services.backend.cancel_emergency(&reply.emergency_id).await {
            tracing::warn!(error = %e, "Failed to withdraw late emergency alert");
        }
    }
}
