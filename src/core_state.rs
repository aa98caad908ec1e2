//! Application state shared by every surface.
//!
//! `CoreState` owns one instance of each component, wired to a single
//! backend, local store and set of platform capabilities. It is the only
//! place that knows how the components relate: profile changes fan out to
//! all of them, and navigation events from the voice assistant switch the
//! active tab.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::appointment::CallOrchestrator;
use crate::backend::Backend;
use crate::capabilities::{AudioPlayer, Geolocator, MapView, Notifier, SpeechRecognizer, Unavailable};
use crate::emergency::SosController;
use crate::hospitals::HospitalLocator;
use crate::medications::MedicationTracker;
use crate::models::{AssistantEvent, NavigationRequest, Tab, UserProfile};
use crate::profile::{ProfileError, ProfileService};
use crate::store::LocalStore;
use crate::timeline::HealthTimeline;
use crate::voice::VoiceAssistant;

// ═══════════════════════════════════════════════════════════
// Capabilities
// ═══════════════════════════════════════════════════════════

/// Platform services the host provides. Anything the host lacks is
/// [`Unavailable`].
#[derive(Clone)]
pub struct Capabilities {
    pub speech: Arc<dyn SpeechRecognizer>,
    pub geolocator: Arc<dyn Geolocator>,
    pub notifier: Arc<dyn Notifier>,
    pub audio: Arc<dyn AudioPlayer>,
    pub map: Arc<dyn MapView>,
}

impl Capabilities {
    pub fn unavailable() -> Self {
        Self {
            speech: Arc::new(Unavailable),
            geolocator: Arc::new(Unavailable),
            notifier: Arc::new(Unavailable),
            audio: Arc::new(Unavailable),
            map: Arc::new(Unavailable),
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::unavailable()
    }
}

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    pub profiles: ProfileService,
    pub voice: VoiceAssistant,
    pub appointments: CallOrchestrator,
    pub emergency: SosController,
    pub hospitals: HospitalLocator,
    pub medications: MedicationTracker,
    pub timeline: HealthTimeline,
    notifier: Arc<dyn Notifier>,
    profile: Mutex<Option<UserProfile>>,
    active_tab: Mutex<Tab>,
    assistant_events: Mutex<UnboundedReceiver<AssistantEvent>>,
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CoreState {
    /// Build every component and seed it from the stored profile, if any.
    /// An unreadable profile is treated as first run.
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn LocalStore>, caps: Capabilities) -> Self {
        let profiles = ProfileService::new(backend.clone(), store.clone());
        let profile = profiles.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ignoring stored profile");
            None
        });

        let (voice, assistant_events) = VoiceAssistant::new(
            backend.clone(),
            caps.speech.clone(),
            caps.audio.clone(),
            profile.clone(),
        );

        let state = Self {
            profiles,
            voice,
            appointments: CallOrchestrator::new(backend.clone(), None),
            emergency: SosController::new(backend.clone(), caps.geolocator.clone()),
            hospitals: HospitalLocator::new(backend.clone(), caps.geolocator, caps.map),
            medications: MedicationTracker::new(backend.clone(), store),
            timeline: HealthTimeline::new(backend),
            notifier: caps.notifier,
            profile: Mutex::new(None),
            active_tab: Mutex::new(Tab::Voice),
            assistant_events: Mutex::new(assistant_events),
        };
        if let Some(profile) = profile {
            state.apply_profile(profile);
        }
        state
    }

    pub fn profile(&self) -> Option<UserProfile> {
        guard(&self.profile).clone()
    }

    /// `true` until a profile has been saved.
    pub fn needs_setup(&self) -> bool {
        guard(&self.profile).is_none()
    }

    /// Applies to every component as soon as the local write succeeds.
    pub fn save_profile(&self, profile: UserProfile) -> Result<UserProfile, CoreError> {
        let saved = self.profiles.save(profile)?;
        self.apply_profile(saved.clone());
        Ok(saved)
    }

    fn apply_profile(&self, profile: UserProfile) {
        self.voice.set_language(&profile.language);
        self.voice.set_profile(Some(profile.clone()));
        self.appointments.set_patient_name(Some(&profile.name));
        self.emergency
            .set_patient(&profile.name, profile.phone.as_deref().unwrap_or_default());
        self.medications.set_conditions(profile.conditions_list());
        *guard(&self.profile) = Some(profile);
    }

    pub fn active_tab(&self) -> Tab {
        *guard(&self.active_tab)
    }

    /// Switch tab and load whatever the tab shows. Load failures are kept in
    /// the component's own state and only logged here.
    pub async fn open_tab(&self, tab: Tab) {
        *guard(&self.active_tab) = tab;
        tracing::debug!(tab = %tab, "Tab opened");
        match tab {
            Tab::Hospitals => {
                if let Err(e) = self.hospitals.refresh().await {
                    tracing::warn!(error = %e, "Hospital list unavailable");
                }
            }
            Tab::Medications => {
                if let Err(e) = self.medications.load().await {
                    tracing::warn!(error = %e, "Medication list unavailable");
                }
            }
            Tab::Timeline => {
                if let Err(e) = self.timeline.refresh().await {
                    tracing::warn!(error = %e, "Health log unavailable");
                }
            }
            Tab::Voice | Tab::Appointments | Tab::Emergency => {}
        }
    }

    /// Act on one assistant event. Returns the alert text the host must show,
    /// if any.
    pub async fn handle_event(&self, event: AssistantEvent) -> Option<String> {
        match event {
            AssistantEvent::Navigate(NavigationRequest { tab, prefill }) => {
                if let Some(prefill) = prefill {
                    self.appointments.prefill(&prefill);
                }
                self.open_tab(tab).await;
                None
            }
            AssistantEvent::Alert(message) => Some(message),
        }
    }

    /// Apply every assistant event raised so far. Returns pending alerts.
    pub async fn pump_events(&self) -> Vec<String> {
        let mut alerts = Vec::new();
        loop {
            let next = guard(&self.assistant_events).try_recv();
            let Ok(event) = next else { break };
            if let Some(alert) = self.handle_event(event).await {
                alerts.push(alert);
            }
        }
        alerts
    }

    /// Notify about every dose not yet taken today.
    pub async fn remind_medications(&self) -> usize {
        self.medications.remind_pending(self.notifier.as_ref()).await
    }
}
