//! Voice assistant loop.
//!
//! Speech transcripts and typed text go to `POST /voice/process` with the
//! profile context; replies are appended to the conversation, their audio is
//! played, and certain intents schedule a delayed switch to another tab.
//! Only one request may be outstanding: while `thinking`, new input is
//! refused.

use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use regex::Regex;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::backend::{Backend, VoiceRequest};
use crate::capabilities::{
    AudioPlayer, CapabilityError, SpeechErrorKind, SpeechEvent, SpeechRecognizer,
};
use crate::language_detect::typed_language_hint;
use crate::models::{
    AssistantEvent, BookingPrefill, ChatMessage, Intent, Language, NavigationRequest,
    SuggestedAction, Tab, UserProfile, VoiceStatus,
};
use crate::timers::TimerHandle;

/// Forces `idle` if the recognizer never reports back.
pub const LISTEN_SAFETY_TIMEOUT: Duration = Duration::from_secs(15);
pub const NO_SPEECH_HINT_DURATION: Duration = Duration::from_secs(3);

pub const EMERGENCY_NAV_DELAY: Duration = Duration::from_millis(1500);
pub const SYMPTOM_NAV_DELAY: Duration = Duration::from_millis(2500);
pub const BOOKING_NAV_DELAY: Duration = Duration::from_secs(2);

pub const APOLOGY: &str = "Sorry, something went wrong. Please try again.";
pub const NO_SPEECH_HINT: &str = "Didn't catch that. Please try again.";
pub const MIC_DENIED: &str =
    "Microphone access denied. Please allow microphone permission and try again.";

/// Indian mobile number, optionally with the +91 prefix.
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\+?91[-\s]?)?[6-9]\d{4}[-\s]?\d{5}").unwrap());

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoiceError {
    #[error("Still waiting for the previous reply")]
    Busy,

    #[error("Nothing to send")]
    EmptyInput,

    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

pub fn greeting(name: Option<&str>) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!(
            "Namaste {name}! I am Bhasha AI. Tap the mic and speak, I will understand you."
        ),
        None => "Namaste! I am Bhasha AI. Tap the mic and speak in any Indian language.".into(),
    }
}

/// A number the booking agent could actually dial.
pub fn is_callable_phone(phone: &str) -> bool {
    PHONE.is_match(phone)
}

/// Which tab an intent should lead to, and after how long.
pub fn navigation_for(
    intent: Intent,
    booking: Option<&BookingPrefill>,
) -> Option<(Duration, NavigationRequest)> {
    match intent {
        Intent::Emergency => Some((
            EMERGENCY_NAV_DELAY,
            NavigationRequest { tab: Tab::Emergency, prefill: None },
        )),
        Intent::Symptom => Some((
            SYMPTOM_NAV_DELAY,
            NavigationRequest { tab: Tab::Hospitals, prefill: None },
        )),
        Intent::Booking => booking
            .filter(|b| is_callable_phone(&b.patient_phone))
            .map(|b| {
                (
                    BOOKING_NAV_DELAY,
                    NavigationRequest { tab: Tab::Appointments, prefill: Some(b.clone()) },
                )
            }),
        Intent::Medication | Intent::General => None,
    }
}

struct VoiceInner {
    status: VoiceStatus,
    messages: Vec<ChatMessage>,
    language: Language,
    session_id: String,
    profile: Option<UserProfile>,
    hint: Option<String>,
    listen: Option<TimerHandle>,
    hint_clear: Option<TimerHandle>,
    navigation: Option<TimerHandle>,
}

fn lock(inner: &Mutex<VoiceInner>) -> MutexGuard<'_, VoiceInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
struct Services {
    backend: Arc<dyn Backend>,
    speech: Arc<dyn SpeechRecognizer>,
    audio: Arc<dyn AudioPlayer>,
    events: UnboundedSender<AssistantEvent>,
}

pub struct VoiceAssistant {
    services: Services,
    inner: Arc<Mutex<VoiceInner>>,
}

impl VoiceAssistant {
    /// Returns the assistant and the stream of navigation and alert events
    /// the host should act on.
    pub fn new(
        backend: Arc<dyn Backend>,
        speech: Arc<dyn SpeechRecognizer>,
        audio: Arc<dyn AudioPlayer>,
        profile: Option<UserProfile>,
    ) -> (Self, UnboundedReceiver<AssistantEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let language = Language::for_code(
            profile.as_ref().map(|p| p.language.as_str()).unwrap_or("hi"),
        );
        let first = ChatMessage::assistant(&greeting(profile.as_ref().map(|p| p.name.as_str())));

        let assistant = Self {
            services: Services { backend, speech, audio, events },
            inner: Arc::new(Mutex::new(VoiceInner {
                status: VoiceStatus::Idle,
                messages: vec![first],
                language,
                session_id: format!("session-{}", Uuid::new_v4()),
                profile,
                hint: None,
                listen: None,
                hint_clear: None,
                navigation: None,
            })),
        };
        (assistant, rx)
    }

    pub fn status(&self) -> VoiceStatus {
        lock(&self.inner).status
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        lock(&self.inner).messages.clone()
    }

    pub fn hint(&self) -> Option<String> {
        lock(&self.inner).hint.clone()
    }

    pub fn language(&self) -> Language {
        lock(&self.inner).language
    }

    pub fn set_language(&self, code: &str) {
        lock(&self.inner).language = Language::for_code(code);
    }

    pub fn set_profile(&self, profile: Option<UserProfile>) {
        lock(&self.inner).profile = profile;
    }

    pub fn speech_available(&self) -> bool {
        self.services.speech.is_available()
    }

    /// Text the user typed; the language is inferred from its script.
    pub async fn send_typed(&self, text: &str) -> Result<ChatMessage, VoiceError> {
        let selected = self.language().code;
        let language = typed_language_hint(text, selected);
        process(&self.inner, &self.services, text, language).await
    }

    /// Send text in an explicit language.
    pub async fn send_text(&self, text: &str, language: &str) -> Result<ChatMessage, VoiceError> {
        process(&self.inner, &self.services, text, language.to_string()).await
    }

    /// Open the microphone. The transcript, if any, is sent automatically.
    pub fn start_listening(&self) -> Result<(), VoiceError> {
        let mut inner = lock(&self.inner);
        if inner.status != VoiceStatus::Idle {
            return Err(VoiceError::Busy);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.services.speech.start(inner.language.bcp, tx)?;
        inner.status = VoiceStatus::Listening;
        inner.hint = None;

        let language = inner.language.code.to_string();
        inner.listen = Some(TimerHandle::spawn(listen(
            Arc::downgrade(&self.inner),
            self.services.clone(),
            rx,
            language,
        )));
        tracing::debug!(language = inner.language.bcp, "Listening");
        Ok(())
    }

    pub fn stop_listening(&self) {
        let mut inner = lock(&self.inner);
        if inner.status == VoiceStatus::Listening {
            self.services.speech.stop();
            inner.listen = None;
            inner.status = VoiceStatus::Idle;
        }
    }

    /// Mic button: start when idle, stop when listening.
    pub fn toggle_listening(&self) -> Result<(), VoiceError> {
        if self.status() == VoiceStatus::Listening {
            self.stop_listening();
            Ok(())
        } else {
            self.start_listening()
        }
    }

    pub fn has_pending_navigation(&self) -> bool {
        crate::timers::is_running(&lock(&self.inner).navigation)
    }
}

async fn process(
    inner: &Arc<Mutex<VoiceInner>>,
    services: &Services,
    text: &str,
    language: String,
) -> Result<ChatMessage, VoiceError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(VoiceError::EmptyInput);
    }

    let request = {
        let mut guard = lock(inner);
        if guard.status == VoiceStatus::Thinking {
            return Err(VoiceError::Busy);
        }
        guard.status = VoiceStatus::Thinking;
        guard.messages.push(ChatMessage::user(text, &language));
        let (user_name, user_conditions) = match &guard.profile {
            Some(p) => (p.name.clone(), p.conditions_list()),
            None => (String::new(), Vec::new()),
        };
        VoiceRequest {
            text: text.to_string(),
            language,
            session_id: guard.session_id.clone(),
            user_conditions,
            user_name,
        }
    };

    tracing::info!(language = %request.language, "Sending voice request");
    let reply = services.backend.process_voice(&request).await;

    let mut guard = lock(inner);
    guard.status = VoiceStatus::Idle;

    let reply = match reply {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(error = %e, "Voice request failed");
            let apology = ChatMessage::assistant(APOLOGY);
            guard.messages.push(apology.clone());
            return Ok(apology);
        }
    };

    let intent = Intent::from_remote(reply.intent.as_deref());
    let mut message = ChatMessage::assistant(&reply.response_text);
    message.intent = Some(intent);
    message.has_audio = reply.audio_content.is_some();
    message.action = SuggestedAction::for_intent(intent);
    guard.messages.push(message.clone());

    if let Some(audio) = reply.audio_content.as_deref() {
        play(services.audio.as_ref(), audio);
    }

    if let Some((delay, request)) = navigation_for(intent, reply.booking_data.as_ref()) {
        tracing::debug!(tab = %request.tab, ?delay, "Scheduling navigation");
        let events = services.events.clone();
        // Replacing the slot drops any navigation still pending.
        guard.navigation = Some(TimerHandle::after(delay, async move {
            let _ = events.send(AssistantEvent::Navigate(request));
        }));
    }

    Ok(message)
}

fn play(audio: &dyn AudioPlayer, encoded: &str) {
    match BASE64.decode(encoded) {
        Ok(bytes) => {
            if let Err(e) = audio.play(&bytes) {
                tracing::warn!(error = %e, "Audio playback failed");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Reply audio is not valid base64"),
    }
}

fn set_idle_if_listening(weak: &Weak<Mutex<VoiceInner>>) {
    if let Some(inner) = weak.upgrade() {
        let mut inner = lock(&inner);
        if inner.status == VoiceStatus::Listening {
            inner.status = VoiceStatus::Idle;
        }
    }
}

/// Pump recognizer events until a transcript, an end, or the safety timeout.
async fn listen(
    weak: Weak<Mutex<VoiceInner>>,
    services: Services,
    mut events: UnboundedReceiver<SpeechEvent>,
    language: String,
) {
    let deadline = tokio::time::sleep(LISTEN_SAFETY_TIMEOUT);
    tokio::pin!(deadline);

    let transcript = loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = &mut deadline => {
                tracing::warn!("Speech recognizer went silent, giving up");
                services.speech.stop();
                set_idle_if_listening(&weak);
                return;
            }
        };

        match event {
            Some(SpeechEvent::Result(text)) => break text,
            Some(SpeechEvent::Error(SpeechErrorKind::NoSpeech)) => {
                if let Some(inner) = weak.upgrade() {
                    let clear = Arc::downgrade(&inner);
                    let mut guard = lock(&inner);
                    guard.hint = Some(NO_SPEECH_HINT.to_string());
                    guard.hint_clear = Some(TimerHandle::after(NO_SPEECH_HINT_DURATION, async move {
                        if let Some(inner) = clear.upgrade() {
                            lock(&inner).hint = None;
                        }
                    }));
                }
                set_idle_if_listening(&weak);
            }
            Some(SpeechEvent::Error(SpeechErrorKind::NotAllowed)) => {
                let _ = services.events.send(AssistantEvent::Alert(MIC_DENIED.to_string()));
                set_idle_if_listening(&weak);
            }
            Some(SpeechEvent::Error(SpeechErrorKind::Other(reason))) => {
                tracing::warn!(%reason, "Speech recognition error");
                set_idle_if_listening(&weak);
            }
            Some(SpeechEvent::End) | None => {
                set_idle_if_listening(&weak);
                return;
            }
        }
    };

    let Some(inner) = weak.upgrade() else {
        return;
    };
    if let Err(e) = process(&inner, &services, &transcript, language).await {
        tracing::debug!(error = %e, "Dropping transcript");
    }
}
