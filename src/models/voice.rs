use serde::Serialize;

use super::appointment::BookingPrefill;
use super::enums::{Intent, Tab};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Shortcut chip rendered under an assistant reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SuggestedAction {
    pub label: &'static str,
    pub tab: Tab,
}

impl SuggestedAction {
    pub fn for_intent(intent: Intent) -> Option<Self> {
        match intent {
            Intent::Booking => Some(Self { label: "Book an Appointment", tab: Tab::Appointments }),
            Intent::Emergency => Some(Self { label: "Find Nearby Hospital", tab: Tab::Hospitals }),
            Intent::Medication => Some(Self { label: "Manage My Meds", tab: Tab::Medications }),
            Intent::Symptom | Intent::General => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    pub language: Option<String>,
    pub intent: Option<Intent>,
    pub has_audio: bool,
    pub action: Option<SuggestedAction>,
}

impl ChatMessage {
    pub fn user(text: &str, language: &str) -> Self {
        Self {
            role: Role::User,
            text: text.to_string(),
            language: Some(language.to_string()),
            intent: None,
            has_audio: false,
            action: None,
        }
    }

    pub fn assistant(text: &str) -> Self {
        Self {
            role: Role::Assistant,
            text: text.to_string(),
            language: None,
            intent: None,
            has_audio: false,
            action: None,
        }
    }
}

/// A request to switch the visible tab, optionally carrying booking details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationRequest {
    pub tab: Tab,
    pub prefill: Option<BookingPrefill>,
}

/// Events the assistant raises for the surrounding shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantEvent {
    Navigate(NavigationRequest),
    /// Blocking alert the user must acknowledge.
    Alert(String),
}
