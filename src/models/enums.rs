use serde::{Deserialize, Serialize};

/// A string did not match any variant of a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid value for {field}: {value}")]
pub struct ParseEnumError {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Serde goes through the same strings, so the wire form matches `as_str`.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "&'static str")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ParseEnumError {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParseEnumError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for &'static str {
            fn from(value: $name) -> Self {
                value.as_str()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(TimeSlot {
    Morning => "Morning (8 AM)",
    Afternoon => "Afternoon (2 PM)",
    Night => "Night (9 PM)",
});

str_enum!(CallStatus {
    Idle => "idle",
    Initiating => "initiating",
    Calling => "calling",
    InProgress => "in_progress",
    Confirmed => "confirmed",
    Failed => "failed",
});

str_enum!(EmergencyState {
    Idle => "idle",
    Active => "active",
    Cancelled => "cancelled",
});

str_enum!(HospitalType {
    Hospital => "hospital",
    Clinic => "clinic",
    Government => "government",
});

str_enum!(HospitalFilter {
    All => "all",
    Emergency => "emergency",
    Clinic => "clinic",
    Government => "government",
});

str_enum!(Intent {
    Booking => "booking",
    Emergency => "emergency",
    Symptom => "symptom",
    Medication => "medication",
    General => "general",
});

str_enum!(Tab {
    Voice => "voice",
    Medications => "medications",
    Hospitals => "hospitals",
    Appointments => "appointments",
    Emergency => "emergency",
    Timeline => "timeline",
});

str_enum!(VoiceStatus {
    Idle => "idle",
    Listening => "listening",
    Thinking => "thinking",
});

impl CallStatus {
    /// Statuses the status endpoint may move a session into.
    pub fn from_remote(value: &str) -> Option<Self> {
        match value.parse::<Self>().ok()? {
            s @ (Self::Calling | Self::InProgress | Self::Confirmed | Self::Failed) => Some(s),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// The call is live and the duration ticker should run.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Calling | Self::InProgress)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "",
            Self::Initiating => "Initiating call to clinic...",
            Self::Calling => "AI agent is calling the clinic...",
            Self::InProgress => "Message being delivered...",
            Self::Confirmed => "Call completed!",
            Self::Failed => "Clinic did not answer",
        }
    }
}

impl TimeSlot {
    /// Map free-form timing text ("morning and night", "after lunch") onto slots.
    pub fn from_timing_text(text: &str) -> Vec<Self> {
        let lower = text.to_lowercase();
        let mut slots = Vec::new();
        if ["morning", "breakfast", "subah", "am"]
            .iter()
            .any(|k| lower.split(|c: char| !c.is_alphanumeric()).any(|w| w == *k))
        {
            slots.push(Self::Morning);
        }
        if ["afternoon", "lunch", "noon", "dopahar"].iter().any(|k| lower.contains(k)) {
            slots.push(Self::Afternoon);
        }
        if ["night", "dinner", "bedtime", "evening", "raat"].iter().any(|k| lower.contains(k)) {
            slots.push(Self::Night);
        }
        if slots.is_empty() {
            if lower.contains("twice") {
                slots = vec![Self::Morning, Self::Night];
            } else if lower.contains("thrice") || lower.contains("three times") {
                slots = Self::ALL.to_vec();
            }
        }
        slots
    }
}

impl Intent {
    /// Unknown intents are treated as general conversation.
    pub fn from_remote(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or(Self::General)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_slot_serializes_as_label() {
        let json = serde_json::to_string(&TimeSlot::Morning).unwrap();
        assert_eq!(json, "\"Morning (8 AM)\"");
        let back: TimeSlot = serde_json::from_str("\"Night (9 PM)\"").unwrap();
        assert_eq!(back, TimeSlot::Night);
    }

    #[test]
    fn time_slot_rejects_values_outside_fixed_set() {
        let result: Result<TimeSlot, _> = serde_json::from_str("\"Midnight\"");
        assert!(result.is_err());
    }

    #[test]
    fn call_status_from_remote_accepts_only_poll_states() {
        assert_eq!(CallStatus::from_remote("in_progress"), Some(CallStatus::InProgress));
        assert_eq!(CallStatus::from_remote("confirmed"), Some(CallStatus::Confirmed));
        assert_eq!(CallStatus::from_remote("idle"), None);
        assert_eq!(CallStatus::from_remote("initiating"), None);
        assert_eq!(CallStatus::from_remote("unknown"), None);
    }

    #[test]
    fn terminal_and_live_partition() {
        assert!(CallStatus::Confirmed.is_terminal());
        assert!(CallStatus::Failed.is_terminal());
        assert!(!CallStatus::Calling.is_terminal());
        assert!(CallStatus::Calling.is_live());
        assert!(CallStatus::InProgress.is_live());
        assert!(!CallStatus::Initiating.is_live());
    }

    #[test]
    fn parse_error_names_the_enum() {
        let err = "bogus".parse::<Tab>().unwrap_err();
        assert_eq!(err.field, "Tab");
        assert_eq!(err.value, "bogus");
    }

    #[test]
    fn timing_text_maps_to_slots() {
        assert_eq!(TimeSlot::from_timing_text("Morning"), vec![TimeSlot::Morning]);
        assert_eq!(
            TimeSlot::from_timing_text("after breakfast and dinner"),
            vec![TimeSlot::Morning, TimeSlot::Night]
        );
        assert_eq!(TimeSlot::from_timing_text("twice daily"), vec![TimeSlot::Morning, TimeSlot::Night]);
        assert!(TimeSlot::from_timing_text("as needed").is_empty());
    }

    #[test]
    fn unknown_intent_is_general() {
        assert_eq!(Intent::from_remote(Some("booking")), Intent::Booking);
        assert_eq!(Intent::from_remote(Some("chitchat")), Intent::General);
        assert_eq!(Intent::from_remote(None), Intent::General);
    }
}
