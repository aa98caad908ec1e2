use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The user's own record. Lives only in the local store; the backend copy
/// is a best-effort mirror and never read back.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Preferred language code (`hi`, `en`, ...).
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub conditions: BTreeSet<String>,
}

fn default_language() -> String {
    "hi".to_string()
}

/// Conditions offered on the setup form.
pub const KNOWN_CONDITIONS: &[&str] = &[
    "Diabetes",
    "Blood Pressure",
    "Asthma",
    "Heart Disease",
    "Thyroid",
    "Kidney Disease",
];

impl UserProfile {
    pub fn new(name: &str, language: &str) -> Self {
        Self {
            name: name.to_string(),
            language: language.to_string(),
            ..Default::default()
        }
    }

    pub fn with_condition(mut self, condition: &str) -> Self {
        self.conditions.insert(condition.to_string());
        self
    }

    pub fn conditions_list(&self) -> Vec<String> {
        self.conditions.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_optional_fields_use_defaults() {
        let profile: UserProfile = serde_json::from_str(r#"{"name":"Asha"}"#).unwrap();
        assert_eq!(profile.name, "Asha");
        assert_eq!(profile.language, "hi");
        assert!(profile.conditions.is_empty());
        assert!(profile.age.is_none());
    }

    #[test]
    fn conditions_are_a_set() {
        let profile = UserProfile::new("Asha", "en")
            .with_condition("Diabetes")
            .with_condition("Diabetes")
            .with_condition("Asthma");
        assert_eq!(profile.conditions_list(), vec!["Asthma", "Diabetes"]);
    }
}
