use serde::Serialize;

/// A language the speech recognizer can be switched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub code: &'static str,
    /// BCP-47 tag handed to the recognizer.
    pub bcp: &'static str,
    pub label: &'static str,
}

pub const RECOGNITION_LANGUAGES: &[Language] = &[
    Language { code: "hi", bcp: "hi-IN", label: "हिंदी" },
    Language { code: "en", bcp: "en-IN", label: "English" },
    Language { code: "bn", bcp: "bn-IN", label: "বাংলা" },
    Language { code: "te", bcp: "te-IN", label: "తెలుగు" },
    Language { code: "ta", bcp: "ta-IN", label: "தமிழ்" },
    Language { code: "mr", bcp: "mr-IN", label: "मराठी" },
];

impl Language {
    /// Recognition language for a profile code, Hindi when unsupported.
    pub fn for_code(code: &str) -> Language {
        RECOGNITION_LANGUAGES
            .iter()
            .copied()
            .find(|l| l.code == code)
            .unwrap_or(RECOGNITION_LANGUAGES[0])
    }
}
