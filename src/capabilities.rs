//! Platform capabilities the components depend on.
//!
//! Speech recognition, geolocation, notifications, audio playback and the
//! map widget all live outside this crate. Each is a trait with an explicit
//! availability check so a host without the capability degrades instead of
//! failing. [`Unavailable`] implements every trait as absent.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::models::Coordinates;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("{0} is not available on this device")]
    Unavailable(&'static str),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Timed out")]
    Timeout,

    #[error("{0}")]
    Failed(String),
}

// ═══════════════════════════════════════════════════════════
// Speech
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechErrorKind {
    NoSpeech,
    NotAllowed,
    Other(String),
}

/// Callback from a running recognition session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Final transcript.
    Result(String),
    Error(SpeechErrorKind),
    End,
}

pub trait SpeechRecognizer: Send + Sync {
    fn is_available(&self) -> bool;

    /// Begin one recognition session in `language` (BCP-47). Events are
    /// delivered on `events` until `End`.
    fn start(
        &self,
        language: &str,
        events: UnboundedSender<SpeechEvent>,
    ) -> Result<(), CapabilityError>;

    fn stop(&self);
}

// ═══════════════════════════════════════════════════════════
// Geolocation, notifications, audio
// ═══════════════════════════════════════════════════════════

#[async_trait]
pub trait Geolocator: Send + Sync {
    fn is_available(&self) -> bool;

    async fn current_position(&self) -> Result<Coordinates, CapabilityError>;
}

/// How long a position fix may take before callers fall back.
pub const GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(8);

/// One position fix bounded by `timeout`.
pub async fn locate(
    geolocator: &dyn Geolocator,
    timeout: Duration,
) -> Result<Coordinates, CapabilityError> {
    if !geolocator.is_available() {
        return Err(CapabilityError::Unavailable("Geolocation"));
    }
    tokio::time::timeout(timeout, geolocator.current_position())
        .await
        .map_err(|_| CapabilityError::Timeout)?
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn is_available(&self) -> bool;

    /// Ask for permission; returns whether it is granted.
    async fn request_permission(&self) -> bool;

    fn notify(&self, title: &str, body: &str) -> Result<(), CapabilityError>;
}

pub trait AudioPlayer: Send + Sync {
    /// Play an MP3 clip. Returns once playback has started.
    fn play(&self, mp3: &[u8]) -> Result<(), CapabilityError>;
}

// ═══════════════════════════════════════════════════════════
// Map
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct MapMarker {
    pub position: Coordinates,
    /// CSS hex colour.
    pub color: &'static str,
    pub label: String,
    pub is_user: bool,
}

pub trait MapView: Send + Sync {
    fn is_available(&self) -> bool;

    fn clear_markers(&self);

    fn add_marker(&self, marker: &MapMarker);

    fn fit_bounds(&self, points: &[Coordinates]);

    fn fly_to(&self, at: Coordinates, zoom: u8);
}

/// Stand-in for a host that offers none of the capabilities.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl SpeechRecognizer for Unavailable {
    fn is_available(&self) -> bool {
        false
    }

    fn start(&self, _: &str, _: UnboundedSender<SpeechEvent>) -> Result<(), CapabilityError> {
        Err(CapabilityError::Unavailable("Speech recognition"))
    }

    fn stop(&self) {}
}

#[async_trait]
impl Geolocator for Unavailable {
    fn is_available(&self) -> bool {
        false
    }

    async fn current_position(&self) -> Result<Coordinates, CapabilityError> {
        Err(CapabilityError::Unavailable("Geolocation"))
    }
}

#[async_trait]
impl Notifier for Unavailable {
    fn is_available(&self) -> bool {
        false
    }

    async fn request_permission(&self) -> bool {
        false
    }

    fn notify(&self, _: &str, _: &str) -> Result<(), CapabilityError> {
        Err(CapabilityError::Unavailable("Notifications"))
    }
}

impl AudioPlayer for Unavailable {
    fn play(&self, _: &[u8]) -> Result<(), CapabilityError> {
        Err(CapabilityError::Unavailable("Audio playback"))
    }
}

impl MapView for Unavailable {
    fn is_available(&self) -> bool {
        false
    }
    fn clear_markers(&self) {}
    fn add_marker(&self, _: &MapMarker) {}
    fn fit_bounds(&self, _: &[Coordinates]) {}
    fn fly_to(&self, _: Coordinates, _: u8) {}
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_reports_absence_everywhere() {
        let none = Unavailable;
        assert!(!SpeechRecognizer::is_available(&none));
        assert!(!Geolocator::is_available(&none));
        assert!(!Notifier::is_available(&none));
        assert!(!MapView::is_available(&none));
        assert_eq!(
            none.current_position().await,
            Err(CapabilityError::Unavailable("Geolocation"))
        );
        assert!(!none.request_permission().await);
        assert!(none.play(&[0xFF]).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn locate_times_out_on_a_silent_device() {
        let geo = fakes::FakeGeolocator::hanging();
        let started = tokio::time::Instant::now();
        assert_eq!(locate(&geo, GEOLOCATION_TIMEOUT).await, Err(CapabilityError::Timeout));
        assert_eq!(started.elapsed(), GEOLOCATION_TIMEOUT);
    }

    #[tokio::test]
    async fn locate_skips_unavailable_device() {
        assert_eq!(
            locate(&Unavailable, GEOLOCATION_TIMEOUT).await,
            Err(CapabilityError::Unavailable("Geolocation"))
        );
    }

    #[test]
    fn unavailable_speech_refuses_to_start() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let err = Unavailable.start("hi-IN", tx).unwrap_err();
        assert_eq!(err.to_string(), "Speech recognition is not available on this device");
    }
}
