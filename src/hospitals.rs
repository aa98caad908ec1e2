//! Nearby hospitals.
//!
//! Resolves the device position (falling back to central New Delhi),
//! fetches facilities within 10 km and keeps the map widget in step with
//! the filtered list.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::backend::{Backend, BackendError};
use crate::capabilities::{locate, CapabilityError, Geolocator, MapMarker, MapView, GEOLOCATION_TIMEOUT};
use crate::models::{Coordinates, Hospital, HospitalFilter, HospitalType};

pub const SEARCH_RADIUS_KM: f64 = 10.0;
/// Facilities (after the user marker) the viewport is fitted around.
pub const FIT_BOUNDS_LIMIT: usize = 10;
pub const SELECT_ZOOM: u8 = 16;

pub const COLOR_EMERGENCY: &str = "#FF3B30";
pub const COLOR_GOVERNMENT: &str = "#FF9F0A";
pub const COLOR_OTHER: &str = "#30D158";
pub const COLOR_USER: &str = "#0A84FF";

pub const NOTICE_UNSUPPORTED: &str = "Geolocation not supported. Showing hospitals near Delhi.";
pub const NOTICE_NO_FIX: &str = "Could not get your location. Showing hospitals near Delhi.";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HospitalError {
    #[error("Could not load nearby hospitals. Check your connection and try again.")]
    Load(#[source] BackendError),

    #[error("No hospital at position {0}")]
    NoSuchHospital(usize),
}

pub fn marker_color(hospital: &Hospital) -> &'static str {
    if hospital.emergency {
        COLOR_EMERGENCY
    } else if hospital.kind == HospitalType::Government {
        COLOR_GOVERNMENT
    } else {
        COLOR_OTHER
    }
}

#[derive(Default)]
struct LocatorState {
    hospitals: Vec<Hospital>,
    filter: HospitalFilter,
    position: Option<Coordinates>,
    notice: Option<&'static str>,
    error: Option<String>,
}

impl LocatorState {
    fn visible(&self) -> Vec<Hospital> {
        self.hospitals
            .iter()
            .filter(|h| h.matches(self.filter))
            .cloned()
            .collect()
    }
}

pub struct HospitalLocator {
    backend: Arc<dyn Backend>,
    geolocator: Arc<dyn Geolocator>,
    map: Arc<dyn MapView>,
    state: Mutex<LocatorState>,
}

impl HospitalLocator {
    pub fn new(
        backend: Arc<dyn Backend>,
        geolocator: Arc<dyn Geolocator>,
        map: Arc<dyn MapView>,
    ) -> Self {
        Self {
            backend,
            geolocator,
            map,
            state: Mutex::new(LocatorState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, LocatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locate the user and reload the facility list.
    pub async fn refresh(&self) -> Result<Vec<Hospital>, HospitalError> {
        let (position, notice) = match locate(self.geolocator.as_ref(), GEOLOCATION_TIMEOUT).await {
            Ok(position) => (position, None),
            Err(CapabilityError::Unavailable(_)) => (Coordinates::FALLBACK, Some(NOTICE_UNSUPPORTED)),
            Err(e) => {
                tracing::info!(error = %e, "Location unavailable, using fallback");
                (Coordinates::FALLBACK, Some(NOTICE_NO_FIX))
            }
        };

        {
            let mut state = self.state();
            state.position = Some(position);
            state.notice = notice;
        }

        let result = self.backend.nearby_hospitals(position, SEARCH_RADIUS_KM).await;

        let mut state = self.state();
        match result {
            Ok(hospitals) => {
                tracing::info!(count = hospitals.len(), "Loaded nearby hospitals");
                state.hospitals = hospitals;
                state.error = None;
                self.render(&state);
                Ok(state.visible())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Nearby hospitals request failed");
                let err = HospitalError::Load(e);
                state.hospitals.clear();
                state.error = Some(err.to_string());
                self.render(&state);
                Err(err)
            }
        }
    }

    pub fn set_filter(&self, filter: HospitalFilter) -> Vec<Hospital> {
        let mut state = self.state();
        if state.filter != filter {
            state.filter = filter;
            self.render(&state);
        }
        state.visible()
    }

    pub fn filter(&self) -> HospitalFilter {
        self.state().filter
    }

    pub fn visible(&self) -> Vec<Hospital> {
        self.state().visible()
    }

    pub fn position(&self) -> Option<Coordinates> {
        self.state().position
    }

    /// Fallback-location notice from the last refresh.
    pub fn notice(&self) -> Option<&'static str> {
        self.state().notice
    }

    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    /// Centre the map on one of the visible facilities.
    pub fn select(&self, index: usize) -> Result<Hospital, HospitalError> {
        let hospital = self
            .visible()
            .into_iter()
            .nth(index)
            .ok_or(HospitalError::NoSuchHospital(index))?;
        if self.map.is_available() {
            self.map.fly_to(hospital.coordinates(), SELECT_ZOOM);
        }
        Ok(hospital)
    }

    fn render(&self, state: &LocatorState) {
        if !self.map.is_available() {
            return;
        }
        let visible = state.visible();
        self.map.clear_markers();

        let mut bounds = Vec::with_capacity(FIT_BOUNDS_LIMIT + 1);
        if let Some(user) = state.position {
            self.map.add_marker(&MapMarker {
                position: user,
                color: COLOR_USER,
                label: "You are here".to_string(),
                is_user: true,
            });
            bounds.push(user);
        }
        for hospital in &visible {
            self.map.add_marker(&MapMarker {
                position: hospital.coordinates(),
                color: marker_color(hospital),
                label: hospital.name.clone(),
                is_user: false,
            });
        }
        bounds.extend(visible.iter().take(FIT_BOUNDS_LIMIT).map(Hospital::coordinates));
        if !bounds.is_empty() {
            self.map.fit_bounds(&bounds);
        }
    }
}
