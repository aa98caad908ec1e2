//! The user's profile. The local record is authoritative; the backend gets a
//! best-effort copy on every save.

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use crate::backend::Backend;
use crate::models::UserProfile;
use crate::store::{self, LocalStore, StoreError, PROFILE_KEY};
use crate::timers::TimerHandle;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Name is required")]
    MissingName,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct ProfileService {
    backend: Arc<dyn Backend>,
    store: Arc<dyn LocalStore>,
    /// In-flight `POST /profile`; a newer save replaces it.
    sync: Mutex<Option<TimerHandle>>,
}

impl ProfileService {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn LocalStore>) -> Self {
        Self {
            backend,
            store,
            sync: Mutex::new(None),
        }
    }

    /// `Ok(None)` on first run.
    pub fn load(&self) -> Result<Option<UserProfile>, ProfileError> {
        Ok(store::load(&*self.store, PROFILE_KEY)?)
    }

    /// Validate and write locally. The backend copy is sent in the background
    /// and its outcome only logged.
    pub fn save(&self, mut profile: UserProfile) -> Result<UserProfile, ProfileError> {
        profile.name = profile.name.trim().to_string();
        if profile.name.is_empty() {
            return Err(ProfileError::MissingName);
        }
        if let Some(phone) = &profile.phone {
            let phone = phone.trim();
            profile.phone = (!phone.is_empty()).then(|| phone.to_string());
        }

        store::save(&*self.store, PROFILE_KEY, &profile)?;
        tracing::info!(language = %profile.language, conditions = profile.conditions.len(), "Profile saved");

        let backend = Arc::clone(&self.backend);
        let remote = profile.clone();
        let task = TimerHandle::spawn(async move {
            if let Err(e) = backend.save_profile(&remote).await {
                tracing::warn!(error = %e, "Profile sync failed, keeping local copy");
            }
        });
        *self.sync.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        Ok(profile)
    }

    pub fn is_syncing(&self) -> bool {
        crate::timers::is_running(&self.sync.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{Call, MockBackend};
    use crate::backend::BackendError;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn service(mock: MockBackend) -> (ProfileService, Arc<MockBackend>, Arc<MemoryStore>) {
        let mock = Arc::new(mock);
        let store = Arc::new(MemoryStore::new());
        (ProfileService::new(mock.clone(), store.clone()), mock, store)
    }

    async fn synced(svc: &ProfileService) {
        while svc.is_syncing() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn first_run_has_no_profile() {
        let (svc, _, _) = service(MockBackend::new());
        assert!(svc.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn save_persists_and_mirrors() {
        let (svc, mock, _) = service(MockBackend::new());
        let profile = UserProfile::new("  Asha ", "ta").with_condition("Diabetes");
        let saved = svc.save(profile).unwrap();
        assert_eq!(saved.name, "Asha");
        assert_eq!(svc.load().unwrap(), Some(saved.clone()));
        synced(&svc).await;
        assert_eq!(mock.calls(), vec![Call::SaveProfile(saved)]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_does_not_delay_save() {
        let (svc, mock, _) = service(MockBackend::new().with_delay(Duration::from_secs(20)));
        let started = tokio::time::Instant::now();
        svc.save(UserProfile::new("Asha", "hi")).unwrap();

        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(svc.is_syncing());
        assert_eq!(svc.load().unwrap().map(|p| p.name), Some("Asha".to_string()));

        synced(&svc).await;
        assert_eq!(mock.count(|c| matches!(c, Call::SaveProfile(_))), 1);
    }

    #[tokio::test]
    async fn empty_name_is_rejected_without_side_effects() {
        let (svc, mock, store) = service(MockBackend::new());
        let err = svc.save(UserProfile::new("   ", "hi")).unwrap_err();
        assert!(matches!(err, ProfileError::MissingName));
        assert!(store.read(PROFILE_KEY).unwrap().is_none());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn remote_failure_keeps_local_save() {
        let (svc, _, _) = service(
            MockBackend::new().with_profile(Err(BackendError::Connection("offline".into()))),
        );
        svc.save(UserProfile::new("Ravi", "en")).unwrap();
        synced(&svc).await;
        assert_eq!(svc.load().unwrap().map(|p| p.name), Some("Ravi".to_string()));
    }

    #[tokio::test]
    async fn blank_phone_is_dropped() {
        let (svc, _, _) = service(MockBackend::new());
        let mut profile = UserProfile::new("Meena", "mr");
        profile.phone = Some("  ".into());
        assert_eq!(svc.save(profile).unwrap().phone, None);
    }

    #[tokio::test]
    async fn corrupt_record_is_reported() {
        let (svc, _, store) = service(MockBackend::new());
        store.write(PROFILE_KEY, "{not json").unwrap();
        assert!(matches!(svc.load(), Err(ProfileError::Store(StoreError::Corrupt { .. }))));
    }
}
