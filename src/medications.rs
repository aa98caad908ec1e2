//! Medication tracker.
//!
//! The local list is authoritative for display and always persisted first;
//! the backend is a best-effort mirror. Records created here carry no
//! `remote_id` until the create call is acknowledged, and only records with
//! one are marked taken remotely.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{Local, NaiveDate, Utc};
use thiserror::Error;

use crate::backend::{Backend, NewMedication};
use crate::capabilities::Notifier;
use crate::models::{Medication, MedicineInfo, ScannedMedicine, TimeSlot};
use crate::store::{self, LocalStore, StoreError, MEDICATIONS_KEY};
use crate::timers::TimerHandle;

pub const REMINDER_TITLE: &str = "Medication Reminder";

#[derive(Error, Debug)]
pub enum MedicationError {
    #[error("Medication name is required")]
    EmptyName,

    #[error("Pick at least one time slot")]
    NoTimeSlot,

    #[error("Medication not found: {0}")]
    NotFound(String),

    #[error("Prescription image is empty")]
    EmptyImage,

    #[error("The prescription could not be read")]
    Unreadable,

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn lock(meds: &Mutex<Vec<Medication>>) -> MutexGuard<'_, Vec<Medication>> {
    meds.lock().unwrap_or_else(PoisonError::into_inner)
}

fn sort_by_name(meds: &mut [Medication]) {
    meds.sort_by_key(|m| m.name.to_lowercase());
}

fn persist(store: &dyn LocalStore, meds: &[Medication]) -> Result<(), StoreError> {
    store::save(store, MEDICATIONS_KEY, &meds)
}

pub struct MedicationTracker {
    backend: Arc<dyn Backend>,
    store: Arc<dyn LocalStore>,
    meds: Arc<Mutex<Vec<Medication>>>,
    conditions: Mutex<Vec<String>>,
    syncs: Mutex<Vec<TimerHandle>>,
}

impl MedicationTracker {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn LocalStore>) -> Self {
        Self {
            backend,
            store,
            meds: Arc::new(Mutex::new(Vec::new())),
            conditions: Mutex::new(Vec::new()),
            syncs: Mutex::new(Vec::new()),
        }
    }

    /// Profile conditions sent with medicine lookups.
    pub fn set_conditions(&self, conditions: Vec<String>) {
        *self.conditions.lock().unwrap_or_else(PoisonError::into_inner) = conditions;
    }

    fn conditions(&self) -> Vec<String> {
        self.conditions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn list(&self) -> Vec<Medication> {
        lock(&self.meds).clone()
    }

    /// Medications not yet taken today.
    pub fn pending(&self) -> Vec<Medication> {
        lock(&self.meds)
            .iter()
            .filter(|m| !m.taken_today)
            .cloned()
            .collect()
    }

    /// Read the local list, then prefer the server's list when it has one.
    /// Records never acknowledged by the server are kept either way.
    pub async fn load(&self) -> Result<Vec<Medication>, MedicationError> {
        let local: Vec<Medication> = match store::load(self.store.as_ref(), MEDICATIONS_KEY) {
            Ok(found) => found.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable medication list");
                Vec::new()
            }
        };

        let today = today();
        let mut meds = match self.backend.list_medications().await {
            Ok(remote) if !remote.is_empty() => {
                tracing::info!(count = remote.len(), "Using server medication list");
                let mut merged: Vec<Medication> =
                    remote.into_iter().map(|r| r.into_local(today)).collect();
                merged.extend(local.into_iter().filter(|m| !m.is_synced()));
                merged
            }
            Ok(_) => local,
            Err(e) => {
                tracing::warn!(error = %e, "Medication list unavailable, using local copy");
                local
            }
        };

        for med in &mut meds {
            med.roll_over(today);
        }
        sort_by_name(&mut meds);
        persist(self.store.as_ref(), &meds)?;

        *lock(&self.meds) = meds.clone();
        Ok(meds)
    }

    /// Add a medication locally and mirror it to the backend in the background.
    pub fn add(
        &self,
        name: &str,
        dosage: &str,
        times: Vec<TimeSlot>,
    ) -> Result<Medication, MedicationError> {
        if name.trim().is_empty() {
            return Err(MedicationError::EmptyName);
        }
        if times.is_empty() {
            return Err(MedicationError::NoTimeSlot);
        }

        let med = Medication::new_local(name, dosage, times);
        {
            let mut meds = lock(&self.meds);
            let mut next = meds.clone();
            next.push(med.clone());
            sort_by_name(&mut next);
            persist(self.store.as_ref(), &next)?;
            *meds = next;
        }
        tracing::info!(id = %med.id, "Medication added");

        let task = TimerHandle::spawn(create_remote(
            Arc::downgrade(&self.meds),
            Arc::clone(&self.backend),
            Arc::clone(&self.store),
            med.clone(),
        ));
        let mut syncs = self.syncs.lock().unwrap_or_else(PoisonError::into_inner);
        syncs.retain(TimerHandle::is_active);
        syncs.push(task);

        Ok(med)
    }

    /// Mark today's dose taken. Returns `false` when it already was.
    pub async fn mark_taken(&self, id: &str) -> Result<bool, MedicationError> {
        let remote_id = {
            let mut meds = lock(&self.meds);
            let mut next = meds.clone();
            let med = next
                .iter_mut()
                .find(|m| m.id == id)
                .ok_or_else(|| MedicationError::NotFound(id.to_string()))?;
            if med.taken_today {
                return Ok(false);
            }
            med.taken_today = true;
            med.last_taken = Some(today());
            let remote_id = med.remote_id.clone();
            persist(self.store.as_ref(), &next)?;
            *meds = next;
            remote_id
        };

        match remote_id {
            Some(remote_id) => {
                if let Err(e) = self.backend.mark_medication_taken(&remote_id, Utc::now()).await {
                    tracing::warn!(%remote_id, error = %e, "Taken flag not synced");
                }
            }
            None => tracing::debug!(%id, "Local-only medication, skipping remote update"),
        }
        Ok(true)
    }

    /// Reference information for a medicine, or a safe placeholder.
    pub async fn check_medicine(&self, name: &str) -> Result<MedicineInfo, MedicationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MedicationError::EmptyName);
        }
        match self.backend.check_medicine(name, &self.conditions()).await {
            Ok(info) => Ok(info),
            Err(e) => {
                tracing::warn!(error = %e, "Medicine lookup failed");
                Ok(MedicineInfo::unavailable(name))
            }
        }
    }

    /// Upload a prescription photo and return the medicines read from it.
    pub async fn scan_prescription(
        &self,
        image: &[u8],
        image_type: &str,
    ) -> Result<Vec<ScannedMedicine>, MedicationError> {
        if image.is_empty() {
            return Err(MedicationError::EmptyImage);
        }
        let encoded = BASE64.encode(image);
        tracing::info!(bytes = image.len(), %image_type, "Scanning prescription");
        match self
            .backend
            .scan_prescription(&encoded, image_type, &self.conditions())
            .await
        {
            Ok(found) => Ok(found),
            Err(e) => {
                tracing::warn!(error = %e, "Prescription scan failed");
                Ok(vec![ScannedMedicine::unreadable()])
            }
        }
    }

    /// Turn a scanned line into a tracked medication. Timing text that
    /// names no slot defaults to the morning.
    pub fn accept_suggestion(&self, scanned: &ScannedMedicine) -> Result<Medication, MedicationError> {
        if *scanned == ScannedMedicine::unreadable() {
            return Err(MedicationError::Unreadable);
        }
        let mut times = TimeSlot::from_timing_text(&scanned.timing);
        if times.is_empty() {
            times.push(TimeSlot::Morning);
        }
        self.add(&scanned.name, &scanned.dosage, times)
    }

    /// Show one notification per pending medication. Returns how many were shown.
    pub async fn remind_pending(&self, notifier: &dyn Notifier) -> usize {
        let pending = self.pending();
        if pending.is_empty() || !notifier.is_available() {
            return 0;
        }
        if !notifier.request_permission().await {
            tracing::info!("Notification permission denied");
            return 0;
        }

        let mut shown = 0;
        for med in &pending {
            let body = if med.dosage.is_empty() {
                format!("Time to take {}", med.name)
            } else {
                format!("Time to take {} ({})", med.name, med.dosage)
            };
            match notifier.notify(REMINDER_TITLE, &body) {
                Ok(()) => shown += 1,
                Err(e) => tracing::warn!(error = %e, "Reminder not shown"),
            }
        }
        shown
    }
}

async fn create_remote(
    meds: Weak<Mutex<Vec<Medication>>>,
    backend: Arc<dyn Backend>,
    store: Arc<dyn LocalStore>,
    med: Medication,
) {
    let remote_id = match backend.create_medication(&NewMedication::from(&med)).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(id = %med.id, error = %e, "Medication kept local only");
            return;
        }
    };

    let Some(meds) = meds.upgrade() else {
        return;
    };
    let mut meds = lock(&meds);
    if let Some(local) = meds.iter_mut().find(|m| m.id == med.id) {
        local.remote_id = Some(remote_id);
        if let Err(e) = persist(store.as_ref(), &meds) {
            tracing::warn!(error = %e, "Could not persist server id");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{Call, MockBackend};
    use crate::backend::{BackendError, RemoteMedication};
    use crate::capabilities::fakes::FakeNotifier;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn tracker(mock: MockBackend) -> (Arc<MockBackend>, Arc<MemoryStore>, MedicationTracker) {
        let mock = Arc::new(mock);
        let store = Arc::new(MemoryStore::new());
        let tracker = MedicationTracker::new(mock.clone(), store.clone());
        (mock, store, tracker)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    fn stored(store: &MemoryStore) -> Vec<Medication> {
        store::load(store, MEDICATIONS_KEY).unwrap().unwrap_or_default()
    }

    #[tokio::test(start_paused = true)]
    async fn add_sorts_persists_and_syncs() {
        let (mock, store, tracker) = tracker(MockBackend::new());
        tracker.add("metformin", "500mg", vec![TimeSlot::Morning]).unwrap();
        tracker.add("Aspirin", "75mg", vec![TimeSlot::Night]).unwrap();

        let names: Vec<_> = tracker.list().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["Aspirin", "metformin"]);
        assert_eq!(stored(&store).len(), 2);

        settle().await;
        assert_eq!(mock.count(|c| matches!(c, Call::CreateMedication(_))), 2);
        assert!(tracker.list().iter().all(Medication::is_synced));
        assert!(stored(&store).iter().all(Medication::is_synced));
    }

    #[tokio::test]
    async fn add_validates_input() {
        let (_mock, _store, tracker) = tracker(MockBackend::new());
        assert!(matches!(
            tracker.add("  ", "5mg", vec![TimeSlot::Morning]),
            Err(MedicationError::EmptyName)
        ));
        assert!(matches!(tracker.add("Aspirin", "", vec![]), Err(MedicationError::NoTimeSlot)));
    }

    #[tokio::test(start_paused = true)]
    async fn mark_taken_is_idempotent() {
        let (_mock, store, tracker) = tracker(
            MockBackend::new().with_created_medication(Err(BackendError::Timeout(30))),
        );
        let med = tracker.add("Aspirin", "75mg", vec![TimeSlot::Morning]).unwrap();
        settle().await;

        assert!(tracker.mark_taken(&med.id).await.unwrap());
        let after_first = tracker.list();
        assert!(!tracker.mark_taken(&med.id).await.unwrap());
        assert_eq!(tracker.list(), after_first);
        assert!(after_first[0].taken_today);
        assert_eq!(after_first[0].last_taken, Some(today()));
        assert!(stored(&store)[0].taken_today);
    }

    #[tokio::test(start_paused = true)]
    async fn only_synced_records_are_marked_remotely() {
        let (mock, _store, tracker) = tracker(
            MockBackend::new().with_created_medication(Err(BackendError::Timeout(30))),
        );
        let local = tracker.add("Aspirin", "75mg", vec![TimeSlot::Morning]).unwrap();
        settle().await;
        tracker.mark_taken(&local.id).await.unwrap();
        assert_eq!(mock.count(|c| matches!(c, Call::MarkTaken(_))), 0);

        let (mock, _store, tracker) = tracker_with_synced().await;
        let id = tracker.list()[0].id.clone();
        tracker.mark_taken(&id).await.unwrap();
        assert!(mock.calls().contains(&Call::MarkTaken("srv-med-1".into())));
    }

    async fn tracker_with_synced() -> (Arc<MockBackend>, Arc<MemoryStore>, MedicationTracker) {
        let (mock, store, tracker) = tracker(MockBackend::new());
        tracker.add("Aspirin", "75mg", vec![TimeSlot::Morning]).unwrap();
        settle().await;
        (mock, store, tracker)
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let (_mock, _store, tracker) = tracker(MockBackend::new());
        assert!(matches!(
            tracker.mark_taken("nope").await,
            Err(MedicationError::NotFound(id)) if id == "nope"
        ));
    }

    #[tokio::test]
    async fn server_list_wins_when_non_empty() {
        let remote = RemoteMedication {
            medication_id: "m-1".into(),
            name: "Thyroxine".into(),
            dosage: "50mcg".into(),
            times: vec!["Morning (8 AM)".into()],
            taken_today: false,
        };
        let (_mock, store, tracker) = tracker(MockBackend::new().with_medications(Ok(vec![remote])));

        let mut stale = Medication::new_local("Old", "1mg", vec![TimeSlot::Night]);
        stale.remote_id = Some("m-0".into());
        let unsynced = Medication::new_local("Zinc", "10mg", vec![TimeSlot::Night]);
        store::save(&*store, MEDICATIONS_KEY, &vec![stale, unsynced]).unwrap();

        let names: Vec<_> = tracker.load().await.unwrap().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["Thyroxine", "Zinc"]);
    }

    #[tokio::test]
    async fn empty_or_failed_server_list_keeps_local() {
        let local = vec![Medication::new_local("Aspirin", "75mg", vec![TimeSlot::Morning])];

        let (_mock, store, empty_remote) = tracker(MockBackend::new());
        store::save(&*store, MEDICATIONS_KEY, &local).unwrap();
        assert_eq!(empty_remote.load().await.unwrap().len(), 1);

        let (_mock, store, failed_remote) =
            tracker(MockBackend::new().with_medications(Err(BackendError::Timeout(30))));
        store::save(&*store, MEDICATIONS_KEY, &local).unwrap();
        assert_eq!(failed_remote.load().await.unwrap()[0].name, "Aspirin");
    }

    /// Memory store whose writes can be switched off.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        broken: std::sync::atomic::AtomicBool,
    }

    impl FlakyStore {
        fn break_writes(&self) {
            self.broken.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    impl LocalStore for FlakyStore {
        fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.read(key)
        }

        fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
            if self.broken.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.inner.write(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key)
        }
    }

    #[tokio::test]
    async fn failed_local_write_leaves_list_unchanged() {
        let store = Arc::new(FlakyStore::default());
        let tracker = MedicationTracker::new(Arc::new(MockBackend::new()), store.clone());
        let aspirin = tracker.add("Aspirin", "75mg", vec![TimeSlot::Morning]).unwrap();

        store.break_writes();
        assert!(matches!(
            tracker.add("Zinc", "10mg", vec![TimeSlot::Night]),
            Err(MedicationError::Store(_))
        ));
        assert_eq!(tracker.list().len(), 1);

        assert!(matches!(tracker.mark_taken(&aspirin.id).await, Err(MedicationError::Store(_))));
        assert!(!tracker.list()[0].taken_today);
        assert!(matches!(tracker.mark_taken(&aspirin.id).await, Err(MedicationError::Store(_))));
    }

    #[tokio::test]
    async fn load_clears_yesterdays_taken_flag() {
        let (_mock, store, tracker) = tracker(MockBackend::new());
        let mut med = Medication::new_local("Aspirin", "75mg", vec![TimeSlot::Morning]);
        med.taken_today = true;
        med.last_taken = today().pred_opt();
        store::save(&*store, MEDICATIONS_KEY, &vec![med]).unwrap();

        let loaded = tracker.load().await.unwrap();
        assert!(!loaded[0].taken_today);
        assert_eq!(tracker.pending().len(), 1);
    }

    #[tokio::test]
    async fn medicine_check_falls_back_on_failure() {
        let (mock, _store, tracker) =
            tracker(MockBackend::new().with_medicine_info(Err(BackendError::Timeout(30))));
        let info = tracker.check_medicine(" Crocin ").await.unwrap();
        assert_eq!(info, MedicineInfo::unavailable("Crocin"));
        assert!(mock.calls().contains(&Call::CheckMedicine("Crocin".into())));
    }

    #[tokio::test]
    async fn scan_uploads_base64_and_falls_back() {
        let (mock, _store, tracker) =
            tracker(MockBackend::new().with_scan(Err(BackendError::Timeout(30))));
        let result = tracker.scan_prescription(&[0xFF, 0xD8, 0xFF], "image/jpeg").await.unwrap();
        assert_eq!(result, vec![ScannedMedicine::unreadable()]);
        assert!(mock.calls().contains(&Call::ScanPrescription {
            image_type: "image/jpeg".into(),
            bytes: 4,
        }));

        assert!(matches!(
            tracker.scan_prescription(&[], "image/png").await,
            Err(MedicationError::EmptyImage)
        ));
    }

    #[tokio::test]
    async fn accepted_suggestion_maps_timing_to_slots() {
        let (_mock, _store, tracker) = tracker(MockBackend::new());
        let med = tracker
            .accept_suggestion(&ScannedMedicine {
                name: "Amoxicillin".into(),
                dosage: "250mg".into(),
                timing: "after breakfast and dinner".into(),
            })
            .unwrap();
        assert_eq!(med.times, vec![TimeSlot::Morning, TimeSlot::Night]);

        let vague = tracker
            .accept_suggestion(&ScannedMedicine {
                name: "Vitamin D".into(),
                dosage: String::new(),
                timing: "weekly".into(),
            })
            .unwrap();
        assert_eq!(vague.times, vec![TimeSlot::Morning]);

        assert!(matches!(
            tracker.accept_suggestion(&ScannedMedicine::unreadable()),
            Err(MedicationError::Unreadable)
        ));
    }

    #[tokio::test]
    async fn reminders_cover_pending_doses() {
        let (_mock, _store, tracker) = tracker(MockBackend::new());
        let taken = tracker.add("Aspirin", "75mg", vec![TimeSlot::Morning]).unwrap();
        tracker.add("Metformin", "500mg", vec![TimeSlot::Night]).unwrap();
        tracker.mark_taken(&taken.id).await.unwrap();

        let notifier = FakeNotifier::default();
        assert_eq!(tracker.remind_pending(&notifier).await, 1);
        let shown = notifier.shown.lock().unwrap();
        assert_eq!(shown[0], (REMINDER_TITLE.to_string(), "Time to take Metformin (500mg)".to_string()));

        let denied = FakeNotifier { deny: true, ..Default::default() };
        assert_eq!(tracker.remind_pending(&denied).await, 0);
    }
}
