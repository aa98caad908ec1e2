pub mod appointment; // AI-placed clinic calls
pub mod backend;
pub mod capabilities;
pub mod config;
pub mod console;
pub mod core_state;
pub mod emergency; // SOS hold gesture + countdown
pub mod hospitals;
pub mod language_detect;
pub mod medications;
pub mod models;
pub mod profile;
pub mod store;
pub mod timeline; // Symptom log
pub mod timers;
pub mod voice; // Voice interaction loop

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::backend::HttpBackend;
use crate::console::{Console, ConsoleNotifier, MutedAudio};
use crate::core_state::{Capabilities, CoreState};
use crate::store::{JsonFileStore, LocalStore, MemoryStore};

fn open_store() -> Arc<dyn LocalStore> {
    let dir = config::store_dir();
    match JsonFileStore::open(dir.clone()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "Store unavailable, nothing will persist");
            Arc::new(MemoryStore::new())
        }
    }
}

pub fn run() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Bhasha starting v{}", config::APP_VERSION);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "Cannot start async runtime");
            return;
        }
    };

    let api = config::ApiConfig::from_env();
    tracing::info!(base_url = %api.base_url, user_id = %api.user_id, "Backend configured");

    runtime.block_on(async move {
        let backend = match HttpBackend::new(&api) {
            Ok(backend) => Arc::new(backend),
            Err(e) => {
                tracing::error!(error = %e, "Cannot build HTTP client");
                return;
            }
        };
        let caps = Capabilities {
            notifier: Arc::new(ConsoleNotifier),
            audio: Arc::new(MutedAudio),
            ..Capabilities::unavailable()
        };

        let state = Arc::new(CoreState::new(backend, open_store(), caps));
        if let Err(e) = Console::new(state).run().await {
            tracing::error!(error = %e, "Console input failed");
        }
    });

    tracing::info!("Bhasha stopped");
}
