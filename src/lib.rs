pub mod config;
pub mod deploy;
pub mod error;
pub mod handlers;
pub mod utils;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use config::{DeployerConfig, Registry, Settings};

pub struct AppState {
    pub registry: Registry,
    pub settings: Settings,
    // One lock per repo path, built at startup. Serializes deploys that
    // race for the same working directory.
    repo_locks: HashMap<String, Arc<Mutex<()>>>,
}

impl AppState {
    pub fn new(config: DeployerConfig) -> Self {
        let repo_locks = config
            .registry
            .iter()
            .map(|entry| (entry.repo_path.clone(), Arc::new(Mutex::new(()))))
            .collect();
        Self {
            registry: config.registry,
            settings: config.settings,
            repo_locks,
        }
    }

    /// Returns the deploy lock for a repository path. Every registered path
    /// has one; the fallback only exists so callers need not unwrap.
    pub fn repo_lock(&self, repo_path: &str) -> Arc<Mutex<()>> {
        self.repo_locks
            .get(repo_path)
            .cloned()
            .unwrap_or_else(|| Arc::new(Mutex::new(())))
    }
}

pub type SharedState = Arc<AppState>;
