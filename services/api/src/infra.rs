use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use amalianur::config::AppConfig;
use amalianur::content::{ManagedCollections, MemoryContentRepository};
use amalianur::enrollment::{
    Confirmer, DisabledDispatcher, EnrollmentService, HttpEmailDispatcher, LocalDocumentStorage,
    MemoryEnrollmentStore, NotificationDispatcher,
};
use amalianur::users::{MemoryUserRepository, RoleGate, UserService};
use inquire::{Confirm, Text};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) files: Arc<LocalDocumentStorage>,
}

/// Every service the HTTP surface needs, wired against the in-process stores.
pub(crate) struct Backoffice {
    pub(crate) enrollment: Arc<EnrollmentService<MemoryEnrollmentStore>>,
    pub(crate) gate: RoleGate,
    pub(crate) collections: ManagedCollections,
    pub(crate) files: Arc<LocalDocumentStorage>,
}

pub(crate) fn dispatcher_from_config(config: &AppConfig) -> Arc<dyn NotificationDispatcher> {
    match HttpEmailDispatcher::from_config(&config.email) {
        Some(dispatcher) => Arc::new(dispatcher),
        None => Arc::new(DisabledDispatcher),
    }
}

pub(crate) fn build_backoffice(config: &AppConfig) -> Backoffice {
    let files = Arc::new(LocalDocumentStorage::new(
        &config.storage.upload_dir,
        config.storage.public_base_url.clone(),
    ));
    let enrollment = Arc::new(EnrollmentService::new(
        Arc::new(MemoryEnrollmentStore::new()),
        dispatcher_from_config(config),
        files.clone(),
    ));

    let users = UserService::new(Arc::new(MemoryUserRepository::default()));
    if let Some(email) = config.admin.bootstrap_email.as_deref() {
        match users.bootstrap_super_admin(email) {
            Ok(account) => info!(email = %account.email, "super admin provisioned"),
            Err(error) => warn!(%error, "super admin could not be provisioned"),
        }
    }

    let collections =
        ManagedCollections::new(Arc::new(MemoryContentRepository::default()), files.clone());

    Backoffice {
        enrollment,
        gate: RoleGate::new(users),
        collections,
        files,
    }
}

/// Terminal prompts for the interactive demo. A cancelled or failed prompt reads as "no".
pub(crate) struct InquireConfirmer;

impl Confirmer for InquireConfirmer {
    fn confirm(&self, message: &str) -> bool {
        Confirm::new(message)
            .with_default(false)
            .prompt()
            .unwrap_or(false)
    }

    fn prompt(&self, message: &str) -> Option<String> {
        Text::new(message).prompt().ok()
    }
}
