//! Application state shared across handlers.

use crate::deployments::Deployments;
use crate::directory::DeviceDirectory;
use crate::introspect::ArtifactIntrospector;
use hangar_core::config::AppConfig;
use hangar_metadata::MetadataStore;
use hangar_signer::LinkSigner;
use hangar_storage::ObjectStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Object storage backend.
    pub storage: Arc<dyn ObjectStore>,
    /// Deployment orchestration engine.
    pub deployments: Arc<Deployments>,
}

impl AppState {
    /// Create a new application state wired to the given collaborators.
    pub fn new(
        config: AppConfig,
        metadata: Arc<dyn MetadataStore>,
        storage: Arc<dyn ObjectStore>,
        introspector: Arc<dyn ArtifactIntrospector>,
        directory: Arc<dyn DeviceDirectory>,
    ) -> Self {
        let config = Arc::new(config);
        let signer = Arc::new(LinkSigner::new(config.download.secret.as_bytes().to_vec()));
        let deployments = Arc::new(Deployments::new(
            config.clone(),
            metadata.clone(),
            storage.clone(),
            signer,
            introspector,
            directory,
        ));
        crate::metrics::register_metrics();

        Self {
            config,
            metadata,
            storage,
            deployments,
        }
    }
}
