//! Application state for report service.

use std::sync::Arc;

use common::config::AppConfig;
use reporter::ChartRenderer;

use crate::store::ArtifactStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub renderer: ChartRenderer,
    pub store: Arc<ArtifactStore>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(config: AppConfig) -> Self {
        Self {
            renderer: ChartRenderer::new(config.chart_width, config.chart_height),
            store: Arc::new(ArtifactStore::new(config.output_dir.clone())),
            config,
        }
    }
}
