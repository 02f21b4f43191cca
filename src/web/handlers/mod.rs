//! Request handlers.

pub mod config;
pub mod feed;

pub use config::*;
pub use feed::*;

use std::sync::Arc;

use crate::cache::LoadingCache;
use crate::config::Config;
use crate::template::TemplateEngine;
use crate::{Database, Result};

/// Shared state of the read path.
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub cache: LoadingCache,
    pub templates: Arc<TemplateEngine>,
}

impl AppState {
    /// Build the state, loading page templates from the configured override
    /// directory.
    pub fn new(config: Arc<Config>, db: Database) -> Result<Self> {
        let templates = TemplateEngine::with_defaults(&config.templates.path)?;
        Ok(Self {
            cache: LoadingCache::from_config(&config.cache),
            config,
            db,
            templates: Arc::new(templates),
        })
    }
}
