//! Template loader module.
//!
//! Page templates are compiled into the binary. An override directory may
//! replace any of them with a file of the same name.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use super::{Result, TemplateEngine, TemplateError};

/// Built-in page templates.
pub const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    ("feed.html", include_str!("../../templates/feed.html")),
    ("feeds.html", include_str!("../../templates/feeds.html")),
    ("error.html", include_str!("../../templates/error.html")),
];

/// Resolves template sources from an optional override directory.
#[derive(Debug, Default)]
pub struct TemplateLoader {
    override_dir: Option<PathBuf>,
}

impl TemplateLoader {
    /// Create a loader. An empty path means built-in templates only.
    pub fn new<P: AsRef<Path>>(override_dir: P) -> Self {
        let dir = override_dir.as_ref();
        Self {
            override_dir: (!dir.as_os_str().is_empty()).then(|| dir.to_path_buf()),
        }
    }

    /// Source text for `name`: the override file if present, else the built-in.
    pub fn load(&self, name: &str) -> Result<String> {
        if let Some(dir) = &self.override_dir {
            let path = dir.join(name);
            if path.is_file() {
                info!("loading template {} from {}", name, path.display());
                return fs::read_to_string(&path).map_err(|e| {
                    TemplateError::Render(format!("Failed to read template '{name}': {e}"))
                });
            }
        }

        DEFAULT_TEMPLATES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, content)| content.to_string())
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))
    }

    /// Build an engine holding every page template.
    pub fn engine(&self) -> Result<TemplateEngine> {
        let mut engine = TemplateEngine::new();
        for (name, _) in DEFAULT_TEMPLATES {
            let content = self.load(name)?;
            engine.load(*name, &content)?;
        }
        Ok(engine)
    }
}
