use std::{fs, path::Path};

use color_eyre::eyre::{Context, Result};
use dew::RenderOptions;
use serde::Deserialize;

/// Contents of a `dew.toml` file.
///
/// ```toml
/// [render]
/// base = "https://cdn.example/build/"
/// fragmentTagName = "section"
///
/// [render.prefetchStrategy]
/// implementation = "link-modulepreload-html"
/// symbolsToPrefetch = "all-document"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub render: RenderOptions,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }
}
