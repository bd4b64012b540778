//! Manifest loader: finds and parses `Devrigfile.yml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::application::ports::ManifestLoader;
use crate::domain::config::DevrigConfig;
use crate::domain::error::ManifestError;
use crate::domain::manifest::{MANIFEST_FILES, Manifest, SystemDefinition};

#[derive(Debug, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    default: Option<String>,
    #[serde(default)]
    systems: serde_yaml::Mapping,
}

/// Production `ManifestLoader` reading YAML manifests from disk.
pub struct YamlManifestLoader;

/// Find the manifest file for `dir`, searching parent directories.
#[must_use]
pub fn find_manifest(dir: &Path) -> Option<PathBuf> {
    dir.ancestors().find_map(|candidate| {
        MANIFEST_FILES
            .iter()
            .map(|name| candidate.join(name))
            .find(|path| path.is_file())
    })
}

/// Parse manifest `content` found in `dir`.
///
/// # Errors
///
/// Returns an error if the YAML is malformed or a system is invalid.
pub fn parse_manifest(dir: &Path, content: &str, config: &DevrigConfig) -> Result<Manifest> {
    let file: ManifestFile = serde_yaml::from_str(content).context("invalid manifest YAML")?;

    let mut definitions = Vec::with_capacity(file.systems.len());
    for (key, value) in file.systems {
        let name = key
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ManifestError::InvalidSystem {
                system: format!("{key:?}"),
                reason: "system names must be strings".to_string(),
            })?;
        let invalid = |reason: &str| ManifestError::InvalidSystem {
            system: name.clone(),
            reason: reason.to_string(),
        };
        let Value::Object(mut options) =
            serde_json::to_value(value).with_context(|| format!("converting system '{name}'"))?
        else {
            return Err(invalid("definition must be a mapping").into());
        };
        let image = match options.remove("image") {
            Some(Value::String(image)) => image,
            _ => return Err(invalid("'image' is required").into()),
        };
        definitions.push(SystemDefinition {
            name,
            image,
            options,
        });
    }

    Ok(Manifest::new(
        dir.to_path_buf(),
        definitions,
        file.default,
        &config.agent.balancer,
    )?)
}

impl ManifestLoader for YamlManifestLoader {
    fn load(&self, dir: &Path, config: &DevrigConfig) -> Result<Manifest> {
        let dir = dir
            .canonicalize()
            .with_context(|| format!("cannot resolve {}", dir.display()))?;
        let path = find_manifest(&dir)
            .ok_or_else(|| ManifestError::NotFound(dir.display().to_string()))?;
        debug!(path = %path.display(), "loading manifest");
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let manifest_dir = path.parent().unwrap_or(&dir);
        parse_manifest(manifest_dir, &content, config)
            .with_context(|| format!("invalid manifest {}", path.display()))
    }
}
