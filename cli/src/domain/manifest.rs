//! Manifest model: the ordered set of systems declared for one project.
//!
//! Systems are stored so that every dependency precedes its dependents; the
//! scaling controller relies on that order and never re-sorts.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::domain::config::BalancerConfig;
use crate::domain::error::ManifestError;
use crate::domain::system::System;

/// File names recognised as a manifest, in lookup order.
pub const MANIFEST_FILES: &[&str] = &["Devrigfile.yml", "Devrigfile.yaml"];

/// One system as declared in the manifest file, before expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemDefinition {
    pub name: String,
    pub image: String,
    pub options: Map<String, Value>,
}

/// A loaded project manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    dir: PathBuf,
    namespace: String,
    systems: Vec<System>,
    default: String,
}

/// Derive the container namespace of a manifest from its directory.
#[must_use]
pub fn namespace_for(dir: &Path) -> String {
    let digest = format!("{:x}", Sha256::digest(dir.to_string_lossy().as_bytes()));
    format!("dev.devrig.{}", &digest[..16])
}

impl Manifest {
    /// Build a manifest from its declared systems.
    ///
    /// # Errors
    ///
    /// Returns an error if no systems are declared, a system is invalid, a
    /// dependency is unknown or circular, or `default` names no system.
    pub fn new(
        dir: PathBuf,
        definitions: Vec<SystemDefinition>,
        default: Option<String>,
        balancer: &BalancerConfig,
    ) -> Result<Self, ManifestError> {
        if definitions.is_empty() {
            return Err(ManifestError::Empty);
        }
        let namespace = namespace_for(&dir);
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let declared = definitions
            .into_iter()
            .map(|def| System::new(&namespace, &dir_name, &def.name, &def.image, def.options, balancer))
            .collect::<Result<Vec<_>, _>>()?;

        let default = match default {
            Some(name) if declared.iter().any(|s| s.name() == name) => name,
            Some(name) => return Err(ManifestError::UnknownSystem(name)),
            None => declared[0].name().to_string(),
        };

        Ok(Self {
            dir,
            namespace,
            systems: order_by_dependencies(declared)?,
            default,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Last component of the manifest directory.
    #[must_use]
    pub fn dir_name(&self) -> String {
        self.dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// All systems, dependencies first.
    #[must_use]
    pub fn systems(&self) -> &[System] {
        &self.systems
    }

    #[must_use]
    pub fn system(&self, name: &str) -> Option<&System> {
        self.systems.iter().find(|s| s.name() == name)
    }

    /// The system opened by `--open`.
    #[must_use]
    pub fn system_default(&self) -> Option<&System> {
        self.system(&self.default)
    }

    /// Systems to bring up for `start [name]`: the named system and all of its
    /// transitive dependencies, dependencies first. `None` selects everything.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::UnknownSystem`] if `name` is not declared.
    pub fn systems_with_dependencies(&self, name: Option<&str>) -> Result<Vec<System>, ManifestError> {
        let Some(name) = name else {
            return Ok(self.systems.clone());
        };
        let root = self
            .system(name)
            .ok_or_else(|| ManifestError::UnknownSystem(name.to_string()))?;

        let mut wanted = vec![root.name().to_string()];
        let mut cursor = 0;
        while cursor < wanted.len() {
            let deps: Vec<String> = self
                .system(&wanted[cursor])
                .map(|s| s.depends().into_iter().map(str::to_string).collect())
                .unwrap_or_default();
            for dep in deps {
                if !wanted.contains(&dep) {
                    wanted.push(dep);
                }
            }
            cursor += 1;
        }

        Ok(self
            .systems
            .iter()
            .filter(|s| wanted.iter().any(|w| w == s.name()))
            .cloned()
            .collect())
    }

    /// Systems addressed by `stop/restart [name]`: only the named system, or
    /// everything when `name` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::UnknownSystem`] if `name` is not declared.
    pub fn systems_named(&self, name: Option<&str>) -> Result<Vec<System>, ManifestError> {
        match name {
            None => Ok(self.systems.clone()),
            Some(name) => self
                .system(name)
                .cloned()
                .map(|s| vec![s])
                .ok_or_else(|| ManifestError::UnknownSystem(name.to_string())),
        }
    }
}

/// Order systems so that dependencies come first, keeping declaration order
/// wherever the graph allows.
///
/// # Errors
///
/// Returns an error on unknown dependencies or dependency cycles.
pub fn order_by_dependencies(declared: Vec<System>) -> Result<Vec<System>, ManifestError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        Visiting,
        Done,
    }

    fn visit(
        idx: usize,
        declared: &[System],
        marks: &mut [Mark],
        path: &mut Vec<String>,
        order: &mut Vec<usize>,
    ) -> Result<(), ManifestError> {
        match marks[idx] {
            Mark::Done => return Ok(()),
            Mark::Visiting => {
                path.push(declared[idx].name().to_string());
                return Err(ManifestError::CircularDependency(path.join(" -> ")));
            }
            Mark::Unvisited => {}
        }
        marks[idx] = Mark::Visiting;
        path.push(declared[idx].name().to_string());
        for dep in declared[idx].depends() {
            let dep_idx = declared.iter().position(|s| s.name() == dep).ok_or_else(|| {
                ManifestError::UnknownDependency {
                    system: declared[idx].name().to_string(),
                    dependency: dep.to_string(),
                }
            })?;
            visit(dep_idx, declared, marks, path, order)?;
        }
        path.pop();
        marks[idx] = Mark::Done;
        order.push(idx);
        Ok(())
    }

    let mut marks = vec![Mark::Unvisited; declared.len()];
    let mut order = Vec::with_capacity(declared.len());
    for idx in 0..declared.len() {
        visit(idx, &declared, &mut marks, &mut Vec::new(), &mut order)?;
    }

    let mut slots: Vec<Option<System>> = declared.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|idx| slots[idx].take()).collect())
}
