//! The `System` entity: a named service definition backed by a container image.
//!
//! A system is built once per manifest load from its raw option tree. Options
//! are template-expanded and validated in [`System::new`]; every accessor reads
//! the expanded tree, so raw placeholders never reach callers.

use std::fmt;

use serde_json::{Map, Value};

use crate::domain::config::BalancerConfig;
use crate::domain::error::ManifestError;
use crate::domain::template::{self, TemplateContext};

/// Label key recording the instance type of containers created by devrig.
pub const TYPE_LABEL: &str = "devrig.type";

// ── Image reference ───────────────────────────────────────────────────────────

/// A container image reference such as `postgres:16` or `registry:5000/app`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    repository: String,
    tag: String,
}

impl ImageRef {
    /// Split an image string into repository and tag (`latest` when absent).
    #[must_use]
    pub fn parse(image: &str) -> Self {
        let last_segment = image.rfind('/').map_or(0, |i| i + 1);
        match image[last_segment..].rfind(':') {
            Some(i) => Self {
                repository: image[..last_segment + i].to_string(),
                tag: image[last_segment + i + 1..].to_string(),
            },
            None => Self {
                repository: image.to_string(),
                tag: "latest".to_string(),
            },
        }
    }

    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

// ── Containers ────────────────────────────────────────────────────────────────

/// A container as reported by the container runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    /// Runtime names; the first one identifies the container.
    pub names: Vec<String>,
    /// Value of the [`TYPE_LABEL`] label, if present.
    pub kind: Option<String>,
    pub running: bool,
}

impl Container {
    /// Whether this is a long-running daemon instance.
    #[must_use]
    pub fn is_daemon(&self) -> bool {
        self.kind.as_deref() == Some("daemon")
    }
}

// ── System ────────────────────────────────────────────────────────────────────

/// Immutable service definition with fully expanded options.
#[derive(Debug, Clone, PartialEq)]
pub struct System {
    name: String,
    image: ImageRef,
    manifest_namespace: String,
    options: Map<String, Value>,
}

impl System {
    /// Build a system from its raw options.
    ///
    /// `command` defaults to a command that reports the missing setting and
    /// fails; `depends` defaults to an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Template`] if a placeholder cannot be
    /// resolved, or [`ManifestError::InvalidSystem`] if `command` or
    /// `depends` have the wrong shape.
    pub fn new(
        manifest_namespace: &str,
        manifest_dir: &str,
        name: &str,
        image: &str,
        raw: Map<String, Value>,
        balancer: &BalancerConfig,
    ) -> Result<Self, ManifestError> {
        let mut merged = default_options(name);
        for (key, value) in raw {
            merged.insert(key, value);
        }

        let ctx = TemplateContext::new(name, manifest_dir, balancer)?;
        let options = match template::resolve(&Value::Object(merged), &ctx)? {
            Value::Object(options) => options,
            _ => Map::new(),
        };

        let system = Self {
            name: name.to_string(),
            image: ImageRef::parse(image),
            manifest_namespace: manifest_namespace.to_string(),
            options,
        };
        system.validate()?;
        Ok(system)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        let invalid = |reason: &str| ManifestError::InvalidSystem {
            system: self.name.clone(),
            reason: reason.to_string(),
        };
        if !self.options.get("command").is_some_and(Value::is_string) {
            return Err(invalid("'command' must be a string"));
        }
        match self.options.get("depends") {
            Some(Value::Array(items)) if items.iter().all(Value::is_string) => {}
            _ => return Err(invalid("'depends' must be a list of system names")),
        }
        if let Some(scalable) = self.options.get("scalable")
            && !scalable
                .get("default")
                .is_none_or(|d| d.as_u64().is_some_and(|n| u32::try_from(n).is_ok()))
        {
            return Err(invalid("'scalable.default' must be a non-negative integer"));
        }
        Ok(())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    /// Namespace used to discover this system's containers by name.
    #[must_use]
    pub fn namespace(&self) -> String {
        format!("{}-sys.{}", self.manifest_namespace, self.name)
    }

    #[must_use]
    pub fn command(&self) -> &str {
        self.options
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Names of the systems this one depends on, in declaration order.
    #[must_use]
    pub fn depends(&self) -> Vec<&str> {
        self.options
            .get("depends")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Raw `mount_folders` setting, if configured.
    #[must_use]
    pub fn mount_folders(&self) -> Option<&Value> {
        self.options.get("mount_folders")
    }

    /// A single expanded option by key.
    #[must_use]
    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Instance count applied when no explicit count is requested.
    #[must_use]
    pub fn scalable_default(&self) -> u32 {
        self.options
            .get("scalable")
            .and_then(|s| s.get("default"))
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(1)
    }

    #[must_use]
    pub fn disabled(&self) -> bool {
        self.options
            .get("disabled")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Hostnames the balancer routes to this system.
    #[must_use]
    pub fn http_domains(&self) -> Vec<&str> {
        self.options
            .get("http")
            .and_then(|h| h.get("domains"))
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Whether the system is published through the load balancer.
    #[must_use]
    pub fn balanceable(&self) -> bool {
        !self.http_domains().is_empty()
    }

    /// Public URL of a balanceable system.
    #[must_use]
    pub fn url(&self, balancer_port: u16) -> Option<String> {
        let domain = self.http_domains().into_iter().next()?;
        Some(if balancer_port == 80 {
            format!("http://{domain}")
        } else {
            format!("http://{domain}:{balancer_port}")
        })
    }

    /// Containers belonging to this system, matched by namespace prefix on
    /// the container's first name.
    #[must_use]
    pub fn filter<'c>(&self, containers: &'c [Container]) -> Vec<&'c Container> {
        let namespace = self.namespace();
        containers
            .iter()
            .filter(|c| {
                c.names.first().is_some_and(|n| {
                    n.trim_start_matches('/')
                        .strip_prefix(namespace.as_str())
                        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
                })
            })
            .collect()
    }
}

fn default_options(name: &str) -> Map<String, Value> {
    let mut options = Map::new();
    options.insert(
        "command".to_string(),
        Value::String(format!(
            "echo \"command not set for system {name}\"; exit 1"
        )),
    );
    options.insert("depends".to_string(), Value::Array(Vec::new()));
    options
}
