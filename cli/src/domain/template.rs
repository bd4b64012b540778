//! Placeholder expansion for system option trees.
//!
//! Options may reference `${system.name}`, `${system.persistent_folders}`,
//! `${manifest.dir}`, `${manifest.project_name}`, `${balancer.default_domain}`,
//! `${balancer.port}` and `${balancer.ip}` inside any string value, at any
//! depth. Expansion walks the tree and rewrites strings in place; object keys
//! and non-string scalars are left untouched.

use serde_json::Value;

use crate::domain::config::BalancerConfig;
use crate::domain::error::TemplateError;

/// Persistent-folder convention exposed as `${system.persistent_folders}`.
pub const PERSISTENT_FOLDERS: &str = "/data";

/// The fixed set of substitution variables available to one system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateContext {
    system: String,
    vars: Vec<(&'static str, String)>,
}

impl TemplateContext {
    /// Build the context for `system_name` declared in a manifest whose
    /// directory is named `manifest_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::PlaceholderInValue`] when a bound value could
    /// form a placeholder once expanded: it contains `${`, starts with `{` or
    /// ends with `$`.
    pub fn new(
        system_name: &str,
        manifest_dir: &str,
        balancer: &BalancerConfig,
    ) -> Result<Self, TemplateError> {
        let vars = vec![
            ("system.name", system_name.to_string()),
            ("system.persistent_folders", PERSISTENT_FOLDERS.to_string()),
            ("manifest.dir", manifest_dir.to_string()),
            ("manifest.project_name", manifest_dir.to_string()),
            ("balancer.default_domain", balancer.host.clone()),
            ("balancer.port", balancer.port.to_string()),
            ("balancer.ip", balancer.ip.clone()),
        ];
        if let Some((token, value)) = vars.iter().find(|(_, value)| forms_placeholder(value)) {
            return Err(TemplateError::PlaceholderInValue {
                system: system_name.to_string(),
                token: (*token).to_string(),
                value: value.clone(),
            });
        }
        Ok(Self {
            system: system_name.to_string(),
            vars,
        })
    }

    /// Value bound to `token`, if it is one of the known variables.
    #[must_use]
    pub fn lookup(&self, token: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(name, _)| *name == token)
            .map(|(_, value)| value.as_str())
    }
}

fn forms_placeholder(value: &str) -> bool {
    value.contains("${") || value.starts_with('{') || value.ends_with('$')
}

/// Return a copy of `raw` with every placeholder replaced.
///
/// # Errors
///
/// Returns [`TemplateError::Unresolved`] naming the first unknown token, or
/// [`TemplateError::Unterminated`] when a `${` has no closing brace.
pub fn resolve(raw: &Value, ctx: &TemplateContext) -> Result<Value, TemplateError> {
    Ok(match raw {
        Value::String(s) => Value::String(resolve_str(s, ctx)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve(item, ctx))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| Ok::<_, TemplateError>((k.clone(), resolve(v, ctx)?)))
                .collect::<Result<_, TemplateError>>()?,
        ),
        other => other.clone(),
    })
}

fn resolve_str(input: &str, ctx: &TemplateContext) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(TemplateError::Unterminated {
                system: ctx.system.clone(),
                value: input.to_string(),
            });
        };
        let token = after[..end].trim();
        let value = ctx.lookup(token).ok_or_else(|| TemplateError::Unresolved {
            system: ctx.system.clone(),
            token: token.to_string(),
        })?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
