//! Rendering of `${name:default}` templates against a deployment identity.
//!
//! The key prefix shared by all caches is configured as a template so that
//! several deployments can share one Redis database without colliding:
//!
//! ```
//! use redis_cache_manager::placeholder::{render, DeploymentIdentity};
//!
//! let identity = DeploymentIdentity::new()
//!     .with_application_name("billing")
//!     .with_active_profile("prod");
//!
//! let prefix = render("${application.name}:${profiles.active:default}:", &identity).unwrap();
//! assert_eq!(prefix, "billing:prod:");
//! ```

use rand::Rng;
use std::collections::HashMap;

/// Placeholder resolved to the application name.
pub const APPLICATION_NAME: &str = "application.name";
/// Placeholder resolved to the comma separated active profiles.
pub const ACTIVE_PROFILES: &str = "profiles.active";
/// Placeholder resolved to a random value, fixed for the lifetime of the source.
pub const RANDOM_VALUE: &str = "random.value";

/// Default key prefix template: `<app-name>:<active-profile>:`.
pub const DEFAULT_KEY_PREFIX_TEMPLATE: &str =
    "${application.name:${random.value}}:${profiles.active:default}:";

/// Source of placeholder values.
pub trait PlaceholderSource {
    /// Look up the value of a placeholder, `None` when it is not defined.
    fn lookup(&self, name: &str) -> Option<String>;
}

impl PlaceholderSource for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Identity of the running deployment, used to render the key prefix.
#[derive(Clone, Debug)]
pub struct DeploymentIdentity {
    application_name: Option<String>,
    active_profiles: Vec<String>,
    random_value: String,
    properties: HashMap<String, String>,
}

impl DeploymentIdentity {
    /// Identity with nothing defined except `random.value`.
    pub fn new() -> Self {
        let bytes: [u8; 16] = rand::rng().random();
        let random_value = bytes.iter().map(|b| format!("{:02x}", b)).collect();

        DeploymentIdentity {
            application_name: None,
            active_profiles: Vec::new(),
            random_value,
            properties: HashMap::new(),
        }
    }

    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    pub fn with_active_profile(mut self, profile: impl Into<String>) -> Self {
        self.active_profiles.push(profile.into());
        self
    }

    /// Define an arbitrary placeholder.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn application_name(&self) -> Option<&str> {
        self.application_name.as_deref()
    }

    pub fn active_profiles(&self) -> &[String] {
        &self.active_profiles
    }
}

impl Default for DeploymentIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaceholderSource for DeploymentIdentity {
    fn lookup(&self, name: &str) -> Option<String> {
        match name {
            APPLICATION_NAME => self.application_name.clone(),
            ACTIVE_PROFILES if !self.active_profiles.is_empty() => {
                Some(self.active_profiles.join(","))
            }
            RANDOM_VALUE => Some(self.random_value.clone()),
            _ => self.properties.get(name).cloned(),
        }
    }
}

/// Render `template`, substituting every `${name}` / `${name:default}`.
///
/// Defaults are rendered recursively and may contain placeholders themselves.
///
/// # Errors
///
/// Returns a description of the problem when a placeholder is unterminated or
/// cannot be resolved and has no default.
pub fn render(template: &str, source: &dyn PlaceholderSource) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let body_start = start + 2;
        let end = matching_brace(&rest[body_start..])
            .map(|offset| body_start + offset)
            .ok_or_else(|| format!("unterminated placeholder in '{}'", template))?;

        let body = &rest[body_start..end];
        let (name, default) = split_default(body);

        match source.lookup(name) {
            Some(value) => out.push_str(&value),
            None => match default {
                Some(default) => out.push_str(&render(default, source)?),
                None => return Err(format!("could not resolve placeholder '{}'", name)),
            },
        }

        rest = &rest[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Offset of the `}` closing a placeholder body, honouring nested `${...}`.
fn matching_brace(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                depth += 1;
                i += 2;
                continue;
            }
            b'}' if depth == 0 => return Some(i),
            b'}' => depth -= 1,
            _ => {}
        }
        i += 1;
    }

    None
}

/// Split `name:default` at the first top-level colon.
fn split_default(body: &str) -> (&str, Option<&str>) {
    let bytes = body.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                depth += 1;
                i += 2;
                continue;
            }
            b'}' => depth = depth.saturating_sub(1),
            b':' if depth == 0 => return (&body[..i], Some(&body[i + 1..])),
            _ => {}
        }
        i += 1;
    }

    (body, None)
}
