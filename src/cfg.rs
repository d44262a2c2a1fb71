//! Configuration loading for the standalone backend.
//!
//! The configuration file (`debugmcp.config.json`) describes which debug
//! adapter to spawn per language plus optional per-language launch defaults.
//! It is loaded once at startup and immutable thereafter. Every string value
//! goes through a single expansion pass that resolves `${workspaceFolder}`
//! (the directory containing the config file) and `${env:NAME}` (empty when
//! the variable is unset).

use crate::error::{Error, Result};
use crate::types::{DebugConfig, RequestKind};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// File name looked up by [`find_config_file`].
pub const CONFIG_FILE_NAME: &str = "debugmcp.config.json";

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// How to start one debug adapter process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterDescriptor {
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Merged over the host process environment on spawn.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,
}

/// The loaded, variable-expanded configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandaloneConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds; the outer tool server's operation timeout.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    pub adapters: IndexMap<String, AdapterDescriptor>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub defaults: IndexMap<String, serde_json::Map<String, Value>>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl StandaloneConfig {
    /// Load and validate the configuration at `path`. Idempotent: loading the
    /// same file twice yields equivalent configs.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                Error::ConfigNotFound(path.to_path_buf())
            } else {
                Error::Io(err)
            }
        })?;
        let workspace = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&raw, workspace)
    }

    /// Parse configuration content with an explicit workspace directory
    /// (the directory `${workspaceFolder}` expands to).
    pub fn parse(raw: &str, workspace: &Path) -> Result<Self> {
        let mut value: Value = serde_json::from_str(raw)
            .map_err(|err| Error::ConfigInvalid(format!("not valid JSON: {err}")))?;
        validate(&value)?;
        expand_value(&mut value, workspace);
        serde_json::from_value(value).map_err(|err| Error::ConfigInvalid(err.to_string()))
    }

    pub fn adapter(&self, language: &str) -> Option<&AdapterDescriptor> {
        self.adapters.get(language)
    }

    pub fn languages(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }
}

fn validate(value: &Value) -> Result<()> {
    let root = value
        .as_object()
        .ok_or_else(|| Error::ConfigInvalid("top level must be an object".to_string()))?;

    let adapters = root
        .get("adapters")
        .ok_or_else(|| Error::ConfigInvalid("missing `adapters` section".to_string()))?;
    let adapters = adapters
        .as_object()
        .ok_or_else(|| Error::ConfigInvalid("`adapters` must be an object".to_string()))?;

    for (language, descriptor) in adapters {
        let descriptor = descriptor.as_object().ok_or_else(|| {
            Error::ConfigInvalid(format!("adapter `{language}` must be an object"))
        })?;
        match descriptor.get("command").and_then(Value::as_str) {
            Some(command) if !command.is_empty() => {}
            _ => {
                return Err(Error::ConfigInvalid(format!(
                    "adapter `{language}` requires a non-empty string `command`"
                )));
            }
        }
        if let Some(args) = descriptor.get("args")
            && !args.is_array()
        {
            return Err(Error::ConfigInvalid(format!(
                "adapter `{language}`: `args` must be a list"
            )));
        }
    }
    Ok(())
}

static VAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{(?:(workspaceFolder)|env:([A-Za-z_][A-Za-z0-9_]*))\}").expect("must compile")
});

/// Expand `${workspaceFolder}` / `${env:NAME}` in one pass; replacement text
/// is never rescanned.
fn expand_str(input: &str, workspace: &Path) -> String {
    VAR_RE
        .replace_all(input, |caps: &Captures| {
            if caps.get(1).is_some() {
                Cow::Owned(workspace.to_string_lossy().into_owned())
            } else {
                let name = &caps[2];
                Cow::Owned(std::env::var(name).unwrap_or_default())
            }
        })
        .into_owned()
}

fn expand_value(value: &mut Value, workspace: &Path) {
    match value {
        Value::String(s) => *s = expand_str(s, workspace),
        Value::Array(items) => items.iter_mut().for_each(|v| expand_value(v, workspace)),
        Value::Object(map) => map.values_mut().for_each(|v| expand_value(v, workspace)),
        _ => {}
    }
}

/// Walk up from `start` looking for [`CONFIG_FILE_NAME`].
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

/// Derive the adapter language for a source file. The map is closed; anything
/// unknown debugs as python.
pub fn language_for_file(path: &Path) -> &'static str {
    match path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .as_deref()
    {
        Some("py") => "python",
        Some("js" | "ts" | "jsx" | "tsx") => "node",
        Some("java") => "java",
        Some("cs") => "coreclr",
        Some("cpp" | "cc" | "c") => "cppdbg",
        Some("go") => "go",
        Some("rs") => "lldb",
        Some("php") => "php",
        Some("rb") => "ruby",
        _ => "python",
    }
}

/// Source of launch configurations. The standalone variant is file backed;
/// editor-embedded variants implement the same contract elsewhere.
pub trait ConfigurationProvider {
    /// Adapter descriptor for a language, if one is configured.
    fn adapter(&self, language: &str) -> Option<&AdapterDescriptor>;

    /// Languages with a configured adapter, in configuration order.
    fn languages(&self) -> Vec<String>;

    /// Build a ready-to-launch [`DebugConfig`] for a source file.
    fn resolve_launch_config(&self, file: &Path, working_dir: &Path) -> DebugConfig;
}

impl ConfigurationProvider for StandaloneConfig {
    fn adapter(&self, language: &str) -> Option<&AdapterDescriptor> {
        StandaloneConfig::adapter(self, language)
    }

    fn languages(&self) -> Vec<String> {
        StandaloneConfig::languages(self)
    }

    fn resolve_launch_config(&self, file: &Path, working_dir: &Path) -> DebugConfig {
        let language = language_for_file(file);
        let defaults = self.defaults.get(language);

        let adapter_type = defaults
            .and_then(|d| d.get("type"))
            .and_then(Value::as_str)
            .unwrap_or(language)
            .to_string();
        let request = defaults
            .and_then(|d| d.get("request"))
            .and_then(Value::as_str)
            .and_then(|r| serde_json::from_value(Value::String(r.to_string())).ok())
            .unwrap_or(RequestKind::Launch);
        let basename = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string_lossy().into_owned());

        let mut config = DebugConfig::new(adapter_type, request, format!("Standalone Debug: {basename}"));
        if let Some(defaults) = defaults {
            for (key, value) in defaults {
                if !matches!(key.as_str(), "type" | "request" | "name") {
                    config.rest.insert(key.clone(), value.clone());
                }
            }
        }
        config.rest.insert(
            "program".to_string(),
            Value::String(file.to_string_lossy().into_owned()),
        );
        config.rest.insert(
            "cwd".to_string(),
            Value::String(working_dir.to_string_lossy().into_owned()),
        );
        if !config.rest.contains_key("console") {
            config.rest.insert(
                "console".to_string(),
                Value::String("integratedTerminal".to_string()),
            );
        }
        config
    }
}
