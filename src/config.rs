use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// Service defaults
pub const DEFAULT_APIHOST: &str = "https://adobeioruntime.net";
pub const DEFAULT_NAMESPACE: &str = "_";

// Image used by --native: the code artifact is the executable.
pub const DEFAULT_NATIVE_IMAGE: &str = "openwhisk/dockerskeleton";

pub const DEFAULT_LIST_LIMIT: u32 = 30;
pub const ACTIVATION_LIST_MAX: u32 = 50;

pub const CONFIG_FILE_ENV: &str = "WSK_CONFIG_FILE";
const PROPS_FILE_NAME: &str = ".wskprops";

/// Connection settings for the runtime service.
#[derive(Debug, Clone, PartialEq)]
pub struct Props {
    pub apihost: String,
    pub auth: Option<String>,
    pub namespace: String,
}

/// Values given on the command line; they win over every other layer.
#[derive(Debug, Clone, Default)]
pub struct PropOverrides {
    pub apihost: Option<String>,
    pub auth: Option<String>,
    pub namespace: Option<String>,
}

impl Props {
    pub fn require_auth(&self) -> Result<&str> {
        self.auth.as_deref().ok_or_else(|| {
            anyhow::anyhow!("No auth key configured. Set AUTH in ~/.wskprops, RUNTIME_AUTH, or pass --auth")
        })
    }
}

/// `$WSK_CONFIG_FILE`, else `~/.wskprops`.
pub fn props_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CONFIG_FILE_ENV) {
        return Some(PathBuf::from(p));
    }
    dirs::home_dir().map(|h| h.join(PROPS_FILE_NAME))
}

/// Parse `KEY=VALUE` lines, skipping blanks and `#` comments.
pub fn parse_props(text: &str) -> HashMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.trim().to_uppercase(), v.trim().to_string()))
        .collect()
}

pub fn load(overrides: &PropOverrides) -> Result<Props> {
    let file = match props_path() {
        Some(p) => read_props_file(&p)?,
        None => HashMap::new(),
    };
    Ok(layer(&file, |k| std::env::var(k).ok(), overrides))
}

fn read_props_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let txt = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded properties file");
    Ok(parse_props(&txt))
}

/// defaults < properties file < environment < command line
fn layer(file: &HashMap<String, String>, env: impl Fn(&str) -> Option<String>, overrides: &PropOverrides) -> Props {
    let pick = |flag: &Option<String>, env_key: &str, file_key: &str| -> Option<String> {
        flag.clone()
            .or_else(|| env(env_key))
            .or_else(|| file.get(file_key).cloned())
            .filter(|v| !v.is_empty())
    };

    let apihost = pick(&overrides.apihost, "RUNTIME_APIHOST", "APIHOST")
        .map(|h| normalize_apihost(&h))
        .unwrap_or_else(|| DEFAULT_APIHOST.to_string());
    Props {
        apihost,
        auth: pick(&overrides.auth, "RUNTIME_AUTH", "AUTH"),
        namespace: pick(&overrides.namespace, "RUNTIME_NAMESPACE", "NAMESPACE")
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
    }
}

fn normalize_apihost(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}
