//! Builds the action specification submitted on create and update.
//!
//! The web-secure precondition is checked before anything else, then the code
//! source is resolved, then parameters, environment entries, annotations and
//! limits are merged. The first rule that fails aborts the whole composition.

use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

use crate::error::{SpecResult, ValidationError};
use crate::kinds::KindLookup;
use crate::models::{ActionSpec, AnnotationEntry, Limits, Operation, ParameterEntry};
use crate::params;
use crate::resolver::{self, SourceFlags};

#[derive(Debug, Clone, Default)]
pub struct ComposeFlags {
    pub source: SourceFlags,
    /// Flat `KEY VALUE` pairs.
    pub params: Vec<String>,
    pub param_file: Option<PathBuf>,
    pub env: Vec<String>,
    pub env_file: Option<PathBuf>,
    pub annotations: Vec<String>,
    pub annotation_file: Option<PathBuf>,
    pub web: Option<String>,
    pub web_secure: Option<String>,
    pub timeout: Option<u64>,
    pub memory: Option<u64>,
    pub logsize: Option<u64>,
}

pub fn compose(flags: &ComposeFlags, op: Operation, kinds: &dyn KindLookup) -> SpecResult<ActionSpec> {
    let web = flags.web.as_deref().map(str::to_lowercase);
    // an empty --web-secure counts as not given
    let web_secure = flags.web_secure.as_deref().filter(|s| !s.is_empty());
    check_web_secure(web.as_deref(), web_secure)?;

    let source = resolver::resolve(&flags.source, op, kinds)?;

    let parameters = merge_parameters(flags)?;

    let mut annotations = params::merged(&flags.annotations, flags.annotation_file.as_deref())?
        .map(params::KeyValues::into_annotations)
        .unwrap_or_default();
    if let Some(web) = web.as_deref() {
        annotations.extend(web_annotations(web, web_secure));
    }

    let spec = ActionSpec {
        name: source.name,
        exec: source.exec,
        limits: limits(flags),
        parameters,
        annotations: (!annotations.is_empty()).then_some(annotations),
    };
    debug!(name = %spec.name, op = op.verb(), "composed action spec");
    Ok(spec)
}

fn check_web_secure(web: Option<&str>, web_secure: Option<&str>) -> Result<(), ValidationError> {
    let secured = web_secure.is_some_and(|s| !s.eq_ignore_ascii_case("false"));
    let exported = web.is_some_and(|w| !matches!(w, "false" | "no"));
    if secured && !exported {
        return Err(ValidationError::WebSecureWithoutWeb);
    }
    Ok(())
}

/// Explicit parameters followed by environment entries marked `init`.
fn merge_parameters(flags: &ComposeFlags) -> SpecResult<Option<Vec<ParameterEntry>>> {
    let params = params::merged(&flags.params, flags.param_file.as_deref())?.map(params::KeyValues::into_parameters);
    let env = params::merged(&flags.env, flags.env_file.as_deref())?.map(|kv| {
        kv.into_parameters()
            .into_iter()
            .map(|p| ParameterEntry { init: true, ..p })
            .collect::<Vec<_>>()
    });

    match (params, env) {
        (Some(mut params), Some(env)) => {
            let env_keys: HashSet<&str> = env.iter().map(|e| e.key.as_str()).collect();
            if params.iter().any(|p| env_keys.contains(p.key.as_str())) {
                return Err(ValidationError::OverlappingParams.into());
            }
            params.extend(env);
            Ok(Some(params))
        }
        (params, env) => Ok(params.or(env)),
    }
}

/// Annotations implied by `--web` and `--web-secure`, in emission order.
pub fn web_annotations(web: &str, web_secure: Option<&str>) -> Vec<AnnotationEntry> {
    let mut out = Vec::new();
    match web {
        "true" | "yes" => {
            out.push(AnnotationEntry::new("web-export", true));
            out.push(AnnotationEntry::new("final", true));
        }
        "raw" => {
            out.push(AnnotationEntry::new("web-export", true));
            out.push(AnnotationEntry::new("raw-http", true));
            out.push(AnnotationEntry::new("final", true));
        }
        "false" | "no" => out.push(AnnotationEntry::new("web-export", false)),
        _ => {}
    }
    if let Some(secure) = web_secure {
        // anything but true/false is a shared secret and kept verbatim
        let value = match secure.to_lowercase().as_str() {
            "true" => serde_json::Value::Bool(true),
            "false" => serde_json::Value::Bool(false),
            _ => serde_json::Value::String(secure.to_string()),
        };
        out.push(AnnotationEntry::new("require-whisk-auth", value));
    }
    out
}

fn limits(flags: &ComposeFlags) -> Option<Limits> {
    if flags.timeout.is_none() && flags.memory.is_none() && flags.logsize.is_none() {
        return None;
    }
    Some(Limits {
        timeout: flags.timeout,
        memory: flags.memory,
        logs: flags.logsize,
    })
}
