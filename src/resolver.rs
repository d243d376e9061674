// src/resolver.rs
use base64::Engine as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::DEFAULT_NATIVE_IMAGE;
use crate::error::{SpecError, SpecResult, ValidationError};
use crate::kinds::KindLookup;
use crate::models::{Exec, Operation};

const ARCHIVE_EXTENSIONS: &[&str] = &[".zip"];

/// Code-source flags as they arrive from the command line.
#[derive(Debug, Clone, Default)]
pub struct SourceFlags {
    pub name: String,
    pub action_path: Option<PathBuf>,
    pub sequence: Option<String>,
    pub docker: Option<String>,
    pub native: bool,
    pub kind: Option<String>,
    pub main: Option<String>,
    pub binary: bool,
}

/// One validation rule: the error is raised when `violated` holds.
pub struct Rule {
    pub violated: fn(&SourceFlags) -> bool,
    pub error: ValidationError,
}

/// Combinations that can never be resolved, checked in this order.
pub const CONFLICT_RULES: &[Rule] = &[
    Rule { violated: |f| f.action_path.is_some() && f.sequence.is_some(), error: ValidationError::SequenceWithAction },
    Rule { violated: |f| f.docker.is_some() && f.sequence.is_some(), error: ValidationError::SequenceWithDocker },
    Rule { violated: |f| f.native && f.sequence.is_some(), error: ValidationError::SequenceWithNative },
    Rule { violated: |f| f.docker.is_some() && f.kind.is_some(), error: ValidationError::KindWithDocker },
    Rule { violated: |f| f.native && f.kind.is_some(), error: ValidationError::KindWithNative },
];

/// Flags that need a code artifact, checked after the implicit file fallback.
pub const PREREQUISITE_RULES: &[Rule] = &[
    Rule { violated: |f| f.main.is_some() && f.action_path.is_none(), error: ValidationError::MainWithoutAction },
    Rule { violated: |f| f.kind.is_some() && f.sequence.is_some(), error: ValidationError::KindWithSequence },
    Rule { violated: |f| f.kind.is_some() && f.action_path.is_none(), error: ValidationError::KindWithoutAction },
];

pub fn check_rules(rules: &[Rule], flags: &SourceFlags) -> Result<(), ValidationError> {
    match rules.iter().find(|r| (r.violated)(flags)) {
        Some(rule) => Err(rule.error),
        None => Ok(()),
    }
}

/// Where the action's code comes from. Exactly one variant is picked per action.
#[derive(Debug, Clone, PartialEq)]
pub enum CodeSource {
    File { path: PathBuf, binary: bool },
    Sequence { components: Vec<String> },
    Container { image: String },
}

impl CodeSource {
    fn select(flags: &SourceFlags) -> SpecResult<Option<CodeSource>> {
        if let Some(path) = &flags.action_path {
            let binary = flags.binary || is_archive(path);
            return Ok(Some(CodeSource::File { path: path.clone(), binary }));
        }
        if let Some(expr) = &flags.sequence {
            let components = parse_sequence(expr)?;
            return Ok(Some(CodeSource::Sequence { components }));
        }
        Ok(container_image(flags).map(|image| CodeSource::Container { image }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSource {
    pub name: String,
    pub exec: Option<Exec>,
}

/// Resolve the action name and execution descriptor from the code-source flags.
pub fn resolve(flags: &SourceFlags, op: Operation, kinds: &dyn KindLookup) -> SpecResult<ResolvedSource> {
    check_rules(CONFLICT_RULES, flags)?;

    let mut flags = flags.clone();
    let mut name = flags.name.clone();
    if flags.action_path.is_none() && flags.sequence.is_none() && flags.docker.is_none() && op == Operation::Create {
        let candidate = PathBuf::from(&flags.name);
        if !candidate.exists() {
            return Err(ValidationError::MissingSource.into());
        }
        name = strip_extension(&candidate);
        info!(path = %candidate.display(), %name, "using local file named after the action");
        flags.action_path = Some(candidate);
    }

    check_rules(PREREQUISITE_RULES, &flags)?;

    let exec = match CodeSource::select(&flags)? {
        Some(CodeSource::File { path, binary }) => Some(file_exec(&flags, &path, binary, kinds)?),
        Some(CodeSource::Sequence { components }) => Some(Exec::Sequence { components }),
        Some(CodeSource::Container { image }) => Some(Exec::Blackbox { image, code: None, main: None, binary: false }),
        None => None,
    };
    debug!(
        %name,
        kind = ?exec.as_ref().map(Exec::kind),
        binary = exec.as_ref().is_some_and(Exec::is_binary),
        code_len = ?exec.as_ref().and_then(Exec::code).map(str::len),
        "resolved action source"
    );
    Ok(ResolvedSource { name, exec })
}

fn file_exec(flags: &SourceFlags, path: &Path, binary: bool, kinds: &dyn KindLookup) -> SpecResult<Exec> {
    if !path.exists() {
        return Err(ValidationError::MissingAction.into());
    }
    let image = container_image(flags);
    if binary && flags.kind.is_none() && image.is_none() {
        return Err(ValidationError::MissingKindForBinary.into());
    }

    let bytes = std::fs::read(path).map_err(|source| SpecError::Read { path: path.to_path_buf(), source })?;
    let code = if binary {
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    } else {
        String::from_utf8(bytes).map_err(|_| SpecError::NotText { path: path.to_path_buf() })?
    };
    let main = flags.main.clone();

    if let Some(image) = image {
        return Ok(Exec::Blackbox { image, code: Some(code), main, binary });
    }
    let kind = match &flags.kind {
        Some(kind) => kind.clone(),
        None => {
            let kind = kinds.kind_for(path).ok_or(ValidationError::UnknownKind)?;
            debug!(path = %path.display(), %kind, "inferred kind from file extension");
            kind
        }
    };
    Ok(Exec::Code { kind, code, main, binary })
}

fn container_image(flags: &SourceFlags) -> Option<String> {
    match (&flags.docker, flags.native) {
        (Some(image), _) => Some(image.clone()),
        (None, true) => Some(DEFAULT_NATIVE_IMAGE.to_string()),
        (None, false) => None,
    }
}

fn is_archive(path: &Path) -> bool {
    let p = path.to_string_lossy();
    ARCHIVE_EXTENSIONS.iter().any(|ext| p.ends_with(ext))
}

/// Split a comma separated sequence into fully qualified component names.
pub fn parse_sequence(expr: &str) -> Result<Vec<String>, ValidationError> {
    let components: Vec<&str> = expr.trim().split(',').map(str::trim).collect();
    if components.iter().any(|c| c.is_empty()) {
        return Err(ValidationError::InvalidSequence);
    }
    Ok(components.into_iter().map(qualify).collect())
}

/// `a` -> `/_/a`, `pkg/a` -> `/_/pkg/a`; names that already start with `/` are kept.
pub fn qualify(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/_/{name}")
    }
}

/// Base name with the last `.ext` removed; names without a dot are kept whole.
fn strip_extension(path: &Path) -> String {
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());
    match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => base,
    }
}
