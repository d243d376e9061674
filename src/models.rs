use base64::Engine as _;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

// ---- Action specification (what we submit) ----

/// Whether an action is being created or an existing one overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
}

impl Operation {
    pub fn verb(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
        }
    }
}

/// Resolved code payload of an action.
///
/// Each variant carries only the fields that make sense for it, so a
/// sequence can never carry code and a runtime kind never sits next to an image.
#[derive(Debug, Clone, PartialEq)]
pub enum Exec {
    /// Source or archive executed by a named runtime kind.
    Code {
        kind: String,
        code: String,
        main: Option<String>,
        binary: bool,
    },
    /// Ordered composition of other actions (fully qualified names).
    Sequence { components: Vec<String> },
    /// Container image, optionally with a code artifact handed to it.
    Blackbox {
        image: String,
        code: Option<String>,
        main: Option<String>,
        binary: bool,
    },
}

pub const BLACKBOX_KIND: &str = "blackbox";
pub const SEQUENCE_KIND: &str = "sequence";

impl Exec {
    pub fn kind(&self) -> &str {
        match self {
            Exec::Code { kind, .. } => kind,
            Exec::Sequence { .. } => SEQUENCE_KIND,
            Exec::Blackbox { .. } => BLACKBOX_KIND,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Exec::Code { code, .. } => Some(code),
            Exec::Blackbox { code, .. } => code.as_deref(),
            Exec::Sequence { .. } => None,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Exec::Code { binary: true, .. } | Exec::Blackbox { binary: true, .. })
    }

    /// Recover the artifact bytes from the payload, undoing base64 for binary code.
    #[cfg(test)]
    pub fn code_bytes(&self) -> anyhow::Result<Option<Vec<u8>>> {
        let Some(code) = self.code() else { return Ok(None) };
        if self.is_binary() {
            let raw = base64::engine::general_purpose::STANDARD.decode(code)?;
            Ok(Some(raw))
        } else {
            Ok(Some(code.as_bytes().to_vec()))
        }
    }
}

#[derive(Serialize)]
struct ExecWire<'a> {
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    main: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    components: Option<&'a [String]>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    binary: bool,
}

impl Serialize for Exec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Exec::Code { kind, code, main, binary } => ExecWire {
                kind,
                code: Some(code),
                main: main.as_deref(),
                image: None,
                components: None,
                binary: *binary,
            },
            Exec::Sequence { components } => ExecWire {
                kind: SEQUENCE_KIND,
                code: None,
                main: None,
                image: None,
                components: Some(components),
                binary: false,
            },
            Exec::Blackbox { image, code, main, binary } => ExecWire {
                kind: BLACKBOX_KIND,
                code: code.as_deref(),
                main: main.as_deref(),
                image: Some(image),
                components: None,
                binary: *binary,
            },
        };
        wire.serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterEntry {
    pub key: String,
    pub value: Value,
    /// Set for entries that came from environment sources.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub init: bool,
}

impl ParameterEntry {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self { key: key.into(), value, init: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationEntry {
    pub key: String,
    pub value: Value,
}

impl AnnotationEntry {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec: Option<Exec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<Limits>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<ParameterEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<AnnotationEntry>>,
}

// ---- Remote entities (what we list) ----

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Package {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub publish: Option<bool>,
    #[serde(default)]
    pub annotations: Vec<AnnotationEntry>,
    #[serde(default)]
    pub updated: Option<i64>,
}

impl Package {
    pub fn is_binding(&self) -> bool {
        self.annotations.iter().any(|a| a.key == "binding")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Trigger {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub rules: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    pub updated: Option<i64>,
}

impl Trigger {
    pub fn active_rules(&self) -> usize {
        self.rules
            .as_ref()
            .map(|rules| {
                rules
                    .values()
                    .filter(|r| r.get("status").and_then(Value::as_str) == Some("active"))
                    .count()
            })
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activation {
    pub activation_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ActivationLogs {
    #[serde(default)]
    pub logs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_code_exec_serialization() {
        let exec = Exec::Code {
            kind: "nodejs:default".to_string(),
            code: "function main() {}".to_string(),
            main: None,
            binary: false,
        };
        assert_eq!(
            serde_json::to_value(&exec).unwrap(),
            json!({ "kind": "nodejs:default", "code": "function main() {}" })
        );
    }

    #[test]
    fn test_sequence_exec_has_no_code() {
        let exec = Exec::Sequence { components: vec!["/_/a".into(), "/_/b".into()] };
        let v = serde_json::to_value(&exec).unwrap();
        assert_eq!(v, json!({ "kind": "sequence", "components": ["/_/a", "/_/b"] }));
        assert!(exec.code().is_none());
    }

    #[test]
    fn test_blackbox_exec_serialization() {
        let exec = Exec::Blackbox {
            image: "org/img".into(),
            code: Some("Zm9v".into()),
            main: Some("run".into()),
            binary: true,
        };
        assert_eq!(
            serde_json::to_value(&exec).unwrap(),
            json!({ "kind": "blackbox", "code": "Zm9v", "main": "run", "image": "org/img", "binary": true })
        );
        assert_eq!(exec.code_bytes().unwrap(), Some(b"foo".to_vec()));
    }

    #[test]
    fn test_action_spec_omits_absent_fields() {
        let spec = ActionSpec {
            name: "hello".into(),
            exec: None,
            limits: None,
            parameters: None,
            annotations: None,
        };
        assert_eq!(serde_json::to_value(&spec).unwrap(), json!({ "name": "hello" }));
    }

    #[test]
    fn test_parameter_init_only_when_set() {
        let mut p = ParameterEntry::new("a", json!(1));
        assert_eq!(serde_json::to_value(&p).unwrap(), json!({ "key": "a", "value": 1 }));
        p.init = true;
        assert_eq!(serde_json::to_value(&p).unwrap(), json!({ "key": "a", "value": 1, "init": true }));
    }

    #[test]
    fn test_package_binding_and_trigger_rules() {
        let pkg: Package = serde_json::from_value(json!({
            "name": "p", "namespace": "ns", "version": "0.0.1",
            "annotations": [{ "key": "binding", "value": { "namespace": "x", "name": "y" } }]
        }))
        .unwrap();
        assert!(pkg.is_binding());

        let trigger: Trigger = serde_json::from_value(json!({
            "name": "t", "namespace": "ns", "version": "0.0.2",
            "rules": {
                "ns/r1": { "status": "active" },
                "ns/r2": { "status": "inactive" },
                "ns/r3": { "status": "active" }
            }
        }))
        .unwrap();
        assert_eq!(trigger.active_rules(), 2);
    }
}
