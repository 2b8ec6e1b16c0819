//! Versioned tracking-plan schema: the scan's output document.
//!
//! YAML is the canonical on-disk form. Maps are `BTreeMap`s and
//! implementations are kept sorted, so two scans of the same tree serialize
//! identically except for `source.commit`, `source.timestamp` and
//! `metadata.durationMs`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detect::Provider;
use crate::error::SchemaError;

/// The only schema version this build reads or writes.
pub const SCHEMA_VERSION: u32 = 1;

/// Inferred type of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Number,
    Boolean,
    Null,
    Object,
    Array,
    Any,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::String => "string",
            PropertyType::Number => "number",
            PropertyType::Boolean => "boolean",
            PropertyType::Null => "null",
            PropertyType::Object => "object",
            PropertyType::Array => "array",
            PropertyType::Any => "any",
        }
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Property name → shape.
pub type PropertySchema = BTreeMap<String, Property>;

/// Shape of one property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(rename = "type")]
    pub kind: PropertyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Nested properties, for objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<PropertySchema>,
    /// Element shape, for arrays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Property>>,
}

impl Property {
    pub fn of(kind: PropertyType) -> Self {
        Self {
            kind,
            description: None,
            properties: None,
            items: None,
        }
    }

    pub fn any() -> Self {
        Self::of(PropertyType::Any)
    }

    pub fn object(properties: PropertySchema) -> Self {
        Self {
            properties: Some(properties),
            ..Self::of(PropertyType::Object)
        }
    }

    pub fn array(items: Property) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::of(PropertyType::Array)
        }
    }
}

/// One place in source where an event is fired.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Implementation {
    /// Path relative to the scan root, `/`-separated.
    pub path: String,
    pub line: usize,
    pub function: String,
    pub destination: Provider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Implementation {
    /// Identity used for deduplication.
    pub fn key(&self) -> (&str, usize, Provider, &str) {
        (&self.path, self.line, self.destination, &self.function)
    }
}

impl PartialOrd for Implementation {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Implementation {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key()
            .cmp(&other.key())
            .then_with(|| self.description.cmp(&other.description))
    }
}

/// A detected analytics event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub implementations: Vec<Implementation>,
    #[serde(default)]
    pub properties: PropertySchema,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// ISO 8601 timestamp.
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanMetadata {
    pub event_count: usize,
    pub implementation_count: usize,
    #[serde(default)]
    pub files_scanned: usize,
    pub duration_ms: u64,
    #[serde(default)]
    pub custom_functions: Vec<String>,
    #[serde(default)]
    pub ignored_patterns: Vec<String>,
}

/// Root of the output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub version: u32,
    pub source: SourceMetadata,
    pub events: BTreeMap<String, Event>,
    pub metadata: ScanMetadata,
}

/// Serialization format for a [`ScanResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl OutputFormat {
    /// Guess the format from a file extension, defaulting to YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => OutputFormat::Json,
            _ => OutputFormat::Yaml,
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Yaml => write!(f, "yaml"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl ScanResult {
    pub fn to_yaml(&self) -> Result<String, SchemaError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json(&self) -> Result<String, SchemaError> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    pub fn render(&self, format: OutputFormat) -> Result<String, SchemaError> {
        match format {
            OutputFormat::Yaml => self.to_yaml(),
            OutputFormat::Json => self.to_json(),
        }
    }

    /// Read a YAML document, refusing any version other than [`SCHEMA_VERSION`].
    pub fn from_yaml(text: &str) -> Result<Self, SchemaError> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        check_version(value.get("version").and_then(serde_yaml::Value::as_u64))?;
        Ok(serde_yaml::from_value(value)?)
    }

    /// Read a JSON document, refusing any version other than [`SCHEMA_VERSION`].
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        check_version(value.get("version").and_then(serde_json::Value::as_u64))?;
        Ok(serde_json::from_value(value)?)
    }

    /// Read a schema file, choosing the format from its extension.
    pub fn read_file(path: &Path) -> Result<Self, SchemaError> {
        let text = std::fs::read_to_string(path)?;
        match OutputFormat::from_path(path) {
            OutputFormat::Json => Self::from_json(&text),
            OutputFormat::Yaml => Self::from_yaml(&text),
        }
    }
}

fn check_version(found: Option<u64>) -> Result<(), SchemaError> {
    match found {
        None => Err(SchemaError::MissingVersion),
        Some(v) if v == u64::from(SCHEMA_VERSION) => Ok(()),
        Some(v) => Err(SchemaError::UnsupportedVersion {
            found: v,
            expected: SCHEMA_VERSION,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScanResult {
        let mut properties = PropertySchema::new();
        properties.insert("plan".into(), Property::of(PropertyType::String));
        properties.insert(
            "tags".into(),
            Property::array(Property::of(PropertyType::String)),
        );

        let mut events = BTreeMap::new();
        events.insert(
            "signup_completed".into(),
            Event {
                description: None,
                implementations: vec![Implementation {
                    path: "src/app.js".into(),
                    line: 4,
                    function: "signup".into(),
                    destination: Provider::Segment,
                    description: None,
                }],
                properties,
            },
        );

        ScanResult {
            version: SCHEMA_VERSION,
            source: SourceMetadata {
                repository: Some("git@example.com:acme/web.git".into()),
                commit: None,
                timestamp: "2024-01-01T00:00:00Z".into(),
            },
            events,
            metadata: ScanMetadata {
                event_count: 1,
                implementation_count: 1,
                files_scanned: 1,
                duration_ms: 12,
                custom_functions: vec![],
                ignored_patterns: vec![],
            },
        }
    }

    #[test]
    fn test_yaml_shape() {
        let yaml = sample().to_yaml().unwrap();
        assert!(yaml.starts_with("version: 1\n"));
        assert!(yaml.contains("destination: segment"));
        assert!(yaml.contains("eventCount: 1"));
        assert!(yaml.contains("durationMs: 12"));
        assert!(yaml.contains("items:\n"));
        assert!(!yaml.contains("commit:"));
    }

    #[test]
    fn test_read_back_json() {
        let json = sample().to_json().unwrap();
        assert_eq!(ScanResult::from_json(&json).unwrap(), sample());
    }

    #[test]
    fn test_future_version_fails_closed() {
        let yaml = sample().to_yaml().unwrap().replacen("version: 1", "version: 2", 1);
        match ScanResult::from_yaml(&yaml) {
            Err(SchemaError::UnsupportedVersion { found, expected }) => {
                assert_eq!(found, 2);
                assert_eq!(expected, 1);
            }
            other => panic!("expected UnsupportedVersion, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_version_fails_closed() {
        let result = ScanResult::from_json(r#"{"events": {}}"#);
        assert!(matches!(result, Err(SchemaError::MissingVersion)));
    }

    #[test]
    fn test_implementations_sort_by_identity() {
        let mut imps = vec![
            Implementation {
                path: "b.js".into(),
                line: 1,
                function: "global".into(),
                destination: Provider::Segment,
                description: None,
            },
            Implementation {
                path: "a.js".into(),
                line: 9,
                function: "global".into(),
                destination: Provider::Mixpanel,
                description: None,
            },
            Implementation {
                path: "a.js".into(),
                line: 9,
                function: "global".into(),
                destination: Provider::Segment,
                description: None,
            },
        ];
        imps.sort();
        assert_eq!(imps[0].path, "a.js");
        assert_eq!(imps[0].destination, Provider::Mixpanel);
        assert_eq!(imps[1].destination, Provider::Segment);
        assert_eq!(imps[2].path, "b.js");
    }
}
