use crate::error::{AppError, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Structured formats for tree listings and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Xml,
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "xml" => Ok(OutputFormat::Xml),
            other => Err(AppError::InvalidArgument(format!(
                "Unsupported output format '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
            OutputFormat::Xml => f.write_str("xml"),
        }
    }
}

pub fn serialize_to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    if pretty {
        serde_json::to_string_pretty(value).map_err(AppError::JsonSerialize)
    } else {
        serde_json::to_string(value).map_err(AppError::JsonSerialize)
    }
}

pub fn serialize_to_yaml<T: Serialize>(value: &T) -> Result<String> {
    serde_yml::to_string(value).map_err(AppError::YamlError)
}

#[cfg(feature = "serde_support")]
pub fn serialize_to_xml<T: Serialize>(value: &T, root_name: &str) -> Result<String> {
    quick_xml::se::to_string_with_root(root_name, value)
        .map_err(|e| AppError::XmlSerialize(e.to_string()))
}

#[cfg(not(feature = "serde_support"))]
pub fn serialize_to_xml<T: Serialize>(_value: &T, _root_name: &str) -> Result<String> {
    Err(AppError::XmlSerialize(
        "XML output requires the serde_support feature".to_string(),
    ))
}

pub fn serialize<T: Serialize>(
    value: &T,
    format: OutputFormat,
    pretty: bool,
    xml_root: &str,
) -> Result<String> {
    match format {
        OutputFormat::Json => serialize_to_json(value, pretty),
        OutputFormat::Yaml => serialize_to_yaml(value),
        OutputFormat::Xml => serialize_to_xml(value, xml_root),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::SelectionSummary;

    #[test]
    fn serializes_summary_in_every_format() {
        let summary = SelectionSummary {
            files: 2,
            total_bytes: 10,
        };
        let json = serialize(&summary, OutputFormat::Json, false, "Summary").unwrap();
        assert_eq!(json, r#"{"files":2,"total_bytes":10}"#);
        let yaml = serialize(&summary, OutputFormat::Yaml, false, "Summary").unwrap();
        assert!(yaml.contains("files: 2"));
        let xml = serialize(&summary, OutputFormat::Xml, false, "Summary").unwrap();
        assert!(xml.starts_with("<Summary>"));
        assert!(xml.contains("<files>2</files>"));
    }

    #[test]
    fn parses_formats() {
        assert_eq!("YML".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert!("toml".parse::<OutputFormat>().is_err());
    }
}
