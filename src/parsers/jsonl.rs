use crate::parsers::RecordParser;
use crate::record::{json_type_name, Record};
use anyhow::{anyhow, Context, Result};

/// Parser for newline-delimited JSON objects
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonlParser;

impl JsonlParser {
    pub fn new() -> Self {
        Self
    }
}

impl RecordParser for JsonlParser {
    fn parse(&self, line: &str) -> Result<Record> {
        let json_value: serde_json::Value =
            serde_json::from_str(line).context("Failed to parse JSON")?;

        match json_value {
            serde_json::Value::Object(map) => Ok(Record::from_fields(map)),
            other => Err(anyhow!(
                "Expected JSON object, got {}",
                json_type_name(&other)
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AuthStatus;

    #[test]
    fn test_jsonl_parser_basic() {
        let parser = JsonlParser::new();
        let record = parser
            .parse(r#"{"auth":"Logged In","length":200.5,"song":"Intro"}"#)
            .unwrap();

        assert_eq!(record.auth_status().unwrap(), AuthStatus::LoggedIn);
        assert_eq!(record.length().unwrap(), Some(200.5));
        assert_eq!(record.get("song").and_then(|v| v.as_str()), Some("Intro"));
    }

    #[test]
    fn test_jsonl_parser_rejects_invalid_json() {
        let parser = JsonlParser::new();
        let err = parser.parse("not-json").unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse JSON"));
    }

    #[test]
    fn test_jsonl_parser_rejects_non_objects() {
        let parser = JsonlParser::new();
        for line in ["[1,2,3]", "42", "\"Logged In\"", "null"] {
            let err = parser.parse(line).unwrap_err();
            assert!(
                err.to_string().contains("Expected JSON object"),
                "unexpected error for {}: {}",
                line,
                err
            );
        }
    }

    #[test]
    fn test_jsonl_parser_empty_object() {
        let parser = JsonlParser::new();
        let record = parser.parse("{}").unwrap();
        assert!(record.fields().is_empty());
        assert_eq!(record.auth_status().unwrap(), AuthStatus::Unknown);
    }
}
