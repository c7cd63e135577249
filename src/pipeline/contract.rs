//! The extraction contract: what we ask for and what we are willing to accept.
//!
//! The service is treated as an untrusted oracle. Its raw text only becomes a
//! [`BusinessCardRecord`] after [`parse_response`] has checked it against the
//! same [`FieldSchema`] that was sent with the request. Any deviation is a
//! validation failure, not a negotiation.

use super::codec::{self, ImagePayload};
use super::llm::ExtractionService;
use crate::error::ScanError;
use crate::record::{BusinessCardRecord, CardField};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::debug;

/// One named, string-typed field of the output schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: CardField,
    pub required: bool,
}

/// Machine-checkable output schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub fields: Vec<FieldSpec>,
}

impl FieldSchema {
    /// The eight business-card fields; the four anchors are required.
    pub fn business_card() -> Self {
        Self {
            fields: CardField::ALL
                .iter()
                .map(|&field| FieldSpec {
                    field,
                    required: field.is_anchor(),
                })
                .collect(),
        }
    }

    pub fn required_fields(&self) -> impl Iterator<Item = CardField> + '_ {
        self.fields.iter().filter(|s| s.required).map(|s| s.field)
    }

    /// Render as a JSON Schema object.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for spec in &self.fields {
            properties.insert(
                spec.field.key().to_string(),
                json!({ "type": "string", "description": spec.field.description() }),
            );
        }
        let required: Vec<&str> = self.required_fields().map(CardField::key).collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Everything the extraction service receives for one scan.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub image: ImagePayload,
    pub instruction: String,
    pub schema: FieldSchema,
}

impl ExtractionRequest {
    pub fn new(image: ImagePayload, instruction: impl Into<String>) -> Self {
        Self {
            image,
            instruction: instruction.into(),
            schema: FieldSchema::business_card(),
        }
    }
}

/// Send one image to the service and validate the answer.
///
/// Exactly one `generate` call is made; retrying is the caller's decision.
pub async fn submit(
    service: &dyn ExtractionService,
    data_uri: &str,
    instruction: &str,
) -> Result<BusinessCardRecord, ScanError> {
    let payload = codec::parse_data_uri(data_uri)?;
    let request = ExtractionRequest::new(payload, instruction);
    let raw = service.generate(&request).await?;
    debug!("Extraction service returned {} chars", raw.len());
    parse_response(&raw, &request.schema)
}

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?\s*\n(.*)\n```$").unwrap());

/// Validate raw service output against `schema`.
///
/// * empty / whitespace → [`ScanError::EmptyResponse`]
/// * not a JSON object → [`ScanError::MalformedResponse`]
/// * required key absent → [`ScanError::MissingAnchorField`]
/// * field present but neither string nor null → [`ScanError::MalformedResponse`]
///
/// `null` values and absent optional keys become empty strings. Unknown keys
/// are ignored.
pub fn parse_response(raw: &str, schema: &FieldSchema) -> Result<BusinessCardRecord, ScanError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ScanError::EmptyResponse);
    }

    let body = match RE_JSON_FENCE.captures(trimmed) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => trimmed,
    };

    let value: Value = serde_json::from_str(body).map_err(|e| ScanError::MalformedResponse {
        detail: format!("not valid JSON: {e}"),
    })?;
    let object = value.as_object().ok_or_else(|| ScanError::MalformedResponse {
        detail: format!("expected a JSON object, got {}", kind(&value)),
    })?;

    for field in schema.required_fields() {
        if !object.contains_key(field.key()) {
            return Err(ScanError::MissingAnchorField { field });
        }
    }

    let mut record = BusinessCardRecord::default();
    for spec in &schema.fields {
        let key = spec.field.key();
        match object.get(key) {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) => *record.get_mut(spec.field) = s.clone(),
            Some(other) => {
                return Err(ScanError::MalformedResponse {
                    detail: format!("field '{key}' must be a string, got {}", kind(other)),
                })
            }
        }
    }

    Ok(record)
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<BusinessCardRecord, ScanError> {
        parse_response(raw, &FieldSchema::business_card())
    }

    #[test]
    fn schema_marks_anchors_required() {
        let schema = FieldSchema::business_card().to_json_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required, vec!["name", "companyName", "phone", "email"]);
        assert_eq!(schema["properties"].as_object().unwrap().len(), 8);
        assert_eq!(schema["properties"]["website"]["type"], "string");
    }

    #[test]
    fn full_response_parses() {
        let r = parse(
            r#"{"name":"Jane Doe","jobTitle":"CTO","companyName":"Acme","phone":"555-0100",
                "email":"jane@acme.com","address":"1 Main St","website":"acme.com","description":"Rockets"}"#,
        )
        .unwrap();
        assert_eq!(r.name, "Jane Doe");
        assert_eq!(r.job_title, "CTO");
        assert_eq!(r.description, "Rockets");
    }

    #[test]
    fn missing_optional_fields_default_to_empty() {
        let r = parse(r#"{"name":"Jane","companyName":"Acme","email":"j@a.com","phone":"1"}"#)
            .unwrap();
        assert_eq!(r.job_title, "");
        assert_eq!(r.address, "");
        assert_eq!(r.website, "");
        assert_eq!(r.description, "");
    }

    #[test]
    fn empty_anchor_values_are_accepted() {
        let r = parse(r#"{"name":"","companyName":"","email":"","phone":""}"#).unwrap();
        assert!(r.is_blank());
    }

    #[test]
    fn absent_anchor_is_rejected() {
        let err = parse(r#"{"name":"Jane","companyName":"Acme","phone":"1"}"#).unwrap_err();
        assert!(matches!(
            err,
            ScanError::MissingAnchorField {
                field: CardField::Email
            }
        ));
    }

    #[test]
    fn null_values_become_empty() {
        let r = parse(r#"{"name":"Jane","companyName":null,"email":"j@a.com","phone":"1","website":null}"#)
            .unwrap();
        assert_eq!(r.company_name, "");
        assert_eq!(r.website, "");
    }

    #[test]
    fn non_string_values_are_malformed() {
        let err = parse(r#"{"name":"Jane","companyName":"Acme","email":"j@a.com","phone":5550100}"#)
            .unwrap_err();
        assert!(matches!(err, ScanError::MalformedResponse { .. }));
        assert!(err.to_string().contains("'phone'"));
    }

    #[test]
    fn empty_and_whitespace_are_empty_response() {
        assert!(matches!(parse(""), Err(ScanError::EmptyResponse)));
        assert!(matches!(parse("  \n "), Err(ScanError::EmptyResponse)));
    }

    #[test]
    fn non_json_and_non_object_are_malformed() {
        assert!(matches!(
            parse("Sorry, I cannot read this card."),
            Err(ScanError::MalformedResponse { .. })
        ));
        assert!(matches!(
            parse(r#"["Jane","Acme"]"#),
            Err(ScanError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let raw = "```json\n{\"name\":\"Jane\",\"companyName\":\"Acme\",\"email\":\"\",\"phone\":\"\"}\n```";
        assert_eq!(parse(raw).unwrap().company_name, "Acme");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let r = parse(r#"{"name":"J","companyName":"A","email":"e","phone":"p","fax":"123"}"#)
            .unwrap();
        assert_eq!(r.name, "J");
    }
}
