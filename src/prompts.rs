//! Instructions sent to the extraction service.
//!
//! Callers can override the default via
//! [`crate::config::ScanConfig::instruction`]; the constants here are used
//! only when no override is provided.

use crate::pipeline::contract::FieldSchema;

/// Default natural-language instruction describing the extraction task.
pub const DEFAULT_INSTRUCTION: &str = "Analyze this business card image and extract the following details into a structured JSON format.
If a field is not found, use an empty string.
Ensure phone numbers are formatted professionally.
Address should be the full physical address found.";

/// Appended after the schema so providers without a native structured-output
/// mode still answer with a bare JSON object.
pub const JSON_ONLY_SUFFIX: &str = "Respond with a single JSON object that matches the schema above. \
Do not wrap it in markdown fences and do not add commentary.";

/// Build the full system message: instruction, schema, output rules.
pub fn system_message(instruction: &str, schema: &FieldSchema) -> String {
    let schema_json = serde_json::to_string_pretty(&schema.to_json_schema())
        .unwrap_or_else(|_| schema.to_json_schema().to_string());
    format!("{instruction}\n\nJSON schema:\n{schema_json}\n\n{JSON_ONLY_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_message_embeds_schema_and_rules() {
        let msg = system_message(DEFAULT_INSTRUCTION, &FieldSchema::business_card());
        assert!(msg.starts_with("Analyze this business card image"));
        assert!(msg.contains("\"companyName\""));
        assert!(msg.contains("\"required\""));
        assert!(msg.ends_with(JSON_ONLY_SUFFIX));
    }
}
