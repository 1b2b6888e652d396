//! Wire types for the generateContent protocol
//!
//! The request carries a declarative response schema the service must
//! conform its JSON output to; the response wraps that JSON in the
//! candidates envelope. Everything here is typed so a malformed response
//! fails the decode instead of surfacing as a panic somewhere downstream.

use crate::db::models::Category;
use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// Declarative schema for the structured output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSchema {
    #[serde(rename = "type")]
    pub schema_type: String,

    pub properties: BTreeMap<String, PropertySchema>,

    pub required: Vec<String>,
}

/// Schema for a single output field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub schema_type: String,

    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl PropertySchema {
    fn string() -> Self {
        Self {
            schema_type: "string".to_string(),
            enum_values: None,
        }
    }

    fn string_enum(values: Vec<String>) -> Self {
        Self {
            schema_type: "string".to_string(),
            enum_values: Some(values),
        }
    }
}

/// Schema for the draft stage: title, description, keyword, and a category
/// constrained to the fixed set
pub fn draft_schema() -> ResponseSchema {
    let mut properties = BTreeMap::new();
    properties.insert("title".to_string(), PropertySchema::string());
    properties.insert("description".to_string(), PropertySchema::string());
    properties.insert("keyword".to_string(), PropertySchema::string());
    properties.insert(
        "category".to_string(),
        PropertySchema::string_enum(Category::labels().iter().map(|s| s.to_string()).collect()),
    );

    ResponseSchema {
        schema_type: "object".to_string(),
        properties,
        required: vec![
            "title".to_string(),
            "description".to_string(),
            "keyword".to_string(),
            "category".to_string(),
        ],
    }
}

/// Schema for the body stage: a single body field
pub fn body_schema() -> ResponseSchema {
    let mut properties = BTreeMap::new();
    properties.insert("body".to_string(), PropertySchema::string());

    ResponseSchema {
        schema_type: "object".to_string(),
        properties,
        required: vec!["body".to_string()],
    }
}

/// Request body for generateContent
#[derive(Debug, Clone, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,

    #[serde(rename = "generationConfig")]
    pub generation_config: RequestGenerationConfig,
}

impl GenerateContentRequest {
    pub fn new(prompt: &str, schema: ResponseSchema) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: RequestGenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: schema,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestGenerationConfig {
    #[serde(rename = "responseMimeType")]
    pub response_mime_type: String,

    #[serde(rename = "responseSchema")]
    pub response_schema: ResponseSchema,
}

/// Response envelope for generateContent
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl GenerateContentResponse {
    /// Extract the model's text payload: first part of the first candidate.
    /// Any missing piece of the envelope yields None.
    pub fn into_first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()
            .map(|part| part.text)
    }
}

/// Structured payload of a draft generation, decoded from the raw JSON text
/// the service returns
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DraftPayload {
    #[validate(length(min = 1))]
    pub title: String,

    #[validate(length(min = 1))]
    pub description: String,

    #[validate(length(min = 1))]
    pub keyword: String,

    pub category: String,
}

impl DraftPayload {
    /// Decode and validate raw model output. Fails closed: missing fields,
    /// wrong types, empty strings, and out-of-set categories are all
    /// rejected before anything reaches the store.
    pub fn parse(raw: &str) -> Result<DraftPayload> {
        let payload: DraftPayload = serde_json::from_str(raw)?;
        payload.validate()?;

        if Category::parse(&payload.category).is_none() {
            return Err(AppError::Validation {
                message: format!("category not in the fixed set: {}", payload.category),
            });
        }

        Ok(payload)
    }

    /// The parsed category; guaranteed present after [`DraftPayload::parse`]
    pub fn category(&self) -> Option<Category> {
        Category::parse(&self.category)
    }

    /// Convert into the store's draft type
    pub fn into_new_draft(self) -> Result<crate::db::NewDraft> {
        let category = Category::parse(&self.category).ok_or_else(|| AppError::Validation {
            message: format!("category not in the fixed set: {}", self.category),
        })?;

        Ok(crate::db::NewDraft {
            title: self.title,
            description: self.description,
            keyword: self.keyword,
            category,
        })
    }
}

/// Structured payload of a body generation
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BodyPayload {
    #[validate(length(min = 1))]
    pub body: String,
}

impl BodyPayload {
    /// Decode and validate raw model output for the body stage
    pub fn parse(raw: &str) -> Result<BodyPayload> {
        let payload: BodyPayload = serde_json::from_str(raw)?;
        payload.validate()?;
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_schema_shape() {
        let schema = draft_schema();
        let json = serde_json::to_value(&schema).unwrap();

        assert_eq!(json["type"], "object");
        assert_eq!(json["properties"]["title"]["type"], "string");
        assert!(json["properties"]["title"].get("enum").is_none());

        let categories = json["properties"]["category"]["enum"].as_array().unwrap();
        assert_eq!(categories.len(), 5);
        assert!(categories.contains(&serde_json::json!("cost optimization")));

        let required = json["required"].as_array().unwrap();
        assert_eq!(required.len(), 4);
    }

    #[test]
    fn test_body_schema_shape() {
        let json = serde_json::to_value(body_schema()).unwrap();
        assert_eq!(json["properties"]["body"]["type"], "string");
        assert_eq!(json["required"], serde_json::json!(["body"]));
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateContentRequest::new("write about freight", body_schema());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["contents"][0]["parts"][0]["text"], "write about freight");
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(json["generationConfig"]["responseSchema"]["type"], "object");
    }

    #[test]
    fn test_envelope_text_extraction() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"{\"body\":\"x\"}"}]}}]}"#;
        let envelope: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.into_first_text().as_deref(), Some("{\"body\":\"x\"}"));
    }

    #[test]
    fn test_envelope_missing_pieces() {
        let empty: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.into_first_text().is_none());

        let no_content: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"content":null}]}"#).unwrap();
        assert!(no_content.into_first_text().is_none());

        let no_parts: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[]}}]}"#).unwrap();
        assert!(no_parts.into_first_text().is_none());
    }

    #[test]
    fn test_draft_payload_parse() {
        let raw = r#"{
            "title": "Five signals of a reliable light-freight partner",
            "description": "A checklist for shippers comparing carriers.",
            "keyword": "light freight carrier selection",
            "category": "partner selection"
        }"#;

        let payload = DraftPayload::parse(raw).unwrap();
        assert_eq!(payload.category(), Some(Category::PartnerSelection));
    }

    #[test]
    fn test_draft_payload_rejects_bad_input() {
        // Not JSON at all
        assert!(DraftPayload::parse("not json").is_err());

        // Missing field
        assert!(DraftPayload::parse(r#"{"title":"t","description":"d","keyword":"k"}"#).is_err());

        // Empty field
        assert!(DraftPayload::parse(
            r#"{"title":"","description":"d","keyword":"k","category":"market trends"}"#
        )
        .is_err());

        // Mistyped field
        assert!(DraftPayload::parse(
            r#"{"title":1,"description":"d","keyword":"k","category":"market trends"}"#
        )
        .is_err());

        // Category outside the fixed set
        assert!(DraftPayload::parse(
            r#"{"title":"t","description":"d","keyword":"k","category":"growth hacking"}"#
        )
        .is_err());
    }

    #[test]
    fn test_body_payload_parse() {
        assert_eq!(
            BodyPayload::parse(r#"{"body":"full text"}"#).unwrap().body,
            "full text"
        );
        assert!(BodyPayload::parse(r#"{"body":""}"#).is_err());
        assert!(BodyPayload::parse(r#"{}"#).is_err());
    }
}
