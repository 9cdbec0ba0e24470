//! Enrichment collaborator backed by an OpenAI-compatible chat endpoint
//!
//! The enricher only ever answers for fields the cascade left unresolved.
//! Everything it returns is filtered to those fields and normalized before
//! the cascade accepts it.

use crate::config::EnrichmentConfig;
use crate::record::FieldValue;
use crate::source::FieldHint;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

/// Instructions sent with every enrichment request
const SYSTEM_PROMPT: &str = "Tu reçois une offre d'emploi extraite d'un site web. \
Complète uniquement les champs listés dans \"unresolved\" en t'appuyant sur le texte fourni. \
Retourne uniquement un objet JSON, sans balise markdown ni texte autour, dont les clés sont \
ces champs. Ne réécris pas la description. Si une information est absente, mets null.";

/// Errors raised by an enrichment call
///
/// These never cross the cascade boundary; the cascade logs them and keeps
/// the record as it was.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// Transport failure (connection refused, reset, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// The endpoint answered with a non-success status
    #[error("API error: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// The answer was not the JSON object that was asked for
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// What the enricher is asked to complete
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentRequest {
    /// Source the record came from
    pub source: String,

    /// Fields already resolved by earlier stages
    pub known: BTreeMap<String, FieldValue>,

    /// Fields the enricher may answer for
    pub unresolved: Vec<String>,

    /// Free text of the offer, already truncated
    pub context: String,
}

/// Capability to fill unresolved fields from an offer's text
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Returns answers keyed by field name
    ///
    /// Implementations return only non-empty answers for names listed in
    /// `request.unresolved`.
    async fn enrich(
        &self,
        request: &EnrichmentRequest,
    ) -> Result<BTreeMap<String, FieldValue>, EnrichmentError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// Enricher calling `{endpoint}/chat/completions`
#[derive(Debug, Clone)]
pub struct LlmEnricher {
    http_client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl LlmEnricher {
    /// Creates an enricher sharing the crawler's HTTP client
    pub fn new(http_client: Client, config: &EnrichmentConfig, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
        }
    }

    /// Creates an enricher if the configured key is usable
    ///
    /// Returns `None` when the key variable is unset, blank or a placeholder.
    pub fn from_config(http_client: Client, config: &EnrichmentConfig) -> Option<Self> {
        let api_key = config.api_key()?;
        Some(Self::new(http_client, config, api_key))
    }

    async fn chat(&self, user_content: String) -> Result<String, EnrichmentError> {
        let start = Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_content,
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichmentError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| EnrichmentError::MalformedResponse(e.to_string()))?;

        debug!(
            model = %self.model,
            duration_ms = start.elapsed().as_millis(),
            "Enrichment chat completion"
        );

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| EnrichmentError::MalformedResponse("empty choices".to_string()))
    }
}

#[async_trait]
impl Enricher for LlmEnricher {
    async fn enrich(
        &self,
        request: &EnrichmentRequest,
    ) -> Result<BTreeMap<String, FieldValue>, EnrichmentError> {
        if request.unresolved.is_empty() {
            return Ok(BTreeMap::new());
        }
        let payload = serde_json::to_string_pretty(request)
            .map_err(|e| EnrichmentError::MalformedResponse(e.to_string()))?;
        let content = self.chat(payload).await?;
        let answers = parse_answer(&content, &request.unresolved)?;
        if answers.is_empty() {
            warn!(
                "Enrichment for {} answered none of {} requested fields",
                request.source,
                request.unresolved.len()
            );
        }
        Ok(answers)
    }
}

/// Parses a model answer into normalized field values
///
/// Accepts a bare JSON object, one wrapped in a markdown fence, or one
/// embedded in surrounding prose. Only names in `requested` are kept, and
/// null or empty answers are dropped.
pub fn parse_answer(
    content: &str,
    requested: &[String],
) -> Result<BTreeMap<String, FieldValue>, EnrichmentError> {
    let object = parse_json_object(content)?;

    let mut answers = BTreeMap::new();
    for name in requested {
        let Some(raw) = object.get(name) else {
            continue;
        };
        if let Some(value) = normalize_answer(name, raw) {
            answers.insert(name.clone(), value);
        }
    }
    Ok(answers)
}

fn strip_fence(content: &str) -> &str {
    let text = content.trim();
    let Some(inner) = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
    else {
        return text;
    };
    inner.trim().strip_suffix("```").unwrap_or(inner).trim()
}

fn parse_json_object(content: &str) -> Result<serde_json::Map<String, Value>, EnrichmentError> {
    let text = strip_fence(content);
    let parsed = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(first) => {
            let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
                return Err(EnrichmentError::MalformedResponse(first.to_string()));
            };
            if end <= start {
                return Err(EnrichmentError::MalformedResponse(first.to_string()));
            }
            serde_json::from_str::<Value>(&text[start..=end])
                .map_err(|e| EnrichmentError::MalformedResponse(e.to_string()))?
        }
    };

    match parsed {
        Value::Object(map) => Ok(map),
        other => Err(EnrichmentError::MalformedResponse(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

fn normalize_answer(name: &str, raw: &Value) -> Option<FieldValue> {
    let hint = FieldHint::from_field_name(name);

    let value = match raw {
        Value::Null => return None,
        Value::Bool(b) => FieldValue::Flag(*b),
        Value::Number(n) => match hint {
            Some(FieldHint::Remote) => FieldValue::Flag(n.as_f64().is_some_and(|v| v != 0.0)),
            Some(FieldHint::Count) => FieldValue::Text(n.as_u64()?.to_string()),
            _ => FieldValue::Text(n.to_string()),
        },
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || matches!(s.to_lowercase().as_str(), "null" | "n/a" | "none") {
                return None;
            }
            match hint {
                Some(FieldHint::Remote) => FieldValue::Flag(matches!(
                    s.to_lowercase().as_str(),
                    "oui" | "yes" | "true" | "1"
                )),
                Some(FieldHint::Count) => FieldValue::Text(s.parse::<u32>().ok()?.to_string()),
                Some(FieldHint::Education) => FieldValue::Text(normalize_education(s)),
                Some(FieldHint::Experience) => FieldValue::Text(normalize_experience(s)),
                _ => FieldValue::Text(s.to_string()),
            }
        }
        Value::Array(items) => {
            let mut list: Vec<String> = Vec::new();
            for item in items {
                let text = match item {
                    Value::String(s) => s.trim().to_string(),
                    Value::Number(n) => n.to_string(),
                    _ => continue,
                };
                if !text.is_empty() && !list.contains(&text) {
                    list.push(text);
                }
            }
            FieldValue::List(list)
        }
        Value::Object(map) => FieldValue::Map(
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.trim().to_string())))
                .filter(|(_, v)| !v.is_empty())
                .collect(),
        ),
    };

    value.non_empty()
}

fn normalize_education(raw: &str) -> String {
    match raw.to_lowercase().as_str() {
        "bac+2" => "Bac+2".to_string(),
        "bac+3" => "Bac+3".to_string(),
        "bac+4" => "Bac+4".to_string(),
        "bac+5" => "Bac+5".to_string(),
        "bac" | "baccalauréat" | "baccalaureat" => "Bac".to_string(),
        "aucun certificat, diplôme ou grade" => "Aucun diplôme".to_string(),
        _ => raw.to_string(),
    }
}

fn normalize_experience(raw: &str) -> String {
    match raw.to_lowercase().as_str() {
        "junior" => "Junior".to_string(),
        "mid-senior level" | "confirmé" | "confirme" => "Confirmé".to_string(),
        "senior" => "Senior".to_string(),
        "débutant" | "debutant" => "Débutant".to_string(),
        _ => raw.to_string(),
    }
}
