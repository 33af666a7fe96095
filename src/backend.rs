use std::io::{BufRead, BufReader};

use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::GeminiConfig;
use crate::error::{OracleError, Result};
use crate::fixtures::Fixture;
use crate::http_client::streaming_client;

/// Raw response text in arrival order. Fragments may split UTF-8 sequences.
pub type TextStream = Box<dyn Iterator<Item = Result<Vec<u8>>> + Send>;

#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub fixtures: Vec<Fixture>,
    pub prompt: String,
}

impl StreamRequest {
    pub fn for_batch(fixtures: &[Fixture]) -> Self {
        Self {
            fixtures: fixtures.to_vec(),
            prompt: build_batch_prompt(fixtures),
        }
    }
}

/// Generative backend seen by the orchestrator and the translation helper.
pub trait AiBackend: Send + Sync {
    /// Opens a streaming structured-output request for one batch.
    fn stream(&self, request: &StreamRequest) -> Result<TextStream>;

    /// Single-shot free-text completion.
    fn generate(&self, prompt: &str) -> Result<String>;
}

pub fn build_batch_prompt(fixtures: &[Fixture]) -> String {
    let fixture_list = fixtures
        .iter()
        .map(|f| {
            format!(
                "- **Match:** {} vs {} ({})\n  - **ID:** {}\n  - **Time:** {}",
                f.teams.home.name,
                f.teams.away.name,
                f.league.name,
                f.id(),
                f.fixture.date
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an expert football analyst and a master of Krishnamurti Paddhati (KP) Astrology.
Analyze the following matches and give predictions for these markets only:
1. Match Result (W1, X, W2)
2. Double Chance (1X, 12, 2X)
3. Total Goals Over/Under (TO <line>, TU <line>)
4. Most likely correct scores

KP method:
- Home team is the 1st house (Lagna), away team is the 7th house.
- Weigh the 6th house (victory) and the 11th house (gain).
- Goal counts follow the strength of the 2nd and 5th cusps against the main significators.
- Cast the horary chart for the match start time and combine it with current team form.

Matches:
{fixture_list}

Output rules:
- Every tip value must be one of the codes above, e.g. \"W1\", \"2X\", \"TO 2.5\".
- \"correctScores\" holds the 3 most likely scores written as \"<home>-<away>\", e.g. \"2-1\".
- \"analysis\" is a detailed KP astrology analysis in Markdown.
- Use the exact ID given for each match as \"fixtureId\".

Return a JSON array conforming to the provided schema, one element per match."
    )
}

fn tip_schema(description: &str) -> Value {
    json!({
        "type": "OBJECT",
        "description": description,
        "properties": {
            "bet": { "type": "STRING", "description": "Market name (Match Result, Double Chance or Total Goals)." },
            "value": { "type": "STRING", "description": "Outcome code (W1, X, W2, 1X, 12, 2X, TO <line>, TU <line>)." },
            "confidence": { "type": "INTEGER", "description": "Confidence level 0-100." }
        },
        "required": ["bet", "value", "confidence"]
    })
}

pub fn batch_response_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "fixtureId": { "type": "INTEGER" },
                "prediction": {
                    "type": "OBJECT",
                    "properties": {
                        "safeTip": tip_schema("The safest tip (result or over/under) with high probability."),
                        "valueTip": tip_schema("A value tip on result or over/under markets."),
                        "tips": {
                            "type": "ARRAY",
                            "description": "6-10 tips on result, double chance and goal over/under markets only.",
                            "items": tip_schema("A single tip.")
                        },
                        "analysis": {
                            "type": "STRING",
                            "description": "KP astrology match analysis in Markdown."
                        },
                        "correctScores": {
                            "type": "ARRAY",
                            "description": "Three most likely correct scores.",
                            "items": { "type": "STRING" }
                        }
                    },
                    "required": ["safeTip", "valueTip", "tips", "analysis", "correctScores"]
                }
            },
            "required": ["fixtureId", "prediction"]
        }
    })
}

pub struct GeminiBackend {
    api_key: String,
    base_url: String,
    model: String,
    translate_model: String,
    thinking_budget: u32,
}

impl GeminiBackend {
    pub fn from_config(cfg: &GeminiConfig) -> Result<Self> {
        let api_key = cfg
            .api_key
            .clone()
            .ok_or_else(|| OracleError::Config("GEMINI_API_KEY is not set".to_string()))?;
        Ok(Self {
            api_key,
            base_url: cfg.base_url.clone(),
            model: cfg.model.clone(),
            translate_model: cfg.translate_model.clone(),
            thinking_budget: cfg.thinking_budget,
        })
    }

    fn send(&self, url: &str, body: &Value) -> Result<reqwest::blocking::Response> {
        let client = streaming_client().map_err(|err| OracleError::Transport(err.to_string()))?;
        let resp = client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let text = resp.text().unwrap_or_default();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(OracleError::QuotaExhausted(text));
        }
        Err(OracleError::Transport(format!("http {status}: {text}")))
    }
}

impl AiBackend for GeminiBackend {
    fn stream(&self, request: &StreamRequest) -> Result<TextStream> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        );
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": batch_response_schema(),
                "thinkingConfig": { "thinkingBudget": self.thinking_budget }
            }
        });
        info!(model = %self.model, fixtures = request.fixtures.len(), "opening prediction stream");
        let resp = self.send(&url, &body)?;
        Ok(Box::new(SseTextStream::new(BufReader::new(resp))))
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.translate_model
        );
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
        });
        let resp = self.send(&url, &body)?;
        let payload: Value = resp.json()?;
        if let Some(err) = payload_error(&payload) {
            return Err(err);
        }
        candidate_text(&payload)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| OracleError::Backend("response carried no text".to_string()))
    }
}

/// Turns a server-sent-event body into the text fragments of each event.
pub struct SseTextStream<R> {
    reader: R,
    data: String,
    done: bool,
}

impl<R: BufRead> SseTextStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            data: String::new(),
            done: false,
        }
    }

    /// Decodes the buffered event, if any.
    fn flush_event(&mut self) -> Option<Result<Vec<u8>>> {
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data);
        match decode_sse_payload(&data) {
            Ok(Some(text)) => Some(Ok(text.into_bytes())),
            Ok(None) => None,
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<R: BufRead> Iterator for SseTextStream<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = Vec::new();
        while !self.done {
            line.clear();
            let read = match self.reader.read_until(b'\n', &mut line) {
                Ok(n) => n,
                Err(err) => {
                    self.done = true;
                    return Some(Err(OracleError::Transport(err.to_string())));
                }
            };
            if read == 0 {
                let last = self.flush_event();
                self.done = true;
                return last;
            }

            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\r', '\n']);
            if text.is_empty() {
                if let Some(item) = self.flush_event() {
                    return Some(item);
                }
                continue;
            }
            if let Some(rest) = text.strip_prefix("data:") {
                if !self.data.is_empty() {
                    self.data.push('\n');
                }
                self.data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
            }
        }
        None
    }
}

/// Extracts the answer text from one streamed `GenerateContentResponse`.
///
/// `Ok(None)` means the event carried no answer text (thought parts, usage metadata).
pub fn decode_sse_payload(data: &str) -> Result<Option<String>> {
    let trimmed = data.trim();
    if trimmed.is_empty() || trimmed == "[DONE]" {
        return Ok(None);
    }
    let payload: Value = serde_json::from_str(trimmed)?;
    if let Some(err) = payload_error(&payload) {
        return Err(err);
    }
    let text = candidate_text(&payload);
    if text.is_none() {
        debug!("stream event without answer text");
    }
    Ok(text)
}

fn candidate_text(payload: &Value) -> Option<String> {
    let parts = payload
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter(|p| !p.get("thought").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    (!text.is_empty()).then_some(text)
}

fn payload_error(payload: &Value) -> Option<OracleError> {
    let err = payload.get("error")?;
    let code = err.get("code").and_then(Value::as_u64).unwrap_or_default();
    let status = err.get("status").and_then(Value::as_str).unwrap_or_default();
    let message = err
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown backend error")
        .to_string();
    if code == 429 || status == "RESOURCE_EXHAUSTED" {
        Some(OracleError::QuotaExhausted(message))
    } else {
        Some(OracleError::Backend(message))
    }
}
