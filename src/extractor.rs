use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::tips::{BatchPrediction, Prediction};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("object has no positive integer fixtureId")]
    MissingFixtureId,
    #[error("object has no prediction object")]
    MissingPrediction,
    #[error("prediction does not match the schema: {0}")]
    InvalidPrediction(String),
}

/// Checks that a parsed object is a `{fixtureId, prediction}` envelope.
pub fn validate_envelope(value: Value) -> Result<BatchPrediction, EnvelopeError> {
    let Value::Object(mut map) = value else {
        return Err(EnvelopeError::MissingFixtureId);
    };
    let fixture_id = map
        .get("fixtureId")
        .and_then(Value::as_u64)
        .filter(|id| *id > 0)
        .ok_or(EnvelopeError::MissingFixtureId)?;
    let prediction = match map.remove("prediction") {
        Some(v @ Value::Object(_)) => v,
        _ => return Err(EnvelopeError::MissingPrediction),
    };
    let prediction: Prediction = serde_json::from_value(prediction)
        .map_err(|err| EnvelopeError::InvalidPrediction(err.to_string()))?;
    Ok(BatchPrediction {
        fixture_id,
        prediction,
    })
}

/// Pulls complete top-level objects out of a JSON array that is still arriving.
///
/// Bytes are appended with [`ArrayExtractor::push`]; every object whose closing brace has been
/// seen is parsed and returned in the order the braces close. Scan state survives between pushes,
/// so the emitted sequence depends only on the concatenated input, never on how it was chunked.
#[derive(Debug, Default)]
pub struct ArrayExtractor {
    buf: Vec<u8>,
    cursor: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
    start: Option<usize>,
    dropped: usize,
}

impl ArrayExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<BatchPrediction> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        let mut consumed = 0;

        let mut i = self.cursor;
        while i < self.buf.len() {
            let b = self.buf[i];
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
                i += 1;
                continue;
            }

            match b {
                b'"' => self.in_string = true,
                b'{' => {
                    if self.depth == 0 {
                        self.start = Some(i);
                    }
                    self.depth += 1;
                }
                b'}' if self.depth > 0 => {
                    self.depth -= 1;
                    if self.depth == 0
                        && let Some(start) = self.start.take()
                    {
                        match serde_json::from_slice::<Value>(&self.buf[start..=i]) {
                            Ok(value) => {
                                consumed = i + 1;
                                match validate_envelope(value) {
                                    Ok(prediction) => out.push(prediction),
                                    Err(err) => {
                                        self.dropped += 1;
                                        debug!(error = %err, "dropping streamed object");
                                    }
                                }
                            }
                            Err(err) => {
                                debug!(error = %err, "skipping unparseable object span");
                            }
                        }
                    }
                }
                _ => {}
            }
            i += 1;
        }

        self.cursor = self.buf.len();
        if consumed > 0 {
            self.buf.drain(..consumed);
            self.cursor -= consumed;
            if let Some(start) = self.start.as_mut() {
                *start -= consumed;
            }
        }
        out
    }

    /// Bytes retained for the next push (an object still being streamed, or array punctuation).
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Objects that parsed as JSON but were not prediction envelopes.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}
