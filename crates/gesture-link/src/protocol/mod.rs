// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Gesture record decoding.
//!
//! The backend sends one JSON object per message:
//!
//! ```text
//! { "gesture": "wave", "confidence": 0.92 }
//! ```
//!
//! Both fields are optional and unknown fields are ignored. Field values of
//! the wrong type are tolerated and treated as absent; only a payload that is
//! not a JSON object at all is an error.

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while decoding a gesture message.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// A decoded gesture classification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GestureEvent {
    /// Gesture label. `Some("")` when the field is present but empty or null.
    pub gesture: Option<String>,
    /// Classifier confidence.
    pub confidence: Option<f64>,
}

impl GestureEvent {
    /// Decode a complete incoming message.
    pub fn decode(message: &str) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_str(message)?;
        let fields = match value {
            Value::Object(fields) => fields,
            other => return Err(ParseError::NotAnObject(json_type_name(&other))),
        };

        let gesture = match fields.get("gesture") {
            Some(Value::String(label)) => Some(label.clone()),
            Some(Value::Null) => Some(String::new()),
            _ => None,
        };
        let confidence = fields.get("confidence").and_then(Value::as_f64);

        Ok(Self {
            gesture,
            confidence,
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
