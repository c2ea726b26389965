use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// WordPress REST error envelope: `{"code": "...", "message": "...", "data": {"status": 404}}`.
///
/// The store returns this shape both with 4xx/5xx statuses and, for some
/// plugins, embedded in a 200 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ApiErrorData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorData {
    #[serde(default)]
    pub status: Option<u16>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }

    /// Extracts an error envelope from a JSON body when it carries a `code`
    /// field. Arrays and objects without `code` are not errors.
    pub fn from_body(body: &Value) -> Option<Self> {
        let object = body.as_object()?;
        let code = match object.get("code")? {
            Value::String(code) => code.clone(),
            Value::Null => return None,
            other => other.to_string(),
        };
        let message = object
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let data = object
            .get("data")
            .and_then(|data| serde_json::from_value::<ApiErrorData>(data.clone()).ok());
        Some(Self {
            code,
            message,
            data,
        })
    }
}
