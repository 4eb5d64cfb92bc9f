use std::borrow::Cow;

/// The body of an error response, kept verbatim so callers can inspect
/// ServiceNow's own error code and message.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A JSON error document, usually `{"error": {"message", "detail"}, "status"}`.
    Json(serde_json::Value),

    /// A body that was not JSON (HTML error pages, proxies, ...).
    Text(Box<str>),
}

impl Payload {
    /// The most specific human readable message in the payload.
    pub fn message(&self) -> Cow<'_, str> {
        match self {
            Payload::Json(json) => match &json["error"] {
                serde_json::Value::Object(error) => match error.get("message") {
                    Some(serde_json::Value::String(message)) => Cow::Borrowed(message),
                    _ => Cow::Owned(json["error"].to_string()),
                },
                serde_json::Value::String(message) => Cow::Borrowed(message),
                serde_json::Value::Null => match json {
                    serde_json::Value::String(message) => Cow::Borrowed(message),
                    _ => Cow::Owned(json.to_string()),
                },
                other => Cow::Owned(other.to_string()),
            },
            Payload::Text(text) => Cow::Borrowed(text),
        }
    }

    /// The `error.detail` member, when the server supplied one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Payload::Json(json) => json["error"]["detail"].as_str(),
            Payload::Text(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Json(json) => Some(json),
            Payload::Text(_) => None,
        }
    }
}

impl core::fmt::Display for Payload {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(&self.message())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value.into())
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.into())
    }
}
