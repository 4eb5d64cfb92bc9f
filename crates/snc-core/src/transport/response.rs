use crate::{Error, Payload, Result};

use serde::de::DeserializeOwned;
use std::borrow::Cow;

/// An HTTP response, either read off the wire or rebuilt from one entry of a
/// batch envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A JSON response with the given status.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(
            status,
            vec![("Content-Type".to_string(), "application/json".to_string())],
            body.to_string().into_bytes(),
        )
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Look up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.body
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn json_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn json_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// The body as an error payload: parsed JSON when possible, raw text
    /// otherwise.
    pub fn payload(&self) -> Payload {
        match serde_json::from_slice::<serde_json::Value>(&self.body) {
            Ok(json) => Payload::Json(json),
            Err(_) => Payload::from(self.text().into_owned()),
        }
    }

    /// Map `>= 400` statuses onto the error taxonomy; pass anything else
    /// through.
    pub fn validate(self) -> Result<Self> {
        if self.status < 400 {
            return Ok(self);
        }

        let Ok(json) = serde_json::from_slice::<serde_json::Value>(&self.body) else {
            return Err(Error::request_with_status(
                self.status,
                self.text().into_owned(),
            ));
        };

        Err(match self.status {
            404 => Error::not_found(json),
            403 => Error::authorization(json),
            401 => Error::authentication(json),
            status => Error::request_with_status(status, json),
        })
    }
}
