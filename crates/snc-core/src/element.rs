mod row;
pub use row::Row;

mod serialize;
pub use serialize::{DisplayValue, SerializeOptions};

use crate::{Error, Result};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

/// Format ServiceNow uses for date/time values. Values are always UTC; only
/// display values are rendered in the user's time zone.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The value, display value and reference link of one field of one row.
///
/// `Value::Null` means the value is unset. A display value is only kept when
/// the server sent one that differs from the value, or when one was set
/// explicitly.
#[derive(Debug, Clone, Default)]
pub struct GlideElement {
    name: String,
    value: Value,
    display_value: Option<Value>,
    link: Option<String>,
    changed: bool,
}

impl GlideElement {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    /// A cell that only carries a display value.
    pub fn display_only(name: impl Into<String>, display_value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            display_value: Some(display_value.into()),
            ..Default::default()
        }
    }

    /// Build a cell from one field of a Table API result.
    ///
    /// Depending on `sysparm_display_value` the server sends either a bare
    /// scalar or `{value, display_value, link?}`.
    pub fn from_json(name: impl Into<String>, raw: Value) -> Self {
        let name = name.into();

        let Value::Object(mut obj) = raw else {
            return Self::new(name, raw);
        };

        if !obj.contains_key("value") && !obj.contains_key("display_value") {
            return Self::new(name, Value::Object(obj));
        }

        let value = obj.remove("value").unwrap_or(Value::Null);
        let display_value = obj.remove("display_value").filter(|dv| *dv != value);
        let link = match obj.remove("link") {
            Some(Value::String(link)) => Some(link),
            _ => None,
        };

        Self {
            name,
            value,
            display_value,
            link,
            changed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value, falling back to the display value for display-only cells.
    pub fn get_value(&self) -> &Value {
        match (&self.value, &self.display_value) {
            (Value::Null, Some(display_value)) => display_value,
            (value, _) => value,
        }
    }

    /// The display value, falling back to the value when none was recorded.
    pub fn get_display_value(&self) -> &Value {
        match &self.display_value {
            Some(display_value) if !is_empty(display_value) => display_value,
            _ => &self.value,
        }
    }

    /// The value as a string slice, when it is one.
    pub fn as_str(&self) -> Option<&str> {
        self.get_value().as_str()
    }

    /// Assign a new value. A differing value marks the cell changed and drops
    /// the now stale display value.
    pub fn set_value(&mut self, value: impl Into<Value>) {
        let value = value.into();
        if self.value != value {
            self.changed = true;
            self.value = value;
            self.display_value = None;
        }
    }

    /// Assign a display value without touching the value.
    pub fn set_display_value(&mut self, display_value: impl Into<Value>) {
        let display_value = display_value.into();
        if self.display_value.as_ref() != Some(&display_value) {
            self.changed = true;
            self.display_value = Some(display_value);
        }
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    pub fn set_link(&mut self, link: impl Into<String>) {
        self.link = Some(link.into());
    }

    /// Whether the cell was mutated since it was materialized. Sticky: setting
    /// the original value back does not clear it.
    pub fn changes(&self) -> bool {
        self.changed
    }

    pub fn with_changed(mut self, changed: bool) -> Self {
        self.changed = changed;
        self
    }

    /// True when the value is unset or an empty string.
    pub fn nil(&self) -> bool {
        is_empty(&self.value)
    }

    /// Truthiness of the value. The string `"false"` counts as false since
    /// boolean fields arrive as strings.
    pub fn as_bool(&self) -> bool {
        match self.get_value() {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::String(s) => !(s.is_empty() || s == "false"),
            Value::Number(n) => n.as_f64().map(|n| n != 0.0).unwrap_or(true),
            Value::Array(items) => !items.is_empty(),
            Value::Object(obj) => !obj.is_empty(),
        }
    }

    /// `{value, display_value}`
    pub fn serialize(&self) -> Value {
        serde_json::json!({
            "value": self.get_value(),
            "display_value": self.get_display_value(),
        })
    }

    /// The value parsed as a UTC date/time.
    pub fn date_value(&self) -> Result<DateTime<Utc>> {
        let Some(text) = self.as_str() else {
            return Err(err!(
                "field `{}` does not hold a date/time string: {}",
                self.name,
                self.get_value()
            ));
        };

        NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|e| {
                Error::from(anyhow::Error::from(e))
                    .context(err!("field `{}` is not a date/time: {text:?}", self.name))
            })
    }

    /// Milliseconds since the Unix epoch.
    pub fn date_numeric_value(&self) -> Result<i64> {
        Ok(self.date_value()?.timestamp_millis())
    }

    pub fn set_date_numeric_value(&mut self, ms: i64) -> Result<()> {
        let Some(date) = DateTime::<Utc>::from_timestamp_millis(ms) else {
            return Err(err!("{ms}ms is out of range for a date/time"));
        };
        self.set_value(date.format(TIMESTAMP_FORMAT).to_string());
        Ok(())
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

impl core::fmt::Display for GlideElement {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self.get_value() {
            Value::Null => Ok(()),
            Value::String(s) => f.write_str(s),
            other => core::fmt::Display::fmt(other, f),
        }
    }
}

impl PartialEq for GlideElement {
    fn eq(&self, other: &Self) -> bool {
        self.get_value() == other.get_value()
    }
}

impl PartialEq<Value> for GlideElement {
    fn eq(&self, other: &Value) -> bool {
        self.get_value() == other
    }
}

impl PartialEq<str> for GlideElement {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl PartialEq<&str> for GlideElement {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl PartialEq<String> for GlideElement {
    fn eq(&self, other: &String) -> bool {
        self.as_str() == Some(other.as_str())
    }
}

impl PartialOrd for GlideElement {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        match (self.get_value(), other.get_value()) {
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Null, Value::Null) => Some(core::cmp::Ordering::Equal),
            _ => None,
        }
    }
}
