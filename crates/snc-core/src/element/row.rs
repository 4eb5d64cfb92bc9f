use super::{DisplayValue, GlideElement, SerializeOptions};
use crate::{Error, Result, PRIMARY_KEY};

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// One record: field name to cell, in server order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: IndexMap<String, GlideElement>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialize one `result` entry of a Table API response.
    pub fn from_json(raw: Value) -> Result<Row> {
        match raw {
            Value::Object(obj) => Ok(Row::from_map(obj)),
            other => Err(Error::invalid_response(format!(
                "expected a record object, got {other}"
            ))),
        }
    }

    pub fn from_map(obj: Map<String, Value>) -> Row {
        let fields = obj
            .into_iter()
            .map(|(name, raw)| {
                let element = GlideElement::from_json(name.clone(), raw);
                (name, element)
            })
            .collect();
        Row { fields }
    }

    pub fn get(&self, name: &str) -> Option<&GlideElement> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut GlideElement> {
        self.fields.get_mut(name)
    }

    /// The cell for `name`, created empty if the row does not have it yet.
    pub fn element_mut(&mut self, name: &str) -> &mut GlideElement {
        self.fields
            .entry(name.to_string())
            .or_insert_with(|| GlideElement::new(name, Value::Null))
    }

    pub fn insert(&mut self, element: GlideElement) {
        self.fields.insert(element.name().to_string(), element);
    }

    /// Assign a value, creating the cell when missing. A created cell counts
    /// as changed unless `track_new` is false.
    pub fn set_value(&mut self, name: &str, value: impl Into<Value>, track_new: bool) {
        match self.fields.get_mut(name) {
            Some(element) => element.set_value(value),
            None => self.insert(GlideElement::new(name, value).with_changed(track_new)),
        }
    }

    pub fn set_display_value(&mut self, name: &str, value: impl Into<Value>, track_new: bool) {
        match self.fields.get_mut(name) {
            Some(element) => element.set_display_value(value),
            None => self.insert(GlideElement::display_only(name, value).with_changed(track_new)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Follow a reference field to a dot-walked field fetched alongside it,
    /// e.g. `department` + `name` reads the `department.name` column.
    pub fn dot_walk(&self, element: &GlideElement, item: &str) -> Option<&GlideElement> {
        self.get(&format!("{}.{item}", element.name()))
    }

    /// Look up a possibly dotted path such as `department.dept_head.email`.
    pub fn resolve(&self, path: &str) -> Option<&GlideElement> {
        if let Some(element) = self.get(path) {
            return Some(element);
        }

        let (base, item) = path.rsplit_once('.')?;
        let parent = self.resolve(base)?;
        self.dot_walk(parent, item)
    }

    pub fn sys_id(&self) -> Option<&str> {
        self.get(PRIMARY_KEY).and_then(GlideElement::as_str)
    }

    /// Whether any cell reports a change.
    pub fn changes(&self) -> bool {
        self.fields.values().any(GlideElement::changes)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GlideElement> {
        self.fields.values()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn serialize(&self, options: &SerializeOptions) -> Map<String, Value> {
        let mut out = Map::new();

        for (name, element) in &self.fields {
            if let Some(fields) = &options.fields {
                if !fields.iter().any(|field| field == name) {
                    continue;
                }
            }

            if options.changes_only && !element.changes() {
                continue;
            }

            let link = element.link().filter(|_| !options.exclude_reference_link);

            let value = match (options.display_value, link) {
                (DisplayValue::Value, None) => element.get_value().clone(),
                (DisplayValue::Display, None) => element.get_display_value().clone(),
                (DisplayValue::Both, None) => element.serialize(),
                (DisplayValue::Value, Some(link)) => serde_json::json!({
                    "value": element.get_value(),
                    "link": link,
                }),
                (DisplayValue::Display, Some(link)) => serde_json::json!({
                    "display_value": element.get_display_value(),
                    "link": link,
                }),
                (DisplayValue::Both, Some(link)) => serde_json::json!({
                    "value": element.get_value(),
                    "display_value": element.get_display_value(),
                    "link": link,
                }),
            };

            out.insert(name.clone(), value);
        }

        out
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = (&'a String, &'a GlideElement);
    type IntoIter = indexmap::map::Iter<'a, String, GlideElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
