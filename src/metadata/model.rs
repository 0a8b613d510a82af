//! The metadata record stored in images

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Field names of the standard (non-custom) part of the record
pub const STANDARD_FIELDS: &[&str] = &[
    "prompt",
    "model",
    "date",
    "description",
    "tags",
    "copyright",
    "artist",
];

/// Key under which custom fields are grouped; never itself a custom field
pub const CUSTOM_FIELDS_KEY: &str = "custom_fields";

/// Prefix that marks custom fields in flat key/value stores
pub const CUSTOM_PREFIX: &str = "custom_";

/// A record failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// Generation metadata of one image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Prompt used to generate the image (may be empty)
    #[serde(default)]
    pub prompt: String,
    /// Generator model; required when writing
    #[serde(default)]
    pub model: String,
    /// ISO date (`YYYY-MM-DD`) or date-time
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub copyright: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
}

impl ImageMetadata {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    /// Check the record can be written to an image
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.model.trim().is_empty() {
            return Err(ValidationError(
                "model is required and cannot be empty".to_string(),
            ));
        }

        if let Some(date) = &self.date {
            if !is_iso_date(date) {
                return Err(ValidationError(format!(
                    "date must be in ISO format (YYYY-MM-DD), got: {}",
                    date
                )));
            }
        }

        for key in self.custom_fields.keys() {
            if key.trim().is_empty() {
                return Err(ValidationError("custom field name cannot be empty".to_string()));
            }
            if key == CUSTOM_FIELDS_KEY || STANDARD_FIELDS.contains(&key.as_str()) {
                return Err(ValidationError(format!(
                    "custom field '{}' clashes with a standard field",
                    key
                )));
            }
        }

        Ok(())
    }

    /// No field carries a value
    pub fn is_empty(&self) -> bool {
        self.populated_fields().is_empty() && self.custom_fields.is_empty()
    }

    /// Names of the standard fields that carry a value
    pub fn populated_fields(&self) -> Vec<&'static str> {
        let present = [
            !self.prompt.trim().is_empty(),
            !self.model.trim().is_empty(),
            is_set(&self.date),
            is_set(&self.description),
            !self.tags.is_empty(),
            is_set(&self.copyright),
            is_set(&self.artist),
        ];
        STANDARD_FIELDS
            .iter()
            .zip(present)
            .filter_map(|(name, set)| set.then_some(*name))
            .collect()
    }

    /// Overlay `self` on `existing`: every field `self` sets wins, the rest
    /// is kept. Custom fields merge key by key.
    pub fn merged_over(&self, existing: &ImageMetadata) -> ImageMetadata {
        fn pick(new: &Option<String>, old: &Option<String>) -> Option<String> {
            if is_set(new) {
                new.clone()
            } else {
                old.clone()
            }
        }
        fn pick_text(new: &str, old: &str) -> String {
            if new.trim().is_empty() {
                old.trim().to_string()
            } else {
                new.trim().to_string()
            }
        }

        let mut custom_fields = existing.custom_fields.clone();
        custom_fields.extend(
            self.custom_fields
                .iter()
                .filter(|(key, _)| key.as_str() != CUSTOM_FIELDS_KEY)
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        ImageMetadata {
            prompt: pick_text(&self.prompt, &existing.prompt),
            model: pick_text(&self.model, &existing.model),
            date: pick(&self.date, &existing.date),
            description: pick(&self.description, &existing.description),
            tags: if self.tags.is_empty() {
                existing.tags.clone()
            } else {
                self.tags.clone()
            },
            copyright: pick(&self.copyright, &existing.copyright),
            artist: pick(&self.artist, &existing.artist),
            custom_fields,
        }
    }

    /// Set a field by name from a flat key/value source.
    ///
    /// `custom_<key>` and unknown names go to `custom_fields`; empty values
    /// are ignored.
    pub fn set_field(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        match key {
            "prompt" => self.prompt = value.to_string(),
            "model" => self.model = value.to_string(),
            "date" => self.date = Some(value.to_string()),
            "description" => self.description = Some(value.to_string()),
            "tags" => self.tags = split_tags(value),
            "copyright" => self.copyright = Some(value.to_string()),
            "artist" => self.artist = Some(value.to_string()),
            CUSTOM_FIELDS_KEY => {}
            _ => {
                let name = key.strip_prefix(CUSTOM_PREFIX).unwrap_or(key);
                if !name.is_empty() && name != CUSTOM_FIELDS_KEY {
                    self.custom_fields.insert(name.to_string(), value.to_string());
                }
            }
        }
    }

    /// Build a record from flat key/value pairs (a CSV row)
    pub fn from_fields<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut meta = Self::default();
        for (key, value) in fields {
            meta.set_field(key, value.trim());
        }
        meta
    }

    /// Build a record from a JSON object, leniently.
    ///
    /// Tags may be a list or a comma-separated string, `custom_fields` may be
    /// nested, nulls are skipped and other scalars are stringified.
    pub fn from_json_value(value: &Value) -> Result<Self, ValidationError> {
        let object = value
            .as_object()
            .ok_or_else(|| ValidationError("metadata record must be a JSON object".to_string()))?;

        let mut meta = Self::default();
        for (key, value) in object {
            match (key.as_str(), value) {
                (_, Value::Null) => {}
                ("tags", Value::Array(items)) => {
                    meta.tags = items
                        .iter()
                        .filter_map(scalar_text)
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty())
                        .collect();
                }
                (CUSTOM_FIELDS_KEY, Value::Object(custom)) => {
                    for (name, value) in custom {
                        if let Some(text) = scalar_text(value) {
                            if name != CUSTOM_FIELDS_KEY {
                                meta.custom_fields.insert(name.clone(), text);
                            }
                        }
                    }
                }
                (key, value) => {
                    if let Some(text) = scalar_text(value) {
                        meta.set_field(key, &text);
                    }
                }
            }
        }
        Ok(meta)
    }

    /// Tags joined the way flat stores keep them
    pub fn tags_joined(&self) -> String {
        self.tags.join(", ")
    }
}

/// Split a comma-separated tag list, dropping blanks
pub fn split_tags(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `value` is an ISO 8601 date or date-time
pub fn is_iso_date(value: &str) -> bool {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(value, fmt).is_ok())
        || DateTime::parse_from_rfc3339(value).is_ok()
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |v| !v.trim().is_empty())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
