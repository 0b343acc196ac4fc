use std::net::IpAddr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{ser::SerializeMap, Serialize, Serializer};
use serde_json::Value;

/// A single constraint applied to one field of a JSON body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    /// Must not be blank when present.
    Filled,
    Nullable,
    String,
    Max(usize),
    Min(usize),
    Email,
    Ip,
}

pub type Schema = &'static [(&'static str, &'static [Rule])];

pub const CREATE_USER: Schema = &[
    ("name", &[Rule::Required, Rule::String, Rule::Max(255)]),
    ("email", &[Rule::Required, Rule::String, Rule::Email, Rule::Max(255)]),
    ("password", &[Rule::Required, Rule::String, Rule::Min(8)]),
    ("ip", &[Rule::Nullable, Rule::Ip]),
    ("comment", &[Rule::Nullable, Rule::String]),
];

pub const UPDATE_USER: Schema = &[
    ("name", &[Rule::Filled, Rule::String, Rule::Max(255)]),
    ("password", &[Rule::Nullable, Rule::String, Rule::Min(8)]),
    ("ip", &[Rule::Nullable, Rule::Ip]),
    ("comment", &[Rule::Nullable, Rule::String]),
];

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Field errors in schema order; serializes as `{field: [messages]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: Vec<(String, Vec<String>)>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        match self.fields.iter_mut().find(|(f, _)| f == field) {
            Some((_, messages)) => messages.push(message.into()),
            None => self.fields.push((field.to_string(), vec![message.into()])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, m)| m.as_slice())
    }

    pub fn first_message(&self) -> Option<&str> {
        self.fields
            .first()
            .and_then(|(_, m)| m.first())
            .map(String::as_str)
    }
}

impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (field, messages) in &self.fields {
            map.serialize_entry(field, messages)?;
        }
        map.end()
    }
}

/// Turns blank strings into null for fields the schema marks `Nullable`,
/// so `{"ip": ""}` reads the same as `{"ip": null}`.
pub fn blank_to_null(schema: Schema, body: &mut Value) {
    let Some(fields) = body.as_object_mut() else {
        return;
    };
    for (field, rules) in schema {
        if !rules.contains(&Rule::Nullable) {
            continue;
        }
        if let Some(value) = fields.get_mut(*field) {
            if matches!(value, Value::String(s) if s.trim().is_empty()) {
                *value = Value::Null;
            }
        }
    }
}

/// Checks `body` against `schema`. Non-object bodies are treated as empty.
pub fn validate(schema: Schema, body: &Value) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    for (field, rules) in schema {
        check_field(field, rules, body.get(field), &mut errors);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_field(field: &str, rules: &[Rule], value: Option<&Value>, errors: &mut ValidationErrors) {
    let required = rules.contains(&Rule::Required);
    let value = match value {
        None | Some(Value::Null) => {
            if required {
                errors.add(field, format!("The {field} field is required."));
            }
            return;
        }
        Some(v) => v,
    };

    if matches!(value, Value::String(s) if s.trim().is_empty()) {
        if required {
            errors.add(field, format!("The {field} field is required."));
            return;
        }
        if rules.contains(&Rule::Filled) {
            errors.add(field, format!("The {field} field must have a value."));
            return;
        }
    }

    for rule in rules {
        match rule {
            Rule::Required | Rule::Filled | Rule::Nullable => {}
            Rule::String => {
                if !value.is_string() {
                    errors.add(field, format!("The {field} field must be a string."));
                    return;
                }
            }
            Rule::Max(max) => {
                if let Some(s) = value.as_str() {
                    if s.chars().count() > *max {
                        errors.add(
                            field,
                            format!("The {field} field must not be greater than {max} characters."),
                        );
                    }
                }
            }
            Rule::Min(min) => {
                if let Some(s) = value.as_str() {
                    if s.chars().count() < *min {
                        errors.add(
                            field,
                            format!("The {field} field must be at least {min} characters."),
                        );
                    }
                }
            }
            Rule::Email => {
                if !value.as_str().is_some_and(is_valid_email) {
                    errors.add(field, format!("The {field} field must be a valid email address."));
                }
            }
            Rule::Ip => {
                if !value.as_str().is_some_and(|s| s.parse::<IpAddr>().is_ok()) {
                    errors.add(field, format!("The {field} field must be a valid IP address."));
                }
            }
        }
    }
}
