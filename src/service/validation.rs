//! Field validation for form and row payloads.

use crate::error::AppError;
use crate::sql::RowData;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default)]
pub struct ValidationRule {
    pub required: bool,
    /// "email" or "uuid".
    pub format: Option<String>,
    pub min_length: Option<u32>,
    pub max_length: Option<u32>,
}

impl ValidationRule {
    pub fn required() -> Self {
        ValidationRule {
            required: true,
            ..Default::default()
        }
    }

    pub fn format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    pub fn min_length(mut self, n: u32) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: u32) -> Self {
        self.max_length = Some(n);
        self
    }
}

pub type Rules = BTreeMap<String, ValidationRule>;

pub struct RequestValidator;

impl RequestValidator {
    /// Check every rule and report all failures at once.
    pub fn validate(body: &RowData, rules: &Rules) -> Result<(), AppError> {
        let errors = Self::errors(body, rules);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors.join("; ")))
        }
    }

    /// Failure messages, in column order. Empty when the payload is valid.
    pub fn errors(body: &RowData, rules: &Rules) -> Vec<String> {
        let mut errors = Vec::new();
        for (col, rule) in rules {
            match body.get(col) {
                None | Some(Value::Null) if rule.required => errors.push(format!("{} is required", col)),
                Some(Value::String(s)) if rule.required && s.trim().is_empty() => {
                    errors.push(format!("{} is required", col))
                }
                Some(v) => {
                    if let Err(msg) = check_field(col, v, rule) {
                        errors.push(msg);
                    }
                }
                None => {}
            }
        }
        errors
    }
}

fn check_field(col: &str, v: &Value, rule: &ValidationRule) -> Result<(), String> {
    if v.is_null() {
        return Ok(());
    }
    if let (Some(format), Some(s)) = (&rule.format, v.as_str()) {
        match format.to_lowercase().as_str() {
            "email" => {
                let ok = s
                    .split_once('@')
                    .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.') && !domain.ends_with('.'));
                if !ok {
                    return Err(format!("{} must be a valid email", col));
                }
            }
            "uuid" if uuid::Uuid::parse_str(s).is_err() => {
                return Err(format!("{} must be a valid UUID", col));
            }
            _ => {}
        }
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                return Err(format!("{} must be at most {} characters", col, max));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                return Err(format!("{} must be at least {} characters", col, min));
            }
        }
    }
    Ok(())
}
