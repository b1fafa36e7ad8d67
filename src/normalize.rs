use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::models::{IdentityRecord, FIELD_KEYS};

// ── Lazy static regexes ──────────────────────────────────────────────────────

static FISCAL_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9]{16}$").unwrap());

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{2}([/\-.])\d{2}([/\-.])\d{4}$").unwrap());

const DATE_KEYS: [&str; 3] = ["dataNascita", "dataRilascio", "dataScadenza"];

// ── Normalization ────────────────────────────────────────────────────────────

/// Coerce an arbitrary JSON value into the canonical record.
///
/// Never fails: missing keys, nulls, arrays and nested objects all become
/// `""`, unknown keys are dropped and a non-object input yields an empty
/// record.
pub fn normalize(raw: &Value) -> IdentityRecord {
    let mut record = IdentityRecord::default();
    let Some(obj) = raw.as_object() else {
        return record;
    };

    for key in FIELD_KEYS {
        let value = obj.get(key).map(coerce_to_string).unwrap_or_default();
        let value = if key == "codiceFiscale" {
            value.to_uppercase()
        } else {
            value
        };
        if let Some(slot) = record.field_mut(key) {
            *slot = value;
        }
    }

    record
}

fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

// ── Format checks ────────────────────────────────────────────────────────────

/// Describe values whose shape looks wrong for their field. Purely
/// informational; the record is returned unchanged either way.
pub fn format_warnings(record: &IdentityRecord) -> Vec<String> {
    let mut warnings = Vec::new();
    for (key, value) in record.fields() {
        if value.is_empty() {
            continue;
        }
        if key == "codiceFiscale" && !FISCAL_CODE_RE.is_match(value) {
            warnings.push(format!(
                "{}: atteso un codice di 16 caratteri alfanumerici",
                key
            ));
        } else if DATE_KEYS.contains(&key) && !is_date(value) {
            warnings.push(format!("{}: data non nel formato DD/MM/YYYY", key));
        }
    }
    warnings
}

fn is_date(value: &str) -> bool {
    DATE_RE
        .captures(value)
        .map(|caps| caps[1] == caps[2])
        .unwrap_or(false)
}
