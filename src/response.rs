use serde_json::{Map, Value};

use crate::error::ExtractionError;

/// Recover the JSON object embedded in a model completion.
///
/// Models often wrap the payload in prose or a fenced block, so the candidate
/// is the span from the first `{` to the last `}`. Nesting is not tracked:
/// two separate objects in one completion produce an unparsable candidate.
/// A completion without any `{`, or whose only `}` come before the first `{`,
/// has no candidate. An opening brace with no `}` anywhere is a truncated
/// payload and fails to parse.
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>, ExtractionError> {
    let candidate = json_candidate(text).ok_or(ExtractionError::NoJsonFound)?;
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) | Err(_) => Err(ExtractionError::InvalidJson),
    }
}

fn json_candidate(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    match text.rfind('}') {
        Some(end) if end > start => Some(&text[start..=end]),
        Some(_) => None,
        None => Some(&text[start..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IdentityRecord;
    use crate::normalize::normalize;
    use pretty_assertions::assert_eq;

    fn sample_record() -> IdentityRecord {
        IdentityRecord {
            nome: "Marco".into(),
            cognome: "Rossi".into(),
            data_nascita: "15/03/1985".into(),
            luogo_nascita: "Milano".into(),
            codice_fiscale: "RSSMRA85C15F205X".into(),
            numero_documento: "CA12345678".into(),
            data_rilascio: "01/02/2020".into(),
            data_scadenza: "".into(),
        }
    }

    #[test]
    fn recovers_record_wrapped_in_prose() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let completion = format!("Ecco il risultato:\n```json\n{}\n```\nSpero sia utile.", json);

        let map = extract_json_object(&completion).unwrap();
        assert_eq!(normalize(&Value::Object(map)), record);
    }

    #[test]
    fn bare_object_parses() {
        let map = extract_json_object(r#"{"nome":"Anna"}"#).unwrap();
        assert_eq!(map["nome"], "Anna");
    }

    #[test]
    fn no_braces_is_no_json_found() {
        let err = extract_json_object("Non ho trovato dati nel testo.").unwrap_err();
        assert_eq!(err, ExtractionError::NoJsonFound);
    }

    #[test]
    fn closing_brace_alone_is_no_json_found() {
        let err = extract_json_object("stray } only").unwrap_err();
        assert_eq!(err, ExtractionError::NoJsonFound);
    }

    #[test]
    fn opening_brace_alone_is_invalid_json() {
        let err = extract_json_object("only an opening { here").unwrap_err();
        assert_eq!(err, ExtractionError::InvalidJson);
    }

    #[test]
    fn reversed_braces_are_no_json_found() {
        assert_eq!(
            extract_json_object("} reversed {").unwrap_err(),
            ExtractionError::NoJsonFound
        );
        assert_eq!(
            extract_json_object("chiuso } poi aperto { senza fine").unwrap_err(),
            ExtractionError::NoJsonFound
        );
    }

    #[test]
    fn broken_payload_is_invalid_json() {
        let err = extract_json_object("{not valid json}").unwrap_err();
        assert_eq!(err, ExtractionError::InvalidJson);
    }

    #[test]
    fn truncated_payload_is_invalid_json() {
        let err = extract_json_object("{not valid json").unwrap_err();
        assert_eq!(err, ExtractionError::InvalidJson);
        let err = extract_json_object(r#"{"nome":"Marco","cognome":"Ro"#).unwrap_err();
        assert_eq!(err, ExtractionError::InvalidJson);
    }

    #[test]
    fn two_objects_span_is_invalid_json() {
        let err = extract_json_object(r#"{"a":1} and {"b":2}"#).unwrap_err();
        assert_eq!(err, ExtractionError::InvalidJson);
    }

    #[test]
    fn nested_objects_are_kept() {
        let map = extract_json_object(r#"x {"nome":"A","meta":{"k":1}} y"#).unwrap();
        assert_eq!(map["meta"]["k"], 1);
    }
}
