use serde_json::{Map, Value};

use crate::models::{LetterAnalysis, NOT_DETECTED};

const DOCUMENT_TYPE_KEYS: &[&str] = &["documentType", "document_type", "type", "dokumenttyp"];
const SENDER_KEYS: &[&str] = &["sender", "from", "absender"];
const RECIPIENT_KEYS: &[&str] = &["recipient", "to", "empfaenger", "empfänger"];
const DATE_KEYS: &[&str] = &["date", "datum"];
const SUBJECT_KEYS: &[&str] = &["subject", "betreff"];
const FULL_TEXT_KEYS: &[&str] = &["fullText", "full_text", "text", "volltext"];

/// Total parse of a vision model response. Never fails: when no structured
/// object can be recovered, every header is [`NOT_DETECTED`] and the raw
/// response becomes `full_text` verbatim.
pub fn parse_or_fallback(raw: &str) -> LetterAnalysis {
    parse_structured(raw).unwrap_or_else(|| LetterAnalysis::undetected(raw.to_string()))
}

/// Recover the structured object, defaulting each field independently.
/// An object without any recognized key is not the expected shape.
pub fn parse_structured(raw: &str) -> Option<LetterAnalysis> {
    let candidate = extract_json_candidate(raw)?;
    let value: Value = serde_json::from_str(candidate).ok()?;
    let object = value.as_object()?;
    if !has_recognized_key(object) {
        return None;
    }

    Some(LetterAnalysis {
        document_type: header_field(object, DOCUMENT_TYPE_KEYS),
        sender: header_field(object, SENDER_KEYS),
        recipient: header_field(object, RECIPIENT_KEYS),
        date: header_field(object, DATE_KEYS),
        subject: header_field(object, SUBJECT_KEYS),
        full_text: lookup(object, FULL_TEXT_KEYS).unwrap_or_default(),
    })
}

/// Prefer a fenced ```json block, else the outermost `{...}` span unless
/// that span sits inside a `[...]`.
fn extract_json_candidate(raw: &str) -> Option<&str> {
    if let Some(start) = raw.find("```json") {
        let content_start = start + 7;
        if let Some(len) = raw[content_start..].find("```") {
            return Some(raw[content_start..content_start + len].trim());
        }
    }

    let open = raw.find('{')?;
    let close = raw.rfind('}')?;
    if close <= open {
        return None;
    }
    if raw[..open].contains('[') && raw[close..].contains(']') {
        return None;
    }
    Some(&raw[open..=close])
}

fn has_recognized_key(object: &Map<String, Value>) -> bool {
    [
        DOCUMENT_TYPE_KEYS,
        SENDER_KEYS,
        RECIPIENT_KEYS,
        DATE_KEYS,
        SUBJECT_KEYS,
        FULL_TEXT_KEYS,
    ]
    .iter()
    .flat_map(|keys| keys.iter())
    .any(|key| object.contains_key(*key))
}

fn header_field(object: &Map<String, Value>, keys: &[&str]) -> String {
    lookup(object, keys)
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| NOT_DETECTED.to_string())
}

/// First key present with a scalar value, scalars rendered as text.
fn lookup(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match object.get(*key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_object() {
        let raw = r#"{
            "documentType": "Tax assessment",
            "sender": "Finanzamt Berlin",
            "recipient": "J. Doe",
            "date": "2024-03-01",
            "subject": "Steuerbescheid",
            "fullText": "Sehr geehrte Frau Doe, ..."
        }"#;
        let analysis = parse_or_fallback(raw);
        assert_eq!(analysis.sender, "Finanzamt Berlin");
        assert_eq!(analysis.subject, "Steuerbescheid");
        assert_eq!(analysis.full_text, "Sehr geehrte Frau Doe, ...");
    }

    #[test]
    fn parses_fenced_block_with_surrounding_prose() {
        let raw = "Here you go:\n```json\n{\"sender\": \"AOK\", \"subject\": \"Beitrag\"}\n```\nHope it helps.";
        let analysis = parse_or_fallback(raw);
        assert_eq!(analysis.sender, "AOK");
        assert_eq!(analysis.subject, "Beitrag");
        assert_eq!(analysis.recipient, NOT_DETECTED);
        assert_eq!(analysis.full_text, "");
    }

    #[test]
    fn non_json_falls_back_to_verbatim_text() {
        let raw = "  I could not find a JSON structure, but the letter says: pay by May.  ";
        let analysis = parse_or_fallback(raw);
        assert_eq!(analysis.full_text, raw);
        assert_eq!(analysis.sender, NOT_DETECTED);
        assert_eq!(analysis.document_type, NOT_DETECTED);
        assert_eq!(analysis.date, NOT_DETECTED);
    }

    #[test]
    fn broken_json_falls_back() {
        let raw = "{\"sender\": \"Finanzamt\", \"subject\": ";
        let analysis = parse_or_fallback(raw);
        assert_eq!(analysis.full_text, raw);
    }

    #[test]
    fn json_array_is_not_the_expected_object() {
        let raw = "[{\"sender\": \"x\"}]";
        assert!(parse_structured(raw).is_none());
        assert_eq!(parse_or_fallback(raw).full_text, raw);
    }

    #[test]
    fn scalar_values_coerced_and_blanks_defaulted() {
        let raw = r#"{"sender": "  ", "date": 20240301, "subject": null, "recipient": ["a"], "fullText": "body"}"#;
        let analysis = parse_or_fallback(raw);
        assert_eq!(analysis.sender, NOT_DETECTED);
        assert_eq!(analysis.date, "20240301");
        assert_eq!(analysis.subject, NOT_DETECTED);
        assert_eq!(analysis.recipient, NOT_DETECTED);
        assert_eq!(analysis.full_text, "body");
    }

    #[test]
    fn snake_case_and_german_keys_accepted() {
        let raw = r#"{"document_type": "Mahnung", "absender": "Stadtwerke", "betreff": "Zahlungserinnerung", "full_text": "..."}"#;
        let analysis = parse_or_fallback(raw);
        assert_eq!(analysis.document_type, "Mahnung");
        assert_eq!(analysis.sender, "Stadtwerke");
        assert_eq!(analysis.subject, "Zahlungserinnerung");
    }

    #[test]
    fn empty_object_in_prose_keeps_raw_text() {
        let raw = "I see a letter but cannot read it. {}";
        assert!(parse_structured(raw).is_none());
        let analysis = parse_or_fallback(raw);
        assert_eq!(analysis.full_text, raw);
        assert_eq!(analysis.sender, NOT_DETECTED);
    }

    #[test]
    fn unrelated_object_in_prose_keeps_raw_text() {
        let raw = "The letter says: pay 120 EUR by May. Reference {\"ref\": 42}";
        let analysis = parse_or_fallback(raw);
        assert_eq!(analysis.full_text, raw);
        assert_eq!(analysis.subject, NOT_DETECTED);
    }

    #[test]
    fn bracketed_note_before_object_is_not_an_array() {
        let raw = "[note] {\"sender\": \"AOK\"}";
        assert_eq!(parse_or_fallback(raw).sender, "AOK");
    }

    #[test]
    fn empty_input_yields_empty_text() {
        assert_eq!(parse_or_fallback("").full_text, "");
    }
}
