//! Reply draft composition from an analyzed letter.
//!
//! The reply goes back to the letter's sender, signed by its recipient, so
//! the header roles are swapped. Pure and deterministic: no clock, no
//! randomness.

use crate::models::{LetterAnalysis, NOT_DETECTED};

/// Body used when the analysis carries no text.
pub const BODY_PLACEHOLDER: &str = "[Reply text to be completed]";

const SENDER_PLACEHOLDER: &str = "[Your name and address]";
const ADDRESSEE_PLACEHOLDER: &str = "[Recipient]";
const DATE_PLACEHOLDER: &str = "[Date]";

/// Compose a reply draft. Calling twice with the same analysis yields
/// byte-identical output.
pub fn compose(analysis: &LetterAnalysis) -> String {
    let subject = detected(&analysis.subject);
    let letter_date = detected(&analysis.date);
    let document_type = detected(&analysis.document_type);

    let mut lines = vec![
        format!("From: {}", detected(&analysis.recipient).unwrap_or(SENDER_PLACEHOLDER)),
        format!("To: {}", detected(&analysis.sender).unwrap_or(ADDRESSEE_PLACEHOLDER)),
        format!("Date: {DATE_PLACEHOLDER}"),
        match subject {
            Some(subject) => format!("Subject: Re: {subject}"),
            None => "Subject: Re: your letter".to_string(),
        },
        String::new(),
    ];

    lines.push(reference_line(document_type, letter_date));
    lines.push(String::new());

    let body = analysis.full_text.trim();
    lines.push(if body.is_empty() {
        BODY_PLACEHOLDER.to_string()
    } else {
        body.to_string()
    });

    lines.push(String::new());
    lines.push("Kind regards,".to_string());
    lines.push(detected(&analysis.recipient).unwrap_or(SENDER_PLACEHOLDER).to_string());

    lines.join("\n")
}

fn reference_line(document_type: Option<&str>, letter_date: Option<&str>) -> String {
    match (document_type, letter_date) {
        (Some(kind), Some(date)) => format!("Regarding your {kind} dated {date}."),
        (Some(kind), None) => format!("Regarding your {kind}."),
        (None, Some(date)) => format!("Regarding your letter dated {date}."),
        (None, None) => "Regarding your letter.".to_string(),
    }
}

fn detected(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == NOT_DETECTED {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tax_letter() -> LetterAnalysis {
        LetterAnalysis {
            document_type: "tax assessment".into(),
            sender: "Finanzamt Berlin".into(),
            recipient: "J. Doe".into(),
            date: "2024-03-01".into(),
            subject: "Steuerbescheid".into(),
            full_text: "Ihr Einkommensteuerbescheid 2023 ...".into(),
        }
    }

    #[test]
    fn draft_contains_headers_and_swaps_roles() {
        let draft = compose(&tax_letter());
        assert!(draft.starts_with("From: J. Doe\nTo: Finanzamt Berlin\n"));
        assert!(draft.contains("Subject: Re: Steuerbescheid"));
        assert!(draft.contains("Regarding your tax assessment dated 2024-03-01."));
        assert!(draft.contains("Ihr Einkommensteuerbescheid 2023 ..."));
    }

    #[test]
    fn compose_is_idempotent() {
        let analysis = tax_letter();
        assert_eq!(compose(&analysis), compose(&analysis));
        let empty = LetterAnalysis::empty();
        assert_eq!(compose(&empty), compose(&empty));
    }

    #[test]
    fn empty_text_uses_placeholder() {
        let draft = compose(&LetterAnalysis::empty());
        assert!(draft.contains(BODY_PLACEHOLDER));
        assert!(!draft.contains(NOT_DETECTED));
        assert!(draft.contains("To: [Recipient]"));
        assert!(draft.contains("Regarding your letter."));
    }

    #[test]
    fn whitespace_only_text_uses_placeholder() {
        let mut analysis = tax_letter();
        analysis.full_text = "  \n\t".into();
        assert!(compose(&analysis).contains(BODY_PLACEHOLDER));
    }
}
