use super::types::DocumentContext;

/// Starts the draft section of a model reply.
pub const DRAFT_MARKER: &str = "[DRAFT]";

/// Letter text beyond this many characters is cut from the prompt.
const MAX_CONTEXT_CHARS: usize = 12_000;

const BASE_PROMPT: &str = "\
You are Lettera, an assistant that helps people understand official letters \
and write replies to them. Answer in the language the user writes in. Be \
concise and concrete. Do not invent facts about the letter.";

const DRAFT_INSTRUCTIONS: &str = "\
When you propose a new or revised reply letter, first write your short \
conversational answer, then a line containing only [DRAFT], then the complete \
letter text and nothing after it. Never write [DRAFT] for any other purpose.";

const GENERAL_MODE: &str = "\
No letter is selected. Help with general questions about correspondence with \
authorities, insurers, landlords and companies.";

/// System prompt for general mode or grounded on one document.
pub fn build_system_prompt(context: Option<&DocumentContext>) -> String {
    let mut prompt = String::from(BASE_PROMPT);
    prompt.push_str("\n\n");
    prompt.push_str(DRAFT_INSTRUCTIONS);
    prompt.push_str("\n\n");

    let Some(context) = context else {
        prompt.push_str(GENERAL_MODE);
        return prompt;
    };

    prompt.push_str("<LETTER>\n");
    if let Some(analysis) = &context.analysis {
        prompt.push_str(&format!("Type: {}\n", analysis.document_type));
        prompt.push_str(&format!("Sender: {}\n", analysis.sender));
        prompt.push_str(&format!("Recipient: {}\n", analysis.recipient));
        prompt.push_str(&format!("Date: {}\n", analysis.date));
        prompt.push_str(&format!("Subject: {}\n", analysis.subject));
    }
    let text = context
        .ocr_text
        .as_deref()
        .or(context.analysis.as_ref().map(|a| a.full_text.as_str()))
        .unwrap_or("");
    if !text.trim().is_empty() {
        prompt.push_str("Text:\n");
        prompt.push_str(truncate_chars(text.trim(), MAX_CONTEXT_CHARS));
        prompt.push('\n');
    }
    prompt.push_str("</LETTER>\n");

    if let Some(draft) = context.current_draft.as_deref().filter(|d| !d.trim().is_empty()) {
        prompt.push_str("\n<CURRENT_DRAFT>\n");
        prompt.push_str(draft.trim());
        prompt.push_str("\n</CURRENT_DRAFT>\n");
    }
    prompt
}

/// Split a model reply at the first [`DRAFT_MARKER`]: text before is the
/// reply, text after is the draft, both trimmed. A marker with nothing after
/// it yields no draft.
pub fn split_reply(text: &str) -> (String, Option<String>) {
    match text.split_once(DRAFT_MARKER) {
        Some((reply, draft)) => {
            let draft = draft.trim();
            let draft = (!draft.is_empty()).then(|| draft.to_string());
            (reply.trim().to_string(), draft)
        }
        None => (text.trim().to_string(), None),
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
