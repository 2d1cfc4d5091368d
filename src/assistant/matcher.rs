use crate::config::questions::{ ALLOWED_QUESTIONS, FALLBACK_APOLOGY };

pub fn normalize(input: &str) -> String {
    input.trim().to_lowercase()
}

/// Exact lookup against the allow-list. Only case and surrounding whitespace
/// are forgiven.
pub fn answer(input: &str) -> Option<&'static str> {
    let wanted = normalize(input);
    ALLOWED_QUESTIONS.iter()
        .find(|entry| normalize(entry.question) == wanted)
        .map(|entry| entry.answer)
}

pub fn fallback_message() -> String {
    let list = ALLOWED_QUESTIONS.iter()
        .map(|entry| format!("• {}", entry.question))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n{}", FALLBACK_APOLOGY, list)
}

/// The bot's reply to `input`: the canned answer, or the apology listing
/// every allowed question.
pub fn reply(input: &str) -> String {
    match answer(input) {
        Some(text) => text.to_string(),
        None => fallback_message(),
    }
}

pub fn quick_replies() -> Vec<String> {
    ALLOWED_QUESTIONS.iter()
        .map(|entry| entry.question.to_string())
        .collect()
}
