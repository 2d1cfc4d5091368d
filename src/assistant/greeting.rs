use chrono::{ DateTime, Local, Timelike, Utc };

use crate::config::questions::{ ALLOWED_QUESTIONS, ASSISTANT_NAME };
use crate::models::chat::{ ChatMessage, Originator };

pub fn time_of_day_greeting(hour: u32) -> &'static str {
    if hour < 12 {
        "Good morning"
    } else if hour < 18 {
        "Good afternoon"
    } else {
        "Good evening"
    }
}

/// Intro line for the page the widget was opened on.
pub fn page_intro(path: &str) -> &'static str {
    if path.starts_with("/products") {
        "You are on the Products page."
    } else if path.starts_with("/solutions") {
        "You are on the Solutions page."
    } else if path.starts_with("/contact") {
        "You are on the Contact page."
    } else {
        "Welcome to Magnum\u{2011}Lima Fish."
    }
}

pub fn greeting_text(hour: u32, path: &str) -> String {
    let list = ALLOWED_QUESTIONS.iter()
        .enumerate()
        .map(|(i, entry)| format!("{}. {}", i + 1, entry.question))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}! I'm {}. {}\n\nYou can ask me exactly one of these questions:\n{}",
        time_of_day_greeting(hour),
        ASSISTANT_NAME,
        page_intro(path),
        list
    )
}

/// Fresh single-message conversation used when nothing usable is stored.
pub fn seed_message(path: &str, now: DateTime<Utc>) -> ChatMessage {
    let hour = now.with_timezone(&Local).hour();
    ChatMessage {
        id: now.timestamp_millis().to_string(),
        text: greeting_text(hour, path),
        originator: Originator::Bot,
        timestamp: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_follows_the_clock() {
        assert_eq!(time_of_day_greeting(0), "Good morning");
        assert_eq!(time_of_day_greeting(11), "Good morning");
        assert_eq!(time_of_day_greeting(12), "Good afternoon");
        assert_eq!(time_of_day_greeting(17), "Good afternoon");
        assert_eq!(time_of_day_greeting(18), "Good evening");
        assert_eq!(time_of_day_greeting(23), "Good evening");
    }

    #[test]
    fn intro_depends_on_page() {
        assert_eq!(page_intro("/products/fish-feed"), "You are on the Products page.");
        assert_eq!(page_intro("/solutions"), "You are on the Solutions page.");
        assert_eq!(page_intro("/contact"), "You are on the Contact page.");
        assert_eq!(page_intro("/"), "Welcome to Magnum\u{2011}Lima Fish.");
        assert_eq!(page_intro("/news"), "Welcome to Magnum\u{2011}Lima Fish.");
    }

    #[test]
    fn greeting_lists_numbered_questions() {
        let text = greeting_text(9, "/products");
        assert!(text.starts_with("Good morning! I'm Magnum Assistant. You are on the Products page.\n\n"));
        assert!(text.contains("You can ask me exactly one of these questions:\n1. What products do you offer?"));
        assert!(text.ends_with("5. Show me your products"));
    }

    #[test]
    fn seed_message_is_from_the_bot() {
        let now = Utc::now();
        let seed = seed_message("/", now);
        assert!(seed.is_bot());
        assert_eq!(seed.timestamp, now);
        assert_eq!(seed.id, now.timestamp_millis().to_string());
    }
}
