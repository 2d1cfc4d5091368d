/// A pre-approved question and the canned answer the assistant gives for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowedQuestion {
    pub question: &'static str,
    pub answer: &'static str,
}

/// The only questions the assistant answers, in display order.
pub const ALLOWED_QUESTIONS: [AllowedQuestion; 5] = [
    AllowedQuestion {
        question: "What products do you offer?",
        answer: "We offer Fish Feed, Dog Food, Groundnut Meal, and Soybean Meal. Visit the Products page to browse all.",
    },
    AllowedQuestion {
        question: "How can I pay (Orange / MTN)?",
        answer: "You can pay with Orange Money and MTN Mobile Money during checkout on the Payment page.",
    },
    AllowedQuestion {
        question: "Where do you ship?",
        answer: "We ship locally and can coordinate regional deliveries. Contact us for details about your location.",
    },
    AllowedQuestion {
        question: "How do I contact support?",
        answer: "Use the Contact page to reach our team. We will get back to you promptly.",
    },
    AllowedQuestion {
        question: "Show me your products",
        answer: "Head to the Products page to see all items and filter by category.",
    },
];

pub const ASSISTANT_NAME: &str = "Magnum Assistant";

pub const FALLBACK_APOLOGY: &str =
    "Sorry, I can only answer predefined questions right now.\nPlease choose from:";

/// Storage key the browser widget uses for its conversation.
pub const DEFAULT_STORAGE_KEY: &str = "mlf_chat_v2_restricted";
