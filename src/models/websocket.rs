use serde::{ Serialize, Deserialize };
use crate::models::chat::ChatMessage;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    #[serde(rename = "quick_reply")] QuickReply {
        index: usize,
    },
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "close")]
    Close,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "history")] History {
        messages: Vec<ChatMessage>,
        quick_replies: Vec<String>,
    },
    #[serde(rename = "message")] Message {
        message: ChatMessage,
    },
    #[serde(rename = "typing")] Typing {
        composing: bool,
    },
    #[serde(rename = "unread")] Unread {
        count: u8,
        badge: Option<String>,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}
