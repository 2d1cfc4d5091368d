use log::{ debug, info };
use rand_core::{ OsRng, RngCore };
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{ mpsc, Mutex };
use tokio::task::JoinHandle;

use crate::assistant::matcher;
use crate::config::questions::ALLOWED_QUESTIONS;
use crate::conversation::store::ConversationStore;
use crate::models::chat::{ ChatMessage, Originator };

/// Randomized pause before the bot answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyDelay {
    min: Duration,
    max: Duration,
}

impl ReplyDelay {
    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min: Duration::from_millis(min_ms),
            max: Duration::from_millis(max_ms.max(min_ms)),
        }
    }

    /// Uniform in `[min, max)`, or exactly `min` when the bounds meet.
    pub fn sample(&self) -> Duration {
        let span = (self.max - self.min).as_millis() as u64;
        if span == 0 {
            return self.min;
        }
        self.min + Duration::from_millis(OsRng.next_u64() % span)
    }
}

impl Default for ReplyDelay {
    fn default() -> Self {
        Self::from_millis(600, 1300)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Appended(ChatMessage),
    Composing(bool),
    Unread {
        count: u8,
        badge: Option<String>,
    },
}

/// A live widget: the conversation plus the replies it is waiting on.
/// Pending replies are aborted when the session shuts down or is dropped.
pub struct ChatSession {
    store: Arc<Mutex<ConversationStore>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    delay: ReplyDelay,
    pending: Vec<JoinHandle<()>>,
}

impl ChatSession {
    pub fn new(
        store: ConversationStore,
        delay: ReplyDelay
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let session = Self {
            store: Arc::new(Mutex::new(store)),
            events,
            delay,
            pending: Vec::new(),
        };
        (session, rx)
    }

    pub async fn history(&self) -> Vec<ChatMessage> {
        self.store.lock().await.all().to_vec()
    }

    pub async fn is_composing(&self) -> bool {
        self.store.lock().await.is_composing()
    }

    /// Records the user's message and schedules the bot's reply. Blank input is
    /// ignored.
    pub async fn submit(&mut self, text: &str) -> Option<ChatMessage> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let user_message = {
            let mut store = self.store.lock().await;
            let message = store.append(text, Originator::User).await;
            let was_composing = store.is_composing();
            store.begin_reply();
            let _ = self.events.send(SessionEvent::Appended(message.clone()));
            if !was_composing {
                let _ = self.events.send(SessionEvent::Composing(true));
            }
            message
        };

        self.pending.retain(|handle| !handle.is_finished());
        let handle = tokio::spawn(
            deliver_reply(
                Arc::clone(&self.store),
                self.events.clone(),
                text.to_string(),
                self.delay.sample()
            )
        );
        self.pending.push(handle);

        Some(user_message)
    }

    pub async fn submit_quick_reply(&mut self, index: usize) -> Option<ChatMessage> {
        let entry = ALLOWED_QUESTIONS.get(index)?;
        self.submit(entry.question).await
    }

    pub async fn open(&self) {
        let mut store = self.store.lock().await;
        store.open();
        let _ = self.events.send(SessionEvent::Unread {
            count: 0,
            badge: None,
        });
    }

    pub async fn close(&self) {
        self.store.lock().await.close();
    }

    /// Ends the session, cancelling every reply that has not been delivered yet.
    pub fn shutdown(mut self) {
        self.abort_pending();
    }

    fn abort_pending(&mut self) {
        let cancelled = self.pending
            .drain(..)
            .filter(|handle| !handle.is_finished())
            .map(|handle| handle.abort())
            .count();
        if cancelled > 0 {
            info!("Cancelled {} pending replies", cancelled);
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.abort_pending();
    }
}

async fn deliver_reply(
    store: Arc<Mutex<ConversationStore>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    question: String,
    delay: Duration
) {
    tokio::time::sleep(delay).await;

    let reply = matcher::reply(&question);
    let mut store = store.lock().await;
    let unread_before = store.unread();
    let message = store.append(reply, Originator::Bot).await;
    store.finish_reply();
    debug!("Replied in '{}' after {:?}", store.key(), delay);

    let _ = events.send(SessionEvent::Appended(message));
    let unread = store.unread();
    if unread != unread_before {
        let _ = events.send(SessionEvent::Unread {
            count: unread.count(),
            badge: unread.badge(),
        });
    }
    if !store.is_composing() {
        let _ = events.send(SessionEvent::Composing(false));
    }
}
