//! Bridges between the dialogue's transport-free boundaries and the Bot API:
//! a presenter that turns render directives into chat messages, and a sink
//! that forwards confirmed orders to the operator chat.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, warn};

use order_flow::{
    FlowError, NotificationSink, OrderRecord, PresentationAdapter, RenderDirective,
};

use crate::telegram::{InlineKeyboardMarkup, TelegramClient};

/// Renders directives into a chat and keeps, per chat, the id of the last
/// message that still carries live buttons. When a directive asks to replace
/// the previous prompt, that message is deleted first so stale keyboards
/// cannot be tapped.
pub struct TelegramPresenter {
    client: Arc<TelegramClient>,
    last_prompt: DashMap<i64, i64>,
}

impl TelegramPresenter {
    pub fn new(client: Arc<TelegramClient>) -> Self {
        Self {
            client,
            last_prompt: DashMap::new(),
        }
    }

    /// Stops the client-side spinner on a tapped button. Best effort.
    pub async fn acknowledge(&self, callback_id: &str) {
        if let Err(err) = self.client.answer_callback_query(callback_id).await {
            debug!(error = %err, "failed to answer callback query");
        }
    }

    async fn retire_previous(&self, chat_id: i64) {
        if let Some((_, message_id)) = self.last_prompt.remove(&chat_id) {
            if let Err(err) = self.client.delete_message(chat_id, message_id).await {
                // The message may already be gone, deleted by the user.
                warn!(chat_id, message_id, error = %err, "failed to remove previous prompt");
            }
        }
    }
}

#[async_trait]
impl PresentationAdapter for TelegramPresenter {
    async fn render(&self, chat_id: &str, directive: &RenderDirective) -> order_flow::Result<()> {
        let chat_id: i64 = chat_id
            .parse()
            .map_err(|_| FlowError::Presentation(format!("chat id is not numeric: {chat_id}")))?;

        if directive.replace_previous {
            self.retire_previous(chat_id).await;
        }

        let keyboard = (!directive.choices.is_empty())
            .then(|| InlineKeyboardMarkup::from_choices(&directive.choices, directive.columns));

        let sent = match &directive.image {
            Some(image) => {
                match self
                    .client
                    .send_photo(chat_id, image.as_path(), &directive.text, keyboard.as_ref())
                    .await
                {
                    Ok(sent) => Ok(sent),
                    Err(err) => {
                        // The photo can disappear from disk while the service
                        // runs; the screen still works as plain text.
                        warn!(chat_id, error = %err, "photo send failed, falling back to text");
                        self.client
                            .send_message(chat_id, &directive.text, keyboard.as_ref(), directive.markdown)
                            .await
                    }
                }
            }
            None => {
                self.client
                    .send_message(chat_id, &directive.text, keyboard.as_ref(), directive.markdown)
                    .await
            }
        }
        .map_err(|err| FlowError::Presentation(err.to_string()))?;

        if keyboard.is_some() {
            self.last_prompt.insert(chat_id, sent.message_id);
        } else {
            self.last_prompt.remove(&chat_id);
        }
        Ok(())
    }
}

/// Sends every confirmed order to the manager chat, Markdown formatted.
pub struct TelegramNotifier {
    client: Arc<TelegramClient>,
    operator_chat_id: i64,
}

impl TelegramNotifier {
    pub fn new(client: Arc<TelegramClient>, operator_chat_id: i64) -> Self {
        Self {
            client,
            operator_chat_id,
        }
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn deliver(&self, record: &OrderRecord) -> order_flow::Result<()> {
        self.client
            .send_message(self.operator_chat_id, &record.operator_message(), None, true)
            .await
            .map(drop)
            .map_err(|err| FlowError::Notification(err.to_string()))
    }
}
