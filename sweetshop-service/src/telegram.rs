//! The few pieces of the Telegram Bot API this service actually touches:
//! webhook update payloads on the way in, and a thin HTTPS client for the
//! handful of methods screens are rendered with.

use std::path::Path;

use anyhow::{Context, anyhow};
use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use order_flow::{Choice, UserProfile};

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<TgUser>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUser {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl TgUser {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last_name) => format!("{} {}", self.first_name, last_name),
            None => self.first_name.clone(),
        }
    }

    pub fn profile(&self) -> UserProfile {
        let profile = UserProfile::new(self.id.to_string(), self.full_name());
        match &self.username {
            Some(username) => profile.with_username(username.clone()),
            None => profile,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: TgUser,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineKeyboardMarkup {
    /// Lays choices out `columns` per row, in directive order.
    pub fn from_choices(choices: &[Choice], columns: usize) -> Self {
        Self {
            inline_keyboard: choices
                .chunks(columns.max(1))
                .map(|row| {
                    row.iter()
                        .map(|choice| InlineKeyboardButton {
                            text: choice.label.clone(),
                            callback_data: choice.data.clone(),
                        })
                        .collect()
                })
                .collect(),
        }
    }
}

/// Every Bot API response wraps its payload in this envelope. The optional
/// fields must stay bare `Option`s: a `serde(default)` here would put a
/// `Default` bound on `T`, which the payload types do not carry.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &str) -> anyhow::Result<T> {
        if !self.ok {
            return Err(anyhow!(
                "{method} rejected: {}",
                self.description
                    .unwrap_or_else(|| "no description".to_string())
            ));
        }
        self.result
            .ok_or_else(|| anyhow!("{method} returned no result"))
    }
}

/// Minimal Bot API client. No retries: the dialogue tolerates a lost screen
/// better than a duplicated one, and Telegram retries the webhook side.
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("https://api.telegram.org/bot{token}"),
        }
    }

    async fn invoke<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> anyhow::Result<T> {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("calling {method}"))?;
        Self::decode(method, response).await
    }

    async fn decode<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> anyhow::Result<T> {
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .with_context(|| format!("decoding {method} response"))?;
        envelope.into_result(method)
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
        markdown: bool,
    ) -> anyhow::Result<Message> {
        let mut payload = json!({ "chat_id": chat_id, "text": text });
        if let Some(keyboard) = keyboard {
            payload["reply_markup"] = serde_json::to_value(keyboard)?;
        }
        if markdown {
            payload["parse_mode"] = json!("Markdown");
        }
        self.invoke("sendMessage", payload).await
    }

    pub async fn send_photo(
        &self,
        chat_id: i64,
        photo: &Path,
        caption: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> anyhow::Result<Message> {
        let bytes = tokio::fs::read(photo)
            .await
            .with_context(|| format!("reading {}", photo.display()))?;
        let file_name = photo
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo.jpg".to_string());

        let mut form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("photo", multipart::Part::bytes(bytes).file_name(file_name));
        if let Some(keyboard) = keyboard {
            form = form.text("reply_markup", serde_json::to_string(keyboard)?);
        }

        let response = self
            .http
            .post(format!("{}/sendPhoto", self.base_url))
            .multipart(form)
            .send()
            .await
            .context("calling sendPhoto")?;
        Self::decode("sendPhoto", response).await
    }

    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> anyhow::Result<()> {
        self.invoke::<bool>(
            "deleteMessage",
            json!({ "chat_id": chat_id, "message_id": message_id }),
        )
        .await
        .map(drop)
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) -> anyhow::Result<()> {
        self.invoke::<bool>(
            "answerCallbackQuery",
            json!({ "callback_query_id": callback_query_id }),
        )
        .await
        .map(drop)
    }

    pub async fn set_webhook(&self, url: &str) -> anyhow::Result<()> {
        self.invoke::<bool>("setWebhook", json!({ "url": url }))
            .await
            .map(drop)
    }
}
