//! Telegram adapter (teloxide).
//!
//! Implements the `spb-core` messaging port over the Telegram Bot API and owns
//! the transport: long polling or webhook delivery, health endpoints and
//! process shutdown.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{
        CallbackQueryId, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode as TgParseMode,
        WebAppInfo,
    },
};

use tokio::time::sleep;

pub mod convert;
pub mod health;
pub mod router;

use spb_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, OutgoingMessage, ParseMode},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Messaging(format!("telegram error: {e}"))
    }

    /// One retry when Telegram answers 429 with a retry-after hint.
    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(teloxide::RequestError::RetryAfter(after)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    sleep(after.duration()).await;
                }
                Err(other) => return Err(Self::map_err(other)),
            }
        }
    }
}

fn tg_keyboard(keyboard: &InlineKeyboard) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
        .buttons
        .iter()
        .map(|b| {
            vec![InlineKeyboardButton::web_app(
                b.label.clone(),
                WebAppInfo {
                    url: b.web_app.clone(),
                },
            )]
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

// Replies are authored in legacy Markdown (`*bold*`, `_italic_`), which
// MarkdownV2 would reject without escaping every '.', '!' and '-'.
#[allow(deprecated)]
fn tg_parse_mode(mode: ParseMode) -> TgParseMode {
    match mode {
        ParseMode::Markdown => TgParseMode::Markdown,
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_message(&self, chat_id: ChatId, msg: &OutgoingMessage) -> Result<MessageRef> {
        let markup = msg.keyboard.as_ref().map(tg_keyboard);
        let sent = self
            .with_retry(|| {
                let mut req = self
                    .bot
                    .send_message(Self::tg_chat(chat_id), msg.text.clone());
                if let Some(mode) = msg.parse_mode {
                    req = req.parse_mode(tg_parse_mode(mode));
                }
                if let Some(markup) = &markup {
                    req = req.reply_markup(markup.clone());
                }
                req
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(sent.id.0),
        })
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.with_retry(|| {
            let mut req = self
                .bot
                .answer_callback_query(CallbackQueryId(callback_id.to_string()));
            if let Some(t) = text {
                req = req.text(t.to_string());
            }
            req
        })
        .await?;
        Ok(())
    }
}
