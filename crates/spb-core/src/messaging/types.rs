use url::Url;

use crate::domain::{ChatId, ChatKind, UserId};

/// One inbound event from the messaging platform.
///
/// Created by the transport per event, flows through the pipeline exactly once
/// and is dropped afterwards.
#[derive(Clone, Debug)]
pub struct Update {
    pub id: i64,
    pub from: Option<Sender>,
    pub chat: Option<ChatInfo>,
    pub kind: UpdateKind,
}

#[derive(Clone, Debug)]
pub struct Sender {
    pub id: UserId,
    pub username: Option<String>,
}

#[derive(Clone, Copy, Debug)]
pub struct ChatInfo {
    pub id: ChatId,
    pub kind: ChatKind,
}

#[derive(Clone, Debug)]
pub enum UpdateKind {
    Message { text: Option<String> },
    Callback { callback_id: String, data: Option<String> },
    /// Anything else the platform delivers (edits, joins, polls...), tagged
    /// with the platform's update type name.
    Other(String),
}

impl Update {
    pub fn user_id(&self) -> Option<UserId> {
        self.from.as_ref().map(|s| s.id)
    }

    pub fn username(&self) -> Option<&str> {
        self.from.as_ref().and_then(|s| s.username.as_deref())
    }

    pub fn chat_id(&self) -> Option<ChatId> {
        self.chat.map(|c| c.id)
    }

    pub fn chat_kind(&self) -> Option<ChatKind> {
        self.chat.map(|c| c.kind)
    }

    pub fn update_type(&self) -> &str {
        match &self.kind {
            UpdateKind::Message { .. } => "message",
            UpdateKind::Callback { .. } => "callback_query",
            UpdateKind::Other(name) => name,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            UpdateKind::Message { text } => text.as_deref(),
            _ => None,
        }
    }

    pub fn callback_data(&self) -> Option<&str> {
        match &self.kind {
            UpdateKind::Callback { data, .. } => data.as_deref(),
            _ => None,
        }
    }

    pub fn callback_id(&self) -> Option<&str> {
        match &self.kind {
            UpdateKind::Callback { callback_id, .. } => Some(callback_id),
            _ => None,
        }
    }

    /// Message text or callback data, whichever this update carries.
    pub fn command_or_data(&self) -> Option<&str> {
        self.text().or_else(|| self.callback_data())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseMode {
    Markdown,
}

/// A formatted reply with an optional inline keyboard.
#[derive(Clone, Debug)]
pub struct OutgoingMessage {
    pub text: String,
    pub parse_mode: Option<ParseMode>,
    pub keyboard: Option<InlineKeyboard>,
}

impl OutgoingMessage {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_mode: None,
            keyboard: None,
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_mode: Some(ParseMode::Markdown),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Inline keyboard, one button per row.
#[derive(Clone, Debug)]
pub struct InlineKeyboard {
    pub buttons: Vec<InlineButton>,
}

impl InlineKeyboard {
    pub fn single(button: InlineButton) -> Self {
        Self {
            buttons: vec![button],
        }
    }
}

/// Opens an external web application inside the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub web_app: Url,
}
