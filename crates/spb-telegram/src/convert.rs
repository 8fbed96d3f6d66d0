//! teloxide update -> core `Update`.

use teloxide::types::{Chat, Update as TgUpdate, UpdateKind as TgKind, User};

use spb_core::{
    domain::{ChatId, ChatKind, UserId},
    messaging::types::{ChatInfo, Sender, Update, UpdateKind},
};

pub fn to_core(update: &TgUpdate) -> Update {
    let kind = match &update.kind {
        TgKind::Message(msg) | TgKind::ChannelPost(msg) => UpdateKind::Message {
            text: msg.text().map(str::to_string),
        },
        TgKind::CallbackQuery(q) => UpdateKind::Callback {
            callback_id: q.id.0.clone(),
            data: q.data.clone(),
        },
        other => UpdateKind::Other(kind_name(other).to_string()),
    };

    Update {
        id: i64::from(update.id.0),
        from: update.from().map(sender),
        chat: update_chat(update).map(chat_info),
        kind,
    }
}

fn update_chat(update: &TgUpdate) -> Option<&Chat> {
    match &update.kind {
        TgKind::CallbackQuery(q) => q.message.as_ref().map(|m| m.chat()),
        _ => update.chat(),
    }
}

fn sender(user: &User) -> Sender {
    Sender {
        id: UserId(user.id.0 as i64),
        username: user.username.clone(),
    }
}

fn chat_info(chat: &Chat) -> ChatInfo {
    let kind = if chat.is_private() {
        ChatKind::Private
    } else if chat.is_supergroup() {
        ChatKind::Supergroup
    } else if chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Group
    };
    ChatInfo {
        id: ChatId(chat.id.0),
        kind,
    }
}

fn kind_name(kind: &TgKind) -> &'static str {
    match kind {
        TgKind::Message(_) => "message",
        TgKind::EditedMessage(_) => "edited_message",
        TgKind::ChannelPost(_) => "channel_post",
        TgKind::EditedChannelPost(_) => "edited_channel_post",
        TgKind::InlineQuery(_) => "inline_query",
        TgKind::ChosenInlineResult(_) => "chosen_inline_result",
        TgKind::CallbackQuery(_) => "callback_query",
        TgKind::ShippingQuery(_) => "shipping_query",
        TgKind::PreCheckoutQuery(_) => "pre_checkout_query",
        TgKind::Poll(_) => "poll",
        TgKind::PollAnswer(_) => "poll_answer",
        TgKind::MyChatMember(_) => "my_chat_member",
        TgKind::ChatMember(_) => "chat_member",
        TgKind::ChatJoinRequest(_) => "chat_join_request",
        _ => "other",
    }
}
