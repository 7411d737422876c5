//! teloxide → core update conversion.

use teloxide::types::{self as tg, UpdateKind as TgKind};

use abot_core::{
    domain::{ChatId, UserId},
    update::{
        CallbackQuery, Chat, ChatKind, Document, InlineQuery, Message, Sender, Update, UpdateKind,
    },
};

/// Kinds the core has no use for become [`UpdateKind::Other`].
pub fn update(u: &tg::Update) -> Update {
    let kind = match &u.kind {
        TgKind::Message(m) => UpdateKind::Message(message(m)),
        TgKind::EditedMessage(m) => UpdateKind::EditedMessage(message(m)),
        TgKind::ChannelPost(m) => UpdateKind::ChannelPost(message(m)),
        TgKind::EditedChannelPost(m) => UpdateKind::EditedChannelPost(message(m)),
        TgKind::CallbackQuery(q) => UpdateKind::CallbackQuery(CallbackQuery {
            id: q.id.clone(),
            from: sender(&q.from),
            message: q.message.as_ref().map(message),
            data: q.data.clone(),
        }),
        TgKind::InlineQuery(q) => UpdateKind::InlineQuery(InlineQuery {
            id: q.id.clone(),
            from: sender(&q.from),
            query: q.query.clone(),
        }),
        TgKind::ChosenInlineResult(r) => UpdateKind::ChosenInlineResult(InlineQuery {
            id: r.result_id.clone(),
            from: sender(&r.from),
            query: r.query.clone(),
        }),
        _ => UpdateKind::Other,
    };
    Update::new(i64::from(u.id), kind)
}

pub fn message(m: &tg::Message) -> Message {
    let mut out = Message::new(m.id.0, chat(&m.chat));
    out.from = m.from().map(sender);
    out.text = m.text().map(str::to_string);
    out.caption = m.caption().map(str::to_string);
    out.document = m.document().map(|d| Document {
        file_id: d.file.id.clone(),
        file_name: d.file_name.clone(),
    });
    out.has_photo = m.photo().is_some();
    out.has_location = m.location().is_some();
    out.reply_to = m.reply_to_message().map(|r| Box::new(message(r)));
    out
}

fn chat(c: &tg::Chat) -> Chat {
    let kind = if c.is_private() {
        ChatKind::Private
    } else if c.is_supergroup() {
        ChatKind::Supergroup
    } else if c.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Group
    };
    Chat {
        id: ChatId(c.id.0),
        kind,
    }
}

fn sender(u: &tg::User) -> Sender {
    Sender {
        id: UserId(u.id.0 as i64),
        first_name: u.first_name.clone(),
        last_name: u.last_name.clone(),
        username: u.username.clone(),
    }
}
