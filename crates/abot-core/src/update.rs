//! Messenger-agnostic incoming update model.
//!
//! Telegram-specific parsing lives in the adapter; the dispatcher only sees
//! these types.

use crate::{
    domain::{ChatId, EndUser, MessageId, UserId},
    errors::Error,
    Result,
};

#[derive(Clone, Debug)]
pub struct Update {
    pub update_id: i64,
    pub kind: UpdateKind,
}

#[derive(Clone, Debug)]
pub enum UpdateKind {
    Message(Message),
    EditedMessage(Message),
    ChannelPost(Message),
    EditedChannelPost(Message),
    CallbackQuery(CallbackQuery),
    InlineQuery(InlineQuery),
    ChosenInlineResult(InlineQuery),
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chat {
    pub id: ChatId,
    pub kind: ChatKind,
}

impl Chat {
    pub fn is_private(&self) -> bool {
        self.kind == ChatKind::Private
    }
}

/// Platform sender info, before it is recorded as an [`EndUser`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    pub id: UserId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl Sender {
    pub fn to_end_user(&self) -> EndUser {
        EndUser {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            username: self.username.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    pub file_id: String,
    pub file_name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Message {
    pub message_id: MessageId,
    pub chat: Chat,
    pub from: Option<Sender>,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub document: Option<Document>,
    pub has_photo: bool,
    pub has_location: bool,
    pub reply_to: Option<Box<Message>>,
}

impl Message {
    pub fn new(message_id: i32, chat: Chat) -> Self {
        Self {
            message_id: MessageId(message_id),
            chat,
            from: None,
            text: None,
            caption: None,
            document: None,
            has_photo: false,
            has_location: false,
            reply_to: None,
        }
    }

    /// Text first, caption second.
    pub fn body(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }
}

#[derive(Clone, Debug)]
pub struct CallbackQuery {
    pub id: String,
    pub from: Sender,
    pub message: Option<Message>,
    pub data: Option<String>,
}

/// Inline query or chosen inline result: both only carry the sender.
#[derive(Clone, Debug)]
pub struct InlineQuery {
    pub id: String,
    pub from: Sender,
    pub query: String,
}

impl Update {
    pub fn new(update_id: i64, kind: UpdateKind) -> Self {
        Self { update_id, kind }
    }

    /// The plain `Message` payload, if this update is one.
    pub fn message(&self) -> Option<&Message> {
        match &self.kind {
            UpdateKind::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Any message-shaped payload (message, edit, channel post, callback origin).
    fn any_message(&self) -> Option<&Message> {
        match &self.kind {
            UpdateKind::Message(m)
            | UpdateKind::EditedMessage(m)
            | UpdateKind::ChannelPost(m)
            | UpdateKind::EditedChannelPost(m) => Some(m),
            UpdateKind::CallbackQuery(q) => q.message.as_ref(),
            _ => None,
        }
    }

    /// Originating user of the update.
    pub fn sender(&self) -> Result<&Sender> {
        let from = match &self.kind {
            UpdateKind::Message(m)
            | UpdateKind::EditedMessage(m)
            | UpdateKind::ChannelPost(m)
            | UpdateKind::EditedChannelPost(m) => m.from.as_ref(),
            UpdateKind::CallbackQuery(q) => Some(&q.from),
            UpdateKind::InlineQuery(q) | UpdateKind::ChosenInlineResult(q) => Some(&q.from),
            UpdateKind::Other => None,
        };
        from.ok_or(Error::UnresolvedUpdate(
            "could not retrieve originating user from update",
        ))
    }

    /// Chat the update originated from; inline updates use the sender's id.
    pub fn chat_id(&self) -> Result<ChatId> {
        match &self.kind {
            UpdateKind::InlineQuery(q) | UpdateKind::ChosenInlineResult(q) => {
                Ok(ChatId(q.from.id.0))
            }
            _ => self.any_message().map(|m| m.chat.id).ok_or(Error::UnresolvedUpdate(
                "could not retrieve originating chat id from update",
            )),
        }
    }

    /// Whether the update comes from a one-to-one chat.
    pub fn is_private(&self) -> Result<bool> {
        match &self.kind {
            UpdateKind::InlineQuery(_) | UpdateKind::ChosenInlineResult(_) => Ok(true),
            _ => self.any_message().map(|m| m.chat.is_private()).ok_or(
                Error::UnresolvedUpdate("could not retrieve update origin (user/group)"),
            ),
        }
    }
}
