//! Update predicates used by ability flags and reply rules.

use std::{fmt, sync::Arc};

use crate::update::{Update, UpdateKind};

/// Built-in update predicates.
///
/// Message flags test the plain `Message` payload and are false when the
/// update carries none.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Flag {
    None,
    Message,
    CallbackQuery,
    ChannelPost,
    EditedChannelPost,
    EditedMessage,
    InlineQuery,
    ChosenInlineQuery,

    Document,
    Text,
    Photo,
    Location,
    Caption,
    Reply,
}

impl Flag {
    pub fn test(self, update: &Update) -> bool {
        match self {
            Flag::None => true,
            Flag::Message => matches!(update.kind, UpdateKind::Message(_)),
            Flag::CallbackQuery => matches!(update.kind, UpdateKind::CallbackQuery(_)),
            Flag::ChannelPost => matches!(update.kind, UpdateKind::ChannelPost(_)),
            Flag::EditedChannelPost => matches!(update.kind, UpdateKind::EditedChannelPost(_)),
            Flag::EditedMessage => matches!(update.kind, UpdateKind::EditedMessage(_)),
            Flag::InlineQuery => matches!(update.kind, UpdateKind::InlineQuery(_)),
            Flag::ChosenInlineQuery => matches!(update.kind, UpdateKind::ChosenInlineResult(_)),

            Flag::Document => update.message().is_some_and(|m| m.document.is_some()),
            Flag::Text => update.message().is_some_and(|m| m.text.is_some()),
            Flag::Photo => update.message().is_some_and(|m| m.has_photo),
            Flag::Location => update.message().is_some_and(|m| m.has_location),
            Flag::Caption => update.message().is_some_and(|m| m.caption.is_some()),
            Flag::Reply => update.message().is_some_and(|m| m.reply_to.is_some()),
        }
    }
}

type PredicateFn = Arc<dyn Fn(&Update) -> bool + Send + Sync>;

/// A condition over an update: a built-in [`Flag`] or an arbitrary function.
#[derive(Clone)]
pub enum Predicate {
    Flag(Flag),
    Custom(PredicateFn),
}

impl Predicate {
    pub fn custom(f: impl Fn(&Update) -> bool + Send + Sync + 'static) -> Self {
        Predicate::Custom(Arc::new(f))
    }

    pub fn test(&self, update: &Update) -> bool {
        match self {
            Predicate::Flag(flag) => flag.test(update),
            Predicate::Custom(f) => f(update),
        }
    }
}

impl From<Flag> for Predicate {
    fn from(flag: Flag) -> Self {
        Predicate::Flag(flag)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Flag(flag) => write!(f, "Flag({flag:?})"),
            Predicate::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// True when every predicate holds (vacuously true for an empty list).
pub fn all_hold(predicates: &[Predicate], update: &Update) -> bool {
    predicates.iter().all(|p| p.test(update))
}

/// Matches a message that replies to a message whose text is exactly `text`.
pub fn is_reply_to(text: impl Into<String>) -> Predicate {
    let text = text.into();
    Predicate::custom(move |update| {
        update
            .message()
            .and_then(|m| m.reply_to.as_deref())
            .and_then(|r| r.text.as_deref())
            .is_some_and(|t| t == text)
    })
}
