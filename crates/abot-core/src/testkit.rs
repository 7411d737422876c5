//! In-crate fakes shared by the unit tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;

use crate::{
    domain::{ChatId, EndUser, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::MessageSender,
    store::{MemoryBackend, StoreBackend},
    update::{Chat, ChatKind, Document, Message, Sender, Update, UpdateKind},
    Result,
};

pub fn sender(id: i64) -> Sender {
    Sender {
        id: UserId(id),
        first_name: format!("first{id}"),
        last_name: None,
        username: Some(format!("user{id}")),
    }
}

pub fn sender_of(user: &EndUser) -> Sender {
    Sender {
        id: user.id,
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        username: user.username.clone(),
    }
}

pub fn message(from: Sender, chat: Chat, text: Option<&str>) -> Message {
    let mut m = Message::new(1, chat);
    m.from = Some(from);
    m.text = text.map(str::to_string);
    m
}

pub fn private_chat(id: i64) -> Chat {
    Chat {
        id: ChatId(id),
        kind: ChatKind::Private,
    }
}

pub fn group_chat(id: i64) -> Chat {
    Chat {
        id: ChatId(id),
        kind: ChatKind::Group,
    }
}

pub fn msg_update(m: Message) -> Update {
    Update::new(1, UpdateKind::Message(m))
}

pub fn private_text(user_id: i64, text: &str) -> Update {
    msg_update(message(sender(user_id), private_chat(user_id), Some(text)))
}

pub fn private_text_from(user: &EndUser, text: &str) -> Update {
    msg_update(message(sender_of(user), private_chat(user.id.0), Some(text)))
}

pub fn group_text(user_id: i64, chat_id: i64, text: &str) -> Update {
    msg_update(message(sender(user_id), group_chat(chat_id), Some(text)))
}

/// A private message carrying a document, replying to a message with `replied_text`.
pub fn reply_with_document(user_id: i64, replied_text: &str, file_id: &str) -> Update {
    let chat = private_chat(user_id);
    let mut prompt = Message::new(0, chat);
    prompt.text = Some(replied_text.to_string());

    let mut m = message(sender(user_id), chat, None);
    m.document = Some(Document {
        file_id: file_id.to_string(),
        file_name: Some("backup.json".to_string()),
    });
    m.reply_to = Some(Box::new(prompt));
    msg_update(m)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Text(ChatId, String),
    Formatted(ChatId, String),
    ForceReply(ChatId, String),
    File(ChatId, String, Vec<u8>),
}

/// Records every outbound call; serves files registered with `add_file`.
#[derive(Default)]
pub struct FakeSender {
    next_id: AtomicUsize,
    sent: Mutex<Vec<Sent>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakeSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_file(&self, file_id: &str, bytes: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(file_id.to_string(), bytes.to_vec());
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Text of every message, regardless of how it was sent.
    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .map(|s| match s {
                Sent::Text(_, t) | Sent::Formatted(_, t) | Sent::ForceReply(_, t) => t,
                Sent::File(_, name, _) => name,
            })
            .collect()
    }

    fn record(&self, chat_id: ChatId, sent: Sent) -> MessageRef {
        self.sent.lock().unwrap().push(sent);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i32 + 1;
        MessageRef {
            chat_id,
            message_id: MessageId(id),
        }
    }
}

#[async_trait]
impl MessageSender for FakeSender {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        Ok(self.record(chat_id, Sent::Text(chat_id, text.to_string())))
    }

    async fn send_formatted(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        Ok(self.record(chat_id, Sent::Formatted(chat_id, html.to_string())))
    }

    async fn send_force_reply(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        Ok(self.record(chat_id, Sent::ForceReply(chat_id, text.to_string())))
    }

    async fn send_file(
        &self,
        chat_id: ChatId,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<MessageRef> {
        Ok(self.record(chat_id, Sent::File(chat_id, file_name.to_string(), bytes)))
    }

    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| Error::External(format!("no such file: {file_id}")))
    }
}

/// Memory backend that counts commits and can be told to reject them.
#[derive(Clone, Default)]
pub struct CountingBackend {
    inner: Arc<MemoryBackend>,
    saves: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl CountingBackend {
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_saves(&self, on: bool) {
        self.failing.store(on, Ordering::SeqCst);
    }
}

impl StoreBackend for CountingBackend {
    fn load(&self) -> Result<Option<String>> {
        self.inner.load()
    }

    fn save(&self, data: &str) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::External("disk full".to_string()));
        }
        self.inner.save(data)
    }
}
