//! Fakes and builders shared by the unit tests.

use std::{
    collections::HashMap,
    io,
    sync::{
        atomic::{AtomicBool, AtomicI32, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

use crate::{
    config::Config,
    domain::{ChatId, ChatKind, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatInfo, OutgoingMessage, Sender, Update, UpdateKind},
    },
    Result,
};

#[derive(Default)]
pub struct FakeMessenger {
    next_id: AtomicI32,
    fail_sends: AtomicBool,
    pub sends: Mutex<Vec<(ChatId, OutgoingMessage)>>,
    pub acks: Mutex<Vec<String>>,
}

impl FakeMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every subsequent `send_message` fails.
    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m)| m.text.clone())
            .collect()
    }

    pub fn acks(&self) -> Vec<String> {
        self.acks.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    async fn send_message(&self, chat_id: ChatId, msg: &OutgoingMessage) -> Result<MessageRef> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::Messaging("chat not found".to_string()));
        }
        self.sends.lock().unwrap().push((chat_id, msg.clone()));
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MessageRef {
            chat_id,
            message_id: MessageId(id),
        })
    }

    async fn answer_callback_query(&self, callback_id: &str, _text: Option<&str>) -> Result<()> {
        self.acks.lock().unwrap().push(callback_id.to_string());
        Ok(())
    }
}

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Lines at the given level (`"WARN"`, `"ERROR"`, ...).
    pub fn lines_at(&self, level: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|l| l.contains(level))
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Route this thread's diagnostics into a buffer until the guard drops.
/// Pair with current-thread runtimes (the `#[tokio::test]` default).
pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut env: HashMap<String, String> = HashMap::new();
    env.insert("BOT_TOKEN".to_string(), "123:test".to_string());
    for (k, v) in overrides {
        env.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|key| env.get(key).cloned()).unwrap()
}

pub fn message_from(user: i64, text: &str) -> Update {
    Update {
        id: 1,
        from: Some(Sender {
            id: UserId(user),
            username: Some(format!("user{user}")),
        }),
        chat: Some(ChatInfo {
            id: ChatId(user),
            kind: ChatKind::Private,
        }),
        kind: UpdateKind::Message {
            text: Some(text.to_string()),
        },
    }
}

pub fn callback_from(user: i64, data: &str) -> Update {
    Update {
        kind: UpdateKind::Callback {
            callback_id: format!("cb-{user}"),
            data: Some(data.to_string()),
        },
        ..message_from(user, "")
    }
}

/// A channel post: no sender, only a chat.
pub fn channel_post(text: &str) -> Update {
    Update {
        from: None,
        chat: Some(ChatInfo {
            id: ChatId(-100),
            kind: ChatKind::Channel,
        }),
        ..message_from(0, text)
    }
}
