//! Example abilities shipped with the binary.

use std::sync::Arc;

use abot_core::{
    ability::{action, Ability},
    access::{Locality, Privacy},
    domain::UserId,
    formatting::escape_html,
    messaging::MessageSender,
    registry::DEFAULT,
    store::Store,
    Result,
};

const MESSAGES: &str = "MESSAGES";

pub fn abilities(store: Arc<Store>, sender: Arc<dyn MessageSender>) -> Result<Vec<Ability>> {
    Ok(vec![
        hello(sender.clone())?,
        stats(store.clone(), sender.clone())?,
        tally(store)?,
        count(sender)?,
    ])
}

fn hello(sender: Arc<dyn MessageSender>) -> Result<Ability> {
    Ability::builder()
        .name("hello")
        .info("says hello")
        .locality(Locality::All)
        .privacy(Privacy::Public)
        .action(move |ctx| {
            let sender = sender.clone();
            async move {
                let html = format!("Hello, <b>{}</b>!", escape_html(&ctx.user.full_name()));
                let _ = sender.send_formatted(ctx.chat_id, &html).await;
                Ok(())
            }
        })
        .build()
}

fn stats(store: Arc<Store>, sender: Arc<dyn MessageSender>) -> Result<Ability> {
    Ability::builder()
        .name("stats")
        .info("lists stored collections")
        .locality(Locality::All)
        .privacy(Privacy::Admin)
        .action(move |ctx| {
            let store = store.clone();
            let sender = sender.clone();
            async move {
                let summary = store.summary();
                let text = if summary.is_empty() {
                    "Nothing stored yet.".to_string()
                } else {
                    summary
                };
                let _ = sender.send(ctx.chat_id, &text).await;
                Ok(())
            }
        })
        .build()
}

/// Free text in private chats bumps the sender's message counter.
fn tally(store: Arc<Store>) -> Result<Ability> {
    let commit_store = store.clone();
    Ability::builder()
        .name(DEFAULT)
        .locality(Locality::User)
        .privacy(Privacy::Public)
        .action(move |ctx| {
            let store = store.clone();
            async move {
                let counts = store.map::<UserId, u64>(MESSAGES)?;
                let n = counts.get(&ctx.user.id)?.unwrap_or(0);
                counts.insert(&ctx.user.id, &(n + 1))?;
                Ok(())
            }
        })
        .post(action(move |_ctx| {
            let store = commit_store.clone();
            async move { store.commit() }
        }))
        .build()
}

fn count(sender: Arc<dyn MessageSender>) -> Result<Ability> {
    Ability::builder()
        .name("count")
        .info("counts the words you send it")
        .locality(Locality::All)
        .privacy(Privacy::Public)
        .action(move |ctx| {
            let sender = sender.clone();
            async move {
                let text = match ctx.arguments.len() {
                    0 => "Give me some words to count.".to_string(),
                    1 => "That is 1 word.".to_string(),
                    n => format!("That is {n} words."),
                };
                let _ = sender.send(ctx.chat_id, &text).await;
                Ok(())
            }
        })
        .build()
}
