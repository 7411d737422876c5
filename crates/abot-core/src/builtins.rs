//! Reserved abilities every bot gets: command listing, ownership claim,
//! moderation, and backup/recovery.

use std::sync::Arc;

use crate::{
    ability::{action, Ability, Action, MessageContext},
    access::{AccessModel, Locality, Privacy},
    backup::BackupCoordinator,
    domain::{ChatId, EndUser, UserId},
    flags::{is_reply_to, Flag, Predicate},
    formatting::{escape_html, strip_tag},
    messaging::MessageSender,
    store::{Store, BLACKLIST, USERS},
    update::Update,
    Result,
};

pub const COMMANDS: &str = "commands";
pub const CLAIM: &str = "claim";
pub const BAN: &str = "ban";
pub const UNBAN: &str = "unban";
pub const PROMOTE: &str = "promote";
pub const DEMOTE: &str = "demote";
pub const BACKUP: &str = "backup";
pub const RECOVER: &str = "recover";

pub const RESERVED: [&str; 8] = [COMMANDS, CLAIM, BAN, UNBAN, PROMOTE, DEMOTE, BACKUP, RECOVER];

pub const RECOVERY_MESSAGE: &str =
    "I am ready to receive the backup file. Please reply to this message with the backup file attached.";
pub const RECOVER_SUCCESS: &str = "I have successfully recovered.";
pub const RECOVER_REJECTED: &str = "Oops, something went wrong during recovery.";
pub const RECOVER_FAILED: &str = "I have failed to recover.";
pub const NO_COMMANDS: &str = "No public commands found.";

/// What the built-ins need from the running bot.
pub struct BuiltinEnv {
    pub store: Arc<Store>,
    pub sender: Arc<dyn MessageSender>,
    pub access: AccessModel,
    pub backup: Arc<BackupCoordinator>,
    pub backup_file_name: String,
}

impl BuiltinEnv {
    async fn say(&self, chat_id: ChatId, text: &str) {
        let _ = self.sender.send(chat_id, text).await;
    }

    async fn say_formatted(&self, chat_id: ChatId, html: &str) {
        let _ = self.sender.send_formatted(chat_id, html).await;
    }

    /// Case-insensitive username lookup among known users.
    fn find_user(&self, username: &str) -> Result<Option<EndUser>> {
        self.store
            .set::<EndUser>(USERS)?
            .find(|u| u.has_username(username))
    }

    fn find_user_by_id(&self, id: UserId) -> Result<Option<EndUser>> {
        self.store.set::<EndUser>(USERS)?.find(|u| u.id == id)
    }

    /// Resolve the `@username` argument, telling the caller when it is unknown.
    async fn target(&self, ctx: &MessageContext) -> Result<Option<(String, EndUser)>> {
        let username = strip_tag(ctx.first_arg().unwrap_or_default());
        match self.find_user(&username)? {
            Some(user) => Ok(Some((username, user))),
            None => {
                tracing::debug!(%username, "moderation target not found");
                let html = format!(
                    "Sorry, I could not find the user <b>@{}</b>.",
                    escape_html(&username)
                );
                self.say_formatted(ctx.chat_id, &html).await;
                Ok(None)
            }
        }
    }

    /// Blacklist `id`, reporting it under `shown`.
    async fn ban_id(&self, chat_id: ChatId, id: UserId, shown: &str) -> Result<()> {
        let shown = escape_html(shown);
        let html = if self.store.set::<UserId>(BLACKLIST)?.insert(&id)? {
            tracing::info!(user_id = id.0, "user banned");
            format!("{shown} is now <b>banned</b>.")
        } else {
            format!("{shown} is already <b>banned</b>.")
        };
        self.say_formatted(chat_id, &html).await;
        Ok(())
    }
}

/// Build every reserved ability. `catalog` is the `(name, info)` listing
/// reported by `commands`.
pub fn abilities(env: Arc<BuiltinEnv>, catalog: Vec<(String, Option<String>)>) -> Result<Vec<Ability>> {
    Ok(vec![
        commands(env.clone(), catalog)?,
        claim(env.clone())?,
        ban(env.clone())?,
        unban(env.clone())?,
        promote(env.clone())?,
        demote(env.clone())?,
        backup(env.clone())?,
        recover(env)?,
    ])
}

/// Post-action shared by every mutating built-in.
fn commit(store: Arc<Store>) -> Action {
    action(move |_ctx| {
        let store = store.clone();
        async move { store.commit() }
    })
}

/// Sorted `name - info` lines for every ability that declares info.
pub fn command_listing(catalog: &[(String, Option<String>)]) -> String {
    let mut lines: Vec<String> = catalog
        .iter()
        .filter_map(|(name, info)| info.as_ref().map(|info| format!("{name} - {info}")))
        .collect();
    if lines.is_empty() {
        return NO_COMMANDS.to_string();
    }
    lines.sort();
    lines.join("\n")
}

fn commands(env: Arc<BuiltinEnv>, catalog: Vec<(String, Option<String>)>) -> Result<Ability> {
    let listing = Arc::new(command_listing(&catalog));
    Ability::builder()
        .name(COMMANDS)
        .locality(Locality::All)
        .privacy(Privacy::Public)
        .action(move |ctx| {
            let env = env.clone();
            let listing = listing.clone();
            async move {
                env.say(ctx.chat_id, &listing).await;
                Ok(())
            }
        })
        .build()
}

fn claim(env: Arc<BuiltinEnv>) -> Result<Ability> {
    let store = env.store.clone();
    Ability::builder()
        .name(CLAIM)
        .locality(Locality::All)
        .privacy(Privacy::Public)
        .action(move |ctx| {
            let env = env.clone();
            async move {
                let caller = ctx.user.id;
                if !env.access.is_creator(caller) {
                    tracing::warn!(user_id = caller.0, "non-creator tried to claim the bot");
                    let shown = ctx.user.username.clone().unwrap_or_else(|| ctx.user.first_name.clone());
                    return env.ban_id(ctx.chat_id, caller, &shown).await;
                }

                let admins = env.store.set::<UserId>(&env.access.admins_collection(ctx.chat_id))?;
                if admins.insert(&caller)? {
                    env.say(ctx.chat_id, "You're now my master.").await;
                } else {
                    env.say(ctx.chat_id, "You're already my master.").await;
                }
                Ok(())
            }
        })
        .post(commit(store))
        .build()
}

fn ban(env: Arc<BuiltinEnv>) -> Result<Ability> {
    let store = env.store.clone();
    Ability::builder()
        .name(BAN)
        .locality(Locality::All)
        .privacy(Privacy::Admin)
        .input(1)
        .action(move |ctx| {
            let env = env.clone();
            async move {
                let Some((username, user)) = env.target(&ctx).await? else {
                    return Ok(());
                };

                if env.access.is_creator(user.id) {
                    // Banning the creator bans whoever asked.
                    tracing::warn!(user_id = ctx.user.id.0, "attempt to ban the creator");
                    let shown = env
                        .find_user_by_id(ctx.user.id)?
                        .map(|u| u.first_name)
                        .unwrap_or_else(|| ctx.user.first_name.clone());
                    return env.ban_id(ctx.chat_id, ctx.user.id, &shown).await;
                }
                env.ban_id(ctx.chat_id, user.id, &username).await
            }
        })
        .post(commit(store))
        .build()
}

fn unban(env: Arc<BuiltinEnv>) -> Result<Ability> {
    let store = env.store.clone();
    Ability::builder()
        .name(UNBAN)
        .locality(Locality::All)
        .privacy(Privacy::Admin)
        .input(1)
        .action(move |ctx| {
            let env = env.clone();
            async move {
                let Some((username, user)) = env.target(&ctx).await? else {
                    return Ok(());
                };
                let username = escape_html(&username);
                let html = if env.store.set::<UserId>(BLACKLIST)?.remove(&user.id)? {
                    tracing::info!(user_id = user.id.0, "ban lifted");
                    format!("@{username}, your ban has been <b>lifted</b>.")
                } else {
                    format!("@{username} is <b>not</b> on the <b>blacklist</b>.")
                };
                env.say_formatted(ctx.chat_id, &html).await;
                Ok(())
            }
        })
        .post(commit(store))
        .build()
}

fn promote(env: Arc<BuiltinEnv>) -> Result<Ability> {
    let store = env.store.clone();
    Ability::builder()
        .name(PROMOTE)
        .locality(Locality::All)
        .privacy(Privacy::Admin)
        .input(1)
        .action(move |ctx| {
            let env = env.clone();
            async move {
                let Some((username, user)) = env.target(&ctx).await? else {
                    return Ok(());
                };
                let admins = env.store.set::<UserId>(&env.access.admins_collection(ctx.chat_id))?;
                let username = escape_html(&username);
                let html = if admins.insert(&user.id)? {
                    tracing::info!(user_id = user.id.0, "user promoted");
                    format!("@{username} is now a <b>super admin</b>.")
                } else {
                    format!("@{username} is already a <b>super admin</b>.")
                };
                env.say_formatted(ctx.chat_id, &html).await;
                Ok(())
            }
        })
        .post(commit(store))
        .build()
}

fn demote(env: Arc<BuiltinEnv>) -> Result<Ability> {
    let store = env.store.clone();
    Ability::builder()
        .name(DEMOTE)
        .locality(Locality::All)
        .privacy(Privacy::Admin)
        .input(1)
        .action(move |ctx| {
            let env = env.clone();
            async move {
                let Some((username, user)) = env.target(&ctx).await? else {
                    return Ok(());
                };
                let admins = env.store.set::<UserId>(&env.access.admins_collection(ctx.chat_id))?;
                let username = escape_html(&username);
                let html = if admins.remove(&user.id)? {
                    tracing::info!(user_id = user.id.0, "user demoted");
                    format!("@{username} has been <b>demoted</b>.")
                } else {
                    format!("@{username} is <b>not</b> a <b>super admin</b>.")
                };
                env.say_formatted(ctx.chat_id, &html).await;
                Ok(())
            }
        })
        .post(commit(store))
        .build()
}

fn backup(env: Arc<BuiltinEnv>) -> Result<Ability> {
    Ability::builder()
        .name(BACKUP)
        .locality(Locality::User)
        .privacy(Privacy::Creator)
        .action(move |ctx| {
            let env = env.clone();
            async move {
                let data = env.backup.backup()?;
                if let Err(e) = env
                    .sender
                    .send_file(ctx.chat_id, &env.backup_file_name, data.into_bytes())
                    .await
                {
                    tracing::error!(error = %e, "could not send backup file");
                }
                Ok(())
            }
        })
        .build()
}

fn recover(env: Arc<BuiltinEnv>) -> Result<Ability> {
    let prompt_env = env.clone();
    let creator = env.access.creator_id();
    let from_creator = Predicate::custom(move |update: &Update| {
        update.sender().is_ok_and(|s| s.id == creator)
    });

    Ability::builder()
        .name(RECOVER)
        .locality(Locality::User)
        .privacy(Privacy::Creator)
        .action(move |ctx| {
            let env = prompt_env.clone();
            async move {
                let _ = env.sender.send_force_reply(ctx.chat_id, RECOVERY_MESSAGE).await;
                Ok(())
            }
        })
        .reply(
            move |update| {
                let env = env.clone();
                async move { recover_from_reply(&env, &update).await }
            },
            vec![
                Flag::Message.into(),
                Flag::Document.into(),
                Flag::Reply.into(),
                is_reply_to(RECOVERY_MESSAGE),
                from_creator,
            ],
        )
        .build()
}

async fn recover_from_reply(env: &BuiltinEnv, update: &Update) -> Result<()> {
    let chat_id = update.chat_id()?;
    let Some(file_id) = update
        .message()
        .and_then(|m| m.document.as_ref())
        .map(|d| d.file_id.clone())
    else {
        return Ok(());
    };

    let data = match env.sender.fetch_file(&file_id).await {
        Ok(bytes) => String::from_utf8(bytes).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    match data {
        Ok(text) => {
            let reply = if env.backup.recover(&text) {
                RECOVER_SUCCESS
            } else {
                RECOVER_REJECTED
            };
            env.say(chat_id, reply).await;
        }
        Err(e) => {
            tracing::error!(error = %e, %file_id, "could not read backup file");
            env.say(chat_id, RECOVER_FAILED).await;
        }
    }
    Ok(())
}
