//! The per-update pipeline: guards, bookkeeping, reply matching, command
//! resolution, access checks and invocation, in a fixed order.
//!
//! Every gate is total and side-effect free; the only writes happen in user
//! upsert, reply actions, and the ability's action/post-action. A failed gate
//! drops the update silently and is reported as [`Outcome::Dropped`].

use std::{sync::Arc, time::Instant};

use regex::Regex;

use crate::{
    ability::{Ability, MessageContext},
    access::AccessModel,
    domain::{EndUser, UserId},
    errors::Error,
    flags::{all_hold, Flag},
    registry::Registry,
    store::{Store, BLACKLIST, USERS},
    update::{Message, Update},
    Result,
};

const COMMAND_MARKER: char = '/';

/// Pipeline stages that can drop an update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    GlobalFlags,
    Blacklist,
    ValidateAbility,
    Flags,
    Privacy,
    Locality,
    Arity,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Dropped(Gate),
    /// A reply rule consumed the update.
    Replied,
    /// The named ability ran (and its post-action, if any).
    Invoked(String),
}

/// What the user-upsert step did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserChange {
    Inserted,
    Updated,
    Unchanged,
}

/// Result of command resolution: `ability` is `None` for unknown commands.
#[derive(Clone, Debug)]
pub struct Resolution {
    pub ability: Option<Arc<Ability>>,
    pub arguments: Vec<String>,
}

/// A resolved ability awaiting the access gates.
pub struct Candidate<'u> {
    pub update: &'u Update,
    pub ability: Arc<Ability>,
    pub arguments: Vec<String>,
}

type GateFn = fn(&Dispatcher, &Candidate<'_>) -> Result<bool>;

/// Post-resolution gates, in evaluation order. Authorization comes before
/// shape checks so a rejected caller learns nothing about expected arguments.
const ABILITY_GATES: [(Gate, GateFn); 4] = [
    (Gate::Flags, Dispatcher::check_flags),
    (Gate::Privacy, Dispatcher::check_privacy),
    (Gate::Locality, Dispatcher::check_locality),
    (Gate::Arity, Dispatcher::check_arity),
];

pub struct Dispatcher {
    registry: Registry,
    access: AccessModel,
    store: Arc<Store>,
    self_mention: Option<Regex>,
}

impl Dispatcher {
    /// `bot_username` is stripped from `/command@bot_username` tokens.
    pub fn new(
        registry: Registry,
        access: AccessModel,
        store: Arc<Store>,
        bot_username: &str,
    ) -> Result<Self> {
        let bot_username = bot_username.trim().trim_start_matches('@');
        let self_mention = if bot_username.is_empty() {
            None
        } else {
            let pattern = format!("(?i)@{}$", regex::escape(bot_username));
            Some(Regex::new(&pattern).map_err(|e| Error::Config(format!("bot username: {e}")))?)
        };

        Ok(Self {
            registry,
            access,
            store,
            self_mention,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn access(&self) -> &AccessModel {
        &self.access
    }

    /// Run one update through the whole pipeline.
    ///
    /// Errors come from unresolvable update shapes, the store, or the
    /// ability itself; callers should contain them to this update.
    pub async fn dispatch(&self, update: Update) -> Result<Outcome> {
        let started = Instant::now();
        let update_id = update.update_id;
        tracing::info!(update_id, "update received");

        let outcome = self.process(update).await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(o) => tracing::info!(update_id, elapsed_ms, outcome = ?o, "update processed"),
            Err(e) => tracing::error!(update_id, elapsed_ms, error = %e, "update failed"),
        }
        outcome
    }

    async fn process(&self, update: Update) -> Result<Outcome> {
        if !self.check_global_flags(&update) {
            return Ok(dropped(Gate::GlobalFlags, &update));
        }
        if !self.check_blacklist(&update)? {
            return Ok(dropped(Gate::Blacklist, &update));
        }

        self.upsert_user(&update)?;

        if self.match_reply(&update).await? {
            return Ok(Outcome::Replied);
        }

        let Resolution { ability, arguments } = self.resolve(&update);
        let Some(ability) = ability else {
            return Ok(dropped(Gate::ValidateAbility, &update));
        };

        let candidate = Candidate {
            update: &update,
            ability,
            arguments,
        };
        for (gate, check) in ABILITY_GATES {
            if !check(self, &candidate)? {
                return Ok(dropped(gate, &update));
            }
        }

        let Candidate {
            ability, arguments, ..
        } = candidate;
        let ctx = self.build_context(&update, arguments)?;
        self.invoke(&ability, ctx).await?;
        Ok(Outcome::Invoked(ability.name().to_string()))
    }

    /// Only plain messages enter the pipeline.
    pub fn check_global_flags(&self, update: &Update) -> bool {
        Flag::Message.test(update)
    }

    /// The creator can never be locked out.
    pub fn check_blacklist(&self, update: &Update) -> Result<bool> {
        let id = update.sender()?.id;
        if self.access.is_creator(id) {
            return Ok(true);
        }
        Ok(!self.store.set::<UserId>(BLACKLIST)?.contains(&id)?)
    }

    /// Record the sender in `USERS`, replacing the stored record on profile
    /// drift. Commits immediately when anything changed.
    pub fn upsert_user(&self, update: &Update) -> Result<UserChange> {
        let user = update.sender()?.to_end_user();
        let users = self.store.set::<EndUser>(USERS)?;

        let change = match users.find(|u| u.id == user.id)? {
            None => {
                users.insert(&user)?;
                UserChange::Inserted
            }
            Some(existing) if existing != user => {
                users.remove(&existing)?;
                users.insert(&user)?;
                UserChange::Updated
            }
            Some(_) => UserChange::Unchanged,
        };

        if change != UserChange::Unchanged {
            self.store.commit()?;
            tracing::debug!(user_id = user.id.0, ?change, "user record stored");
        }
        Ok(change)
    }

    /// Run the first reply rule whose conditions all hold. Returns whether
    /// the update was consumed.
    pub async fn match_reply(&self, update: &Update) -> Result<bool> {
        let Some(rule) = self.registry.replies().iter().find(|r| r.is_ok_for(update)) else {
            return Ok(false);
        };
        tracing::debug!(update_id = update.update_id, "reply rule matched");
        rule.act_on(update.clone()).await?;
        Ok(true)
    }

    /// Map the message body to an ability and its argument tokens.
    ///
    /// `/name args...` looks up `name` (minus any `@botname` suffix); anything
    /// else goes to the default ability with every token as an argument.
    pub fn resolve(&self, update: &Update) -> Resolution {
        let Some(body) = update.message().and_then(Message::body) else {
            return self.default_resolution(Vec::new());
        };

        let mut tokens: Vec<String> = body.split_whitespace().map(str::to_string).collect();
        let command = tokens
            .first()
            .and_then(|t| t.strip_prefix(COMMAND_MARKER))
            .map(|name| self.strip_self_mention(name));

        match command {
            Some(name) => {
                tokens.remove(0);
                Resolution {
                    ability: self.registry.resolve(&name),
                    arguments: tokens,
                }
            }
            None => self.default_resolution(tokens),
        }
    }

    fn default_resolution(&self, arguments: Vec<String>) -> Resolution {
        Resolution {
            ability: self.registry.default_ability(),
            arguments,
        }
    }

    fn strip_self_mention(&self, token: &str) -> String {
        match &self.self_mention {
            Some(re) => re.replace(token, "").into_owned(),
            None => token.to_string(),
        }
    }

    pub fn check_flags(&self, c: &Candidate<'_>) -> Result<bool> {
        Ok(all_hold(c.ability.flags(), c.update))
    }

    pub fn check_privacy(&self, c: &Candidate<'_>) -> Result<bool> {
        let id = c.update.sender()?.id;
        let chat_id = c.update.chat_id()?;
        Ok(self.access.effective_privacy(id, chat_id)? >= c.ability.privacy())
    }

    pub fn check_locality(&self, c: &Candidate<'_>) -> Result<bool> {
        Ok(c.ability.locality().allows(c.update.is_private()?))
    }

    pub fn check_arity(&self, c: &Candidate<'_>) -> Result<bool> {
        Ok(arity_accepts(c.ability.arity(), c.arguments.len()))
    }

    pub fn build_context(&self, update: &Update, arguments: Vec<String>) -> Result<MessageContext> {
        let user = update.sender()?.to_end_user();
        let chat_id = update.chat_id()?;
        Ok(MessageContext::new(user, chat_id, arguments, update.clone()))
    }

    /// Run the action, then the post-action regardless of the action's
    /// result. The action's error wins over the post-action's.
    pub async fn invoke(&self, ability: &Ability, ctx: MessageContext) -> Result<()> {
        let result = ability.run(ctx.clone()).await;
        let post = ability.run_post(ctx).await;

        match (result, post) {
            (Ok(()), post) => post,
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(post_err)) => {
                tracing::warn!(ability = ability.name(), error = %post_err, "post action failed");
                Err(e)
            }
        }
    }
}

/// Zero arity accepts anything; otherwise the count must match exactly and
/// can never be zero.
pub fn arity_accepts(arity: usize, token_count: usize) -> bool {
    arity == 0 || (token_count > 0 && token_count == arity)
}

fn dropped(gate: Gate, update: &Update) -> Outcome {
    tracing::debug!(update_id = update.update_id, ?gate, "update dropped");
    Outcome::Dropped(gate)
}
