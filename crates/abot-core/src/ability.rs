//! Ability descriptors, reply rules and the per-update message context.

use std::{fmt, future::Future, pin::Pin, sync::Arc};

use crate::{
    access::{Locality, Privacy},
    domain::{ChatId, EndUser},
    errors::Error,
    flags::{all_hold, Predicate},
    update::Update,
    Result,
};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Body of an ability (or its post-action).
pub type Action = Arc<dyn Fn(MessageContext) -> BoxFuture<Result<()>> + Send + Sync>;

/// Body of a reply rule; receives the raw update.
pub type ReplyAction = Arc<dyn Fn(Update) -> BoxFuture<Result<()>> + Send + Sync>;

/// Wrap an async closure as an [`Action`].
pub fn action<F, Fut>(f: F) -> Action
where
    F: Fn(MessageContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// Wrap an async closure as a [`ReplyAction`].
pub fn reply_action<F, Fut>(f: F) -> ReplyAction
where
    F: Fn(Update) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |upd| Box::pin(f(upd)))
}

/// Everything a handler needs about the update it was dispatched for.
#[derive(Clone, Debug)]
pub struct MessageContext {
    pub user: EndUser,
    pub chat_id: ChatId,
    pub arguments: Vec<String>,
    pub update: Update,
}

impl MessageContext {
    pub fn new(user: EndUser, chat_id: ChatId, arguments: Vec<String>, update: Update) -> Self {
        Self {
            user,
            chat_id,
            arguments,
            update,
        }
    }

    pub fn first_arg(&self) -> Option<&str> {
        self.arguments.first().map(String::as_str)
    }

    /// Second argument, wrapping around when fewer were given.
    pub fn second_arg(&self) -> Option<&str> {
        self.wrapped_arg(1)
    }

    /// Third argument, wrapping around when fewer were given.
    pub fn third_arg(&self) -> Option<&str> {
        self.wrapped_arg(2)
    }

    fn wrapped_arg(&self, idx: usize) -> Option<&str> {
        if self.arguments.is_empty() {
            return None;
        }
        Some(self.arguments[idx % self.arguments.len()].as_str())
    }
}

/// A conditional continuation: when every condition holds, `action` consumes
/// the update and command dispatch is skipped.
#[derive(Clone)]
pub struct ReplyRule {
    pub conditions: Vec<Predicate>,
    pub action: ReplyAction,
}

impl ReplyRule {
    pub fn new(action: ReplyAction, conditions: Vec<Predicate>) -> Self {
        Self { conditions, action }
    }

    pub fn is_ok_for(&self, update: &Update) -> bool {
        all_hold(&self.conditions, update)
    }

    pub async fn act_on(&self, update: Update) -> Result<()> {
        (self.action)(update).await
    }
}

impl fmt::Debug for ReplyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyRule")
            .field("conditions", &self.conditions)
            .finish_non_exhaustive()
    }
}

/// A named, access-controlled command handler. Immutable once built.
#[derive(Clone)]
pub struct Ability {
    name: String,
    info: Option<String>,
    locality: Locality,
    privacy: Privacy,
    arity: usize,
    flags: Vec<Predicate>,
    action: Action,
    post_action: Option<Action>,
    replies: Vec<ReplyRule>,
}

impl Ability {
    pub fn builder() -> AbilityBuilder {
        AbilityBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> Option<&str> {
        self.info.as_deref()
    }

    pub fn locality(&self) -> Locality {
        self.locality
    }

    pub fn privacy(&self) -> Privacy {
        self.privacy
    }

    /// Expected argument count; 0 means "any".
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn flags(&self) -> &[Predicate] {
        &self.flags
    }

    pub fn replies(&self) -> &[ReplyRule] {
        &self.replies
    }

    pub fn has_post_action(&self) -> bool {
        self.post_action.is_some()
    }

    pub async fn run(&self, ctx: MessageContext) -> Result<()> {
        (self.action)(ctx).await
    }

    /// Runs the post-action if one is declared.
    pub async fn run_post(&self, ctx: MessageContext) -> Result<()> {
        match &self.post_action {
            Some(post) => post(ctx).await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ability")
            .field("name", &self.name)
            .field("locality", &self.locality)
            .field("privacy", &self.privacy)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct AbilityBuilder {
    name: Option<String>,
    info: Option<String>,
    locality: Option<Locality>,
    privacy: Option<Privacy>,
    arity: usize,
    flags: Vec<Predicate>,
    action: Option<Action>,
    post_action: Option<Action>,
    replies: Vec<ReplyRule>,
}

impl AbilityBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    pub fn locality(mut self, locality: Locality) -> Self {
        self.locality = Some(locality);
        self
    }

    pub fn privacy(mut self, privacy: Privacy) -> Self {
        self.privacy = Some(privacy);
        self
    }

    pub fn input(mut self, arity: usize) -> Self {
        self.arity = arity;
        self
    }

    pub fn flag(mut self, flag: impl Into<Predicate>) -> Self {
        self.flags.push(flag.into());
        self
    }

    pub fn action<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(MessageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.action = Some(action(f));
        self
    }

    pub fn post(mut self, post: Action) -> Self {
        self.post_action = Some(post);
        self
    }

    pub fn reply<F, Fut>(mut self, f: F, conditions: Vec<Predicate>) -> Self
    where
        F: Fn(Update) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.replies
            .push(ReplyRule::new(reply_action(f), conditions));
        self
    }

    pub fn build(self) -> Result<Ability> {
        let name = self.name.unwrap_or_default();
        let invalid = |reason: &str| Error::InvalidAbility {
            name: name.clone(),
            reason: reason.to_string(),
        };

        if name.trim().is_empty() {
            return Err(invalid("name cannot be empty"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(invalid("name cannot contain whitespace"));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid("name can only be alphanumeric"));
        }
        let locality = self
            .locality
            .ok_or_else(|| invalid("a locality must be specified"))?;
        let privacy = self
            .privacy
            .ok_or_else(|| invalid("a privacy level must be specified"))?;
        let action = self
            .action
            .ok_or_else(|| invalid("an action must be specified"))?;

        if self.post_action.is_none() {
            tracing::debug!(ability = %name, "no post action declared");
        }

        Ok(Ability {
            name,
            info: self.info,
            locality,
            privacy,
            arity: self.arity,
            flags: self.flags,
            action,
            post_action: self.post_action,
            replies: self.replies,
        })
    }
}
