use std::sync::Arc;

use crate::{
    ability::Ability,
    access::AccessModel,
    backup::BackupCoordinator,
    builtins::{self, BuiltinEnv},
    config::Config,
    dispatch::{Dispatcher, Outcome},
    messaging::MessageSender,
    registry::Registry,
    store::Store,
    update::Update,
    Result,
};

/// A ready-to-run bot: built-in abilities plus the caller's own, wired to a
/// store and an outbound sender.
pub struct AbilityBot {
    dispatcher: Dispatcher,
    store: Arc<Store>,
    backup: Arc<BackupCoordinator>,
}

impl AbilityBot {
    /// Fails if a custom ability reuses a reserved name.
    pub fn new(
        config: &Config,
        store: Arc<Store>,
        sender: Arc<dyn MessageSender>,
        custom: Vec<Ability>,
    ) -> Result<Self> {
        let access = AccessModel::new(config.creator_id, config.admin_scope, store.clone());
        let backup = Arc::new(BackupCoordinator::new(store.clone()));

        let env = Arc::new(BuiltinEnv {
            store: store.clone(),
            sender,
            access: access.clone(),
            backup: backup.clone(),
            backup_file_name: config.backup_file_name.clone(),
        });

        let catalog = custom
            .iter()
            .map(|a| (a.name().to_string(), a.info().map(str::to_string)))
            .collect();
        let mut abilities = builtins::abilities(env, catalog)?;
        abilities.extend(custom);

        let registry = Registry::new(abilities)?;
        let dispatcher = Dispatcher::new(registry, access, store.clone(), &config.bot_username)?;
        tracing::info!(
            creator_id = config.creator_id.0,
            username = %config.bot_username,
            "ability bot ready"
        );

        Ok(Self {
            dispatcher,
            store,
            backup,
        })
    }

    pub async fn handle(&self, update: Update) -> Result<Outcome> {
        self.dispatcher.dispatch(update).await
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn backup(&self) -> &BackupCoordinator {
        &self.backup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AdminScope, Locality, Privacy};
    use crate::builtins::{
        BAN, CLAIM, NO_COMMANDS, RECOVERY_MESSAGE, RECOVER_FAILED, RECOVER_REJECTED,
        RECOVER_SUCCESS,
    };
    use crate::domain::{ChatId, EndUser, UserId};
    use crate::errors::Error;
    use crate::store::{ADMINS, BLACKLIST, USERS};
    use crate::testkit::{
        group_text, private_text, private_text_from, reply_with_document, FakeSender, Sent,
    };
    use std::path::PathBuf;

    const CREATOR: i64 = 1337;

    fn config() -> Config {
        Config {
            bot_token: "token".to_string(),
            bot_username: "TestBot".to_string(),
            creator_id: UserId(CREATOR),
            store_path: PathBuf::from("unused.json"),
            backup_file_name: "backup.json".to_string(),
            admin_scope: AdminScope::Global,
        }
    }

    fn greet() -> Ability {
        Ability::builder()
            .name("greet")
            .info("says hello")
            .privacy(Privacy::Public)
            .locality(Locality::All)
            .action(|_ctx| async { Ok(()) })
            .build()
            .unwrap()
    }

    fn bot_with(custom: Vec<Ability>) -> (AbilityBot, Arc<FakeSender>) {
        let sender = FakeSender::new();
        let bot = AbilityBot::new(
            &config(),
            Arc::new(Store::in_memory()),
            sender.clone(),
            custom,
        )
        .unwrap();
        (bot, sender)
    }

    fn bot() -> (AbilityBot, Arc<FakeSender>) {
        bot_with(vec![greet()])
    }

    fn creator() -> EndUser {
        EndUser::new(CREATOR, "creatorFirst", Some("creatorLast"), Some("creatorUsername"))
    }

    fn musername() -> EndUser {
        EndUser::new(1, "first", Some("last"), Some("username"))
    }

    fn known(bot: &AbilityBot, user: &EndUser) {
        bot.store().set::<EndUser>(USERS).unwrap().insert(user).unwrap();
    }

    fn admin(bot: &AbilityBot, id: i64) {
        bot.store().set::<UserId>(ADMINS).unwrap().insert(&UserId(id)).unwrap();
    }

    fn banned(bot: &AbilityBot, id: i64) -> bool {
        bot.store()
            .set::<UserId>(BLACKLIST)
            .unwrap()
            .contains(&UserId(id))
            .unwrap()
    }

    #[test]
    fn reserved_names_cannot_be_reused() {
        let clash = Ability::builder()
            .name(BAN)
            .privacy(Privacy::Public)
            .locality(Locality::All)
            .action(|_ctx| async { Ok(()) })
            .build()
            .unwrap();
        let err = AbilityBot::new(
            &config(),
            Arc::new(Store::in_memory()),
            FakeSender::new(),
            vec![clash],
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::DuplicateAbility(n) if n == BAN));
    }

    #[tokio::test]
    async fn commands_lists_abilities_with_info() {
        let (bot, sender) = bot();
        bot.handle(private_text(1, "/commands")).await.unwrap();
        assert_eq!(sender.texts(), vec!["greet - says hello".to_string()]);

        let (bot, sender) = bot_with(vec![]);
        bot.handle(private_text(1, "/commands")).await.unwrap();
        assert_eq!(sender.texts(), vec![NO_COMMANDS.to_string()]);
    }

    #[tokio::test]
    async fn creator_can_claim_bot() {
        let (bot, sender) = bot();
        let out = bot.handle(private_text_from(&creator(), "/claim")).await.unwrap();
        assert_eq!(out, Outcome::Invoked(CLAIM.to_string()));
        assert!(bot
            .store()
            .set::<UserId>(ADMINS)
            .unwrap()
            .contains(&UserId(CREATOR))
            .unwrap());
        assert_eq!(sender.texts(), vec!["You're now my master.".to_string()]);

        bot.handle(private_text_from(&creator(), "/claim")).await.unwrap();
        assert_eq!(sender.texts()[1], "You're already my master.");
    }

    #[tokio::test]
    async fn user_gets_banned_if_claims_bot() {
        let (bot, _sender) = bot();
        bot.handle(private_text_from(&musername(), "/claim")).await.unwrap();
        assert!(banned(&bot, 1));
        assert!(bot.store().set::<UserId>(ADMINS).unwrap().is_empty());

        // And is now ignored.
        let out = bot.handle(private_text_from(&musername(), "/greet")).await.unwrap();
        assert_eq!(out, Outcome::Dropped(crate::dispatch::Gate::Blacklist));
    }

    #[tokio::test]
    async fn admin_can_ban_and_unban_user() {
        let (bot, sender) = bot();
        admin(&bot, 2);
        known(&bot, &musername());

        bot.handle(private_text(2, "/ban @UserName")).await.unwrap();
        assert!(banned(&bot, 1));
        assert_eq!(
            sender.sent().last().unwrap(),
            &Sent::Formatted(ChatId(2), "username is now <b>banned</b>.".to_string())
        );

        bot.handle(private_text(2, "/ban username")).await.unwrap();
        assert_eq!(sender.texts().last().unwrap(), "username is already <b>banned</b>.");

        bot.handle(private_text(2, "/unban @username")).await.unwrap();
        assert!(!banned(&bot, 1));
        assert_eq!(
            sender.texts().last().unwrap(),
            "@username, your ban has been <b>lifted</b>."
        );

        bot.handle(private_text(2, "/unban @username")).await.unwrap();
        assert_eq!(
            sender.texts().last().unwrap(),
            "@username is <b>not</b> on the <b>blacklist</b>."
        );
    }

    #[tokio::test]
    async fn banning_the_creator_bans_the_caller() {
        let (bot, sender) = bot();
        admin(&bot, 1);
        known(&bot, &creator());
        known(&bot, &musername());

        bot.handle(private_text_from(&musername(), "/ban @creatorUsername"))
            .await
            .unwrap();
        assert!(!banned(&bot, CREATOR));
        assert!(banned(&bot, 1));
        assert_eq!(sender.texts().last().unwrap(), "first is now <b>banned</b>.");
    }

    #[tokio::test]
    async fn unknown_target_gets_a_notice() {
        let (bot, sender) = bot();
        admin(&bot, 2);
        bot.handle(private_text(2, "/promote @ghost")).await.unwrap();
        assert_eq!(
            sender.texts(),
            vec!["Sorry, I could not find the user <b>@ghost</b>.".to_string()]
        );
        assert!(!bot.store().set::<UserId>(ADMINS).unwrap().contains(&UserId(0)).unwrap());
    }

    #[tokio::test]
    async fn public_user_cannot_ban() {
        let (bot, sender) = bot();
        known(&bot, &musername());
        let out = bot.handle(private_text(3, "/ban @username")).await.unwrap();
        assert_eq!(out, Outcome::Dropped(crate::dispatch::Gate::Privacy));
        assert!(!banned(&bot, 1));
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn promote_then_demote() {
        let (bot, sender) = bot();
        known(&bot, &musername());

        bot.handle(private_text(CREATOR, "/promote @username")).await.unwrap();
        let admins = bot.store().set::<UserId>(ADMINS).unwrap();
        assert!(admins.contains(&UserId(1)).unwrap());
        assert_eq!(sender.texts().last().unwrap(), "@username is now a <b>super admin</b>.");

        bot.handle(private_text(CREATOR, "/promote @username")).await.unwrap();
        assert_eq!(
            sender.texts().last().unwrap(),
            "@username is already a <b>super admin</b>."
        );

        bot.handle(private_text(CREATOR, "/demote @username")).await.unwrap();
        assert!(!admins.contains(&UserId(1)).unwrap());
        assert_eq!(sender.texts().last().unwrap(), "@username has been <b>demoted</b>.");

        bot.handle(private_text(CREATOR, "/demote @username")).await.unwrap();
        assert_eq!(
            sender.texts().last().unwrap(),
            "@username is <b>not</b> a <b>super admin</b>."
        );
    }

    #[tokio::test]
    async fn backup_is_creator_only_and_private_only() {
        let (bot, sender) = bot();
        let out = bot.handle(private_text(1, "/backup")).await.unwrap();
        assert_eq!(out, Outcome::Dropped(crate::dispatch::Gate::Privacy));

        let out = bot.handle(group_text(CREATOR, -10, "/backup")).await.unwrap();
        assert_eq!(out, Outcome::Dropped(crate::dispatch::Gate::Locality));
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn backup_sends_store_as_file() {
        let (bot, sender) = bot();
        bot.handle(private_text(CREATOR, "/backup")).await.unwrap();

        let sent = sender.sent();
        let Some(Sent::File(chat, name, bytes)) = sent.last() else {
            panic!("expected a file, got {sent:?}");
        };
        assert_eq!(*chat, ChatId(CREATOR));
        assert_eq!(name, "backup.json");
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains(USERS));
    }

    #[tokio::test]
    async fn recover_round_trip_through_reply() {
        let (bot, sender) = bot();
        known(&bot, &musername());
        admin(&bot, 1);
        let backup = bot.backup().backup().unwrap();

        bot.store().clear().unwrap();
        assert!(bot.store().set::<UserId>(ADMINS).unwrap().is_empty());

        bot.handle(private_text(CREATOR, "/recover")).await.unwrap();
        assert_eq!(
            sender.sent().last().unwrap(),
            &Sent::ForceReply(ChatId(CREATOR), RECOVERY_MESSAGE.to_string())
        );

        sender.add_file("file-1", backup.as_bytes());
        let out = bot
            .handle(reply_with_document(CREATOR, RECOVERY_MESSAGE, "file-1"))
            .await
            .unwrap();
        assert_eq!(out, Outcome::Replied);
        assert_eq!(sender.texts().last().unwrap(), RECOVER_SUCCESS);
        assert!(bot
            .store()
            .set::<UserId>(ADMINS)
            .unwrap()
            .contains(&UserId(1))
            .unwrap());
    }

    #[tokio::test]
    async fn recover_with_garbage_keeps_state() {
        let (bot, sender) = bot();
        admin(&bot, 5);
        sender.add_file("bad", b"definitely not json");

        let out = bot
            .handle(reply_with_document(CREATOR, RECOVERY_MESSAGE, "bad"))
            .await
            .unwrap();
        assert_eq!(out, Outcome::Replied);
        assert_eq!(sender.texts().last().unwrap(), RECOVER_REJECTED);
        assert!(bot
            .store()
            .set::<UserId>(ADMINS)
            .unwrap()
            .contains(&UserId(5))
            .unwrap());
    }

    #[tokio::test]
    async fn recover_with_misshapen_users_keeps_bot_usable() {
        let (bot, sender) = bot();
        admin(&bot, 5);
        let backup = bot.backup().backup().unwrap();
        sender.add_file(
            "bad",
            br#"{"version":1,"collections":{"USERS":{"kind":"list","items":[]}}}"#,
        );

        bot.handle(reply_with_document(CREATOR, RECOVERY_MESSAGE, "bad"))
            .await
            .unwrap();
        assert_eq!(sender.texts().last().unwrap(), RECOVER_REJECTED);

        // Updates still get past the user upsert, including a second recovery.
        assert!(bot.handle(private_text(CREATOR, "/commands")).await.is_ok());
        sender.add_file("good", backup.as_bytes());
        let out = bot
            .handle(reply_with_document(CREATOR, RECOVERY_MESSAGE, "good"))
            .await
            .unwrap();
        assert_eq!(out, Outcome::Replied);
        assert_eq!(sender.texts().last().unwrap(), RECOVER_SUCCESS);
        assert!(bot
            .store()
            .set::<UserId>(ADMINS)
            .unwrap()
            .contains(&UserId(5))
            .unwrap());
    }

    #[tokio::test]
    async fn recover_reports_download_failure() {
        let (bot, sender) = bot();
        let out = bot
            .handle(reply_with_document(CREATOR, RECOVERY_MESSAGE, "missing"))
            .await
            .unwrap();
        assert_eq!(out, Outcome::Replied);
        assert_eq!(sender.texts().last().unwrap(), RECOVER_FAILED);
    }

    #[tokio::test]
    async fn recover_reply_from_non_creator_is_not_consumed() {
        let (bot, sender) = bot();
        sender.add_file("f", b"{}");
        let out = bot
            .handle(reply_with_document(1, RECOVERY_MESSAGE, "f"))
            .await
            .unwrap();
        assert_ne!(out, Outcome::Replied);
        assert!(sender.texts().is_empty());
    }
}
