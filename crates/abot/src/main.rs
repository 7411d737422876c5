use std::sync::Arc;

use abot_core::{
    config::Config,
    messaging::MessageSender,
    store::{JsonFileBackend, Store},
    AbilityBot,
};
use abot_telegram::TelegramSender;

mod demo;

#[tokio::main]
async fn main() -> Result<(), abot_core::Error> {
    abot_core::logging::init("abot")?;

    let cfg = Arc::new(Config::load()?);
    tracing::info!(store = %cfg.store_path.display(), "opening store");
    let store = Arc::new(Store::open(JsonFileBackend::new(cfg.store_path.clone()))?);

    let telegram = Arc::new(TelegramSender::from_token(&cfg.bot_token));
    let sender: Arc<dyn MessageSender> = telegram.clone();

    let abilities = demo::abilities(store.clone(), sender.clone())?;
    let bot = Arc::new(AbilityBot::new(&cfg, store, sender, abilities)?);

    abot_telegram::router::run_polling(cfg, telegram.bot(), bot)
        .await
        .map_err(|e| abot_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
