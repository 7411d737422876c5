use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use abot_core::{config::Config, dispatch::Outcome, AbilityBot};

use crate::convert;

#[derive(Clone)]
pub struct AppState {
    pub bot: Arc<AbilityBot>,
}

/// Long-poll Telegram with `tg` and feed every update to `bot`.
pub async fn run_polling(cfg: Arc<Config>, tg: Bot, bot: Arc<AbilityBot>) -> anyhow::Result<()> {
    match tg.get_me().await {
        Ok(me) => {
            let actual = me.username();
            if !actual.eq_ignore_ascii_case(&cfg.bot_username) {
                tracing::warn!(
                    configured = %cfg.bot_username,
                    %actual,
                    "BOT_USERNAME does not match the token's bot; mentions will not be stripped"
                );
            }
            tracing::info!(username = %actual, "telegram bot connected");
        }
        Err(e) => tracing::warn!(error = %e, "get_me failed; continuing"),
    }

    let state = Arc::new(AppState { bot });

    let handler = dptree::entry().endpoint(handle_update);

    // Single distribution key: updates are handled one at a time, in order.
    Dispatcher::builder(tg, handler)
        .dependencies(dptree::deps![state])
        .distribution_function(|_| Some(()))
        .build()
        .dispatch()
        .await;

    tracing::info!("polling stopped");
    Ok(())
}

/// Runs one update in its own task so a failing or panicking ability only
/// loses that update.
async fn handle_update(update: Update, state: Arc<AppState>) -> anyhow::Result<()> {
    let update = convert::update(&update);
    let update_id = update.update_id;

    let bot = state.bot.clone();
    let task = tokio::spawn(async move { bot.handle(update).await });

    match task.await {
        Ok(Ok(Outcome::Dropped(gate))) => {
            tracing::debug!(update_id, ?gate, "update ignored");
        }
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            tracing::error!(update_id, error = %e, "update handling failed");
        }
        Err(e) if e.is_panic() => {
            tracing::error!(update_id, "ability panicked while handling update");
        }
        Err(e) => {
            tracing::error!(update_id, error = %e, "update task was cancelled");
        }
    }
    Ok(())
}
