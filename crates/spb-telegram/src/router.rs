use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use teloxide::{
    dispatching::{DefaultKey, Dispatcher, ShutdownToken},
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    types::BotCommand,
    RequestError,
    update_listeners::{webhooks, Polling},
};
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use spb_core::{
    config::{Config, WebhookConfig},
    dispatch::Command,
    pipeline::Pipeline,
    security::RateLimiter,
};

use crate::{convert, health};

/// Latch for process-level failures.
///
/// The first reason recorded wins. Tripping stops the dispatcher, and `run`
/// then returns the reason as an error.
#[derive(Clone, Default)]
pub struct Fatal {
    token: CancellationToken,
    reason: Arc<Mutex<Option<String>>>,
}

impl Fatal {
    pub fn trip(&self, reason: impl Into<String>) {
        let reason = reason.into();
        error!(reason = %reason, "Fatal error, shutting down");
        self.reason
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_or_insert(reason);
        self.token.cancel();
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub async fn tripped(&self) {
        self.token.cancelled().await
    }
}

/// Watch a background task and trip `fatal` if it panics.
fn supervise(name: &'static str, task: JoinHandle<()>, fatal: Fatal) -> JoinHandle<()> {
    tokio::spawn(async move {
        match task.await {
            Ok(()) => debug!(task = name, "background task stopped"),
            Err(e) if e.is_panic() => fatal.trip(format!("{name} task panicked")),
            Err(e) => debug!(task = name, error = %e, "background task cancelled"),
        }
    })
}

/// Ask the dispatcher to stop and wait for it to drain.
///
/// A fatal error can fire before dispatching has started, so an idle
/// dispatcher is retried for a few seconds.
async fn stop_dispatcher(token: ShutdownToken) {
    for _ in 0..50 {
        match token.shutdown() {
            Ok(drained) => return drained.await,
            Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
        }
    }
    warn!("dispatcher was not running at shutdown");
}

/// Run the bot until SIGINT/SIGTERM or a fatal background failure.
///
/// Picks webhook delivery when configured, long polling otherwise. Background
/// tasks (rate-limit sweep, heartbeat) live exactly as long as the dispatcher.
/// In webhook mode the webhook is deleted on every exit path.
pub async fn run(
    cfg: Arc<Config>,
    bot: Bot,
    pipeline: Arc<Pipeline>,
    limiter: Arc<RateLimiter>,
) -> anyhow::Result<()> {
    let started = Instant::now();
    register_commands(&bot).await;

    let fatal = Fatal::default();
    let cancel = CancellationToken::new();
    let sweeper = supervise(
        "rate limit sweeper",
        limiter.spawn_sweeper(cfg.rate_limit_sweep_interval, cancel.clone()),
        fatal.clone(),
    );
    let heartbeat = supervise(
        "heartbeat",
        spawn_heartbeat(
            cfg.health_check_interval,
            started,
            cfg.webhook.is_some(),
            limiter.clone(),
            cancel.clone(),
        ),
        fatal.clone(),
    );

    let handler = dptree::entry().endpoint(handle_update);
    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![pipeline])
        .build();

    let shutdown = dispatcher.shutdown_token();
    let watch = fatal.clone();
    tokio::spawn(async move {
        tokio::select! {
            signal = shutdown_signal() => info!(signal, "Shutdown signal received"),
            _ = watch.tripped() => {}
        }
        stop_dispatcher(shutdown).await;
    });

    let result = match &cfg.webhook {
        None => {
            info!(
                mode = "polling",
                launchpad_url = %cfg.launchpad_url,
                rate_limit_max = cfg.rate_limit_max,
                rate_limit_window_ms = cfg.rate_limit_window.as_millis() as u64,
                "Bot started"
            );
            let listener = Polling::builder(bot.clone()).drop_pending_updates().build();
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
            Ok(())
        }
        Some(webhook) => {
            serve_webhook(&cfg, webhook, &bot, &mut dispatcher, started, &fatal).await
        }
    };

    cancel.cancel();
    for task in [sweeper, heartbeat] {
        if let Err(e) = task.await {
            debug!(error = %e, "supervisor ended abnormally");
        }
    }
    if cfg.webhook.is_some() {
        release_webhook(&bot).await;
    }

    info!(uptime_secs = started.elapsed().as_secs(), "Bot stopped");
    match fatal.reason() {
        Some(reason) => Err(anyhow::anyhow!(reason)),
        None => result,
    }
}

async fn serve_webhook(
    cfg: &Config,
    webhook: &WebhookConfig,
    bot: &Bot,
    dispatcher: &mut Dispatcher<Bot, RequestError, DefaultKey>,
    started: Instant,
    fatal: &Fatal,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let mut options = webhooks::Options::new(addr, webhook.url.clone()).drop_pending_updates();
    if let Some(secret) = &webhook.secret {
        options = options.secret_token(secret.clone());
    }

    let (listener, stop_flag, webhook_routes) =
        webhooks::axum_to_router(bot.clone(), options).await?;
    info!(url = %webhook.url, path = %webhook.path, "Webhook configured");

    let app = webhook_routes.merge(health::router(health::HealthState::new(started)));
    let tcp = TcpListener::bind(addr).await?;
    let server_fatal = fatal.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(tcp, app)
            .with_graceful_shutdown(stop_flag)
            .await
        {
            server_fatal.trip(format!("webhook server failed: {e}"));
        }
    });
    let server = supervise("webhook server", server, fatal.clone());

    info!(
        mode = "webhook",
        port = cfg.port,
        launchpad_url = %cfg.launchpad_url,
        rate_limit_max = cfg.rate_limit_max,
        rate_limit_window_ms = cfg.rate_limit_window.as_millis() as u64,
        "Bot started"
    );
    dispatcher
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the webhook listener"),
        )
        .await;

    if let Err(e) = server.await {
        debug!(error = %e, "supervisor ended abnormally");
    }
    Ok(())
}

/// The bot's own username, used to reject commands addressed to other bots
/// in group chats. Best-effort.
pub async fn fetch_username(bot: &Bot) -> Option<String> {
    match bot.get_me().await {
        Ok(me) => me.user.username.clone(),
        Err(e) => {
            warn!(error = %e, "Failed to fetch bot identity");
            None
        }
    }
}

/// Delete the webhook and drop whatever Telegram still has queued.
pub async fn release_webhook(bot: &Bot) {
    match bot.delete_webhook().drop_pending_updates(true).await {
        Ok(_) => info!("Webhook deleted"),
        Err(e) => warn!(error = %e, "Failed to delete webhook"),
    }
}

async fn handle_update(update: Update, pipeline: Arc<Pipeline>) -> ResponseResult<()> {
    let outcome = pipeline.handle(convert::to_core(&update)).await;
    debug!(update_id = update.id.0, ?outcome, "update processed");
    Ok(())
}

fn bot_commands() -> Vec<BotCommand> {
    Command::ALL
        .into_iter()
        .map(|c| BotCommand::new(c.name(), c.description()))
        .collect()
}

async fn register_commands(bot: &Bot) {
    match bot.set_my_commands(bot_commands()).await {
        Ok(_) => debug!("bot command menu registered"),
        Err(e) => warn!(error = %e, "Failed to register bot commands"),
    }
}

fn spawn_heartbeat(
    interval: Duration,
    started: Instant,
    webhook: bool,
    limiter: Arc<RateLimiter>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.tick().await; // first tick fires immediately
        loop {
            tokio::select! {
              _ = cancel.cancelled() => break,
              _ = tick.tick() => {
                info!(
                    uptime_secs = started.elapsed().as_secs(),
                    webhook,
                    tracked_users = limiter.tracked_users(),
                    "Bot health check"
                );
              }
            }
        }
    })
}

/// Resolves with the name of the first termination signal received.
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
