use std::{process::ExitCode, sync::Arc};

use teloxide::Bot;
use tracing::{error, info};

use spb_core::{
    clock::{Clock, SystemClock},
    config::Config,
    messaging::port::MessagingPort,
    pipeline::Pipeline,
    security::RateLimiter,
};
use spb_telegram::{router, TelegramMessenger};

// Config and `.env` are read before any runtime thread exists.
fn main() -> ExitCode {
    // Logging is configured from the config, so a config failure can only go
    // to stderr.
    let cfg = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("spb: {e}");
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = match spb_core::logging::init(
        "spb",
        cfg.log_level,
        cfg.log_format,
        cfg.logs_dir.as_deref(),
    ) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("spb: {e}");
            return ExitCode::FAILURE;
        }
    };
    install_panic_hook();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "Failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(cfg)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Bot failed");
            ExitCode::FAILURE
        }
    }
}

async fn serve(mut cfg: Config) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());
    if cfg.bot_username.is_none() {
        cfg.bot_username = router::fetch_username(&bot).await;
    }
    run(Arc::new(cfg), bot).await
}

async fn run(cfg: Arc<Config>, bot: Bot) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let limiter = Arc::new(RateLimiter::new(
        cfg.rate_limit_window,
        cfg.rate_limit_max,
        clock.clone(),
    ));
    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let pipeline = Arc::new(Pipeline::launchpad(
        &cfg,
        messenger,
        limiter.clone(),
        clock,
    )?);

    info!(
        mode = cfg.delivery_mode(),
        bot_username = cfg.bot_username.as_deref(),
        "Starting Susumi Pioneer bot"
    );
    router::run(cfg, bot, pipeline, limiter).await
}

// Handler panics are caught by the pipeline; this covers everything else.
// Background task panics are turned into a shutdown by `router::run`.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        error!(panic = %info, "Uncaught panic");
        default_hook(info);
    }));
}
