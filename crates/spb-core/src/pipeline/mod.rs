//! Per-update middleware chain.
//!
//! Every inbound update runs through an ordered list of stages and then the
//! dispatch endpoint. A stage either calls `next.run(ctx)` to continue or
//! returns early to stop propagation. The production order is
//! recovery → sanitize → throttle → dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use crate::{
    clock::Clock,
    config::Config,
    dispatch::{Dispatcher, HandlerTable, Route},
    messaging::{port::MessagingPort, types::Update},
    security::RateLimiter,
    Result,
};

mod recovery;
mod sanitize;
mod throttle;

pub use recovery::Recovery;
pub use sanitize::Sanitize;
pub use throttle::Throttle;

/// Terminal result of one update. Exactly one is produced per update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// No handler matched; nothing was sent.
    Ignored,
    Handled(Route),
    /// Denied by the rate limiter; the user got the throttling notice.
    Throttled,
    /// A stage or handler failed and the recovery stage took over.
    Recovered { notice_delivered: bool },
}

/// Mutable state threaded through the chain for a single update.
#[derive(Debug)]
pub struct UpdateContext {
    pub update: Update,
    pub outcome: Outcome,
}

impl UpdateContext {
    pub fn new(update: Update) -> Self {
        Self {
            update,
            outcome: Outcome::Ignored,
        }
    }
}

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: &mut UpdateContext, next: Next<'_>) -> Result<()>;
}

/// The innermost step of the chain.
#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn call(&self, ctx: &mut UpdateContext) -> Result<()>;
}

/// The remainder of the chain after the current stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    pub async fn run(self, ctx: &mut UpdateContext) -> Result<()> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    endpoint: self.endpoint,
                };
                stage.handle(ctx, next).await
            }
            None => self.endpoint.call(ctx).await,
        }
    }
}

pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
    endpoint: Arc<dyn Endpoint>,
}

impl Pipeline {
    pub fn new(stages: Vec<Arc<dyn Middleware>>, endpoint: Arc<dyn Endpoint>) -> Self {
        Self { stages, endpoint }
    }

    /// The production chain with every launchpad command and action registered.
    pub fn launchpad(
        cfg: &Config,
        messenger: Arc<dyn MessagingPort>,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let table = HandlerTable::launchpad(&cfg.launchpad_url);
        Self::with_table(cfg, table, messenger, limiter, clock)
    }

    /// The production chain over a caller-supplied table. Fails if any route
    /// is left without a handler.
    pub fn with_table(
        cfg: &Config,
        table: HandlerTable,
        messenger: Arc<dyn MessagingPort>,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let dispatcher = Dispatcher::new(table, messenger.clone(), cfg.bot_username.clone())?;
        let stages: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(Recovery::new(
                messenger.clone(),
                clock,
                cfg.slow_request_threshold,
            )),
            Arc::new(Sanitize::new(cfg.max_message_length)),
            Arc::new(Throttle::new(limiter, messenger)),
        ];
        Ok(Self::new(stages, Arc::new(dispatcher)))
    }

    /// Run one update through the chain. Never fails; the outcome says what
    /// happened.
    pub async fn handle(&self, update: Update) -> Outcome {
        let mut ctx = UpdateContext::new(update);
        let next = Next {
            stages: &self.stages,
            endpoint: self.endpoint.as_ref(),
        };

        if let Err(err) = next.run(&mut ctx).await {
            // Only reachable for chains assembled without a recovery stage.
            error!(
                error = %err,
                update_type = ctx.update.update_type(),
                user_id = ctx.update.user_id().map(|u| u.0),
                "update failed outside recovery"
            );
        }

        ctx.outcome
    }
}
