use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{error, warn};

use crate::{
    clock::Clock,
    content::GENERIC_FAILURE_NOTICE,
    errors::Error,
    messaging::{port::MessagingPort, types::OutgoingMessage},
    pipeline::{Middleware, Next, Outcome, UpdateContext},
    Result,
};

/// Outermost stage: times the rest of the chain and turns any failure (error
/// or panic) into a logged diagnostic plus one generic notice to the user.
///
/// Never returns an error.
pub struct Recovery {
    messenger: Arc<dyn MessagingPort>,
    clock: Arc<dyn Clock>,
    slow_threshold: Duration,
}

impl Recovery {
    pub fn new(
        messenger: Arc<dyn MessagingPort>,
        clock: Arc<dyn Clock>,
        slow_threshold: Duration,
    ) -> Self {
        Self {
            messenger,
            clock,
            slow_threshold,
        }
    }

    async fn notify_failure(&self, ctx: &UpdateContext, original: &Error) -> bool {
        let update = &ctx.update;
        let user_id = update.user_id().map(|u| u.0);

        let Some(chat_id) = update.chat_id() else {
            error!(
                user_id,
                original_error = %original,
                "Failed to send error message to user: update has no chat"
            );
            return false;
        };

        match self
            .messenger
            .send_message(chat_id, &OutgoingMessage::plain(GENERIC_FAILURE_NOTICE))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                error!(
                    error = %e,
                    user_id,
                    original_error = %original,
                    "Failed to send error message to user"
                );
                false
            }
        }
    }
}

#[async_trait]
impl Middleware for Recovery {
    async fn handle(&self, ctx: &mut UpdateContext, next: Next<'_>) -> Result<()> {
        let started = self.clock.now();

        let result = match AssertUnwindSafe(next.run(ctx)).catch_unwind().await {
            Ok(res) => res,
            Err(panic) => Err(Error::Handler(format!(
                "panicked: {}",
                panic_message(panic.as_ref())
            ))),
        };
        let elapsed = self.clock.now().saturating_duration_since(started);
        let duration_ms = elapsed.as_millis() as u64;

        let err = match result {
            Ok(()) => {
                if elapsed > self.slow_threshold {
                    warn!(
                        user_id = ctx.update.user_id().map(|u| u.0),
                        username = ctx.update.username(),
                        update_type = ctx.update.update_type(),
                        duration_ms,
                        "Slow request detected"
                    );
                }
                return Ok(());
            }
            Err(err) => err,
        };

        {
            let update = &ctx.update;
            error!(
                error = %err,
                update_type = update.update_type(),
                user_id = update.user_id().map(|u| u.0),
                username = update.username(),
                command = update.command_or_data(),
                duration_ms,
                chat_id = update.chat_id().map(|c| c.0),
                chat_type = update.chat_kind().map(|k| k.as_str()),
                "Unhandled error in pipeline"
            );
        }

        let notice_delivered = self.notify_failure(ctx, &err).await;
        ctx.outcome = Outcome::Recovered { notice_delivered };
        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = panic.downcast_ref::<String>() {
        return s.clone();
    }
    "unknown panic".to_string()
}
