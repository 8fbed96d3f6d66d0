use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    content::THROTTLED_NOTICE,
    messaging::{port::MessagingPort, types::OutgoingMessage},
    pipeline::{Middleware, Next, Outcome, UpdateContext},
    security::{Admission, RateLimiter},
    Result,
};

/// Admission gate in front of dispatch.
///
/// Updates without a user id are always let through.
pub struct Throttle {
    limiter: Arc<RateLimiter>,
    messenger: Arc<dyn MessagingPort>,
}

impl Throttle {
    pub fn new(limiter: Arc<RateLimiter>, messenger: Arc<dyn MessagingPort>) -> Self {
        Self { limiter, messenger }
    }
}

#[async_trait]
impl Middleware for Throttle {
    async fn handle(&self, ctx: &mut UpdateContext, next: Next<'_>) -> Result<()> {
        let Some(user_id) = ctx.update.user_id() else {
            debug!(
                update_type = ctx.update.update_type(),
                "no user id on update, skipping rate limit"
            );
            return next.run(ctx).await;
        };

        let retry_after = match self.limiter.check(user_id) {
            Admission::Admitted { remaining } => {
                debug!(user_id = user_id.0, remaining, "admitted");
                return next.run(ctx).await;
            }
            Admission::Denied { retry_after } => retry_after,
        };

        let update = &ctx.update;
        warn!(
            user_id = user_id.0,
            username = update.username(),
            command = update.command_or_data(),
            chat_type = update.chat_kind().map(|k| k.as_str()),
            retry_after_ms = retry_after.as_millis() as u64,
            "Rate limit exceeded"
        );

        // Stop the button spinner; the notice below is the user-visible part.
        if let Some(callback_id) = update.callback_id() {
            if let Err(e) = self.messenger.answer_callback_query(callback_id, None).await {
                debug!(error = %e, "failed to acknowledge throttled callback");
            }
        }

        if let Some(chat_id) = update.chat_id() {
            self.messenger
                .send_message(chat_id, &OutgoingMessage::plain(THROTTLED_NOTICE))
                .await?;
        }

        ctx.outcome = Outcome::Throttled;
        Ok(())
    }
}
