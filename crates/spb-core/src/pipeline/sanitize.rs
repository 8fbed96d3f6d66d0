use async_trait::async_trait;

use crate::{
    messaging::types::UpdateKind,
    pipeline::{Middleware, Next, UpdateContext},
    security::sanitize_input,
    Result,
};

/// Rewrites message text and callback data in place before anything
/// downstream inspects them.
pub struct Sanitize {
    max_len: usize,
}

impl Sanitize {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }
}

#[async_trait]
impl Middleware for Sanitize {
    async fn handle(&self, ctx: &mut UpdateContext, next: Next<'_>) -> Result<()> {
        match &mut ctx.update.kind {
            UpdateKind::Message { text: Some(text) } => {
                *text = sanitize_input(text, self.max_len);
            }
            UpdateKind::Callback {
                data: Some(data), ..
            } => {
                *data = sanitize_input(data, self.max_len);
            }
            _ => {}
        }

        next.run(ctx).await
    }
}
