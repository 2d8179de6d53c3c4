use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::auth::repo_types::User;

/// Out-of-band delivery of a plaintext reset token to its owner.
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn send_reset(
        &self,
        user: &User,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()>;
}

/// Writes the reset link to the log instead of sending mail.
#[derive(Clone)]
pub struct LogNotifier {
    url_base: String,
}

impl LogNotifier {
    pub fn new(url_base: impl Into<String>) -> Self {
        Self {
            url_base: url_base.into(),
        }
    }

    pub fn reset_link(&self, token: &str) -> String {
        format!(
            "{}/reset-password/{}",
            self.url_base.trim_end_matches('/'),
            token
        )
    }
}

#[async_trait]
impl ResetNotifier for LogNotifier {
    async fn send_reset(
        &self,
        user: &User,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        info!(user_id = %user.id, email = %user.email, %expires_at, "password reset issued");
        debug!(user_id = %user.id, link = %self.reset_link(token), "password reset link");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_link_matches_frontend_route() {
        let n = LogNotifier::new("http://localhost:3000/");
        assert_eq!(
            n.reset_link("abc123"),
            "http://localhost:3000/reset-password/abc123"
        );
    }
}
