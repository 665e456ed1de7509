//! Delivery of password-reset tokens.

use cb_models::user::account::UserProfile;
use tracing::info;

/// Receives a reset token minted for an existing, active account.
///
/// Delivery (mail, queue, ...) lives outside this crate. Implementations must
/// not fail the request: forgot-password answers the same way whether or not
/// anything was delivered.
pub trait ResetTokenSink: Send + Sync {
    fn deliver(&self, user: &UserProfile, token: &str);
}

/// Records that a token was issued. The token itself is never logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogResetSink;

impl ResetTokenSink for LogResetSink {
    fn deliver(&self, user: &UserProfile, _token: &str) {
        info!("Password reset token issued for user {}", user.id);
    }
}
