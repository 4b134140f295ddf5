use std::fmt;

use serde::{Deserialize, Serialize};

/// Persisted session credentials (`auth_prefs` store).
///
/// Invariant: when `is_logged_in` is true, `user_id` and `access_token` are present.
/// Only [`super::CredentialStore`] publishes states, and it never publishes one that
/// breaks the invariant.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialState {
    #[serde(default)]
    pub is_logged_in: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl CredentialState {
    /// A freshly logged-in session.
    pub fn logged_in(
        user_id: i64,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            is_logged_in: true,
            user_id: Some(user_id),
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
        }
    }

    /// Returns false for a logged-in state missing its user id or access token.
    pub fn is_consistent(&self) -> bool {
        !self.is_logged_in || (self.user_id.is_some() && self.access_token.is_some())
    }
}

impl fmt::Debug for CredentialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialState")
            .field("is_logged_in", &self.is_logged_in)
            .field("user_id", &self.user_id)
            .field("access_token", &self.access_token.as_deref().map(redact_token))
            .field(
                "refresh_token",
                &self.refresh_token.as_deref().map(redact_token),
            )
            .finish()
    }
}

/// Returns a masked version of a token for display (first 12 chars + ...).
pub fn redact_token(token: &str) -> String {
    if token.chars().count() <= 16 {
        return "***".to_string();
    }
    let prefix: String = token.chars().take(12).collect();
    format!("{prefix}...")
}
