//! Auth state and configuration.

use std::sync::Arc;
use std::time::Duration;

use super::{credentials::CredentialStore, store::SessionStore};
use crate::api::notifier::Notifier;

const DEFAULT_SESSION_TTL_SECONDS: u64 = 12 * 60 * 60;
const DEFAULT_OTP_TTL_SECONDS: u64 = 5 * 60;
const DEFAULT_NOTIFIER_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_MAIL_FROM: &str = "noreply@seportal.dev";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    session_ttl_seconds: u64,
    otp_ttl_seconds: u64,
    notifier_timeout_seconds: u64,
    secure_cookies: bool,
    mail_from: String,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
            notifier_timeout_seconds: DEFAULT_NOTIFIER_TIMEOUT_SECONDS,
            secure_cookies: false,
            mail_from: DEFAULT_MAIL_FROM.to_string(),
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: u64) -> Self {
        self.otp_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_notifier_timeout_seconds(mut self, seconds: u64) -> Self {
        self.notifier_timeout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_mail_from(mut self, from: String) -> Self {
        self.mail_from = from;
        self
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    #[must_use]
    pub fn otp_ttl(&self) -> Duration {
        Duration::from_secs(self.otp_ttl_seconds)
    }

    #[must_use]
    pub fn notifier_timeout(&self) -> Duration {
        Duration::from_secs(self.notifier_timeout_seconds.max(1))
    }

    #[must_use]
    pub fn mail_from(&self) -> &str {
        &self.mail_from
    }

    pub(super) fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    pub(super) fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AuthState {
    config: AuthConfig,
    sessions: Arc<dyn SessionStore>,
    credentials: Arc<dyn CredentialStore>,
    notifier: Arc<dyn Notifier>,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        sessions: Arc<dyn SessionStore>,
        credentials: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            sessions,
            credentials,
            notifier,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    pub(crate) fn credentials(&self) -> &dyn CredentialStore {
        self.credentials.as_ref()
    }

    pub(crate) fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::AuthConfig;
    use std::time::Duration;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new();
        assert_eq!(config.session_ttl(), Duration::from_secs(super::DEFAULT_SESSION_TTL_SECONDS));
        assert_eq!(config.otp_ttl(), Duration::from_secs(300));
        assert_eq!(config.notifier_timeout(), Duration::from_secs(10));
        assert_eq!(config.mail_from(), super::DEFAULT_MAIL_FROM);
        assert!(!config.secure_cookies());

        let config = config
            .with_session_ttl_seconds(60)
            .with_otp_ttl_seconds(30)
            .with_notifier_timeout_seconds(0)
            .with_secure_cookies(true)
            .with_mail_from("ops@x.com".to_string());

        assert_eq!(config.session_ttl_seconds(), 60);
        assert_eq!(config.otp_ttl(), Duration::from_secs(30));
        // A zero timeout would make every send fail, so it is floored at one second.
        assert_eq!(config.notifier_timeout(), Duration::from_secs(1));
        assert!(config.secure_cookies());
        assert_eq!(config.mail_from(), "ops@x.com");
    }
}
