use crate::{
    api::{self, handlers::auth::AuthConfig, notifier::NotifierConfig},
    cli::commands::{auth, database, notifier},
};
use anyhow::Result;
use secrecy::ExposeSecret;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub database: database::Options,
    pub auth: auth::Options,
    pub notifier: notifier::Options,
}

impl Args {
    fn auth_config(&self) -> AuthConfig {
        AuthConfig::new()
            .with_session_ttl_seconds(self.auth.session_ttl_seconds)
            .with_otp_ttl_seconds(self.auth.otp_ttl_seconds)
            .with_secure_cookies(self.auth.secure_cookies)
            .with_notifier_timeout_seconds(self.notifier.timeout_seconds)
            .with_mail_from(self.notifier.mail_from.clone())
    }

    fn notifier_config(&self) -> NotifierConfig {
        NotifierConfig::new(self.notifier.kind)
            .with_smtp(
                self.notifier.smtp_host.clone(),
                self.notifier.smtp_port,
                self.notifier.smtp_username.clone(),
                self.notifier.smtp_password.clone(),
            )
            .with_webhook_url(self.notifier.webhook_url.clone())
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the DSN is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let dsn = database::inject_credentials(
        &args.database.dsn,
        args.database.user.as_deref(),
        args.database.password.as_ref(),
    )?;

    let auth_config = args.auth_config();
    let notifier_config = args.notifier_config();

    api::new(
        args.port,
        dsn.expose_secret().to_string(),
        auth_config,
        notifier_config,
    )
    .await
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.database.dsn)),
        (
            "db_user",
            args.database
                .user
                .clone()
                .unwrap_or_else(|| "from dsn".to_string()),
        ),
        (
            "session_ttl_seconds",
            args.auth.session_ttl_seconds.to_string(),
        ),
        ("otp_ttl_seconds", args.auth.otp_ttl_seconds.to_string()),
        ("secure_cookies", args.auth.secure_cookies.to_string()),
        (
            "notifier",
            format!("{:?}", args.notifier.kind).to_lowercase(),
        ),
        ("mail_from", args.notifier.mail_from.clone()),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "seportal {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
