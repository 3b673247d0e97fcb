use crate::api::notifier::NotifierKind;
use anyhow::{anyhow, Result};
use clap::{builder::ValueParser, Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_NOTIFIER: &str = "notifier";
pub const ARG_NOTIFIER_TIMEOUT_SECONDS: &str = "notifier-timeout-seconds";
pub const ARG_MAIL_FROM: &str = "mail-from";
pub const ARG_SMTP_HOST: &str = "smtp-host";
pub const ARG_SMTP_PORT: &str = "smtp-port";
pub const ARG_SMTP_USERNAME: &str = "smtp-username";
pub const ARG_SMTP_PASSWORD: &str = "smtp-password";
pub const ARG_WEBHOOK_URL: &str = "webhook-url";

#[derive(Debug, Clone)]
pub struct Options {
    pub kind: NotifierKind,
    pub timeout_seconds: u64,
    pub mail_from: String,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<SecretString>,
    pub webhook_url: Option<String>,
}

impl Options {
    /// Parse notifier arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the selected transport is missing its settings.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let kind = matches
            .get_one::<NotifierKind>(ARG_NOTIFIER)
            .copied()
            .unwrap_or(NotifierKind::Log);

        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let options = Self {
            kind,
            timeout_seconds: matches
                .get_one::<u64>(ARG_NOTIFIER_TIMEOUT_SECONDS)
                .copied()
                .unwrap_or(10),
            mail_from: get_non_empty(ARG_MAIL_FROM)
                .ok_or_else(|| anyhow!("missing required argument: --{ARG_MAIL_FROM}"))?,
            smtp_host: get_non_empty(ARG_SMTP_HOST),
            smtp_port: matches.get_one::<u16>(ARG_SMTP_PORT).copied().unwrap_or(587),
            smtp_username: get_non_empty(ARG_SMTP_USERNAME),
            smtp_password: get_non_empty(ARG_SMTP_PASSWORD).map(SecretString::from),
            webhook_url: get_non_empty(ARG_WEBHOOK_URL),
        };

        match options.kind {
            NotifierKind::Smtp if options.smtp_host.is_none() => {
                anyhow::bail!("missing required argument: --{ARG_SMTP_HOST}")
            }
            NotifierKind::Webhook if options.webhook_url.is_none() => {
                anyhow::bail!("missing required argument: --{ARG_WEBHOOK_URL}")
            }
            _ => Ok(options),
        }
    }
}

fn validator_notifier_kind() -> ValueParser {
    ValueParser::from(|value: &str| value.parse::<NotifierKind>())
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_NOTIFIER)
                .long(ARG_NOTIFIER)
                .help("Mail transport for codes and password resets: log, smtp, webhook")
                .env("SEPORTAL_NOTIFIER")
                .default_value("log")
                .value_parser(validator_notifier_kind()),
        )
        .arg(
            Arg::new(ARG_NOTIFIER_TIMEOUT_SECONDS)
                .long(ARG_NOTIFIER_TIMEOUT_SECONDS)
                .help("Give up on a delivery after this many seconds")
                .env("SEPORTAL_NOTIFIER_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_MAIL_FROM)
                .long(ARG_MAIL_FROM)
                .help("Sender address for outgoing mail")
                .env("SEPORTAL_MAIL_FROM")
                .default_value("noreply@seportal.dev"),
        )
        .arg(
            Arg::new(ARG_SMTP_HOST)
                .long(ARG_SMTP_HOST)
                .help("SMTP relay host (STARTTLS)")
                .env("SEPORTAL_SMTP_HOST"),
        )
        .arg(
            Arg::new(ARG_SMTP_PORT)
                .long(ARG_SMTP_PORT)
                .help("SMTP relay port")
                .env("SEPORTAL_SMTP_PORT")
                .default_value("587")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_SMTP_USERNAME)
                .long(ARG_SMTP_USERNAME)
                .help("SMTP username")
                .env("SEPORTAL_SMTP_USERNAME"),
        )
        .arg(
            Arg::new(ARG_SMTP_PASSWORD)
                .long(ARG_SMTP_PASSWORD)
                .help("SMTP password")
                .env("SEPORTAL_SMTP_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_WEBHOOK_URL)
                .long(ARG_WEBHOOK_URL)
                .help("Mail relay endpoint receiving {from, to, subject, body} as JSON")
                .env("SEPORTAL_WEBHOOK_URL"),
        )
}
