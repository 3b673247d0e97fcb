use anyhow::Result;
use clap::{Arg, ArgMatches, Command};

pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_OTP_TTL_SECONDS: &str = "otp-ttl-seconds";
pub const ARG_SECURE_COOKIES: &str = "secure-cookies";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub session_ttl_seconds: u64,
    pub otp_ttl_seconds: u64,
    pub secure_cookies: bool,
}

impl Options {
    /// Parse session and one-time code arguments.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let seconds = |id: &str| -> Result<u64> {
            matches
                .get_one::<u64>(id)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        Ok(Self {
            session_ttl_seconds: seconds(ARG_SESSION_TTL_SECONDS)?,
            otp_ttl_seconds: seconds(ARG_OTP_TTL_SECONDS)?,
            secure_cookies: matches.get_flag(ARG_SECURE_COOKIES),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Idle session lifetime in seconds")
                .env("SEPORTAL_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_OTP_TTL_SECONDS)
                .long(ARG_OTP_TTL_SECONDS)
                .help("How long a one-time code stays valid, in seconds")
                .env("SEPORTAL_OTP_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_SECURE_COOKIES)
                .long(ARG_SECURE_COOKIES)
                .help("Mark the session cookie Secure (serve over HTTPS)")
                .env("SEPORTAL_SECURE_COOKIES")
                .action(clap::ArgAction::SetTrue),
        )
}
