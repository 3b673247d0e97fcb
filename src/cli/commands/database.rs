use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

pub const ARG_DSN: &str = "dsn";
pub const ARG_DB_USER: &str = "db-user";
pub const ARG_DB_PASSWORD: &str = "db-password";

#[derive(Debug, Clone)]
pub struct Options {
    pub dsn: String,
    pub user: Option<String>,
    pub password: Option<SecretString>,
}

impl Options {
    /// Parse database arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the DSN is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let dsn = matches
            .get_one::<String>(ARG_DSN)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .context("missing required argument: --dsn")?;

        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        Ok(Self {
            dsn,
            user: get_non_empty(ARG_DB_USER),
            password: get_non_empty(ARG_DB_PASSWORD).map(SecretString::from),
        })
    }
}

/// Put the username/password into the DSN, replacing any already present.
///
/// # Errors
/// Returns an error if the DSN is not a valid URL or cannot carry credentials.
pub fn inject_credentials(
    dsn: &str,
    user: Option<&str>,
    password: Option<&SecretString>,
) -> Result<SecretString> {
    let mut url = Url::parse(dsn).context("invalid database DSN")?;

    if let Some(user) = user {
        url.set_username(user)
            .map_err(|()| anyhow!("Error setting username"))?;
    }

    if let Some(password) = password {
        url.set_password(Some(password.expose_secret()))
            .map_err(|()| anyhow!("Error setting password"))?;
    }

    Ok(SecretString::from(url.to_string()))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string")
                .long_help(
                    "MySQL connection string, e.g. mysql://host:3306/seportal. Username/password may be given separately with --db-user/--db-password.",
                )
                .env("SEPORTAL_DSN")
                .required(true),
        )
        .arg(
            Arg::new(ARG_DB_USER)
                .long(ARG_DB_USER)
                .help("Database username, overrides the one in the DSN")
                .env("SEPORTAL_DB_USER"),
        )
        .arg(
            Arg::new(ARG_DB_PASSWORD)
                .long(ARG_DB_PASSWORD)
                .help("Database password, overrides the one in the DSN")
                .env("SEPORTAL_DB_PASSWORD")
                .hide_env_values(true),
        )
}
