use crate::cli::{
    actions::{server::Args, Action},
    commands::{self, auth, database, notifier},
};
use anyhow::Result;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);

    Ok(Action::Server(Args {
        port,
        database: database::Options::parse(matches)?,
        auth: auth::Options::parse(matches)?,
        notifier: notifier::Options::parse(matches)?,
    }))
}
