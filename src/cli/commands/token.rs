use crate::token::DEFAULT_KID;
use clap::{Arg, Command};

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("session-token-secret")
                .long("session-token-secret")
                .help("Shared HS256 secret used to sign and verify session tokens")
                .env("CONSENT_GATE_SESSION_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("session-token-kid")
                .long("session-token-kid")
                .help("Key id written to the header of tokens signed with the current secret")
                .env("CONSENT_GATE_SESSION_TOKEN_KID")
                .default_value(DEFAULT_KID),
        )
        .arg(
            Arg::new("previous-session-token-secrets")
                .long("previous-session-token-secrets")
                .help("Retired secrets still accepted for verification, as kid=secret,kid=secret")
                .env("CONSENT_GATE_PREVIOUS_SESSION_TOKEN_SECRETS")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("token-ttl")
                .long("token-ttl")
                .help("Lifetime in seconds of the token sent to the consent form")
                .env("CONSENT_GATE_TOKEN_TTL")
                .default_value("900")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
}
