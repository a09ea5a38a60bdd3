use clap::{
    builder::{BoolishValueParser, ValueParser},
    Arg, ArgAction, Command,
};
use url::Url;

/// Accept only absolute `http`/`https` URLs for the consent form.
#[must_use]
pub fn validator_form_url() -> ValueParser {
    ValueParser::from(move |value: &str| -> std::result::Result<Url, String> {
        let url = Url::parse(value).map_err(|e| format!("invalid URL: {e}"))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(format!("unsupported scheme: {scheme}")),
        }
    })
}

fn flag(name: &'static str, env: &'static str, default: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .env(env)
        .default_value(default)
        .num_args(0..=1)
        .default_missing_value("true")
        .action(ArgAction::Set)
        .value_parser(BoolishValueParser::new())
}

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("consent-form-url")
                .long("consent-form-url")
                .help("External consent form the user is redirected to")
                .env("CONSENT_GATE_CONSENT_FORM_URL")
                .required(true)
                .value_parser(validator_form_url()),
        )
        .arg(
            flag(
                "skip-if-consented",
                "CONSENT_GATE_SKIP_IF_CONSENTED",
                "true",
            )
            .help("Let users whose metadata already records consent through without a redirect"),
        )
        .arg(
            flag(
                "enforce-on-resume",
                "CONSENT_GATE_ENFORCE_ON_RESUME",
                "true",
            )
            .help("Deny the login when the returned token does not carry tos_accepted=yes"),
        )
        .arg(
            flag(
                "merge-claims-on-denial",
                "CONSENT_GATE_MERGE_CLAIMS_ON_DENIAL",
                "false",
            )
            .help("Still write the returned claims to user metadata after denying"),
        )
}
