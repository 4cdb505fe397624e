//! Client configurations.
//!
//! Values are read from command-line arguments first, then environment variables, then defaults:
//!
//! | Argument                  | Environment variable    | Default                 |
//! |---------------------------|-------------------------|-------------------------|
//! | `--netctl.baseurl`        | `NETCTL_BASE_URL`       | `http://localhost:1080` |
//! | `--netctl.apikey`         | `NETCTL_API_KEY`        |                         |
//! | `--netctl.clientid`       | `NETCTL_CLIENT_ID`      |                         |
//! | `--netctl.clientsecret`   | `NETCTL_CLIENT_SECRET`  |                         |
//! | `--netctl.timeout`        | `NETCTL_TIMEOUT_MS`     | `30000`                 |

use std::{env, time::Duration};

use clap::{Arg, ArgMatches, Command, builder::RangedU64ValueParser};
use serde::Deserialize;

use crate::api::http::{Auth, ClientOptions};

/// Client configuration object.
#[derive(Default, Deserialize)]
pub struct Config {
    /// API base path with scheme.
    ///
    /// Default is `http://localhost:1080`.
    #[serde(rename = "baseUrl")]
    pub base_url: Option<String>,
    /// API key.
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
    /// OAuth2 client ID.
    #[serde(rename = "clientId")]
    pub client_id: Option<String>,
    /// OAuth2 client secret.
    #[serde(rename = "clientSecret")]
    pub client_secret: Option<String>,
    /// Request timeout in milliseconds. `0` disables the timeout.
    ///
    /// Default is `30000`.
    #[serde(rename = "timeoutMs")]
    pub timeout_ms: Option<u64>,
}

pub const DEF_BASE_URL: &'static str = "http://localhost:1080";
pub const DEF_TIMEOUT_MS: u64 = 30000;
pub const DEF_TIMEOUT_MS_STR: &'static str = "30000";

/// To register Clap arguments.
pub fn reg_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("netctl.baseurl")
            .long("netctl.baseurl")
            .help("API base URL")
            .num_args(1),
    )
    .arg(
        Arg::new("netctl.apikey")
            .long("netctl.apikey")
            .help("API key")
            .num_args(1),
    )
    .arg(
        Arg::new("netctl.clientid")
            .long("netctl.clientid")
            .help("OAuth2 client ID")
            .num_args(1),
    )
    .arg(
        Arg::new("netctl.clientsecret")
            .long("netctl.clientsecret")
            .help("OAuth2 client secret")
            .num_args(1),
    )
    .arg(
        Arg::new("netctl.timeout")
            .long("netctl.timeout")
            .help("request timeout in milliseconds, 0 to disable")
            .num_args(1)
            .value_parser(RangedU64ValueParser::<u64>::new()),
    )
}

/// To read input arguments from command-line arguments and environment variables.
///
/// This function will call [`apply_default()`] to fill missing values so you do not need call it
/// again.
pub fn read_args(args: &ArgMatches) -> Config {
    apply_default(&Config {
        base_url: read_string(args, "netctl.baseurl", "NETCTL_BASE_URL"),
        api_key: read_string(args, "netctl.apikey", "NETCTL_API_KEY"),
        client_id: read_string(args, "netctl.clientid", "NETCTL_CLIENT_ID"),
        client_secret: read_string(args, "netctl.clientsecret", "NETCTL_CLIENT_SECRET"),
        timeout_ms: match args.get_one::<u64>("netctl.timeout") {
            None => match env::var("NETCTL_TIMEOUT_MS") {
                Err(_) => None,
                Ok(v) => v.parse::<u64>().ok(),
            },
            Some(v) => Some(*v),
        },
    })
}

/// Fill missing configuration with default values.
pub fn apply_default(config: &Config) -> Config {
    Config {
        base_url: match config.base_url.as_ref() {
            None => Some(DEF_BASE_URL.to_string()),
            Some(v) => Some(v.clone()),
        },
        api_key: config.api_key.clone(),
        client_id: config.client_id.clone(),
        client_secret: config.client_secret.clone(),
        timeout_ms: match config.timeout_ms {
            None => Some(DEF_TIMEOUT_MS),
            Some(v) => Some(v),
        },
    }
}

/// Generate [`ClientOptions`] from the configuration.
///
/// OAuth2 client credentials are used when both the client ID and the secret exist, otherwise the
/// API key is used if any.
pub fn client_options(config: &Config) -> ClientOptions {
    let config = apply_default(config);
    let auth = match (config.client_id, config.client_secret, config.api_key) {
        (Some(client_id), Some(client_secret), _) => Auth::Oauth2 {
            client_id,
            client_secret,
        },
        (_, _, Some(key)) => Auth::ApiKey(key),
        _ => Auth::None,
    };
    ClientOptions {
        base_url: config.base_url.unwrap_or_else(|| DEF_BASE_URL.to_string()),
        auth,
        timeout: match config.timeout_ms {
            None | Some(0) => None,
            Some(v) => Some(Duration::from_millis(v)),
        },
    }
}

/// Non-empty string from the argument `arg` or the environment variable `var`.
fn read_string(args: &ArgMatches, arg: &str, var: &str) -> Option<String> {
    match args.get_one::<String>(arg) {
        None => match env::var(var) {
            Err(_) => None,
            Ok(v) => match v.len() {
                0 => None,
                _ => Some(v),
            },
        },
        Some(v) => match v.len() {
            0 => None,
            _ => Some(v.clone()),
        },
    }
}
