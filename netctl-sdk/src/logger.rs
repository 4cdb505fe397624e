//! To configure the logger.
//!
//! The SDK itself only writes logs with the [`log`] macros. Applications may use [`init()`] to print
//! them on the console:
//!
//! ```rust,no_run
//! use clap::Command;
//! use netctl_sdk::logger;
//!
//! let args = logger::reg_args(Command::new("app")).get_matches();
//! logger::init("app", &logger::read_args(&args));
//! ```

use std::env;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use clap::{Arg, ArgMatches, Command};
use log::{LevelFilter, Record};
use log4rs::{
    self,
    append::console::ConsoleAppender,
    config::{Appender, Root},
    encode::{Encode, Write},
};
use serde::{Deserialize, Serialize};

/// Logger configuration object.
#[derive(Default, Deserialize)]
pub struct Config {
    /// Log level. Can be `off`, `error`, `warn`, `info`, `debug`.
    ///
    /// Default is `info`.
    pub level: Option<String>,
    /// Log style. Can be `json`, `log4j`.
    ///
    /// Default is `json`.
    pub style: Option<String>,
}

/// The log4rs encoder for JSON format.
#[derive(Debug)]
struct JsonEncoder {
    proj_name: String,
}

/// The log4rs encoder for log4j format.
#[derive(Debug)]
struct Log4jEncoder {
    proj_name: String,
}

/// One JSON log line.
#[derive(Debug, Serialize)]
struct JsonEncoderMsg<'a> {
    ts: String,
    level: String,
    proj: &'a str,
    module: String,
    msg: String,
}

pub const LEVEL_OFF: &'static str = "off";
pub const LEVEL_ERROR: &'static str = "error";
pub const LEVEL_WARN: &'static str = "warn";
pub const LEVEL_INFO: &'static str = "info";
pub const LEVEL_DEBUG: &'static str = "debug";

pub const STYLE_JSON: &'static str = "json";
pub const STYLE_LOG4J: &'static str = "log4j";

pub const DEF_LEVEL: &'static str = LEVEL_INFO;
pub const DEF_STYLE: &'static str = STYLE_JSON;

impl Encode for Log4jEncoder {
    fn encode(&self, w: &mut dyn Write, record: &Record<'_>) -> Result<()> {
        let str = format!(
            "{} {} {} [{}] {}\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            record.level(),
            self.proj_name,
            get_module_name(record),
            record.args().to_string().replace("\n", "\\n")
        );
        w.write_all(str.as_bytes())?;
        Ok(())
    }
}

impl Encode for JsonEncoder {
    fn encode(&self, w: &mut dyn Write, record: &Record<'_>) -> Result<()> {
        let msg = JsonEncoderMsg {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level: record.level().to_string().to_lowercase(),
            proj: self.proj_name.as_str(),
            module: get_module_name(record),
            msg: record.args().to_string(),
        };
        let str = serde_json::to_string(&msg)? + "\n";
        w.write_all(str.as_bytes())?;
        Ok(())
    }
}

/// To initialize the logger with configurations.
///
/// Returns an error if the logger has been initialized already.
pub fn init(proj_name: &str, conf: &Config) -> Result<()> {
    let conf = apply_default(conf);

    let level = match conf.level.as_deref() {
        Some(LEVEL_OFF) => LevelFilter::Off,
        Some(LEVEL_ERROR) => LevelFilter::Error,
        Some(LEVEL_WARN) => LevelFilter::Warn,
        Some(LEVEL_DEBUG) => LevelFilter::Debug,
        _ => LevelFilter::Info,
    };
    let style = match conf.style.as_deref() {
        Some(STYLE_LOG4J) => STYLE_LOG4J,
        _ => STYLE_JSON,
    };

    let log4j_appender = ConsoleAppender::builder()
        .encoder(Box::new(Log4jEncoder {
            proj_name: proj_name.to_string(),
        }))
        .build();
    let json_appender = ConsoleAppender::builder()
        .encoder(Box::new(JsonEncoder {
            proj_name: proj_name.to_string(),
        }))
        .build();
    let config = log4rs::Config::builder()
        .appender(Appender::builder().build(STYLE_LOG4J, Box::new(log4j_appender)))
        .appender(Appender::builder().build(STYLE_JSON, Box::new(json_appender)))
        .build(Root::builder().appender(style).build(level))?;
    log4rs::init_config(config)?;
    Ok(())
}

/// To register Clap arguments.
pub fn reg_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("log.level")
            .long("log.level")
            .help("log level")
            .num_args(1)
            .value_parser([LEVEL_OFF, LEVEL_ERROR, LEVEL_WARN, LEVEL_INFO, LEVEL_DEBUG]),
    )
    .arg(
        Arg::new("log.style")
            .long("log.style")
            .help("log style")
            .num_args(1)
            .value_parser([STYLE_JSON, STYLE_LOG4J]),
    )
}

/// To read input arguments from command-line arguments and environment variables.
///
/// This function will call [`apply_default()`] to fill missing values so you do not need call it
/// again.
pub fn read_args(args: &ArgMatches) -> Config {
    apply_default(&Config {
        level: match args.get_one::<String>("log.level") {
            None => env::var("LOG_LEVEL").ok(),
            Some(v) => Some(v.clone()),
        },
        style: match args.get_one::<String>("log.style") {
            None => env::var("LOG_STYLE").ok(),
            Some(v) => Some(v.clone()),
        },
    })
}

/// Fill missing or invalid configuration with default values.
pub fn apply_default(config: &Config) -> Config {
    Config {
        level: match config.level.as_deref() {
            Some(v @ (LEVEL_OFF | LEVEL_ERROR | LEVEL_WARN | LEVEL_INFO | LEVEL_DEBUG)) => {
                Some(v.to_string())
            }
            _ => Some(DEF_LEVEL.to_string()),
        },
        style: match config.style.as_deref() {
            Some(STYLE_LOG4J) => Some(STYLE_LOG4J.to_string()),
            Some(STYLE_JSON) => Some(STYLE_JSON.to_string()),
            _ => Some(DEF_STYLE.to_string()),
        },
    }
}

/// The module path with the source line if any.
fn get_module_name(record: &Record<'_>) -> String {
    match (record.module_path(), record.line()) {
        (Some(module), Some(line)) => format!("{}:{}", module, line),
        (Some(module), None) => module.to_string(),
        (None, _) => record.target().to_string(),
    }
}
