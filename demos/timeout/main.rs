//! # layerfig demo application
//!
//! A small tool with one `get` command and a bounded `timeout` setting. It
//! exists to show the layer precedence by hand.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example timeout -- get
//! ```
//!
//! | Layer            | How to exercise it                                             |
//! |------------------|----------------------------------------------------------------|
//! | Default (400)    | `cargo run --example timeout -- get`                           |
//! | Config file      | Put `[app]` / `timeout = 550` in `./timeout.toml`, run `get`   |
//! | Environment      | `TIMEOUT_TIMEOUT=200 cargo run --example timeout -- get`       |
//! | Command line     | `cargo run --example timeout -- get --timeout 300`             |
//! | Validation       | `cargo run --example timeout -- get --timeout 5000`            |
//! | No config file   | `cargo run --example timeout -- --no-cfg get`                  |
//! | Extension keys   | Add `[[app.headers]]` tables with `name` / `value` to the file |

use std::collections::BTreeMap;
use std::process::ExitCode;

use clap::Command;
use serde::Deserialize;

use layerfig::flags::IntValue;
use layerfig::{AppConfig, BaseConfig, Field, Layerfig, LayerfigError, RawValue, lens};

#[derive(Deserialize, Debug, Clone, PartialEq)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Clone, PartialEq)]
struct TimeoutConfig {
    base: BaseConfig,
    timeout: IntValue,
    headers: Vec<Header>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            base: BaseConfig::default(),
            timeout: IntValue::with_default("timeout", 400, 0, 1000)
                .unwrap_or_else(|_| IntValue::new("timeout", 0, 1000)),
            headers: Vec::new(),
        }
    }
}

impl AppConfig for TimeoutConfig {
    fn base(&self) -> &BaseConfig {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseConfig {
        &mut self.base
    }
}

fn parse_headers(
    cfg: &mut TimeoutConfig,
    values: &BTreeMap<String, RawValue>,
) -> Result<Vec<String>, LayerfigError> {
    let mut done = Vec::new();
    if let Some(raw) = values.get("app.headers") {
        cfg.headers = raw.deserialize_into("app.headers")?;
        done.push("app.headers".to_string());
    }
    Ok(done)
}

fn command() -> Command {
    Command::new("timeout")
        .about("Prints the resolved timeout")
        .subcommand_required(true)
        .subcommand(Command::new("get").about("Print the timeout and where it came from"))
}

fn run() -> Result<(), LayerfigError> {
    let schema = Layerfig::builder::<TimeoutConfig>()
        .app_name("timeout")
        .field(
            Field::flag_codec(
                "timeout",
                "get|timeout|t, app.timeout, TIMEOUT",
                lens!(TimeoutConfig, timeout),
            )
            .doc("Timeout in milliseconds, between 0 and 1000"),
        )
        .field(Field::opaque::<Vec<Header>>("headers", "||custom, app.headers, "))
        .extra_parse(&[], parse_headers)
        .build(command())?;

    let resolved = match schema.load() {
        Ok(resolved) => resolved,
        Err(LayerfigError::Cli(e)) => e.exit(),
        Err(e) => {
            eprintln!("{}", schema.command().clone().render_usage());
            return Err(e);
        }
    };

    let source = resolved
        .report
        .source("timeout")
        .map(ToString::to_string)
        .unwrap_or_else(|| "default".to_string());
    println!("timeout = {} ({source})", resolved.config.timeout);
    if let Some(path) = &resolved.report.config_file {
        println!("config file: {}", path.display());
    }
    for header in &resolved.config.headers {
        println!("header {} = {}", header.name, header.value);
    }
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
