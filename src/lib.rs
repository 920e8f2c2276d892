//! Layered configuration for command-line applications: one annotated field
//! list, three sources, strict precedence.
//!
//! Layerfig reconciles every configuration variable of an application from
//! the command line, the environment and a TOML config file. Each field is
//! declared once with an annotation that says where it may come from, and the
//! engine takes care of registering flags, binding environment variables,
//! checking the file for typos and coercing every value into its Rust type.
//!
//! ```ignore
//! let schema = Layerfig::builder::<AppCfg>()
//!     .app_name("myapp")
//!     .field(Field::flag_codec(
//!         "timeout",
//!         "get|timeout|t, app.timeout, TIMEOUT",
//!         lens!(AppCfg, timeout),
//!     ))
//!     .build(Command::new("myapp").subcommand(Command::new("get")))?;
//!
//! let resolved = schema.load()?;
//! println!("{}", resolved.config.timeout);
//! ```
//!
//! # Two phases
//!
//! [`LayerfigBuilder::build`] compiles the field list once: annotations are
//! parsed, capabilities checked, flags added to the application's
//! [`clap::Command`] and defaults seeded. Every schema mistake (malformed
//! annotation, reserved name, duplicate flag, unsupported type) surfaces here.
//!
//! [`Schema::load_from`] (or [`Schema::resolve`] with matches you parsed
//! yourself) runs once per invocation and produces a fresh config value plus
//! a [`ResolveReport`] recording where each value came from.
//!
//! # Annotation grammar
//!
//! ```text
//! <cmd>|<long>|<short>[&<cmd2>|<long2>|<short2>...], <section.key|.key|>, <ENVSUFFIX>
//! ```
//!
//! - **Command exposures.** `cmd` is a command path with `>` between levels
//!   (`config>init`); empty means the root command. Listing several exposures
//!   makes a *shared* field: any of its flags sets it. The short slot holds a
//!   single character, nothing, or a marker: `none` (no command line),
//!   `custom` (no command line, filled by the extension parser) or `hidden`
//!   (bound but left out of help).
//! - **File key.** `section.key`, `.key` for the top level, or empty.
//! - **Environment suffix.** The variable is `{APP}_{SUFFIX}`.
//!
//! # Layer precedence
//!
//! ```text
//! Compiled defaults     the value in C::default()
//!        ↑ overridden by
//! Config file           one file, first match from the highest-priority path
//!        ↑ overridden by
//! Environment vars      {APP}_{SUFFIX}
//!        ↑ overridden by
//! Command line          only flags the user actually typed
//! ```
//!
//! A field set on the command line is *locked*: neither the environment nor
//! the file can touch it afterwards. Fields without a command-line exposure
//! follow the same order minus the top layer.
//!
//! # Capabilities
//!
//! How a value reaches a field depends on its type, chosen by the [`Field`]
//! constructor:
//!
//! - [`Field::primitive`]: strings, booleans, sized integers, floats,
//!   [`Duration`](std::time::Duration), `Vec<String>` and `Vec<i64>`. Every
//!   integer is range checked, so `300` never silently becomes an `i8`.
//! - [`Field::flag`]: a [`FlagValue`] type validates its own text on every
//!   path, not only on the command line. [`flags`] ships bounded integers,
//!   enums, IP addresses and ports.
//! - [`Field::codec`]: a [`TextCodec`] type decodes from a native file value
//!   or from text. It has no command-line form.
//! - [`Field::opaque`]: a field only the extension parser can fill.
//!
//! # Reserved base configuration
//!
//! Every config embeds a [`BaseConfig`] exposed through [`AppConfig`]. Its
//! fields (`--config/-c`, `--no-cfg`, `--no-env`, `--log-level/-l`,
//! `--verbosity/-v`, `--pretty`, `--log-file`, `--dry-run`) are registered as
//! global flags on the root command, and their names cannot be reused.
//!
//! # Config file checks
//!
//! Every key in the file must belong to a field or to the extension parser
//! registered with [`LayerfigBuilder::extra_parse`]. Unknown keys fail with
//! their line numbers, and routed keys the parser does not consume fail too.
//!
//! # Logging
//!
//! Resolution emits `tracing` events (`debug` for state changes, `trace` per
//! value). Installing a subscriber is up to the application.

pub mod error;
pub mod flags;
pub mod types;

mod base;
mod binder;
mod builder;
mod capability;
mod cli;
mod coerce;
mod env;
mod field;
mod file;
mod resolve;
mod store;
mod tag;
mod validate;
mod value;

#[cfg(test)]
mod fixtures;

pub use base::{AppConfig, BaseConfig, DEFAULT_LOG_LEVEL, LOG_LEVELS, RESERVED_FIELDS};
pub use binder::{AdditionalVar, FlagBinding};
pub use builder::{Layerfig, LayerfigBuilder, Schema};
pub use capability::{Capability, Dispatch, FlagKind, FlagValue, IntWidth, TextCodec, ValueKind};
pub use coerce::{Primitive, format_duration, parse_duration};
pub use env::{Environment, env_name};
pub use error::LayerfigError;
pub use field::{Field, Lens};
pub use file::{LoadedFile, locate_config_file};
pub use resolve::{ExtraParser, ResolveReport, Resolved};
pub use store::{Source, Store};
pub use tag::{ConfigKey, Exposure, FieldTag, Visibility, parse_tag};
pub use types::SearchPath;
pub use value::RawValue;
