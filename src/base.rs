//! The reserved base configuration every application embeds.

use crate::field::{Field, Lens};
use crate::flags::{EnumValue, IntValue};

pub const LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];
pub const DEFAULT_LOG_LEVEL: &str = "error";
pub const DEFAULT_VERBOSITY: i64 = 1;
pub const MAX_VERBOSITY: i64 = 3;

/// Field names user configurations may not reuse.
pub const RESERVED_FIELDS: [&str; 8] = [
    "conf_file",
    "no_cfg",
    "no_env",
    "log_level",
    "verbosity",
    "pretty",
    "log_file",
    "dry_run",
];

/// Options shared by every application: config file selection, environment
/// switch, and logging knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseConfig {
    pub conf_file: String,
    pub no_cfg: bool,
    pub no_env: bool,
    pub log_level: EnumValue,
    pub verbosity: IntValue,
    pub pretty: bool,
    pub log_file: String,
    pub dry_run: bool,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            conf_file: String::new(),
            no_cfg: false,
            no_env: false,
            log_level: EnumValue::preset("log_level", DEFAULT_LOG_LEVEL, &LOG_LEVELS),
            verbosity: IntValue::preset("verbosity", DEFAULT_VERBOSITY, 0, MAX_VERBOSITY),
            pretty: false,
            log_file: String::new(),
            dry_run: false,
        }
    }
}

/// A configuration struct the engine can resolve.
///
/// Implementors embed a [`BaseConfig`] and expose it here; user fields are
/// declared separately through [`Field`] descriptors.
pub trait AppConfig: Default + 'static {
    fn base(&self) -> &BaseConfig;
    fn base_mut(&mut self) -> &mut BaseConfig;
}

impl AppConfig for BaseConfig {
    fn base(&self) -> &BaseConfig {
        self
    }

    fn base_mut(&mut self) -> &mut BaseConfig {
        self
    }
}

/// Descriptors for the reserved fields, registered ahead of user fields.
pub(crate) fn base_fields<C: AppConfig>() -> Vec<Field<C>> {
    vec![
        Field::primitive(
            "conf_file",
            "|config|c, , CONFIGFILE",
            Lens::new(|c: &C| &c.base().conf_file, |c: &mut C| &mut c.base_mut().conf_file),
        )
        .doc("The configuration file location"),
        Field::primitive(
            "no_cfg",
            "|no-cfg|, , NOCFG",
            Lens::new(|c: &C| &c.base().no_cfg, |c: &mut C| &mut c.base_mut().no_cfg),
        )
        .doc("If set, no configuration file will be loaded"),
        Field::primitive(
            "no_env",
            "|no-env|, , ",
            Lens::new(|c: &C| &c.base().no_env, |c: &mut C| &mut c.base_mut().no_env),
        )
        .doc("If set, the environment variables will be ignored"),
        Field::flag_codec(
            "log_level",
            "|log-level|l, .log-level, LOGLEVEL",
            Lens::new(|c: &C| &c.base().log_level, |c: &mut C| &mut c.base_mut().log_level),
        )
        .doc("The log level, one of debug, info, warn, error"),
        Field::flag_codec(
            "verbosity",
            "|verbosity|v, .verbosity, VERBOSITY",
            Lens::new(|c: &C| &c.base().verbosity, |c: &mut C| &mut c.base_mut().verbosity),
        )
        .doc("The verbosity level, 0 is silent, 3 is the most verbose"),
        Field::primitive(
            "pretty",
            "|pretty|, .pretty, PRETTY",
            Lens::new(|c: &C| &c.base().pretty, |c: &mut C| &mut c.base_mut().pretty),
        )
        .doc("Human-friendly log output instead of structured output"),
        Field::primitive(
            "log_file",
            "|log-file|, .log-file, LOGFILE",
            Lens::new(|c: &C| &c.base().log_file, |c: &mut C| &mut c.base_mut().log_file),
        )
        .doc("Write logs to this file instead of stderr"),
        Field::primitive(
            "dry_run",
            "|dry-run|, .dry-run, DRYRUN",
            Lens::new(|c: &C| &c.base().dry_run, |c: &mut C| &mut c.base_mut().dry_run),
        )
        .doc("Report what would be done without doing it"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RawValue;

    #[test]
    fn defaults() {
        let base = BaseConfig::default();
        assert_eq!(base.log_level.get(), "error");
        assert_eq!(base.verbosity.get(), 1);
        assert!(!base.no_cfg && !base.no_env && !base.dry_run);
    }

    #[test]
    fn reserved_names_match_descriptors() {
        let names: Vec<String> = base_fields::<BaseConfig>()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        assert_eq!(names, RESERVED_FIELDS.map(String::from).to_vec());
    }

    #[test]
    fn descriptors_reach_the_base_struct() {
        let fields = base_fields::<BaseConfig>();
        let mut cfg = BaseConfig::default();
        for field in &fields {
            let raw = match field.name() {
                "log_level" => RawValue::from("debug"),
                "verbosity" => RawValue::Int(3),
                "conf_file" | "log_file" => RawValue::from("x.toml"),
                _ => RawValue::Bool(true),
            };
            field.slot.apply(&mut cfg, field.name(), &raw).unwrap();
        }
        assert_eq!(cfg.log_level.get(), "debug");
        assert_eq!(cfg.verbosity.get(), 3);
        assert_eq!(cfg.conf_file, "x.toml");
        assert!(cfg.no_cfg && cfg.no_env && cfg.pretty && cfg.dry_run);
    }
}
