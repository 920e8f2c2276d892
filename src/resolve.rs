//! Per-invocation resolution: merge the command line, the environment and the
//! config file into one typed config.
//!
//! Runs once after clap has parsed argv. Steps:
//!
//! 1. Apply every flag the user typed, through the field's own setter when it
//!    has one, and lock that field. Locking is per field, so any alias of a
//!    shared field locks it.
//! 2. If `no_env` is set, empty the store's environment.
//! 3. Apply environment overrides for additional variables the store cannot
//!    reach (an environment name but no file key). This is also where
//!    `{APP}_CONFIGFILE` and `{APP}_NOCFG` take effect.
//! 4. Unless `no_cfg` is set, locate and parse the config file.
//! 5. Assign every unlocked field with a file key from the store, which
//!    answers env over file over default.
//! 6. Reject file keys nobody declared, then hand the extension keys to the
//!    application's parser and make sure it consumed all of them.
//!
//! Nothing is partially applied on failure: the first error is returned and
//! the config must be discarded.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use clap::ArgMatches;
use tracing::{debug, trace};

use crate::base::AppConfig;
use crate::binder::Bindings;
use crate::cli;
use crate::error::LayerfigError;
use crate::file;
use crate::store::{Source, Store};
use crate::tag::SEP_CMD_LEVELS;
use crate::types::SearchPath;
use crate::validate;
use crate::value::RawValue;

/// Application hook for config file sections that are not plain fields.
///
/// Receives every routed key with its value and returns the keys it consumed.
pub type ExtraParser<C> = dyn Fn(&mut C, &BTreeMap<String, RawValue>) -> Result<Vec<String>, LayerfigError>
    + Send
    + Sync;

/// What happened during one resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveReport {
    /// The config file that was read, if any.
    pub config_file: Option<PathBuf>,
    /// Fields set on the command line.
    pub locked: BTreeSet<String>,
    /// Where each assigned field's value came from. Fields left at their
    /// default are absent.
    pub sources: BTreeMap<String, Source>,
    /// Keys handed to the extension parser.
    pub extension_keys: Vec<String>,
}

impl ResolveReport {
    pub fn source(&self, field: &str) -> Option<&Source> {
        self.sources.get(field)
    }

    pub fn is_locked(&self, field: &str) -> bool {
        self.locked.contains(field)
    }
}

/// A resolved config together with the parsed command line.
#[derive(Debug, Clone)]
pub struct Resolved<C> {
    pub config: C,
    pub report: ResolveReport,
    pub matches: ArgMatches,
}

impl<C> Resolved<C> {
    /// The invoked subcommand path, `>` between levels. Empty for the root.
    pub fn command_path(&self) -> String {
        let mut levels = Vec::new();
        let mut current = &self.matches;
        while let Some((name, sub)) = current.subcommand() {
            levels.push(name);
            current = sub;
        }
        levels.join(&SEP_CMD_LEVELS.to_string())
    }
}

/// Everything the resolver reads from the compiled schema.
pub(crate) struct Resolver<'a, C> {
    pub(crate) app_name: &'a str,
    pub(crate) file_name: &'a str,
    pub(crate) search_paths: &'a [SearchPath],
    pub(crate) bindings: &'a Bindings<C>,
    pub(crate) extension_keys: &'a BTreeSet<String>,
    pub(crate) parser: Option<&'a ExtraParser<C>>,
}

impl<C: AppConfig> Resolver<'_, C> {
    pub(crate) fn resolve(
        &self,
        cfg: &mut C,
        matches: &ArgMatches,
        store: &mut Store,
    ) -> Result<ResolveReport, LayerfigError> {
        let mut report = ResolveReport::default();

        self.apply_command_line(cfg, matches, &mut report)?;
        if !report.locked.is_empty() {
            debug!("locked on the command line: {:?}", report.locked);
        }

        if cfg.base().no_env {
            debug!("environment disabled");
            store.environment_mut().clear();
        }

        self.apply_additional_env(cfg, store, &mut report)?;

        if cfg.base().no_cfg {
            debug!("config file disabled");
        } else {
            let explicit = Some(cfg.base().conf_file.as_str());
            match file::locate_config_file(
                explicit,
                self.search_paths,
                self.file_name,
                self.app_name,
            )? {
                Some(loaded) => {
                    debug!("using config file {}", loaded.path.display());
                    report.config_file = Some(loaded.path.clone());
                    store.set_file(loaded);
                }
                None => debug!("no config file found"),
            }
        }

        self.apply_store(cfg, store, &mut report)?;
        self.apply_extension(cfg, store, &mut report)?;

        Ok(report)
    }

    fn apply_command_line(
        &self,
        cfg: &mut C,
        matches: &ArgMatches,
        report: &mut ResolveReport,
    ) -> Result<(), LayerfigError> {
        let chain = cli::invoked_chain(matches);
        for flag in &self.bindings.flags {
            let Some((_, level)) = chain.iter().find(|(path, _)| *path == flag.command) else {
                continue;
            };
            let Some(raw) = cli::explicit_value(level, &flag.long, flag.list) else {
                continue;
            };
            let Some(field) = self.bindings.field(&flag.field) else {
                continue;
            };
            trace!("--{} = {raw} for field {}", flag.long, field.name);
            field.slot.apply(cfg, &flag.long, &raw)?;
            report.locked.insert(field.name.clone());
            report
                .sources
                .insert(field.name.clone(), Source::CommandLine);
        }
        Ok(())
    }

    fn apply_additional_env(
        &self,
        cfg: &mut C,
        store: &Store,
        report: &mut ResolveReport,
    ) -> Result<(), LayerfigError> {
        for var in &self.bindings.additional {
            if var.config_key.is_some() || report.is_locked(&var.field) {
                continue;
            }
            let Some(env) = &var.env else { continue };
            let Some(value) = store.environment().get(env) else {
                continue;
            };
            let Some(field) = self.bindings.field(&var.field) else {
                continue;
            };
            trace!("{env} = {value} for field {}", field.name);
            field.slot.apply(cfg, env, &RawValue::from(value))?;
            report
                .sources
                .insert(field.name.clone(), Source::Environment(env.clone()));
        }
        Ok(())
    }

    fn apply_store(
        &self,
        cfg: &mut C,
        store: &Store,
        report: &mut ResolveReport,
    ) -> Result<(), LayerfigError> {
        for field in &self.bindings.fields {
            if report.is_locked(&field.name) {
                continue;
            }
            let Some(key) = field.store_key() else {
                continue;
            };
            let Some((value, source)) = store.lookup(&key) else {
                continue;
            };
            if source == Source::Default {
                continue;
            }
            trace!("{key} = {value} from {source}");
            field.slot.apply(cfg, &key, &value)?;
            report.sources.insert(field.name.clone(), source);
        }
        Ok(())
    }

    fn apply_extension(
        &self,
        cfg: &mut C,
        store: &Store,
        report: &mut ResolveReport,
    ) -> Result<(), LayerfigError> {
        let Some(loaded) = store.file() else {
            return Ok(());
        };

        let routable: BTreeSet<String> = self
            .extension_keys
            .union(&self.bindings.custom_keys)
            .cloned()
            .collect();
        let routed = validate::check_file_keys(loaded, &self.bindings.known_keys(), &routable)?;
        if routed.is_empty() {
            return Ok(());
        }

        let values: BTreeMap<String, RawValue> = routed
            .iter()
            .filter_map(|key| store.file_value(key).map(|v| (key.clone(), v)))
            .collect();
        debug!("extension keys: {routed:?}");
        report.extension_keys = routed;

        let processed = match self.parser {
            Some(parser) => parser(cfg, &values)?,
            None => Vec::new(),
        };

        let done: BTreeSet<&str> = processed.iter().map(String::as_str).collect();
        let unprocessed: Vec<String> = values
            .keys()
            .filter(|key| !done.contains(key.as_str()))
            .cloned()
            .collect();
        if unprocessed.is_empty() {
            Ok(())
        } else {
            Err(LayerfigError::UnprocessedKeys {
                unprocessed,
                processed,
            })
        }
    }
}
