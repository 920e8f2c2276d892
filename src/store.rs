//! The per-invocation key/value store behind the file and environment layers.
//!
//! Keys are dotted (`section.leaf`, or just `leaf` for the root section).
//! [`Store::lookup`] answers with the highest-precedence layer that has a
//! value: a bound, non-empty environment variable, then the config file, then
//! the default seeded by the binder.
//!
//! A store is an owned value. Create one per resolution with
//! [`Schema::new_store`](crate::Schema::new_store); nothing is shared between
//! invocations.

use std::collections::BTreeMap;
use std::fmt;

use crate::env::Environment;
use crate::file::LoadedFile;
use crate::value::RawValue;

/// Which layer a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    CommandLine,
    /// Carries the environment variable name.
    Environment(String),
    ConfigFile,
    Default,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::CommandLine => f.write_str("command line"),
            Source::Environment(var) => write!(f, "environment ({var})"),
            Source::ConfigFile => f.write_str("config file"),
            Source::Default => f.write_str("default"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Store {
    defaults: BTreeMap<String, RawValue>,
    /// config key -> environment variable name
    env_bindings: BTreeMap<String, String>,
    env: Environment,
    file: Option<LoadedFile>,
}

impl Store {
    pub(crate) fn new(
        defaults: BTreeMap<String, RawValue>,
        env_bindings: BTreeMap<String, String>,
        env: Environment,
    ) -> Self {
        Self {
            defaults,
            env_bindings,
            env,
            file: None,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn set_file(&mut self, file: LoadedFile) {
        self.file = Some(file);
    }

    pub fn file(&self) -> Option<&LoadedFile> {
        self.file.as_ref()
    }

    /// The value the config file holds for `key`, if any.
    pub fn file_value(&self, key: &str) -> Option<RawValue> {
        let file = self.file.as_ref()?;
        table_get(&file.table, key).cloned().map(RawValue::from)
    }

    /// The highest-precedence value for `key` and where it came from.
    pub fn lookup(&self, key: &str) -> Option<(RawValue, Source)> {
        if let Some(var) = self.env_bindings.get(key)
            && let Some(value) = self.env.get(var)
        {
            return Some((RawValue::from(value), Source::Environment(var.clone())));
        }
        if let Some(value) = self.file_value(key) {
            return Some((value, Source::ConfigFile));
        }
        self.defaults
            .get(key)
            .map(|value| (value.clone(), Source::Default))
    }
}

/// Look up a dotted key in a TOML table.
pub fn table_get<'a>(table: &'a toml::Table, dotted_key: &str) -> Option<&'a toml::Value> {
    let (path, leaf) = match dotted_key.rsplit_once('.') {
        Some((p, l)) => (Some(p), l),
        None => (None, dotted_key),
    };

    let tbl = match path {
        Some(path) => {
            let mut current = table;
            for segment in path.split('.') {
                current = current.get(segment)?.as_table()?;
            }
            current
        }
        None => table,
    };

    tbl.get(leaf)
}
