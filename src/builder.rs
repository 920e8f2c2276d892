use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;

use clap::{ArgMatches, Command};

use crate::base::{AppConfig, base_fields};
use crate::binder::{self, AdditionalVar, Bindings, FlagBinding};
use crate::env::{Environment, env_name};
use crate::error::LayerfigError;
use crate::field::Field;
use crate::resolve::{ExtraParser, ResolveReport, Resolved, Resolver};
use crate::store::Store;
use crate::types::SearchPath;
use crate::value::RawValue;

/// Entry point for building a layerfig schema.
pub struct Layerfig;

impl Layerfig {
    pub fn builder<C: AppConfig>() -> LayerfigBuilder<C> {
        LayerfigBuilder::new()
    }
}

/// Builder for declaring fields and compiling them against a command tree.
///
/// Nothing is checked until [`build()`](Self::build), which parses every
/// annotation, registers the flags and seeds the defaults in one pass.
pub struct LayerfigBuilder<C: AppConfig> {
    app_name: Option<String>,
    file_name: Option<String>,
    search_paths: Option<Vec<SearchPath>>,
    env_prefix: Option<String>,
    fields: Vec<Field<C>>,
    extension_keys: BTreeSet<String>,
    parser: Option<Box<ExtraParser<C>>>,
}

impl<C: AppConfig> LayerfigBuilder<C> {
    fn new() -> Self {
        Self {
            app_name: None,
            file_name: None,
            search_paths: None,
            env_prefix: None,
            fields: Vec::new(),
            extension_keys: BTreeSet::new(),
            parser: None,
        }
    }

    /// Set the application name. This derives sensible defaults:
    /// - `file_name` → `"{app_name}.toml"`
    /// - `search_paths` → `[System, Platform, Cwd]`
    /// - `env_prefix` → `"{APP_NAME}"` (uppercased)
    pub fn app_name(mut self, name: &str) -> Self {
        self.app_name = Some(name.to_string());
        self
    }

    /// Override the config file name (default: `"{app_name}.toml"`).
    pub fn file_name(mut self, name: &str) -> Self {
        self.file_name = Some(name.to_string());
        self
    }

    /// Replace the default search paths entirely.
    ///
    /// Paths are listed in **priority-ascending** order: the last entry has the
    /// highest priority. See [`SearchPath`] for the available variants.
    pub fn search_paths(mut self, paths: Vec<SearchPath>) -> Self {
        self.search_paths = Some(paths);
        self
    }

    /// Append a search path without replacing the defaults.
    pub fn add_search_path(mut self, path: SearchPath) -> Self {
        self.search_paths
            .get_or_insert_with(SearchPath::defaults)
            .push(path);
        self
    }

    /// Override the environment variable prefix (default: uppercased `app_name`).
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self
    }

    pub fn field(mut self, field: Field<C>) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = Field<C>>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Route config file `keys` to `parser`.
    ///
    /// Keys of `custom` fields are routed to it as well. The parser returns
    /// the keys it consumed; leaving any out fails the resolution.
    pub fn extra_parse<F>(mut self, keys: &[&str], parser: F) -> Self
    where
        F: Fn(&mut C, &BTreeMap<String, RawValue>) -> Result<Vec<String>, LayerfigError>
            + Send
            + Sync
            + 'static,
    {
        self.extension_keys
            .extend(keys.iter().map(|k| k.to_string()));
        self.parser = Some(Box::new(parser));
        self
    }

    /// Compile the fields against `command` and return the finished schema.
    ///
    /// Every annotation, capability and flag name error surfaces here.
    pub fn build(self, command: Command) -> Result<Schema<C>, LayerfigError> {
        let app_name = self.app_name.ok_or(LayerfigError::AppNameRequired)?;
        let file_name = self
            .file_name
            .unwrap_or_else(|| format!("{app_name}.toml"));
        let search_paths = self.search_paths.unwrap_or_else(SearchPath::defaults);
        let env_prefix = self
            .env_prefix
            .unwrap_or_else(|| app_name.to_uppercase());

        let prototype = C::default();
        let (command, bindings) =
            binder::bind(&env_prefix, base_fields(), self.fields, command, &prototype)?;

        Ok(Schema {
            app_name,
            file_name,
            search_paths,
            env_prefix,
            command,
            bindings,
            extension_keys: self.extension_keys,
            parser: self.parser,
        })
    }
}

/// A compiled, read-only configuration schema.
///
/// Built once per process. Each invocation gets its own [`Store`] and config
/// value, so a schema can serve any number of resolutions.
pub struct Schema<C> {
    app_name: String,
    file_name: String,
    search_paths: Vec<SearchPath>,
    env_prefix: String,
    command: Command,
    bindings: Bindings<C>,
    extension_keys: BTreeSet<String>,
    parser: Option<Box<ExtraParser<C>>>,
}

impl<C: AppConfig> Schema<C> {
    /// The application's command tree with every field flag registered.
    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The fully qualified environment variable for `suffix`.
    pub fn env_name(&self, suffix: &str) -> String {
        env_name(&self.env_prefix, suffix)
    }

    pub fn flags(&self) -> &[FlagBinding] {
        &self.bindings.flags
    }

    pub fn additional(&self) -> &[AdditionalVar] {
        &self.bindings.additional
    }

    /// Defaults seeded per config file key.
    pub fn defaults(&self) -> &BTreeMap<String, RawValue> {
        &self.bindings.defaults
    }

    /// A fresh store over `env`, seeded with this schema's defaults.
    pub fn new_store(&self, env: Environment) -> Store {
        Store::new(
            self.bindings.defaults.clone(),
            self.bindings.env_bindings.clone(),
            env,
        )
    }

    /// Resolve into an existing config value.
    ///
    /// Fields no source sets keep whatever `cfg` already holds.
    pub fn resolve_into(
        &self,
        cfg: &mut C,
        matches: &ArgMatches,
        store: &mut Store,
    ) -> Result<ResolveReport, LayerfigError> {
        let resolver = Resolver {
            app_name: &self.app_name,
            file_name: &self.file_name,
            search_paths: &self.search_paths,
            bindings: &self.bindings,
            extension_keys: &self.extension_keys,
            parser: self.parser.as_deref(),
        };
        resolver.resolve(cfg, matches, store)
    }

    /// Resolve into a fresh `C::default()`.
    pub fn resolve(
        &self,
        matches: &ArgMatches,
        store: &mut Store,
    ) -> Result<Resolved<C>, LayerfigError> {
        let mut config = C::default();
        let report = self.resolve_into(&mut config, matches, store)?;
        Ok(Resolved {
            config,
            report,
            matches: matches.clone(),
        })
    }

    /// Parse `args` and resolve against `env`.
    ///
    /// Clap errors, including `--help`, come back as [`LayerfigError::Cli`].
    pub fn load_from<I, T>(&self, args: I, env: Environment) -> Result<Resolved<C>, LayerfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.command.clone().try_get_matches_from(args)?;
        let mut store = self.new_store(env);
        self.resolve(&matches, &mut store)
    }

    /// Parse the process arguments and resolve against the process environment.
    pub fn load(&self) -> Result<Resolved<C>, LayerfigError> {
        self.load_from(std::env::args_os(), Environment::from_process())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::BaseConfig;
    use crate::lens;
    use crate::store::Source;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Cfg {
        base: BaseConfig,
        host: String,
    }

    impl AppConfig for Cfg {
        fn base(&self) -> &BaseConfig {
            &self.base
        }
        fn base_mut(&mut self) -> &mut BaseConfig {
            &mut self.base
        }
    }

    fn host() -> Field<Cfg> {
        Field::primitive("host", "|host|H, server.host, HOST", lens!(Cfg, host))
    }

    #[test]
    fn app_name_is_required() {
        let err = Layerfig::builder::<Cfg>()
            .build(Command::new("app"))
            .err()
            .unwrap();
        assert!(matches!(err, LayerfigError::AppNameRequired));
    }

    #[test]
    fn derived_defaults() {
        let schema = Layerfig::builder::<Cfg>()
            .app_name("myapp")
            .field(host())
            .build(Command::new("myapp"))
            .unwrap();
        assert_eq!(schema.file_name(), "myapp.toml");
        assert_eq!(schema.env_name("HOST"), "MYAPP_HOST");
        assert_eq!(schema.search_paths, SearchPath::defaults());
        assert!(schema.flags().iter().any(|f| f.long == "host"));
        assert_eq!(schema.defaults().get("server.host"), Some(&RawValue::from("")));
    }

    #[test]
    fn overrides() {
        let schema = Layerfig::builder::<Cfg>()
            .app_name("myapp")
            .file_name("settings.toml")
            .env_prefix("MY")
            .add_search_path(SearchPath::Path("/opt/myapp".into()))
            .build(Command::new("myapp"))
            .unwrap();
        assert_eq!(schema.file_name(), "settings.toml");
        assert_eq!(schema.env_name("HOST"), "MY_HOST");
        assert_eq!(schema.search_paths.len(), 4);
    }

    #[test]
    fn schema_errors_surface_at_build() {
        let err = Layerfig::builder::<Cfg>()
            .app_name("myapp")
            .field(Field::primitive("host", "|host|H, a.b.c, ", lens!(Cfg, host)))
            .build(Command::new("myapp"))
            .err()
            .unwrap();
        assert!(matches!(err, LayerfigError::InvalidConfigKey { .. }));
    }

    #[test]
    fn one_schema_many_resolutions() {
        let schema = Layerfig::builder::<Cfg>()
            .app_name("myapp")
            .search_paths(vec![])
            .field(host())
            .build(Command::new("myapp"))
            .unwrap();

        let a = schema
            .load_from(["myapp", "-H", "a"], Environment::default())
            .unwrap();
        let b = schema
            .load_from(["myapp"], Environment::from_pairs([("MYAPP_HOST", "b")]))
            .unwrap();
        assert_eq!(a.config.host, "a");
        assert_eq!(b.config.host, "b");
        assert_eq!(
            b.report.source("host"),
            Some(&Source::Environment("MYAPP_HOST".into()))
        );
    }

    #[test]
    fn clap_errors_are_wrapped() {
        let schema = Layerfig::builder::<Cfg>()
            .app_name("myapp")
            .build(Command::new("myapp"))
            .unwrap();
        let err = schema
            .load_from(["myapp", "--bogus"], Environment::default())
            .err()
            .unwrap();
        assert!(matches!(err, LayerfigError::Cli(_)));
    }

    #[test]
    fn help_is_a_cli_error() {
        let schema = Layerfig::builder::<Cfg>()
            .app_name("myapp")
            .build(Command::new("myapp"))
            .unwrap();
        let err = schema
            .load_from(["myapp", "--help"], Environment::default())
            .err()
            .unwrap();
        let LayerfigError::Cli(e) = err else {
            panic!("Expected a clap error");
        };
        assert_eq!(e.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
