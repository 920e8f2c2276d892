use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayerfigError {
    #[error("Invalid tag for {field}, {reason} in '{tag}'")]
    MalformedTag {
        field: String,
        tag: String,
        reason: String,
    },

    #[error("Invalid config file tag for {field}, {reason} in '{key}'")]
    InvalidConfigKey {
        field: String,
        key: String,
        reason: String,
    },

    #[error(
        "Field collision on field {field}, user configurations cannot shadow base configuration fields"
    )]
    FieldCollision { field: String },

    #[error("{context} {field}, unsupported type {type_name}")]
    UnsupportedType {
        context: &'static str,
        field: String,
        type_name: String,
    },

    #[error("Error while creating flag for variable {field}: {reason}")]
    Bind { field: String, reason: String },

    #[error("Internal error, cannot find cmd for {command} (variable {field})")]
    UnknownCommand { command: String, field: String },

    #[error(
        "More than one configuration variable corresponds to config file variable {key} with different defaults: \"{first}\" and \"{second}\" for example"
    )]
    ConflictingDefaults {
        key: String,
        first: String,
        second: String,
    },

    #[error("App name is required, call .app_name() on the builder")]
    AppNameRequired,

    #[error("Could not load config file {path}: {source}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Could not parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Cannot convert flag value {key}: {reason}")]
    Conversion { key: String, reason: String },

    #[error("Cannot convert flag value {key}: {value} would overflow {width}")]
    Overflow {
        key: String,
        value: String,
        width: String,
    },

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Invalid key '{key}' in {path} (line {line})")]
    InvalidKey {
        key: String,
        path: PathBuf,
        line: usize,
    },

    #[error("Invalid key(s) in the configuration file: {}", key_list(.0))]
    InvalidKeys(Vec<LayerfigError>),

    #[error(
        "Unprocessed key(s) in the configuration file, needed custom processing for {}. The parser has processed: {}",
        joined(.unprocessed),
        joined(.processed)
    )]
    UnprocessedKeys {
        unprocessed: Vec<String>,
        processed: Vec<String>,
    },

    #[error("Custom configuration parsing failed for {key}: {reason}")]
    Extension { key: String, reason: String },

    #[error(transparent)]
    Cli(#[from] clap::Error),
}

fn joined(keys: &[String]) -> String {
    keys.join(", ")
}

fn key_list(errors: &[LayerfigError]) -> String {
    errors
        .iter()
        .map(|e| match e {
            LayerfigError::InvalidKey { key, line, .. } if *line > 0 => {
                format!("{key} (line {line})")
            }
            LayerfigError::InvalidKey { key, .. } => key.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl LayerfigError {
    /// Builds an overflow error for a value that does not fit `width`
    /// (`"int8"`, `"uint32"`, `"float32"`, ...).
    pub(crate) fn overflow(key: &str, value: impl ToString, width: &str) -> Self {
        let article = if width.starts_with(['i', 'u']) { "an" } else { "a" };
        LayerfigError::Overflow {
            key: key.to_string(),
            value: value.to_string(),
            width: format!("{article} {width}"),
        }
    }

    pub(crate) fn conversion(key: &str, reason: impl Into<String>) -> Self {
        LayerfigError::Conversion {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
