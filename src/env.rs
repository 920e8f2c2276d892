use std::collections::BTreeMap;

/// Fully qualified environment variable name: `{APP}_{SUFFIX}`.
///
/// The app name is uppercased; the suffix is used as written.
pub fn env_name(app_prefix: &str, suffix: &str) -> String {
    format!("{}_{suffix}", app_prefix.to_uppercase())
}

/// An owned snapshot of environment variables.
///
/// Takes an iterator so tests can pass synthetic data instead of
/// `std::env::vars()`. Empty values are treated as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn from_process() -> Self {
        Self::from_pairs(std::env::vars())
    }

    pub fn from_pairs<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Drop every variable, as if the process environment were empty.
    pub fn clear(&mut self) {
        self.vars.clear();
    }
}
