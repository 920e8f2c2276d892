//! Where layerfig looks for the configuration file.
//!
//! Search paths are listed in **priority-ascending** order: the last entry has
//! the highest priority. Discovery walks the list from the highest-priority end
//! and stops at the first directory containing the file, so only one file is
//! ever loaded.
//!
//! The default list is `[System, Platform, Cwd]`: a file in the working
//! directory wins over the user's config directory, which wins over the
//! system-wide one.
//!
//! An explicit `--config` (or `{APP}_CONFIGFILE`) value bypasses discovery when
//! it contains a path separator. A bare file name is looked up in the search
//! paths instead of the default `{app}.toml`.

use std::path::PathBuf;

/// A directory to search for the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchPath {
    /// `/etc/{app_name}` on Unix. Resolves to nothing elsewhere.
    System,
    /// Platform config directory (e.g. `~/.config/{app_name}/` on Linux,
    /// `~/Library/Application Support/{app_name}/` on macOS).
    Platform,
    /// A subdirectory of the home directory (e.g. `Home(".myapp")`).
    Home(&'static str),
    /// The current working directory.
    Cwd,
    /// An explicit directory.
    Path(PathBuf),
}

impl SearchPath {
    pub fn defaults() -> Vec<SearchPath> {
        vec![SearchPath::System, SearchPath::Platform, SearchPath::Cwd]
    }
}
