//! Locating and parsing the configuration file.
//!
//! Each [`SearchPath`] resolves to at most one directory. Discovery checks
//! `{dir}/{file_name}` from the highest-priority end of the list and returns
//! the first file found. Missing files are skipped; any other I/O error is
//! propagated.
//!
//! Whether a missing file is an error depends on how it was asked for:
//!
//! - auto-discovered (no explicit name): not finding it means "no config
//!   file", and resolution continues with the environment and defaults;
//! - explicit (`--config` or `{APP}_CONFIGFILE`): not finding it is a
//!   [`ConfigLoad`](LayerfigError::ConfigLoad) error.
//!
//! A file that exists but is not valid TOML is always a
//! [`ConfigParse`](LayerfigError::ConfigParse) error.

use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::LayerfigError;
use crate::types::SearchPath;

/// A configuration file that was found and parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub content: String,
    pub table: toml::Table,
}

impl LoadedFile {
    pub fn parse(path: PathBuf, content: String) -> Result<Self, LayerfigError> {
        let table = toml::from_str::<toml::Table>(&content).map_err(|e| {
            LayerfigError::ConfigParse {
                path: path.clone(),
                source: e,
            }
        })?;
        Ok(Self {
            path,
            content,
            table,
        })
    }
}

/// Resolve a [`SearchPath`] to a concrete directory.
///
/// Returns `None` if it cannot be resolved (no home directory, no system
/// directory on this platform, ...).
pub fn resolve_search_path(sp: &SearchPath, app_name: &str) -> Option<PathBuf> {
    match sp {
        SearchPath::System => system_dir(app_name),
        SearchPath::Platform => {
            let proj = directories::ProjectDirs::from("", "", app_name)?;
            Some(proj.config_dir().to_path_buf())
        }
        SearchPath::Home(subdir) => {
            let user = directories::UserDirs::new()?;
            Some(user.home_dir().join(subdir))
        }
        SearchPath::Cwd => std::env::current_dir().ok(),
        SearchPath::Path(p) => Some(p.clone()),
    }
}

#[cfg(unix)]
fn system_dir(app_name: &str) -> Option<PathBuf> {
    Some(PathBuf::from("/etc").join(app_name))
}

#[cfg(not(unix))]
fn system_dir(_app_name: &str) -> Option<PathBuf> {
    None
}

/// Resolve all search paths into concrete directories (priority-ascending).
pub fn expand_search_paths(search_paths: &[SearchPath], app_name: &str) -> Vec<PathBuf> {
    search_paths
        .iter()
        .filter_map(|sp| resolve_search_path(sp, app_name))
        .collect()
}

/// Read the highest-priority `{dir}/{file_name}`.
///
/// Searches from the end of the directory list (highest priority) backward.
fn load_first_match(
    dirs: &[PathBuf],
    file_name: &str,
) -> Result<Option<(PathBuf, String)>, LayerfigError> {
    for dir in dirs.iter().rev() {
        let file_path = dir.join(file_name);
        match std::fs::read_to_string(&file_path) {
            Ok(content) => return Ok(Some((file_path, content))),
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(LayerfigError::ConfigLoad {
                    path: file_path,
                    source: e,
                });
            }
        }
    }
    Ok(None)
}

fn is_path_like(name: &str) -> bool {
    name.contains('/') || name.contains(std::path::MAIN_SEPARATOR)
}

/// Find and parse the configuration file.
///
/// `explicit` is the user-supplied file (empty or `None` means auto-discovery
/// of `default_name`). Returns `Ok(None)` only for an auto-discovered file
/// that does not exist.
pub fn locate_config_file(
    explicit: Option<&str>,
    search_paths: &[SearchPath],
    default_name: &str,
    app_name: &str,
) -> Result<Option<LoadedFile>, LayerfigError> {
    let explicit = explicit.map(str::trim).filter(|name| !name.is_empty());

    let found = match explicit {
        Some(name) if is_path_like(name) => {
            let path = PathBuf::from(name);
            match std::fs::read_to_string(&path) {
                Ok(content) => Some((path, content)),
                Err(e) => return Err(LayerfigError::ConfigLoad { path, source: e }),
            }
        }
        Some(name) => {
            let dirs = expand_search_paths(search_paths, app_name);
            match load_first_match(&dirs, name)? {
                Some(found) => Some(found),
                None => {
                    return Err(LayerfigError::ConfigLoad {
                        path: PathBuf::from(name),
                        source: std::io::Error::new(
                            ErrorKind::NotFound,
                            "not found in any search path",
                        ),
                    });
                }
            }
        }
        None => {
            let dirs = expand_search_paths(search_paths, app_name);
            load_first_match(&dirs, default_name)?
        }
    };

    found
        .map(|(path, content)| LoadedFile::parse(path, content))
        .transpose()
}
