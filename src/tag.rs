//! Field annotation parsing.
//!
//! An annotation has exactly three comma-separated parts:
//!
//! ```text
//! <cmd>|<long>|<short>[&<cmd2>|<long2>|<short2>...], <section.key|.key|>, <ENVSUFFIX>
//! ```
//!
//! - Part one lists the command-line exposures. `cmd` is a command path with
//!   `>` between levels (`config>init`); the empty path is the root command.
//!   The short slot is a single character, empty, or one of the markers
//!   `none` (no command line), `custom` (no command line, fed by the
//!   extension parser) and `hidden` (bound but hidden from help).
//! - Part two is the config file key: empty, `.leaf` for the root section, or
//!   `section.leaf`.
//! - Part three is the environment variable suffix.

use std::fmt;

use crate::error::LayerfigError;

pub const SEP_TAG: char = ',';
pub const SEP_MULTIPLE_CMDS: char = '&';
pub const SEP_CMD_PARTS: char = '|';
pub const SEP_KEY_PARTS: char = '.';
pub const SEP_CMD_LEVELS: char = '>';

/// One command-line exposure of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exposure {
    pub command: String,
    pub long: String,
    pub short: Option<char>,
    pub hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Exposed as one or more flags.
    CommandLine,
    /// Config file and/or environment only.
    None,
    /// Config file only, through the extension parser.
    Custom,
}

/// A `[section.]leaf` config file key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigKey {
    pub section: Option<String>,
    pub leaf: String,
}

impl ConfigKey {
    pub fn dotted(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.section {
            Some(section) => write!(f, "{section}{SEP_KEY_PARTS}{}", self.leaf),
            None => f.write_str(&self.leaf),
        }
    }
}

/// The parsed annotation of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTag {
    pub exposures: Vec<Exposure>,
    pub visibility: Visibility,
    pub config_key: Option<ConfigKey>,
    pub env: Option<String>,
}

impl FieldTag {
    pub fn has_cmdline(&self) -> bool {
        !self.exposures.is_empty()
    }
}

fn malformed(field: &str, tag: &str, reason: impl Into<String>) -> LayerfigError {
    LayerfigError::MalformedTag {
        field: field.to_string(),
        tag: tag.to_string(),
        reason: reason.into(),
    }
}

/// Parse the annotation `tag` of the field called `field`.
pub fn parse_tag(field: &str, tag: &str) -> Result<FieldTag, LayerfigError> {
    let parts: Vec<&str> = tag.split(SEP_TAG).collect();
    if parts.len() != 3 {
        return Err(malformed(
            field,
            tag,
            format!("found {} parts instead of 3", parts.len()),
        ));
    }

    let (exposures, visibility) = parse_exposures(field, tag, parts[0].trim())?;
    let config_key = parse_config_key(field, parts[1].trim())?;
    let env = Some(parts[2].trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(FieldTag {
        exposures,
        visibility,
        config_key,
        env,
    })
}

fn parse_exposures(
    field: &str,
    tag: &str,
    part: &str,
) -> Result<(Vec<Exposure>, Visibility), LayerfigError> {
    if part.is_empty() {
        return Ok((Vec::new(), Visibility::None));
    }

    let mut exposures = Vec::new();
    let mut marker: Option<Visibility> = None;
    for triple in part.split(SEP_MULTIPLE_CMDS) {
        let pieces: Vec<&str> = triple.split(SEP_CMD_PARTS).map(str::trim).collect();
        let [command, long, short] = pieces.as_slice() else {
            return Err(malformed(
                field,
                tag,
                format!("malformed cmdline tag '{triple}'"),
            ));
        };

        match *short {
            "none" | "custom" => {
                let vis = if *short == "none" {
                    Visibility::None
                } else {
                    Visibility::Custom
                };
                if marker.is_some_and(|m| m != vis) {
                    return Err(malformed(field, tag, "conflicting none/custom markers"));
                }
                marker = Some(vis);
                continue;
            }
            _ => {}
        }

        if long.is_empty() {
            return Err(LayerfigError::Bind {
                field: field.to_string(),
                reason: format!(
                    "flag {field} has empty commandline name but is not set as none/custom"
                ),
            });
        }
        if long.starts_with('-') {
            return Err(malformed(
                field,
                tag,
                format!("flag name '{long}' must not start with '-'"),
            ));
        }

        let (short, hidden) = match *short {
            "" => (None, false),
            "hidden" => (None, true),
            s => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_alphanumeric() => (Some(c), false),
                    _ => {
                        return Err(malformed(
                            field,
                            tag,
                            format!("short flag '{s}' must be a single character"),
                        ));
                    }
                }
            }
        };

        let levels = command_levels(command);
        if levels.iter().any(|level| level.is_empty()) {
            return Err(malformed(
                field,
                tag,
                format!("empty level in command path '{command}'"),
            ));
        }

        exposures.push(Exposure {
            command: levels.join(&SEP_CMD_LEVELS.to_string()),
            long: long.to_string(),
            short,
            hidden,
        });
    }

    match marker {
        Some(_) if !exposures.is_empty() => Err(malformed(
            field,
            tag,
            "none/custom cannot be mixed with command-line exposures",
        )),
        Some(vis) => Ok((exposures, vis)),
        None => Ok((exposures, Visibility::CommandLine)),
    }
}

fn parse_config_key(field: &str, key: &str) -> Result<Option<ConfigKey>, LayerfigError> {
    if key.is_empty() {
        return Ok(None);
    }

    let invalid = |reason: &str| LayerfigError::InvalidConfigKey {
        field: field.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if let Some(leaf) = key.strip_prefix(SEP_KEY_PARTS) {
        if leaf.contains(SEP_KEY_PARTS) {
            return Err(invalid("more than two . present"));
        }
        if leaf.is_empty() {
            return Err(invalid("empty key"));
        }
        return Ok(Some(ConfigKey {
            section: None,
            leaf: leaf.to_string(),
        }));
    }

    let Some((section, leaf)) = key.split_once(SEP_KEY_PARTS) else {
        return Err(invalid("no . present"));
    };
    if leaf.contains(SEP_KEY_PARTS) {
        return Err(invalid("more than two . present"));
    }
    if section.is_empty() || leaf.is_empty() {
        return Err(invalid("empty section or key"));
    }
    Ok(Some(ConfigKey {
        section: Some(section.to_string()),
        leaf: leaf.to_string(),
    }))
}

/// Split a command path into its levels. The root command is `[]`.
pub fn command_levels(path: &str) -> Vec<&str> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split(SEP_CMD_LEVELS).map(str::trim).collect()
}
