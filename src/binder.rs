//! Compiles field descriptors into flag registrations and store bindings.
//!
//! Binding runs once, when the schema is built. For every field it parses the
//! annotation, checks the field's capability against what the annotation asks
//! for, adds one global clap argument per command exposure, seeds the default
//! layer from the prototype config, and records how the resolver reaches the
//! field afterwards:
//!
//! - each flag carries the name of the field it came from, so a value typed
//!   through any alias of a shared field locks that field;
//! - a field with both a file key and an environment suffix gets an env
//!   binding on its key, and the store applies env over file itself;
//! - a field without command-line exposure, or with an environment suffix
//!   but no file key, is an additional variable the resolver handles by name.

use std::collections::{BTreeMap, BTreeSet};

use clap::Command;
use tracing::trace;

use crate::base::RESERVED_FIELDS;
use crate::cli;
use crate::env::env_name;
use crate::error::LayerfigError;
use crate::field::{Field, Slot};
use crate::tag::{FieldTag, Visibility, command_levels, parse_tag};
use crate::value::RawValue;

/// A registered command-line flag and the field it feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagBinding {
    /// Command path, `>` between levels. Empty for the root.
    pub command: String,
    pub long: String,
    pub short: Option<char>,
    pub hidden: bool,
    /// Name of the originating field.
    pub field: String,
    pub list: bool,
}

/// A field resolved by name rather than through the store's key bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditionalVar {
    pub field: String,
    pub config_key: Option<String>,
    /// Fully qualified environment variable name.
    pub env: Option<String>,
    pub cmdline: bool,
}

pub(crate) struct BoundField<C> {
    pub(crate) name: String,
    pub(crate) tag: FieldTag,
    pub(crate) slot: Box<dyn Slot<C>>,
}

impl<C> BoundField<C> {
    /// The dotted config key of a field the engine assigns from the store.
    pub(crate) fn store_key(&self) -> Option<String> {
        if self.tag.visibility == Visibility::Custom {
            return None;
        }
        self.tag.config_key.as_ref().map(|k| k.dotted())
    }
}

pub(crate) struct Bindings<C> {
    pub(crate) fields: Vec<BoundField<C>>,
    pub(crate) flags: Vec<FlagBinding>,
    pub(crate) additional: Vec<AdditionalVar>,
    pub(crate) defaults: BTreeMap<String, RawValue>,
    /// config key -> environment variable name
    pub(crate) env_bindings: BTreeMap<String, String>,
    /// File keys of `custom` fields, routed to the extension parser.
    pub(crate) custom_keys: BTreeSet<String>,
}

impl<C> Bindings<C> {
    pub(crate) fn field(&self, name: &str) -> Option<&BoundField<C>> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Every key assigned from the store.
    pub(crate) fn known_keys(&self) -> BTreeSet<String> {
        self.fields.iter().filter_map(BoundField::store_key).collect()
    }
}

/// Bind the reserved `base` fields followed by the application's `user`
/// fields onto `command`.
pub(crate) fn bind<C>(
    env_prefix: &str,
    base: Vec<Field<C>>,
    user: Vec<Field<C>>,
    command: Command,
    prototype: &C,
) -> Result<(Command, Bindings<C>), LayerfigError> {
    let mut seen = BTreeSet::new();
    for field in &user {
        if RESERVED_FIELDS.contains(&field.name.as_str()) {
            return Err(LayerfigError::FieldCollision {
                field: field.name.clone(),
            });
        }
    }

    let mut command = command;
    let mut bindings = Bindings {
        fields: Vec::new(),
        flags: Vec::new(),
        additional: Vec::new(),
        defaults: BTreeMap::new(),
        env_bindings: BTreeMap::new(),
        custom_keys: BTreeSet::new(),
    };

    for field in base.into_iter().chain(user) {
        if !seen.insert(field.name.clone()) {
            return Err(LayerfigError::Bind {
                field: field.name,
                reason: "the field is declared more than once".into(),
            });
        }
        command = bind_field(env_prefix, field, command, prototype, &mut bindings)?;
    }

    Ok((command, bindings))
}

fn bind_field<C>(
    env_prefix: &str,
    field: Field<C>,
    mut command: Command,
    prototype: &C,
    bindings: &mut Bindings<C>,
) -> Result<Command, LayerfigError> {
    let Field {
        name,
        tag: raw_tag,
        doc,
        slot,
    } = field;
    let tag = parse_tag(&name, &raw_tag)?;
    let capability = slot.capability();
    let custom = tag.visibility == Visibility::Custom;
    let key = tag.config_key.as_ref().map(|k| k.dotted());

    if custom && tag.env.is_some() {
        return Err(LayerfigError::MalformedTag {
            field: name,
            tag: raw_tag,
            reason: "custom fields are only read from the config file, remove the environment name"
                .into(),
        });
    }
    if !custom && (key.is_some() || tag.env.is_some()) && !capability.storable() {
        return Err(LayerfigError::UnsupportedType {
            context: "Cannot create configuration file variable",
            field: name,
            type_name: capability.kind.type_name(),
        });
    }

    let default = slot.render(prototype);
    let help_default = default.as_ref().map(help_default).unwrap_or_default();

    for exposure in &tag.exposures {
        let Some(kind) = capability.flag_kind() else {
            return Err(LayerfigError::UnsupportedType {
                context: "Cannot create a flag for",
                field: name,
                type_name: capability.kind.type_name(),
            });
        };
        if cli::command_chain(&command, &exposure.command).is_none() {
            return Err(LayerfigError::UnknownCommand {
                command: exposure.command.clone(),
                field: name,
            });
        }
        if let Some(reason) =
            cli::name_conflict(&command, &exposure.command, &exposure.long, exposure.short)
        {
            return Err(LayerfigError::Bind {
                field: name,
                reason,
            });
        }

        let arg = cli::build_arg(exposure, kind, &doc, &help_default);
        let levels = command_levels(&exposure.command);
        command = cli::with_command(command, &levels, |cmd| cmd.arg(arg));

        trace!(
            "bound --{} on '{}' to field {name}",
            exposure.long, exposure.command
        );
        bindings.flags.push(FlagBinding {
            command: exposure.command.clone(),
            long: exposure.long.clone(),
            short: exposure.short,
            hidden: exposure.hidden,
            field: name.clone(),
            list: capability.kind.is_list(),
        });
    }

    let env = tag.env.as_deref().map(|suffix| env_name(env_prefix, suffix));

    if let Some(key) = &key {
        if custom {
            bindings.custom_keys.insert(key.clone());
        } else if let Some(value) = default {
            seed_default(&mut bindings.defaults, key, value)?;
        }
        if let Some(env) = &env {
            trace!("env {env} bound to key {key}");
            bindings.env_bindings.insert(key.clone(), env.clone());
        }
    }

    let cmdline = tag.has_cmdline();
    let additional = if cmdline {
        key.is_none() && env.is_some()
    } else {
        key.is_some() || env.is_some()
    };
    if !custom && additional {
        trace!("field {name} tracked as additional variable");
        bindings.additional.push(AdditionalVar {
            field: name.clone(),
            config_key: key,
            env,
            cmdline,
        });
    }

    bindings.fields.push(BoundField {
        name,
        tag,
        slot,
    });
    Ok(command)
}

fn seed_default(
    defaults: &mut BTreeMap<String, RawValue>,
    key: &str,
    value: RawValue,
) -> Result<(), LayerfigError> {
    match defaults.get(key) {
        Some(existing) if *existing != value => Err(LayerfigError::ConflictingDefaults {
            key: key.to_string(),
            first: existing.to_string(),
            second: value.to_string(),
        }),
        Some(_) => Ok(()),
        None => {
            defaults.insert(key.to_string(), value);
            Ok(())
        }
    }
}

/// The default shown in help, empty for zero values.
fn help_default(value: &RawValue) -> String {
    match value {
        RawValue::Bool(false) => String::new(),
        RawValue::List(items) if items.is_empty() => String::new(),
        other => other.to_string(),
    }
}
