//! Clap adapter for layerfig.
//!
//! The command tree itself belongs to the application: layerfig receives a
//! [`clap::Command`], adds one argument per field exposure, and after parsing
//! reads back only the values the user actually typed. Defaults never come
//! from clap; they live in the config struct and the store.
//!
//! Every registered argument is `global`, so a flag declared on a command is
//! also accepted after any of its subcommands. Clap propagates a global value
//! up to the level that declared it, which is where it is read back.

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};

use crate::capability::{FlagKind, ValueKind};
use crate::tag::{Exposure, SEP_CMD_LEVELS, command_levels};
use crate::value::RawValue;

fn subcommand<'a>(cmd: &'a Command, name: &str) -> Option<&'a Command> {
    cmd.get_subcommands().find(|sub| sub.get_name() == name)
}

/// The commands from the root down to `path`, or `None` if `path` is not in
/// the tree.
pub(crate) fn command_chain<'a>(root: &'a Command, path: &str) -> Option<Vec<&'a Command>> {
    let mut chain = vec![root];
    let mut current = root;
    for level in command_levels(path) {
        current = subcommand(current, level)?;
        chain.push(current);
    }
    Some(chain)
}

/// Apply `f` to the command at `levels` below `cmd`.
///
/// The path must exist; check with [`command_chain`] first.
pub(crate) fn with_command<F>(cmd: Command, levels: &[&str], f: F) -> Command
where
    F: FnOnce(Command) -> Command,
{
    match levels.split_first() {
        None => f(cmd),
        Some((first, rest)) => cmd.mut_subcommand(*first, |sub| with_command(sub, rest, f)),
    }
}

fn clashes(arg: &Arg, long: &str, short: Option<char>) -> Option<String> {
    if arg.get_long() == Some(long) {
        return Some(format!("flag --{long} is already defined"));
    }
    if let Some(c) = short
        && arg.get_short() == Some(c)
    {
        return Some(format!("short flag -{c} is already defined"));
    }
    None
}

fn descendant_clash(cmd: &Command, long: &str, short: Option<char>) -> Option<String> {
    cmd.get_subcommands().find_map(|sub| {
        sub.get_arguments()
            .find_map(|arg| clashes(arg, long, short))
            .or_else(|| descendant_clash(sub, long, short))
    })
}

/// Why `long`/`short` cannot be registered on `path`, if they cannot.
///
/// A name is taken when the command itself, a global argument of an
/// ancestor, or any descendant already uses it. `help`/`-h` are reserved
/// by clap.
pub(crate) fn name_conflict(
    root: &Command,
    path: &str,
    long: &str,
    short: Option<char>,
) -> Option<String> {
    if long == "help" {
        return Some("flag --help is reserved".into());
    }
    if short == Some('h') {
        return Some("short flag -h is reserved".into());
    }

    let chain = command_chain(root, path)?;
    let (target, ancestors) = chain.split_last()?;
    ancestors
        .iter()
        .flat_map(|cmd| cmd.get_arguments().filter(|arg| arg.is_global_set()))
        .chain(target.get_arguments())
        .find_map(|arg| clashes(arg, long, short))
        .or_else(|| descendant_clash(target, long, short))
}

/// Build the clap argument for one exposure of a field.
pub(crate) fn build_arg(exposure: &Exposure, kind: FlagKind, help: &str, default: &str) -> Arg {
    let mut arg = Arg::new(exposure.long.clone())
        .long(exposure.long.clone())
        .global(true);
    if let Some(c) = exposure.short {
        arg = arg.short(c);
    }
    let help = match (help.is_empty(), default.is_empty()) {
        (_, true) => help.to_string(),
        (true, false) => format!("[default: {default}]"),
        (false, false) => format!("{help} [default: {default}]"),
    };
    if !help.is_empty() {
        arg = arg.help(help);
    }
    if exposure.hidden {
        arg = arg.hide(true);
    }

    match kind {
        FlagKind::Primitive(ValueKind::StringList | ValueKind::IntList) => {
            arg.action(ArgAction::Append).value_delimiter(',')
        }
        FlagKind::Primitive(ValueKind::Bool) => arg
            .action(ArgAction::Set)
            .overrides_with(exposure.long.clone())
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value("true")
            .value_parser(value_parser!(bool)),
        // Numbers are left as text; `Primitive::coerce` range checks them.
        _ => arg
            .action(ArgAction::Set)
            .overrides_with(exposure.long.clone())
            .value_name("VALUE"),
    }
}

/// The invoked command chain, root first, each with its `>`-joined path.
pub(crate) fn invoked_chain(matches: &ArgMatches) -> Vec<(String, &ArgMatches)> {
    let mut chain = vec![(String::new(), matches)];
    let mut path = String::new();
    let mut current = matches;
    while let Some((name, sub)) = current.subcommand() {
        if !path.is_empty() {
            path.push(SEP_CMD_LEVELS);
        }
        path.push_str(name);
        chain.push((path.clone(), sub));
        current = sub;
    }
    chain
}

/// The value of `id` if the user typed it on this invocation.
///
/// List flags yield a [`RawValue::List`] of every occurrence.
pub(crate) fn explicit_value(matches: &ArgMatches, id: &str, list: bool) -> Option<RawValue> {
    if matches.value_source(id) != Some(ValueSource::CommandLine) {
        return None;
    }
    let values: Vec<RawValue> = matches
        .get_raw(id)?
        .map(|v| RawValue::String(v.to_string_lossy().into_owned()))
        .collect();
    if list {
        Some(RawValue::List(values))
    } else {
        values.into_iter().last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::IntWidth;

    fn exposure(long: &str, short: Option<char>) -> Exposure {
        Exposure {
            command: String::new(),
            long: long.into(),
            short,
            hidden: false,
        }
    }

    fn tree() -> Command {
        Command::new("app")
            .subcommand(Command::new("config").subcommand(Command::new("init")))
            .subcommand(Command::new("get"))
    }

    #[test]
    fn chain_follows_levels() {
        let root = tree();
        let chain = command_chain(&root, "config>init").unwrap();
        let names: Vec<&str> = chain.iter().map(|c| c.get_name()).collect();
        assert_eq!(names, vec!["app", "config", "init"]);
        assert!(command_chain(&root, "nonexistent").is_none());
        assert_eq!(command_chain(&root, "").unwrap().len(), 1);
    }

    #[test]
    fn with_command_reaches_nested() {
        let root = with_command(tree(), &["config", "init"], |cmd| {
            cmd.arg(build_arg(&exposure("force", None), FlagKind::Primitive(ValueKind::Bool), "", ""))
        });
        let init = command_chain(&root, "config>init").unwrap()[2];
        assert!(init.get_arguments().any(|a| a.get_long() == Some("force")));
    }

    #[test]
    fn conflicts_with_ancestor_globals() {
        let root = tree().arg(build_arg(
            &exposure("verbosity", Some('v')),
            FlagKind::Value,
            "",
            "",
        ));
        assert!(name_conflict(&root, "get", "verbosity", None).is_some());
        assert!(name_conflict(&root, "get", "other", Some('v')).is_some());
        assert!(name_conflict(&root, "get", "timeout", Some('t')).is_none());
        assert!(name_conflict(&root, "get", "help", None).is_some());
        assert!(name_conflict(&root, "", "x", Some('h')).is_some());
    }

    #[test]
    fn conflicts_with_descendants() {
        let root = with_command(tree(), &["get"], |cmd| {
            cmd.arg(build_arg(&exposure("timeout", None), FlagKind::Value, "", ""))
        });
        assert!(name_conflict(&root, "", "timeout", None).is_some());
        assert!(name_conflict(&root, "config", "timeout", None).is_none());
    }

    #[test]
    fn explicit_values_only() {
        let root = tree()
            .arg(build_arg(
                &exposure("count", None),
                FlagKind::Primitive(ValueKind::Int(IntWidth::W8)),
                "",
                "",
            ))
            .arg(build_arg(
                &exposure("flag", None),
                FlagKind::Primitive(ValueKind::Bool),
                "",
                "",
            ));
        let m = root
            .clone()
            .try_get_matches_from(["app", "--count", "5", "--flag"])
            .unwrap();
        assert_eq!(explicit_value(&m, "count", false), Some(RawValue::from("5")));
        assert_eq!(explicit_value(&m, "flag", false), Some(RawValue::from("true")));

        let m = root.try_get_matches_from(["app"]).unwrap();
        assert_eq!(explicit_value(&m, "count", false), None);
        assert_eq!(explicit_value(&m, "flag", false), None);
    }

    #[test]
    fn bool_flag_does_not_eat_subcommand() {
        let root = tree().arg(build_arg(
            &exposure("flag", None),
            FlagKind::Primitive(ValueKind::Bool),
            "",
            "",
        ));
        let m = root
            .clone()
            .try_get_matches_from(["app", "--flag", "get"])
            .unwrap();
        assert_eq!(m.subcommand_name(), Some("get"));
        let m = root.try_get_matches_from(["app", "--flag=false"]).unwrap();
        assert_eq!(explicit_value(&m, "flag", false), Some(RawValue::from("false")));
    }

    #[test]
    fn narrow_int_flag_is_left_to_coercion() {
        let root = tree().arg(build_arg(
            &exposure("count", None),
            FlagKind::Primitive(ValueKind::Int(IntWidth::W8)),
            "",
            "",
        ));
        let m = root.try_get_matches_from(["app", "--count", "128"]).unwrap();
        assert_eq!(explicit_value(&m, "count", false), Some(RawValue::from("128")));
    }

    #[test]
    fn repeated_single_flag_keeps_last_value() {
        let root = tree()
            .arg(build_arg(&exposure("name", Some('n')), FlagKind::Value, "", ""))
            .arg(build_arg(
                &exposure("flag", None),
                FlagKind::Primitive(ValueKind::Bool),
                "",
                "",
            ));
        let m = root
            .try_get_matches_from(["app", "--name", "x", "-n", "z", "--flag", "--flag=false"])
            .unwrap();
        assert_eq!(explicit_value(&m, "name", false), Some(RawValue::from("z")));
        assert_eq!(explicit_value(&m, "flag", false), Some(RawValue::from("false")));
    }

    #[test]
    fn list_flags_collect_every_value() {
        let root = tree().arg(build_arg(
            &exposure("tag", None),
            FlagKind::Primitive(ValueKind::StringList),
            "",
            "",
        ));
        let m = root
            .try_get_matches_from(["app", "--tag", "a,b", "--tag", "c"])
            .unwrap();
        assert_eq!(
            explicit_value(&m, "tag", true),
            Some(RawValue::List(vec!["a".into(), "b".into(), "c".into()]))
        );
    }

    #[test]
    fn global_value_set_after_subcommand_reaches_root() {
        let root = tree().arg(build_arg(&exposure("level", None), FlagKind::Value, "", ""));
        let m = root
            .try_get_matches_from(["app", "get", "--level", "3"])
            .unwrap();
        assert_eq!(explicit_value(&m, "level", false), Some(RawValue::from("3")));
        let chain = invoked_chain(&m);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].0, "get");
    }

    #[test]
    fn nested_chain_paths() {
        let m = tree()
            .try_get_matches_from(["app", "config", "init"])
            .unwrap();
        let paths: Vec<String> = invoked_chain(&m).into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["", "config", "config>init"]);
    }

    #[test]
    fn help_carries_default() {
        let arg = build_arg(&exposure("timeout", None), FlagKind::Value, "Timeout", "400");
        assert_eq!(
            arg.get_help().map(|h| h.to_string()),
            Some("Timeout [default: 400]".to_string())
        );
    }
}
