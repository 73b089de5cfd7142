use std::path::PathBuf;

use anyhow::{bail, Result};
use backup_status_core::CollectionRef;

pub const USAGE: &str = "usage: backup-status [--config <file>] <get|plan> <database> <collection>
       backup-status [--config <file>] save [file]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get(CollectionRef),
    Save(Option<PathBuf>),
    Plan(CollectionRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Help,
    Run {
        config_path: Option<PathBuf>,
        command: Command,
    },
}

/// Parses arguments after the program name.
pub fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut config_path: Option<PathBuf> = None;
    let mut positional: Vec<&str> = Vec::new();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                if i >= args.len() {
                    bail!("--config requires a path argument");
                }
                config_path = Some(PathBuf::from(&args[i]));
            }
            "-h" | "--help" => return Ok(Invocation::Help),
            other => positional.push(other),
        }
        i += 1;
    }

    let command = match positional.as_slice() {
        ["get", db, coll] => Command::Get(CollectionRef::new(*db, *coll)),
        ["plan", db, coll] => Command::Plan(CollectionRef::new(*db, *coll)),
        ["save"] | ["save", "-"] => Command::Save(None),
        ["save", file] => Command::Save(Some(PathBuf::from(*file))),
        _ => bail!("{USAGE}"),
    };

    Ok(Invocation::Run {
        config_path,
        command,
    })
}
