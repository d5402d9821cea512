use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::filter::Filter;
use crate::task::TaskId;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskboard",
    version,
    about = "Taskboard: terminal client for the task manager REST API",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "boardrc")]
    pub boardrc: Option<PathBuf>,

    /// Overrides api.url from every other source
    #[arg(long = "api-url")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show the board (default)
    List {
        #[arg(short, long, value_enum)]
        filter: Option<Filter>,
    },
    /// Create a task
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Flip a task between pending and completed
    #[command(alias = "done")]
    Toggle { id: TaskId },
    /// Change a task's title or description
    Edit {
        id: TaskId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a task
    #[command(alias = "rm")]
    Delete { id: TaskId },
    /// Show aggregate statistics
    Stats {
        /// Compute from the task list instead of asking the server
        #[arg(long)]
        local: bool,
    },
    /// Check the backend health endpoint
    Health,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` tokens out of argv.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{Command, GlobalCli, preprocess_args};
    use crate::filter::Filter;

    fn args(items: &[&str]) -> Vec<OsString> {
        items.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_tokens_become_overrides() {
        let pre = preprocess_args(&args(&[
            "taskboard",
            "rc.api.url=http://h:1",
            "rc.color:off",
            "list",
        ]))
        .expect("preprocess");

        assert_eq!(pre.cleaned_args, args(&["taskboard", "list"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.api.url".to_string(), "http://h:1".to_string()),
                ("rc.color".to_string(), "off".to_string()),
            ]
        );
    }

    #[test]
    fn add_joins_title_words() {
        let cli = GlobalCli::parse_from(["taskboard", "add", "buy", "milk", "-d", "2 litres"]);
        assert_eq!(
            cli.command,
            Some(Command::Add {
                title: vec!["buy".to_string(), "milk".to_string()],
                description: "2 litres".to_string(),
            })
        );
    }

    #[test]
    fn aliases_and_filters_parse() {
        let cli = GlobalCli::parse_from(["taskboard", "-vv", "done", "4"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.command, Some(Command::Toggle { id: 4 }));

        let cli = GlobalCli::parse_from(["taskboard", "list", "--filter", "completed"]);
        assert_eq!(
            cli.command,
            Some(Command::List {
                filter: Some(Filter::Completed)
            })
        );

        let cli = GlobalCli::parse_from(["taskboard", "--rc", "color=off"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.rc_overrides[0].key, "color");
    }
}
