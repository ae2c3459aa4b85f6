//! Line-oriented session over a single `GobStore`.
//!
//! Each line is parsed like the one-shot commands (`put some text`,
//! `get AbCdEf`, `del-token …`). The session keeps one backend for its whole
//! lifetime, which makes it the way to use the memory backend, and picks up
//! config changes through the hot-reload watcher.

use std::io::Write;

use clap::Parser;
use clap::error::ErrorKind;
use tokio::io::{AsyncBufReadExt, BufReader};

use goblin_facade::GobStore;

use super::Context;
use super::gob::{self, GobCommand};

#[derive(Parser, Debug)]
#[command(name = "goblin", no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: GobCommand,
}

pub async fn run(gobs: &GobStore, ctx: &Context) -> anyhow::Result<()> {
    let ctx = Context {
        read_stdin: false,
        ..ctx.clone()
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    write!(stdout, "goblin> ")?;
    stdout.flush()?;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if matches!(line, "quit" | "exit") {
            break;
        }
        if !line.is_empty() {
            let mut out = Vec::new();
            if let Err(e) = execute_line(gobs, line, &ctx, &mut out).await {
                writeln!(out, "error: {e}")?;
            }
            stdout.write_all(&out)?;
        }
        write!(stdout, "goblin> ")?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}

/// First whitespace-separated word of `s` and everything after it.
fn next_word(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    Some(s.split_at(end))
}

/// Split a shell line into arguments.
///
/// For `put` and `append` the text after the leading arguments is passed on
/// verbatim as a single payload argument, inner whitespace included.
fn shell_args(line: &str) -> Vec<&str> {
    let Some((command, rest)) = next_word(line) else {
        return Vec::new();
    };
    let (mut args, payload) = match command {
        "put" => match next_word(rest) {
            Some(("--horde", after)) => match next_word(after) {
                Some((name, payload)) => (vec![command, "--horde", name], payload),
                None => return line.split_whitespace().collect(),
            },
            Some((flag, payload)) if flag.starts_with("--horde=") => (vec![command, flag], payload),
            _ => (vec![command], rest),
        },
        "append" => match next_word(rest) {
            Some((id, payload)) => (vec![command, id], payload),
            None => return line.split_whitespace().collect(),
        },
        _ => return line.split_whitespace().collect(),
    };
    match payload.trim_start() {
        "" => {}
        help @ ("-h" | "--help") => args.push(help),
        payload => args.extend(["--", payload]),
    }
    args
}

/// Parse and run one shell line, writing its output to `out`.
pub async fn execute_line<W: Write>(
    gobs: &GobStore,
    line: &str,
    ctx: &Context,
    out: &mut W,
) -> anyhow::Result<()> {
    let parsed = match ShellLine::try_parse_from(shell_args(line)) {
        Ok(parsed) => parsed,
        Err(e)
            if matches!(
                e.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) =>
        {
            write!(out, "{e}")?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    gob::run(gobs, parsed.command, ctx, out).await
}
