//! CLI interface for tasklog.
//!
//! Each subcommand reads JSON lines from the given files (or stdin when
//! none are given), groups them into tasks, and writes structured output
//! to stdout. Diagnostics go to stderr.

mod format;

use std::fs;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use tasklog::config::Config;
use tasklog::decode::{DecodeMode, Records};
use tasklog::pipeline::{Forest, parse_to_tasks, read_messages};

use format::{format_node, format_task};

/// tasklog — rebuild action trees from structured task logs.
#[derive(Debug, Parser)]
#[command(name = "tasklog", version, after_long_help = USAGE_HELP)]
pub struct Cli {
    /// Stop at the first line that is not a JSON object.
    #[arg(long, global = true, conflicts_with = "tolerant")]
    strict: bool,

    /// Skip lines that are not JSON objects.
    #[arg(long, global = true)]
    tolerant: bool,

    #[command(subcommand)]
    pub command: Command,
}

const USAGE_HELP: &str = r#"Examples:
  tasklog tree run.log                  one JSON line per top-level node
  tasklog --strict tree a.log b.log     fail on the first malformed line
  cat run.log | tasklog tasks           list tasks and their message counts

Configuration lives in ~/.tasklog/config.toml (mode, pretty, log).
TASKLOG_MODE and TASKLOG_LOG override it."#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Assemble action trees and print each top-level node as JSON.
    Tree {
        /// Log files to read. Reads stdin when omitted.
        files: Vec<PathBuf>,

        /// Pretty-print each node.
        #[arg(long)]
        pretty: bool,
    },

    /// List the tasks found in a log.
    Tasks {
        /// Log files to read. Reads stdin when omitted.
        files: Vec<PathBuf>,
    },
}

impl Cli {
    fn explicit_mode(&self) -> Option<DecodeMode> {
        if self.strict {
            Some(DecodeMode::Strict)
        } else if self.tolerant {
            Some(DecodeMode::Tolerant)
        } else {
            None
        }
    }
}

/// Run the CLI, returning an error message on failure.
pub fn run(config: &Config) -> Result<(), String> {
    let cli = Cli::parse();
    let mode = config.resolve_mode(cli.explicit_mode())?;

    match cli.command {
        Command::Tree { files, pretty } => {
            let forest = load(&files, mode)?;
            cmd_tree(forest, pretty || config.pretty, &mut io::stdout().lock())
        }
        Command::Tasks { files } => {
            let forest = load(&files, mode)?;
            cmd_tasks(&forest, &mut io::stdout().lock())
        }
    }
}

/// Read and group every input. Files are read in order and their
/// messages pooled, so one task may span several files.
fn load(files: &[PathBuf], mode: DecodeMode) -> Result<Forest, String> {
    if files.is_empty() {
        return parse_to_tasks(io::stdin().lock(), mode).map_err(|e| format!("<stdin>: {e}"));
    }

    let mut messages = Vec::new();
    let mut skipped = 0;
    for path in files {
        let file = fs::File::open(path)
            .map_err(|e| format!("failed to open {}: {e}", path.display()))?;
        let mut records = Records::from_reader(BufReader::new(file), mode);
        let read = read_messages(records.by_ref()).map_err(|e| format!("{}: {e}", path.display()))?;
        messages.extend(read);
        skipped += records.skipped();
    }

    Ok(Forest::new(messages, skipped))
}

fn cmd_tree(forest: Forest, pretty: bool, out: &mut impl Write) -> Result<(), String> {
    let tasks = forest.tasks().len();
    let skipped = forest.skipped();
    let mut nodes = 0usize;

    for node in forest.nodes() {
        let node = node.map_err(|e| e.to_string())?;
        let line = format_node(&node, pretty)?;
        writeln!(out, "{line}").map_err(|e| format!("failed to write output: {e}"))?;
        nodes += 1;
    }

    info!(tasks, nodes, skipped, "assembled action trees");
    if skipped > 0 {
        eprintln!("Skipped {skipped} undecodable line(s)");
    }
    Ok(())
}

fn cmd_tasks(forest: &Forest, out: &mut impl Write) -> Result<(), String> {
    if forest.tasks().is_empty() {
        eprintln!("No tasks");
        return Ok(());
    }

    for task in forest.tasks() {
        writeln!(out, "{}", format_task(task)).map_err(|e| format!("failed to write output: {e}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn write_log(dir: &TempDir, name: &str, entries: &[Value]) -> PathBuf {
        let path = dir.path().join(name);
        let text: String = entries.iter().map(|e| format!("{e}\n")).collect();
        fs::write(&path, text).unwrap();
        path
    }

    fn output_lines(bytes: Vec<u8>) -> Vec<Value> {
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn tasks_may_span_files() {
        let dir = TempDir::new().unwrap();
        let first = write_log(
            &dir,
            "first.log",
            &[json!({"task_uuid": "t", "task_level": [1],
                     "action_type": "trial:test", "action_status": "started"})],
        );
        let second = write_log(
            &dir,
            "second.log",
            &[json!({"task_uuid": "t", "task_level": [2],
                     "action_type": "trial:test", "action_status": "succeeded"})],
        );

        let forest = load(&[first, second], DecodeMode::Strict).unwrap();
        assert_eq!(forest.tasks().len(), 1);

        let mut out = Vec::new();
        cmd_tree(forest, false, &mut out).unwrap();
        let nodes = output_lines(out);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0]["node"], "action");
        assert_eq!(nodes[0]["status"], "succeeded");
    }

    #[test]
    fn strict_load_names_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.log");
        fs::write(&path, "{\"task_uuid\": \"t\"}\nnot json\n").unwrap();

        let err = load(&[path], DecodeMode::Strict).unwrap_err();
        assert!(err.contains("broken.log"));
        assert!(err.contains("line 2"));
    }

    #[test]
    fn tolerant_load_counts_skipped_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("noisy.log");
        fs::write(&path, "noise\n{\"task_uuid\": \"t\"}\nmore noise\n").unwrap();

        let forest = load(&[path], DecodeMode::Tolerant).unwrap();
        assert_eq!(forest.skipped(), 2);
        assert_eq!(forest.tasks().len(), 1);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let err = load(&[dir.path().join("nope.log")], DecodeMode::Strict).unwrap_err();
        assert!(err.starts_with("failed to open"));
    }

    #[test]
    fn tree_stops_at_assembly_errors() {
        let dir = TempDir::new().unwrap();
        let path = write_log(
            &dir,
            "run.log",
            &[json!({"task_uuid": "t", "task_level": [1],
                     "action_type": "trial:test", "action_status": "failed"})],
        );

        let forest = load(&[path], DecodeMode::Strict).unwrap();
        let err = cmd_tree(forest, false, &mut Vec::new()).unwrap_err();
        assert!(err.contains("no action in progress"));
    }

    #[test]
    fn tasks_lists_each_task() {
        let dir = TempDir::new().unwrap();
        let path = write_log(
            &dir,
            "run.log",
            &[
                json!({"task_uuid": "a", "task_level": [1], "message_type": "m"}),
                json!({"task_uuid": "b", "task_level": [1], "message_type": "m"}),
                json!({"task_uuid": "a", "task_level": [2], "message_type": "m"}),
            ],
        );

        let forest = load(&[path], DecodeMode::Strict).unwrap();
        let mut out = Vec::new();
        cmd_tasks(&forest, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, ["a  2 messages", "b  1 message"]);
    }
}
