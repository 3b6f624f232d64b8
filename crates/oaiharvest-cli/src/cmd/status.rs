//! Status subcommand - checkpoint, identifier count and recent runs

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use oaiharvest_state::runlog::{self, RunLogEntry};
use oaiharvest_state::{IdentifierSet, recover};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Repository name
    #[arg(short, long)]
    pub name: String,

    /// Number of run log entries to show
    #[arg(short, long, default_value_t = 10)]
    pub last: usize,
}

pub fn run(args: StatusArgs, config: &Config) -> Result<()> {
    let dir = &config.state.dir;
    let stats = dir.join(format!("{}.stats", args.name));
    let next = dir.join(format!("{}.next", args.name));
    if !stats.exists() && !next.exists() {
        anyhow::bail!("No harvest state for {} in {}", args.name, dir.display());
    }

    let checkpoint = recover(dir, &args.name).context("Failed to recover checkpoint")?;
    let ids = IdentifierSet::open(dir, &args.name).context("Failed to open identifier set")?;
    let entries = runlog::read_entries(&stats)?;

    super::print_summary(
        &args.name,
        &[
            (
                "Resumption token",
                checkpoint
                    .resumption_token
                    .clone()
                    .unwrap_or_else(|| "-".to_string()),
            ),
            ("From", checkpoint.from_string().unwrap_or_else(|| "-".to_string())),
            ("Identifiers", oaiharvest_core::fmt_num(ids.total())),
            ("Run log entries", entries.len().to_string()),
        ],
    );

    if entries.is_empty() {
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Started").fg(Color::Cyan),
            Cell::new("Result").fg(Color::Cyan),
            Cell::new("H/U/D/T").fg(Color::Cyan),
            Cell::new("Detail").fg(Color::Cyan),
        ]);
    let skip = entries.len().saturating_sub(args.last);
    for entry in &entries[skip..] {
        let started = entry
            .started()
            .map(|t| t.to_string())
            .unwrap_or_default();
        let result = match entry.kind() {
            "failed" => Cell::new("failed").fg(Color::Red),
            kind => Cell::new(kind),
        };
        let (counts, detail) = match entry {
            RunLogEntry::Completed {
                counts,
                resumption_token,
                ..
            } => (
                counts.to_string(),
                resumption_token
                    .as_deref()
                    .map(|t| format!("token {t}"))
                    .unwrap_or_default(),
            ),
            RunLogEntry::Failed { counts, error, .. } => (counts.to_string(), error.clone()),
            RunLogEntry::Unrecognized(line) => (String::new(), line.clone()),
            _ => (String::new(), String::new()),
        };
        table.add_row(vec![Cell::new(started), result, Cell::new(counts), Cell::new(detail)]);
    }
    eprintln!("\n{table}");
    Ok(())
}
