//! Delete subcommand - remove every harvested record of a repository

use anyhow::{Context, Result};
use clap::Args;

use oaiharvest_state::{HarvestState, IdentifierSet};

use crate::config::Config;
use crate::sink::{FileSink, RecordSink};

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Repository name
    #[arg(short, long)]
    pub name: String,
}

pub fn run(args: DeleteArgs, config: &Config) -> Result<()> {
    let mut ids = IdentifierSet::open(&config.state.dir, &args.name)
        .context("Failed to open identifier set")?;
    let mut sink = FileSink::open(&config.output.dir.join(&args.name))?;

    let mut removed = 0usize;
    for id in ids.sorted() {
        if sink.delete(id)? {
            removed += 1;
        }
    }
    let total = ids.total();
    ids.clear();
    ids.close().context("Failed to write identifier set")?;

    let mut state = HarvestState::open(&config.state.dir, &args.name)
        .context("Failed to open harvest state")?;
    state.mark_deleted()?;
    state.close()?;

    log::info!("{}: deleted {removed} of {total} records", args.name);
    super::print_summary(
        &args.name,
        &[
            ("Identifiers cleared", oaiharvest_core::fmt_num(total)),
            ("Records removed", oaiharvest_core::fmt_num(removed)),
        ],
    );
    Ok(())
}
