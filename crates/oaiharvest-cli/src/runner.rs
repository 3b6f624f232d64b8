//! One harvest run: walk the pages, feed the sink, record every page

use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::NaiveDate;
use indicatif::ProgressBar;

use oaiharvest_client::{ListRecordsArgs, OaiClient, RecordPage, Transport};
use oaiharvest_state::{Counts, HarvestState, IdentifierSet, StateError};

use crate::sink::RecordSink;

/// Run log kind for failures while storing records
const SINK_FAILURE: &str = "SinkFailure";
/// Run log kind for failures while recording a page
const STATE_FAILURE: &str = "StateError";

/// What to harvest
#[derive(Debug, Clone)]
pub struct HarvestJob {
    pub metadata_prefix: String,
    pub set: Option<String>,
    /// Replaces the recovered from-date for this run only
    pub from_override: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Last page recorded
    Completed { counts: Counts },
    /// Stopped by a shutdown request after a recorded page
    Stopped { counts: Counts },
    /// Page fetch or sink failure; the checkpoint still points at the last recorded page
    Failed { kind: String, message: String },
}

/// Run execution summary
#[derive(Debug)]
pub struct Summary {
    pub outcome: RunOutcome,
    pub pages: usize,
    pub elapsed: Duration,
}

/// First request of this run: continue a pending token, or start a new
/// sequence from the recovered (or overridden) from-date.
pub fn initial_args(state: &HarvestState, job: &HarvestJob) -> ListRecordsArgs {
    if let Some(token) = state.resumption_token() {
        log::info!("{}: resuming with token {token}", state.name());
        return ListRecordsArgs::resume(token);
    }
    let mut args = ListRecordsArgs::new(job.metadata_prefix.clone());
    if let Some(from) = job.from_override.or(state.from_date()) {
        args = args.with_from(from.format("%Y-%m-%d").to_string());
    }
    if let Some(set) = &job.set {
        args = args.with_set(set.clone());
    }
    args
}

/// Harvest until the last page, the first failure or a shutdown request.
///
/// Protocol, sink and page-recording failures end up in the run log and as
/// [`RunOutcome::Failed`]. Errors are returned only when the run log itself
/// cannot be written.
pub fn run<T: Transport, S: RecordSink>(
    client: &OaiClient<T>,
    state: &mut HarvestState,
    ids: &mut IdentifierSet,
    sink: &mut S,
    job: &HarvestJob,
    pb: &ProgressBar,
) -> Result<Summary> {
    let start = Instant::now();
    let mut counts = Counts {
        total: ids.total() as u64,
        ..Default::default()
    };
    let mut pages = 0;

    state.mark_started()?;
    let args = initial_args(state, job);
    log::debug!("{}: first request {args:?}", state.name());

    let mut outcome = RunOutcome::Completed { counts };
    for page in client.pages(args) {
        let page = match page {
            Ok(page) => page,
            Err(e) => {
                outcome = fail(state, e.kind(), &e.to_string(), &counts)?;
                break;
            }
        };

        if let Err(e) = apply_page(&page, sink, ids, &mut counts) {
            outcome = fail(state, SINK_FAILURE, &format!("{e:#}"), &counts)?;
            break;
        }
        if let Err(e) = record_page(state, ids, &counts, &page) {
            let kind = match e {
                StateError::CheckpointCorruption { .. } => "CheckpointCorruption",
                _ => STATE_FAILURE,
            };
            outcome = fail(state, kind, &e.to_string(), &counts)?;
            break;
        }
        pages += 1;

        pb.set_message(format!(
            "{} pages, {} records, {} ids",
            pages,
            oaiharvest_core::fmt_num(counts.harvested as usize),
            oaiharvest_core::fmt_num(counts.total as usize)
        ));
        log::debug!(
            "{}: page {pages} ({} records), token {:?}",
            state.name(),
            page.len(),
            page.resumption_token
        );

        outcome = RunOutcome::Completed { counts };
        if !page.is_last() && oaiharvest_core::is_shutdown_requested() {
            log::warn!("{}: shutdown requested, stopping after page {pages}", state.name());
            outcome = RunOutcome::Stopped { counts };
            break;
        }
    }

    Ok(Summary {
        outcome,
        pages,
        elapsed: start.elapsed(),
    })
}

fn fail(state: &mut HarvestState, kind: &str, message: &str, counts: &Counts) -> Result<RunOutcome> {
    log::error!("{}: {kind}: {message}", state.name());
    state.mark_exception(kind, message, counts)?;
    Ok(RunOutcome::Failed {
        kind: kind.to_string(),
        message: message.to_string(),
    })
}

fn record_page(
    state: &mut HarvestState,
    ids: &mut IdentifierSet,
    counts: &Counts,
    page: &RecordPage,
) -> Result<(), StateError> {
    ids.flush()?;
    state.mark_harvested(counts, page.resumption_token.as_deref(), &page.response_date)
}

/// Feed one page to the sink. Identifier changes are applied only once the
/// whole page is stored.
fn apply_page<S: RecordSink>(
    page: &RecordPage,
    sink: &mut S,
    ids: &mut IdentifierSet,
    counts: &mut Counts,
) -> Result<()> {
    let mut changes: Vec<(&str, bool)> = Vec::with_capacity(page.len());
    for record in page {
        counts.harvested += 1;
        if record.is_deleted() {
            if sink.delete(record.identifier())? {
                counts.deleted += 1;
            }
            changes.push((record.identifier(), false));
        } else if sink.store(record)? {
            counts.uploaded += 1;
            changes.push((record.identifier(), true));
        }
    }
    for (id, present) in changes {
        if present {
            ids.add(id);
        } else {
            ids.remove(id);
        }
    }
    counts.total = ids.total() as u64;
    Ok(())
}
