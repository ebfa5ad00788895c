//! Ordered endpoint-probing strategy chains.
//!
//! Each category owns a strict ordered list of strategies, cheapest and
//! most direct first: the portal's server-side report generation is
//! asynchronous and unreliable, so later strategies compensate for a report
//! the portal has not materialized yet. A single generic runner walks the
//! list and short-circuits on the first success; at most one strategy ever
//! contributes rows to a category.
//!
//! Failure policy: a strategy that errors is logged and treated as "no
//! data" for that strategy. An exhausted chain yields an empty table,
//! which is a valid, reportable outcome, never a thrown failure.

pub mod appointments;
pub mod demographics;
pub mod documents;
pub mod financials;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::batch::Deadline;
use crate::config::EngineConfig;
use crate::error::PortalResult;
use crate::log::RunLog;
use crate::session::SessionClient;
use crate::types::{Category, ScrapeOptions, Table};

/// Everything a strategy attempt may consult.
pub struct StrategyContext<'a> {
    pub session: &'a SessionClient,
    pub config: &'a EngineConfig,
    pub options: &'a ScrapeOptions,
    pub deadline: Deadline,
    pub log: &'a RunLog,
}

/// What one strategy attempt produced.
#[derive(Debug)]
pub enum Outcome {
    /// Usable tabular data; the chain stops here.
    Rows(Table),
    /// Nothing usable; try the next strategy.
    NoData,
    /// Something went wrong badly enough to be worth surfacing in the run
    /// log; the chain continues regardless.
    Fatal(String),
}

/// One concrete attempt to retrieve a category's data.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    async fn attempt(&self, ctx: &StrategyContext<'_>) -> PortalResult<Outcome>;
}

/// The ordered chain for a category.
///
/// Documents iterate the patient roster through the batch runner instead of
/// a chain, so their list is empty here.
pub fn chain_for(category: Category) -> Vec<Box<dyn Strategy>> {
    match category {
        Category::Demographics => vec![
            Box::new(demographics::BulkExport),
            Box::new(demographics::TriggeredReport),
            Box::new(demographics::JsonRoster),
        ],
        Category::Appointments => vec![Box::new(appointments::ScheduleReport)],
        Category::Financials => vec![Box::new(financials::StatementPages)],
        Category::Documents => Vec::new(),
    }
}

/// Walk a chain in order, short-circuiting on the first success.
pub async fn run_chain(
    category: Category,
    strategies: &[Box<dyn Strategy>],
    ctx: &StrategyContext<'_>,
) -> Table {
    for strategy in strategies {
        match strategy.attempt(ctx).await {
            Ok(Outcome::Rows(table)) => {
                debug!(
                    category = %category,
                    strategy = strategy.name(),
                    rows = table.row_count(),
                    "strategy succeeded"
                );
                ctx.log.push(format!(
                    "{category}: {} rows via {}",
                    table.row_count(),
                    strategy.name()
                ));
                return table;
            }
            Ok(Outcome::NoData) => {
                debug!(category = %category, strategy = strategy.name(), "no data, trying next");
            }
            Ok(Outcome::Fatal(reason)) => {
                warn!(category = %category, strategy = strategy.name(), reason, "strategy fault");
                ctx.log
                    .push(format!("{category}: {} failed: {reason}", strategy.name()));
            }
            Err(e) => {
                warn!(category = %category, strategy = strategy.name(), error = %e, "strategy error");
                ctx.log
                    .push(format!("{category}: {} error: {e}", strategy.name()));
            }
        }
    }

    ctx.log
        .push(format!("{category}: every strategy exhausted, no rows"));
    Table::new()
}

/// Whether an export payload is real data rather than an HTML shell or an
/// empty placeholder the portal serves before a report materializes.
pub fn usable_payload(body: &str) -> bool {
    let trimmed = body.trim();
    if trimmed.len() < MIN_PAYLOAD_LEN {
        return false;
    }
    let lowered: String = trimmed.chars().take(512).collect::<String>().to_lowercase();
    !lowered.contains("<!doctype") && !lowered.contains("<html")
}

/// A header-only export is shorter than this; any real one is longer.
const MIN_PAYLOAD_LEN: usize = 64;
