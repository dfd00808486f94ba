use crate::cli::ui;
use crate::core::result::{ResultKind, SearchResult};
use crate::core::search::{Query, QueryOrchestrator, ResultSink};
use anyhow::Result;
use indicatif::ProgressBar;
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Prints result lists to stdout. The `Searching` sentinel shows a spinner
/// until the next list arrives.
#[derive(Default)]
pub struct TerminalSink {
    spinner: Mutex<Option<ProgressBar>>,
    last: Mutex<Vec<SearchResult>>,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent list emitted.
    pub fn last(&self) -> Vec<SearchResult> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn stop_spinner(&self) {
        let mut spinner = self.spinner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pb) = spinner.take() {
            pb.finish_and_clear();
        }
    }
}

impl ResultSink for TerminalSink {
    fn emit(&self, results: Vec<SearchResult>) {
        if let [only] = results.as_slice()
            && only.kind == ResultKind::Searching
        {
            let mut spinner = self.spinner.lock().unwrap_or_else(PoisonError::into_inner);
            spinner.get_or_insert_with(|| ui::new_spinner(&only.title));
        } else {
            self.stop_spinner();
            println!("{}", ui::render_results(&results));
        }
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = results;
    }
}

impl Drop for TerminalSink {
    fn drop(&mut self) {
        self.stop_spinner();
    }
}

pub async fn run(orchestrator: &QueryOrchestrator, input: &str) -> Result<()> {
    let sink = TerminalSink::new();
    orchestrator.handle(Query::text(input), &sink).await?;
    Ok(())
}

pub async fn run_watchlist(orchestrator: &QueryOrchestrator) -> Result<()> {
    let sink = TerminalSink::new();
    orchestrator.handle(Query::Watchlist, &sink).await?;
    Ok(())
}

/// Downloads the catalog again regardless of its expiry.
pub async fn refresh(orchestrator: &QueryOrchestrator) -> Result<()> {
    let spinner = ui::new_spinner("Downloading fund catalog...");
    let result = orchestrator.catalog().refresh().await;
    spinner.finish_and_clear();

    let snapshot = result?;
    info!("Catalog refreshed with {} entries", snapshot.entries.len());
    println!(
        "{} {} funds, valid until {}",
        ui::style_text("Catalog refreshed:", ui::StyleType::Title),
        snapshot.entries.len(),
        snapshot.expires_at.format("%Y-%m-%d %H:%M UTC")
    );
    Ok(())
}
