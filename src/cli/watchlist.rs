use crate::cli::ui::{self, StyleType, header_cell, new_styled_table};
use crate::core::result::ItemAction;
use crate::core::search::{QueryOrchestrator, Selection};
use anyhow::{Context, Result};
use comfy_table::Cell;

pub async fn add(orchestrator: &QueryOrchestrator, code: &str) -> Result<()> {
    run_action(orchestrator, code, ItemAction::Save).await
}

pub async fn remove(orchestrator: &QueryOrchestrator, code: &str) -> Result<()> {
    run_action(orchestrator, code, ItemAction::Remove).await
}

pub async fn list(orchestrator: &QueryOrchestrator) -> Result<()> {
    let codes = orchestrator
        .watchlist()
        .list()
        .await
        .context("Failed to read watchlist")?;

    if codes.is_empty() {
        println!("{}", ui::style_text("Watchlist is empty", StyleType::Subtle));
        return Ok(());
    }

    let mut table = new_styled_table();
    table.set_header(vec![header_cell("#"), header_cell("Code")]);
    for (i, code) in codes.iter().enumerate() {
        table.add_row(vec![Cell::new(i + 1), Cell::new(code)]);
    }
    println!("{}", ui::style_text("Watchlist", StyleType::Title));
    println!("{table}");
    Ok(())
}

/// Without an action, prints the menu for `code`; otherwise runs the action.
pub async fn item(
    orchestrator: &QueryOrchestrator,
    code: &str,
    action: Option<ItemAction>,
) -> Result<()> {
    let Some(action) = action else {
        let menu = orchestrator.menu(code).await?;
        let mut table = new_styled_table();
        table.set_header(vec![header_cell("Action"), header_cell("Description")]);
        for entry in menu {
            table.add_row(vec![Cell::new(entry.action), Cell::new(entry.label)]);
        }
        println!("{table}");
        return Ok(());
    };
    run_action(orchestrator, code, action).await
}

async fn run_action(
    orchestrator: &QueryOrchestrator,
    code: &str,
    action: ItemAction,
) -> Result<()> {
    match orchestrator.select(code, action).await? {
        Selection::Saved(code) => println!("Saved {code} to watchlist"),
        Selection::Removed(code) => println!("Removed {code} from watchlist"),
        Selection::Open(url) => println!("{url}"),
    }
    Ok(())
}
