// board.rs - `crm board`: print the kanban board, one section per column.

use std::io::Write;

use crm_pipeline::{Board, Opportunity};

use super::{format_money, truncate};
use crate::config::CrmConfig;

pub fn execute(config: &CrmConfig) -> anyhow::Result<()> {
    let pipeline = super::open_pipeline(config)?;
    let board = pipeline.board();
    let stdout = std::io::stdout();
    render(&board, config.display.currency_decimals, &mut stdout.lock())
}

/// Print every column, including empty ones, in board order.
pub fn render(board: &Board<'_>, decimals: usize, out: &mut impl Write) -> anyhow::Result<()> {
    for column in board.columns() {
        writeln!(out, "== {} ({}) ==", column.status.label(), column.len())?;
        if column.is_empty() {
            writeln!(out, "  (empty)")?;
        }
        for card in &column.cards {
            writeln!(out, "  {}", card_line(card, decimals))?;
        }
        writeln!(out)?;
    }
    writeln!(out, "{} opportunity(ies) total.", board.card_count())?;
    Ok(())
}

fn card_line(opportunity: &Opportunity, decimals: usize) -> String {
    let topics = opportunity.training_topics().join(", ");
    let marker = if opportunity.is_bundle() { "*" } else { " " };
    format!(
        "{:<16} {:<24} {}{:<40} {:>14}",
        opportunity.id,
        truncate(&opportunity.customer_name, 22),
        marker,
        truncate(&topics, 38),
        format_money(
            opportunity.amount.unwrap_or_else(|| opportunity.details_total()),
            opportunity.currency,
            decimals
        ),
    )
}
