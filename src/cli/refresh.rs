use super::ui;
use crate::service::{InitializeReport, QueryService, RefreshFailure, RefreshService};
use anyhow::Result;
use comfy_table::Cell;
use std::sync::Arc;

pub async fn refresh_vendor(query: &QueryService, ticker: &str) -> Result<()> {
    let summary = query.refresh_summary(ticker).await?;
    println!("{}", summary.display_as_table());
    Ok(())
}

impl InitializeReport {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Ticker"), ui::header_cell("Result")]);
        for ticker in &self.refreshed {
            table.add_row(vec![Cell::new(ticker), ui::flag_cell(false)]);
        }
        for RefreshFailure { ticker, error } in &self.failed {
            table.add_row(vec![
                Cell::new(ticker),
                Cell::new(ui::style_text(error, ui::StyleType::Error)),
            ]);
        }
        format!(
            "{}\n\n{}\n\n{} refreshed, {} failed",
            ui::style_text("Vendor initialization", ui::StyleType::Title),
            table,
            self.refreshed.len(),
            self.failed.len()
        )
    }
}

/// Refreshes every configured vendor, showing progress as each completes.
pub async fn initialize_vendors(refresh: &Arc<RefreshService>) -> Result<()> {
    let tickers = refresh.configured_tickers();
    let pb = ui::new_progress_bar(tickers.len() as u64);
    pb.set_message("Refreshing vendors");

    let report = refresh.refresh_all_with(&tickers, |_| pb.inc(1)).await;
    pb.finish_and_clear();

    println!("{}", report.display_as_table());
    Ok(())
}
