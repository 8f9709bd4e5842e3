use super::ui;
use crate::service::{QueryService, VendorSummary};
use anyhow::Result;
use comfy_table::Cell;

impl VendorSummary {
    pub fn display_as_table(&self) -> String {
        let mut output = format!(
            "{} ({})\n",
            ui::style_text(&self.vendor.name, ui::StyleType::Title),
            self.vendor.ticker
        );

        let sector = [self.vendor.sector.as_deref(), self.vendor.industry.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" / ");
        if !sector.is_empty() {
            output.push_str(&ui::style_text(&sector, ui::StyleType::Subtle));
            output.push('\n');
        }

        let fiscal = self
            .fiscal_date_ending
            .map_or("N/A".to_string(), |d| d.to_string());
        let refreshed = self
            .last_refreshed
            .map_or("never".to_string(), |t| t.format("%Y-%m-%d %H:%M UTC").to_string());
        output.push_str(&format!(
            "{} {}   {} {}   {} {}\n",
            ui::style_text("Fiscal period:", ui::StyleType::Label),
            fiscal,
            ui::style_text("Market cap:", ui::StyleType::Label),
            self.market_cap.map_or("N/A".to_string(), ui::format_amount),
            ui::style_text("Refreshed:", ui::StyleType::Label),
            refreshed
        ));
        if self.stale {
            output.push_str(&ui::style_text(
                "Data is stale; a refresh is running in the background.\n",
                ui::StyleType::Warning,
            ));
        }
        output.push('\n');

        let metrics = self.metrics.as_ref();
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Metric"), ui::header_cell("Value")]);

        let ratios: [(&str, Option<f64>); 4] = [
            ("Current ratio", metrics.and_then(|m| m.current_ratio)),
            ("Quick ratio", metrics.and_then(|m| m.quick_ratio)),
            ("Debt to equity", metrics.and_then(|m| m.debt_to_equity)),
            ("Debt ratio", metrics.and_then(|m| m.debt_ratio)),
        ];
        for (label, value) in ratios {
            table.add_row(vec![Cell::new(label), ui::ratio_cell(value)]);
        }

        let percentages: [(&str, Option<f64>); 4] = [
            ("Net margin", metrics.and_then(|m| m.net_margin)),
            ("Operating margin", metrics.and_then(|m| m.operating_margin)),
            ("Return on equity", metrics.and_then(|m| m.return_on_equity)),
            ("Revenue CAGR (3y)", metrics.and_then(|m| m.revenue_cagr_3y)),
        ];
        for (label, value) in percentages {
            table.add_row(vec![Cell::new(label), ui::percentage_cell(value)]);
        }
        table.add_row(vec![
            Cell::new("OCF / net income"),
            ui::percentage_cell(metrics.and_then(|m| m.ocf_to_net_income)),
        ]);

        match metrics {
            Some(m) => {
                table.add_row(vec![Cell::new("Liquidity"), ui::flag_cell(m.liquidity_flag)]);
                table.add_row(vec![Cell::new("Leverage"), ui::flag_cell(m.leverage_flag)]);
            }
            None => {
                let has_error = self.error.is_some();
                table.add_row(vec![Cell::new("Liquidity"), ui::na_cell(has_error)]);
                table.add_row(vec![Cell::new("Leverage"), ui::na_cell(has_error)]);
            }
        }

        output.push_str(&table.to_string());

        if let Some(error) = &self.error {
            output.push_str(&format!(
                "\n\n{}",
                ui::style_text(&format!("Error: {error}"), ui::StyleType::Error)
            ));
        }
        output
    }
}

pub async fn display_summary(query: &QueryService, ticker: &str) -> Result<()> {
    let summary = query.get_summary(ticker).await?;
    println!("{}", summary.display_as_table());
    Ok(())
}
