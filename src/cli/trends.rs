use super::ui;
use crate::service::{QueryService, TrendSeries};
use anyhow::Result;
use comfy_table::Cell;

impl TrendSeries {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Fiscal year"),
            ui::header_cell("Period end"),
            ui::header_cell("Revenue"),
            ui::header_cell("Gross profit"),
            ui::header_cell("Operating income"),
            ui::header_cell("Net income"),
        ]);

        for point in &self.trends {
            table.add_row(vec![
                Cell::new(point.fiscal_year),
                Cell::new(point.fiscal_date_ending),
                ui::amount_cell(point.total_revenue),
                ui::amount_cell(point.gross_profit),
                ui::amount_cell(point.operating_income),
                ui::amount_cell(point.net_income),
            ]);
        }

        let mut output = format!(
            "{}\n\n",
            ui::style_text(&format!("{} income trends", self.ticker), ui::StyleType::Title)
        );
        if self.trends.is_empty() {
            output.push_str(&ui::style_text(
                "No income statements reported.",
                ui::StyleType::Subtle,
            ));
        } else {
            output.push_str(&table.to_string());
        }
        if self.stale {
            output.push_str(&format!(
                "\n{}",
                ui::style_text("Data is stale; a refresh is running.", ui::StyleType::Warning)
            ));
        }
        output
    }
}

pub async fn display_trends(query: &QueryService, ticker: &str) -> Result<()> {
    let series = query.get_trends(ticker).await?;
    println!("{}", series.display_as_table());
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::service::{TrendPoint, TrendSeries};
    use chrono::NaiveDate;

    #[test]
    fn test_trend_table() {
        let series = TrendSeries {
            ticker: "LYB".to_string(),
            stale: false,
            trends: vec![TrendPoint {
                fiscal_year: 2023,
                fiscal_date_ending: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
                total_revenue: Some(41_107_000_000.0),
                net_income: None,
                operating_income: Some(3_000_000_000.0),
                gross_profit: None,
            }],
        };

        let output = console::strip_ansi_codes(&series.display_as_table()).to_string();
        assert!(output.contains("LYB income trends"));
        assert!(output.contains("2023-12-31"));
        assert!(output.contains("41.11B"));
        assert!(output.contains("N/A"));
    }
}
