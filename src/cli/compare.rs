use super::ui;
use crate::core::metrics::DerivedMetrics;
use crate::service::{Comparison, QueryService, VendorSummary};
use anyhow::Result;
use clap::ValueEnum;
use comfy_table::Cell;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    Name,
    CurrentRatio,
    QuickRatio,
    DebtToEquity,
    DebtRatio,
    NetMargin,
    OperatingMargin,
    Roe,
    RevenueCagr,
    OcfToNetIncome,
}

impl SortKey {
    fn metric(&self, metrics: &DerivedMetrics) -> Option<f64> {
        match self {
            SortKey::Name => None,
            SortKey::CurrentRatio => metrics.current_ratio,
            SortKey::QuickRatio => metrics.quick_ratio,
            SortKey::DebtToEquity => metrics.debt_to_equity,
            SortKey::DebtRatio => metrics.debt_ratio,
            SortKey::NetMargin => metrics.net_margin,
            SortKey::OperatingMargin => metrics.operating_margin,
            SortKey::Roe => metrics.return_on_equity,
            SortKey::RevenueCagr => metrics.revenue_cagr_3y,
            SortKey::OcfToNetIncome => metrics.ocf_to_net_income,
        }
    }
}

/// Sorts summaries by `key`. Vendors without a value always come last,
/// whichever the direction.
pub fn sort_summaries(summaries: &mut [VendorSummary], key: SortKey, ascending: bool) {
    let direction = |ordering: Ordering| {
        if ascending {
            ordering
        } else {
            ordering.reverse()
        }
    };

    if key == SortKey::Name {
        summaries.sort_by(|a, b| direction(a.vendor.name.cmp(&b.vendor.name)));
        return;
    }

    summaries.sort_by(|a, b| {
        let value = |s: &VendorSummary| s.metrics.as_ref().and_then(|m| key.metric(m));
        match (value(a), value(b)) {
            (Some(x), Some(y)) => direction(x.total_cmp(&y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

impl Comparison {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Vendor"),
            ui::header_cell("Current"),
            ui::header_cell("Quick"),
            ui::header_cell("D/E"),
            ui::header_cell("Debt ratio"),
            ui::header_cell("Net margin"),
            ui::header_cell("Op. margin"),
            ui::header_cell("ROE"),
            ui::header_cell("Rev. CAGR"),
            ui::header_cell("OCF/NI"),
            ui::header_cell("Liquidity"),
            ui::header_cell("Leverage"),
        ]);

        for summary in &self.vendors {
            let name = if summary.stale {
                format!("{} ({}) *", summary.vendor.name, summary.vendor.ticker)
            } else {
                format!("{} ({})", summary.vendor.name, summary.vendor.ticker)
            };
            let mut row = vec![Cell::new(name)];

            match &summary.metrics {
                Some(m) => {
                    row.extend([
                        ui::ratio_cell(m.current_ratio),
                        ui::ratio_cell(m.quick_ratio),
                        ui::ratio_cell(m.debt_to_equity),
                        ui::ratio_cell(m.debt_ratio),
                        ui::percentage_cell(m.net_margin),
                        ui::percentage_cell(m.operating_margin),
                        ui::percentage_cell(m.return_on_equity),
                        ui::percentage_cell(m.revenue_cagr_3y),
                        ui::percentage_cell(m.ocf_to_net_income),
                        ui::flag_cell(m.liquidity_flag),
                        ui::flag_cell(m.leverage_flag),
                    ]);
                }
                None => row.extend((0..11).map(|_| ui::na_cell(summary.error.is_some()))),
            }
            table.add_row(row);
        }

        let mut output = format!(
            "{}\n\n",
            ui::style_text("Vendor comparison", ui::StyleType::Title)
        );
        output.push_str(&table.to_string());

        if self.vendors.iter().any(|s| s.stale) {
            output.push_str(&format!(
                "\n{}",
                ui::style_text("* stale data, refresh in progress", ui::StyleType::Subtle)
            ));
        }
        for summary in self.vendors.iter().filter(|s| s.error.is_some()) {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    &format!(
                        "{}: {}",
                        summary.vendor.ticker,
                        summary.error.as_deref().unwrap_or_default()
                    ),
                    ui::StyleType::Error
                )
            ));
        }
        output
    }
}

pub async fn display_comparison(
    query: &QueryService,
    sort: Option<SortKey>,
    ascending: bool,
) -> Result<()> {
    let mut comparison = query.get_comparison().await;
    if let Some(key) = sort {
        sort_summaries(&mut comparison.vendors, key, ascending);
    }
    println!("{}", comparison.display_as_table());
    Ok(())
}
