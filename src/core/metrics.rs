//! Financial ratios and risk flags derived from reported statements.
//!
//! Every ratio is `None` when an input is missing, a denominator is zero, or
//! the result is not finite. Absent values are never replaced by zero.
use crate::core::financials::{FinancialStatementRecord, PeriodStatements, group_by_period};
use chrono::NaiveDate;
use rust_decimal::{Decimal, prelude::*};
use rust_finprim::rate::cagr;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const LIQUIDITY_CURRENT_RATIO_FLOOR: f64 = 1.2;
pub const LIQUIDITY_QUICK_RATIO_FLOOR: f64 = 0.8;
pub const LEVERAGE_DEBT_TO_EQUITY_CEILING: f64 = 2.0;
pub const LEVERAGE_DEBT_RATIO_CEILING: f64 = 0.5;

/// Years between the two revenue figures used for the CAGR.
pub const CAGR_YEARS: i32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub ticker: String,
    pub fiscal_date_ending: NaiveDate,
    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub debt_ratio: Option<f64>,
    pub net_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub revenue_cagr_3y: Option<f64>,
    pub ocf_to_net_income: Option<f64>,
    pub liquidity_flag: bool,
    pub leverage_flag: bool,
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let (n, d) = (numerator?, denominator?);
    if d == 0.0 {
        return None;
    }
    Some(n / d).filter(|r| r.is_finite())
}

fn percentage(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    ratio(numerator, denominator).map(|r| r * 100.0)
}

pub fn current_ratio(current_assets: Option<f64>, current_liabilities: Option<f64>) -> Option<f64> {
    ratio(current_assets, current_liabilities)
}

pub fn quick_ratio(
    current_assets: Option<f64>,
    inventory: Option<f64>,
    current_liabilities: Option<f64>,
) -> Option<f64> {
    let liquid_assets = current_assets? - inventory?;
    ratio(Some(liquid_assets), current_liabilities)
}

/// Compound annual growth of revenue over [`CAGR_YEARS`], as a percentage.
pub fn revenue_cagr(current_revenue: Option<f64>, prior_revenue: Option<f64>) -> Option<f64> {
    let (current, prior) = (current_revenue?, prior_revenue?);
    if !prior.is_finite() || prior <= 0.0 || !current.is_finite() || current < 0.0 {
        return None;
    }
    if current == 0.0 {
        return Some(-100.0);
    }

    let begin_bal = Decimal::from_f64(prior)?;
    let end_bal = Decimal::from_f64(current)?;
    let n_years = Decimal::from(CAGR_YEARS);
    let rate = cagr(begin_bal, end_bal, n_years);
    let percentage = (rate * Decimal::from(100)).to_f64();
    debug!("cagr: {begin_bal}, {end_bal}, {n_years} = {rate}");
    percentage.filter(|p| p.is_finite())
}

pub fn liquidity_flag(current_ratio: Option<f64>, quick_ratio: Option<f64>) -> bool {
    current_ratio.is_some_and(|r| r < LIQUIDITY_CURRENT_RATIO_FLOOR)
        || quick_ratio.is_some_and(|r| r < LIQUIDITY_QUICK_RATIO_FLOOR)
}

pub fn leverage_flag(debt_to_equity: Option<f64>, debt_ratio: Option<f64>) -> bool {
    debt_to_equity.is_some_and(|r| r > LEVERAGE_DEBT_TO_EQUITY_CEILING)
        || debt_ratio.is_some_and(|r| r > LEVERAGE_DEBT_RATIO_CEILING)
}

/// Computes the metrics of one period. `three_years_prior` supplies the base
/// revenue for the CAGR.
pub fn compute(
    ticker: &str,
    period: &PeriodStatements<'_>,
    three_years_prior: Option<&PeriodStatements<'_>>,
) -> DerivedMetrics {
    let balance = period.balance_sheet;
    let income = period.income_statement;

    let current_assets = balance.and_then(|b| b.total_current_assets);
    let current_liabilities = balance.and_then(|b| b.total_current_liabilities);
    let total_liabilities = balance.and_then(|b| b.total_liabilities);
    let equity = balance.and_then(|b| b.total_shareholder_equity);
    let net_income = period.net_income();
    let revenue = period.total_revenue();

    let current_ratio = current_ratio(current_assets, current_liabilities);
    let quick_ratio = quick_ratio(
        current_assets,
        balance.and_then(|b| b.inventory),
        current_liabilities,
    );
    let debt_to_equity = ratio(total_liabilities, equity);
    let debt_ratio = ratio(total_liabilities, balance.and_then(|b| b.total_assets));

    DerivedMetrics {
        ticker: ticker.to_string(),
        fiscal_date_ending: period.fiscal_date_ending,
        current_ratio,
        quick_ratio,
        debt_to_equity,
        debt_ratio,
        net_margin: percentage(net_income, revenue),
        operating_margin: percentage(income.and_then(|i| i.operating_income), revenue),
        return_on_equity: percentage(net_income, equity),
        revenue_cagr_3y: revenue_cagr(revenue, three_years_prior.and_then(|p| p.total_revenue())),
        ocf_to_net_income: percentage(
            period.cash_flow.and_then(|c| c.operating_cashflow),
            net_income,
        ),
        liquidity_flag: liquidity_flag(current_ratio, quick_ratio),
        leverage_flag: leverage_flag(debt_to_equity, debt_ratio),
    }
}

/// Computes metrics for every fiscal period present in `records`, oldest
/// first. A period only gets metrics when at least one record backs it.
pub fn compute_all(ticker: &str, records: &[FinancialStatementRecord]) -> Vec<DerivedMetrics> {
    let periods = group_by_period(records);
    periods
        .values()
        .map(|period| {
            let prior_year = period.fiscal_year() - CAGR_YEARS;
            let prior = periods
                .values()
                .rev()
                .find(|p| p.fiscal_year() == prior_year);
            compute(ticker, period, prior)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::financials::{BalanceSheet, CashFlow, IncomeStatement, Statement};

    fn date(y: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, 12, 31).unwrap()
    }

    fn period<'a>(
        balance_sheet: Option<&'a BalanceSheet>,
        income_statement: Option<&'a IncomeStatement>,
        cash_flow: Option<&'a CashFlow>,
    ) -> PeriodStatements<'a> {
        PeriodStatements {
            fiscal_date_ending: date(2024),
            balance_sheet,
            income_statement,
            cash_flow,
        }
    }

    #[test]
    fn test_ratio_is_absent_for_zero_or_missing_denominator() {
        assert_eq!(ratio(Some(10.0), Some(0.0)), None);
        assert_eq!(ratio(Some(10.0), None), None);
        assert_eq!(ratio(None, Some(5.0)), None);
        assert_eq!(ratio(Some(0.0), Some(5.0)), Some(0.0));
        assert_eq!(ratio(Some(f64::MAX), Some(f64::MIN_POSITIVE)), None);
    }

    #[test]
    fn test_current_ratio_and_liquidity_flag_from_known_values() {
        let balance = BalanceSheet {
            total_current_assets: Some(150.0),
            total_current_liabilities: Some(100.0),
            ..Default::default()
        };
        let metrics = compute("TEL", &period(Some(&balance), None, None), None);

        assert_eq!(metrics.current_ratio, Some(1.5));
        assert_eq!(metrics.quick_ratio, None);
        assert!(!metrics.liquidity_flag);
    }

    #[test]
    fn test_debt_to_equity_and_leverage_flag_from_known_values() {
        let balance = BalanceSheet {
            total_liabilities: Some(300.0),
            total_shareholder_equity: Some(100.0),
            ..Default::default()
        };
        let metrics = compute("DD", &period(Some(&balance), None, None), None);

        assert_eq!(metrics.debt_to_equity, Some(3.0));
        assert_eq!(metrics.debt_ratio, None);
        assert!(metrics.leverage_flag);
    }

    #[test]
    fn test_ocf_to_net_income_is_absent_when_net_income_is_zero() {
        let income = IncomeStatement {
            net_income: Some(0.0),
            total_revenue: Some(1000.0),
            ..Default::default()
        };
        let cash_flow = CashFlow {
            operating_cashflow: Some(50.0),
            ..Default::default()
        };
        let metrics = compute("CE", &period(None, Some(&income), Some(&cash_flow)), None);

        assert_eq!(metrics.ocf_to_net_income, None);
        assert_eq!(metrics.net_margin, Some(0.0));
    }

    #[test]
    fn test_liquidity_flag_thresholds() {
        assert!(!liquidity_flag(Some(1.2), Some(0.8)));
        assert!(!liquidity_flag(Some(2.5), Some(1.1)));
        assert!(liquidity_flag(Some(1.19), None));
        assert!(liquidity_flag(None, Some(0.79)));
        assert!(liquidity_flag(Some(1.5), Some(0.5)));
        assert!(!liquidity_flag(None, None));
    }

    #[test]
    fn test_leverage_flag_thresholds() {
        assert!(!leverage_flag(Some(2.0), Some(0.5)));
        assert!(leverage_flag(Some(2.01), None));
        assert!(leverage_flag(None, Some(0.51)));
        assert!(!leverage_flag(None, None));
    }

    #[test]
    fn test_quick_ratio_subtracts_inventory() {
        assert_eq!(quick_ratio(Some(150.0), Some(50.0), Some(100.0)), Some(1.0));
        assert_eq!(quick_ratio(Some(150.0), None, Some(100.0)), None);
        assert_eq!(quick_ratio(Some(150.0), Some(50.0), Some(0.0)), None);
    }

    #[test]
    fn test_margins_and_return_on_equity() {
        let balance = BalanceSheet {
            total_liabilities: Some(400.0),
            total_assets: Some(1000.0),
            total_shareholder_equity: Some(600.0),
            ..Default::default()
        };
        let income = IncomeStatement {
            total_revenue: Some(2000.0),
            operating_income: Some(300.0),
            net_income: Some(150.0),
            ..Default::default()
        };
        let cash_flow = CashFlow {
            operating_cashflow: Some(225.0),
            ..Default::default()
        };
        let m = compute(
            "LYB",
            &period(Some(&balance), Some(&income), Some(&cash_flow)),
            None,
        );

        assert!((m.net_margin.unwrap() - 7.5).abs() < 1e-9);
        assert!((m.operating_margin.unwrap() - 15.0).abs() < 1e-9);
        assert_eq!(m.return_on_equity, Some(25.0));
        assert_eq!(m.ocf_to_net_income, Some(150.0));
        assert_eq!(m.debt_ratio, Some(0.4));
        assert!(!m.leverage_flag);
        assert_eq!(m.revenue_cagr_3y, None);
    }

    #[test]
    fn test_revenue_cagr() {
        let growth = revenue_cagr(Some(133.1), Some(100.0)).unwrap();
        assert!((growth - 10.0).abs() < 1e-4, "got {growth}");

        assert_eq!(revenue_cagr(Some(100.0), None), None);
        assert_eq!(revenue_cagr(None, Some(100.0)), None);
        assert_eq!(revenue_cagr(Some(100.0), Some(0.0)), None);
        assert_eq!(revenue_cagr(Some(100.0), Some(-5.0)), None);
        assert_eq!(revenue_cagr(Some(-1.0), Some(100.0)), None);
        assert_eq!(revenue_cagr(Some(0.0), Some(100.0)), Some(-100.0));
    }

    #[test]
    fn test_compute_all_uses_period_three_years_earlier() {
        let revenue = |year: i32, value: f64| FinancialStatementRecord {
            ticker: "ST".to_string(),
            fiscal_date_ending: date(year),
            reported_currency: None,
            statement: Statement::IncomeStatement(IncomeStatement {
                total_revenue: Some(value),
                ..Default::default()
            }),
        };
        let records = vec![
            revenue(2024, 200.0),
            revenue(2022, 150.0),
            revenue(2021, 100.0),
            revenue(2023, 180.0),
        ];

        let metrics = compute_all("ST", &records);
        assert_eq!(metrics.len(), 4);
        assert_eq!(metrics[0].fiscal_date_ending, date(2021));
        assert_eq!(metrics[3].fiscal_date_ending, date(2024));

        let expected = ((200.0_f64 / 100.0).powf(1.0 / 3.0) - 1.0) * 100.0;
        let cagr = metrics[3].revenue_cagr_3y.unwrap();
        assert!((cagr - expected).abs() < 1e-4, "got {cagr}, want {expected}");
        assert!(metrics[..3].iter().all(|m| m.revenue_cagr_3y.is_none()));
    }
}
