//! Vendors and the raw financial statements reported for them.

use crate::core::error::{Result, VendorError};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

/// A company tracked as a potential supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub ticker: String,
    pub name: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub market_cap: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementType {
    BalanceSheet,
    IncomeStatement,
    CashFlow,
}

impl StatementType {
    /// Alpha Vantage `function` parameter for the statement.
    pub fn api_function(&self) -> &'static str {
        match self {
            StatementType::BalanceSheet => "BALANCE_SHEET",
            StatementType::IncomeStatement => "INCOME_STATEMENT",
            StatementType::CashFlow => "CASH_FLOW",
        }
    }
}

impl Display for StatementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                StatementType::BalanceSheet => "balance sheet",
                StatementType::IncomeStatement => "income statement",
                StatementType::CashFlow => "cash flow",
            }
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub total_assets: Option<f64>,
    pub total_current_assets: Option<f64>,
    pub cash_and_cash_equivalents: Option<f64>,
    pub inventory: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub total_current_liabilities: Option<f64>,
    pub short_term_debt: Option<f64>,
    pub long_term_debt: Option<f64>,
    pub short_long_term_debt_total: Option<f64>,
    pub total_shareholder_equity: Option<f64>,
    pub retained_earnings: Option<f64>,
    pub common_stock_shares_outstanding: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncomeStatement {
    pub total_revenue: Option<f64>,
    pub gross_profit: Option<f64>,
    pub operating_income: Option<f64>,
    pub net_income: Option<f64>,
    pub ebitda: Option<f64>,
    pub cost_of_revenue: Option<f64>,
    pub operating_expenses: Option<f64>,
    pub income_before_tax: Option<f64>,
    pub income_tax_expense: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CashFlow {
    pub operating_cashflow: Option<f64>,
    pub net_income: Option<f64>,
    pub capital_expenditures: Option<f64>,
    pub cashflow_from_investment: Option<f64>,
    pub cashflow_from_financing: Option<f64>,
    pub dividend_payout: Option<f64>,
    pub depreciation_depletion_amortization: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "statement_type", content = "fields", rename_all = "snake_case")]
pub enum Statement {
    BalanceSheet(BalanceSheet),
    IncomeStatement(IncomeStatement),
    CashFlow(CashFlow),
}

impl Statement {
    pub fn statement_type(&self) -> StatementType {
        match self {
            Statement::BalanceSheet(_) => StatementType::BalanceSheet,
            Statement::IncomeStatement(_) => StatementType::IncomeStatement,
            Statement::CashFlow(_) => StatementType::CashFlow,
        }
    }
}

/// One statement for one fiscal period, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatementRecord {
    pub ticker: String,
    pub fiscal_date_ending: NaiveDate,
    pub reported_currency: Option<String>,
    pub statement: Statement,
}

impl FinancialStatementRecord {
    pub fn key(&self) -> (NaiveDate, StatementType) {
        (self.fiscal_date_ending, self.statement.statement_type())
    }
}

/// The statements available for a single fiscal period.
#[derive(Debug, Clone, Copy)]
pub struct PeriodStatements<'a> {
    pub fiscal_date_ending: NaiveDate,
    pub balance_sheet: Option<&'a BalanceSheet>,
    pub income_statement: Option<&'a IncomeStatement>,
    pub cash_flow: Option<&'a CashFlow>,
}

impl<'a> PeriodStatements<'a> {
    fn empty(fiscal_date_ending: NaiveDate) -> Self {
        Self {
            fiscal_date_ending,
            balance_sheet: None,
            income_statement: None,
            cash_flow: None,
        }
    }

    pub fn fiscal_year(&self) -> i32 {
        self.fiscal_date_ending.year()
    }

    /// Net income from the income statement, or the cash-flow statement when
    /// the income statement does not report it.
    pub fn net_income(&self) -> Option<f64> {
        self.income_statement
            .and_then(|i| i.net_income)
            .or_else(|| self.cash_flow.and_then(|c| c.net_income))
    }

    pub fn total_revenue(&self) -> Option<f64> {
        self.income_statement.and_then(|i| i.total_revenue)
    }
}

/// Groups records by fiscal period, oldest period first.
pub fn group_by_period(
    records: &[FinancialStatementRecord],
) -> BTreeMap<NaiveDate, PeriodStatements<'_>> {
    let mut periods = BTreeMap::new();
    for record in records {
        let period = periods
            .entry(record.fiscal_date_ending)
            .or_insert_with(|| PeriodStatements::empty(record.fiscal_date_ending));
        match &record.statement {
            Statement::BalanceSheet(b) => period.balance_sheet = Some(b),
            Statement::IncomeStatement(i) => period.income_statement = Some(i),
            Statement::CashFlow(c) => period.cash_flow = Some(c),
        }
    }
    periods
}

/// Merges freshly fetched records into the stored ones.
///
/// Records for the same (fiscal date, statement type) are replaced by the
/// incoming version; stored periods missing from `incoming` are kept. The
/// result is ordered by fiscal date, then statement type.
pub fn merge_records(
    existing: Vec<FinancialStatementRecord>,
    incoming: Vec<FinancialStatementRecord>,
) -> Vec<FinancialStatementRecord> {
    let mut merged = BTreeMap::new();
    for record in existing.into_iter().chain(incoming) {
        merged.insert(record.key(), record);
    }
    merged.into_values().collect()
}

/// Canonical form of a ticker: trimmed, upper case, 1-10 of `[A-Z0-9.-]`.
pub fn normalize_ticker(ticker: &str) -> Result<String> {
    let normalized = ticker.trim().to_uppercase();
    let valid = !normalized.is_empty()
        && normalized.len() <= 10
        && normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if valid {
        Ok(normalized)
    } else {
        Err(VendorError::TickerNotFound(ticker.to_string()))
    }
}
