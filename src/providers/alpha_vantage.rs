use crate::core::config::AlphaVantageConfig;
use crate::core::error::{Result, VendorError};
use crate::core::financials::{
    BalanceSheet, CashFlow, FinancialStatementRecord, IncomeStatement, Statement, StatementType,
};
use crate::core::provider::{CompanyFinancials, FinancialDataProvider};
use crate::providers::credentials::{ApiKeyPool, mask_key};
use crate::providers::util::{is_rate_limit_message, parse_fiscal_date, parse_reported_value};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

const OVERVIEW: &str = "OVERVIEW";

pub struct AlphaVantageProvider {
    base_url: String,
    client: reqwest::Client,
    keys: Arc<ApiKeyPool>,
    min_interval: Option<Duration>,
    last_request: Mutex<Option<Instant>>,
}

impl AlphaVantageProvider {
    pub fn new(config: &AlphaVantageConfig, keys: Arc<ApiKeyPool>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("vendor-health/0.1")
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let min_interval = config
            .requests_per_minute
            .filter(|rpm| *rpm > 0)
            .map(|rpm| Duration::from_secs_f64(60.0 / f64::from(rpm)));

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            keys,
            min_interval,
            last_request: Mutex::new(None),
        })
    }

    /// Runs one API call, moving through the key pool on rate limits and
    /// outages. Each key is tried at most once.
    async fn query(&self, function: &str, ticker: &str) -> Result<Value> {
        let attempts = self.keys.len();
        let start = self.keys.current_index();
        let mut last_error = None;

        for offset in 0..attempts {
            let Some((index, key)) = self.keys.key_at(start, offset) else {
                break;
            };
            self.pace().await;
            self.keys.record_use(index);

            match self.send(function, ticker, key).await {
                Ok(body) => return Ok(body),
                Err(e) if e.rotates_key() => {
                    warn!(
                        "{} for {} failed on key {}: {}",
                        function,
                        ticker,
                        mask_key(key),
                        e
                    );
                    self.keys.rotate_from(index);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        match last_error {
            Some(VendorError::UpstreamUnavailable(message)) => {
                Err(VendorError::UpstreamUnavailable(message))
            }
            _ => Err(VendorError::PoolExhausted { attempts }),
        }
    }

    async fn send(&self, function: &str, ticker: &str, key: &str) -> Result<Value> {
        let url = Url::parse_with_params(
            &format!("{}/query", self.base_url),
            &[("function", function), ("symbol", ticker), ("apikey", key)],
        )
        .map_err(|e| VendorError::UpstreamUnavailable(format!("Invalid base URL: {e}")))?;
        debug!("Requesting {} for {} from {}", function, ticker, self.base_url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(VendorError::RateLimited {
                key: mask_key(key),
                message: format!("HTTP {status}"),
            });
        }
        if !status.is_success() {
            return Err(VendorError::UpstreamUnavailable(format!(
                "HTTP {status} for {function}"
            )));
        }

        let body: Value = response.json().await?;
        classify_response(body, ticker, key)
    }

    /// Waits until the configured minimum interval since the previous request
    /// has elapsed.
    async fn pace(&self) {
        let Some(interval) = self.min_interval else {
            return;
        };
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < interval {
                debug!("Pacing upstream request for {:?}", interval - elapsed);
                tokio::time::sleep(interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn fetch_statement(
        &self,
        ticker: &str,
        statement_type: StatementType,
    ) -> Result<Vec<FinancialStatementRecord>> {
        let body = self.query(statement_type.api_function(), ticker).await?;
        Ok(parse_annual_reports(ticker, statement_type, &body))
    }

    /// Statements other than the balance sheet are optional.
    async fn fetch_optional_statement(
        &self,
        ticker: &str,
        statement_type: StatementType,
    ) -> Result<Vec<FinancialStatementRecord>> {
        match self.fetch_statement(ticker, statement_type).await {
            Err(VendorError::TickerNotFound(_)) => {
                debug!("No {} reported for {}", statement_type, ticker);
                Ok(Vec::new())
            }
            other => other,
        }
    }
}

#[async_trait]
impl FinancialDataProvider for AlphaVantageProvider {
    #[instrument(name = "AlphaVantageFetch", skip(self), fields(ticker = %ticker))]
    async fn fetch_financials(&self, ticker: &str) -> Result<CompanyFinancials> {
        if self.keys.is_empty() {
            return Err(VendorError::PoolExhausted { attempts: 0 });
        }

        let mut records = self
            .fetch_statement(ticker, StatementType::BalanceSheet)
            .await?;
        if records.is_empty() {
            return Err(VendorError::TickerNotFound(ticker.to_string()));
        }
        records.extend(
            self.fetch_optional_statement(ticker, StatementType::IncomeStatement)
                .await?,
        );
        records.extend(
            self.fetch_optional_statement(ticker, StatementType::CashFlow)
                .await?,
        );

        let overview = match self.query(OVERVIEW, ticker).await {
            Ok(body) => Some(body),
            Err(VendorError::TickerNotFound(_)) => {
                debug!("No overview reported for {}", ticker);
                None
            }
            Err(e) => return Err(e),
        };

        debug!("Fetched {} statement records for {}", records.len(), ticker);
        Ok(CompanyFinancials { overview, records })
    }
}

fn classify_response(body: Value, ticker: &str, key: &str) -> Result<Value> {
    if body.get("Error Message").is_some() {
        return Err(VendorError::TickerNotFound(ticker.to_string()));
    }
    for field in ["Note", "Information"] {
        if let Some(message) = body.get(field).and_then(Value::as_str) {
            if is_rate_limit_message(message) {
                return Err(VendorError::RateLimited {
                    key: mask_key(key),
                    message: message.to_string(),
                });
            }
            return Err(VendorError::UpstreamUnavailable(message.to_string()));
        }
    }
    if body.as_object().is_some_and(|o| o.is_empty()) {
        return Err(VendorError::TickerNotFound(ticker.to_string()));
    }
    Ok(body)
}

fn parse_annual_reports(
    ticker: &str,
    statement_type: StatementType,
    body: &Value,
) -> Vec<FinancialStatementRecord> {
    let Some(reports) = body.get("annualReports").and_then(Value::as_array) else {
        return Vec::new();
    };

    reports
        .iter()
        .filter_map(|report| {
            let Some(fiscal_date_ending) = parse_fiscal_date(report.get("fiscalDateEnding"))
            else {
                warn!(
                    "Skipping {} report for {} with invalid fiscal date: {:?}",
                    statement_type,
                    ticker,
                    report.get("fiscalDateEnding")
                );
                return None;
            };
            let reported_currency = report
                .get("reportedCurrency")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty() && *s != "None")
                .map(str::to_string);

            Some(FinancialStatementRecord {
                ticker: ticker.to_string(),
                fiscal_date_ending,
                reported_currency,
                statement: parse_statement(statement_type, report),
            })
        })
        .collect()
}

fn parse_statement(statement_type: StatementType, report: &Value) -> Statement {
    let field = |name: &str| parse_reported_value(report.get(name));
    match statement_type {
        StatementType::BalanceSheet => Statement::BalanceSheet(BalanceSheet {
            total_assets: field("totalAssets"),
            total_current_assets: field("totalCurrentAssets"),
            cash_and_cash_equivalents: field("cashAndCashEquivalentsAtCarryingValue"),
            inventory: field("inventory"),
            total_liabilities: field("totalLiabilities"),
            total_current_liabilities: field("totalCurrentLiabilities"),
            short_term_debt: field("shortTermDebt"),
            long_term_debt: field("longTermDebt"),
            short_long_term_debt_total: field("shortLongTermDebtTotal"),
            total_shareholder_equity: field("totalShareholderEquity"),
            retained_earnings: field("retainedEarnings"),
            common_stock_shares_outstanding: field("commonStockSharesOutstanding"),
        }),
        StatementType::IncomeStatement => Statement::IncomeStatement(IncomeStatement {
            total_revenue: field("totalRevenue"),
            gross_profit: field("grossProfit"),
            operating_income: field("operatingIncome"),
            net_income: field("netIncome"),
            ebitda: field("ebitda"),
            cost_of_revenue: field("costOfRevenue"),
            operating_expenses: field("operatingExpenses"),
            income_before_tax: field("incomeBeforeTax"),
            income_tax_expense: field("incomeTaxExpense"),
        }),
        StatementType::CashFlow => Statement::CashFlow(CashFlow {
            operating_cashflow: field("operatingCashflow"),
            net_income: field("netIncome"),
            capital_expenditures: field("capitalExpenditures"),
            cashflow_from_investment: field("cashflowFromInvestment"),
            cashflow_from_financing: field("cashflowFromFinancing"),
            dividend_payout: field("dividendPayout"),
            depreciation_depletion_amortization: field("depreciationDepletionAndAmortization"),
        }),
    }
}
