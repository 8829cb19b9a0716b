mod format;
mod ledger;
mod metrics;
mod types;

pub use format::{format_number, format_percent, format_usd};
pub use ledger::{FORECAST_YEARS, format_cell, parse_cell, year_label};
pub use metrics::{DISCOUNT_RATE, cash_flow_vector, compute_metrics, irr, npv, peak_equity};
pub use types::{
    FinancialMetrics, ForecastLedger, LedgerRow, MetricsDisplay, RowSummary, UnknownRow,
    YearOrdering, YearSeries,
};
