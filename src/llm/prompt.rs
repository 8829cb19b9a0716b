use std::fmt::Write as _;

use crate::core::{
    DISCOUNT_RATE, FinancialMetrics, ForecastLedger, LedgerRow, format_number, format_usd,
};

pub const SYSTEM_PROMPT: &str = "You are a helpful financial analyst assistant. Help analyze revenue forecast data and answer questions about it.
When discussing monetary values, always use proper currency formatting with $ and commas.
Be concise but informative in your responses. Focus on the specific question asked while providing relevant context.";

fn format_row_value(row: LedgerRow, value: f64) -> String {
    if row.is_monetary() {
        format_usd(value)
    } else {
        format_number(value, 0)
    }
}

/// Totals, a per-year breakdown and (when given) the headline metrics.
pub fn forecast_context(ledger: &ForecastLedger, metrics: Option<&FinancialMetrics>) -> String {
    let mut context = String::from("Here is the revenue forecast data:\n");

    context.push_str("\nTotals:\n");
    for row in LedgerRow::ALL {
        let _ = writeln!(
            context,
            "- Total {}: {}",
            row.label(),
            format_row_value(row, ledger.row_total(row))
        );
    }

    context.push_str("\nYearly Breakdown:\n");
    for year in ledger.year_labels() {
        let _ = writeln!(context, "\n{year}:");
        for row in LedgerRow::ALL {
            if let Some(value) = ledger.value(row, year) {
                let _ = writeln!(context, "- {}: {}", row.label(), format_row_value(row, value));
            }
        }
    }

    if let Some(metrics) = metrics {
        let display = metrics.display();
        context.push_str("\nFinancial Metrics:\n");
        let _ = writeln!(context, "- IRR: {}", display.irr);
        let _ = writeln!(
            context,
            "- NPV ({}% discount rate): {}",
            format_number(DISCOUNT_RATE * 100.0, 0),
            display.npv
        );
        let _ = writeln!(context, "- Peak Equity: {}", display.peak_equity);
    }

    context
}

pub fn user_prompt(
    question: &str,
    ledger: &ForecastLedger,
    metrics: Option<&FinancialMetrics>,
) -> String {
    format!(
        "Here is the context of our revenue forecast data:\n\n{}\n\nQuestion: {question}",
        forecast_context(ledger, metrics)
    )
}
