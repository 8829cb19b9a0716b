use std::collections::BTreeSet;

use super::format::format_number;
use super::types::{ForecastLedger, LedgerRow, RowSummary, YearSeries};

/// Number of year columns in the forecast form.
pub const FORECAST_YEARS: u32 = 13;

pub fn year_label(year: u32) -> String {
    format!("Year {year}")
}

/// Coerces raw cell text to a value.
///
/// Everything except ASCII digits, `.` and `-` is dropped. What remains is
/// read like a browser `parseFloat`: the longest leading run that is a valid
/// number wins (`"1.2.3"` reads as `1.2`), and text with no numeric prefix
/// reads as null.
pub fn parse_cell(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-'))
        .collect();

    let end = numeric_prefix_len(cleaned.as_bytes());
    if end == 0 {
        return None;
    }
    cleaned[..end]
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Length of the leading `-?digits(.digits)?` run, or 0 when it holds no digit.
fn numeric_prefix_len(bytes: &[u8]) -> usize {
    let digits_from = |start: usize| {
        start
            + bytes[start..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count()
    };

    let sign = usize::from(bytes.first() == Some(&b'-'));
    let int_end = digits_from(sign);
    let mut end = int_end;
    let mut digits = int_end - sign;

    if bytes.get(int_end) == Some(&b'.') {
        let frac_end = digits_from(int_end + 1);
        digits += frac_end - int_end - 1;
        end = frac_end;
    }

    if digits == 0 { 0 } else { end }
}

/// Renders a cell under the row's precision policy; null is blank.
pub fn format_cell(row: LedgerRow, value: Option<f64>) -> String {
    match value {
        Some(value) => format_number(value, if row.shows_decimals() { 2 } else { 0 }),
        None => String::new(),
    }
}

impl ForecastLedger {
    /// The sample forecast the form opens with, totals derived.
    pub fn seed() -> Self {
        fn series(values: &[(u32, f64)]) -> YearSeries {
            values
                .iter()
                .map(|&(year, value)| (year_label(year), Some(value)))
                .collect()
        }

        let mut ledger = ForecastLedger {
            lots_developed: series(&[
                (4, 124.0),
                (5, 73.0),
                (6, 72.0),
                (7, 211.0),
                (8, 73.0),
                (9, 50.0),
                (10, 57.0),
            ]),
            lots_sold: series(&[
                (4, 70.0),
                (5, 95.0),
                (6, 123.0),
                (7, 142.0),
                (8, 50.0),
                (9, 57.0),
            ]),
            gross_lot_sales_revenue: series(&[
                (4, 6_443_700.0),
                (5, 9_896_752.0),
                (6, 13_847_710.0),
                (7, 26_831_600.0),
                (8, 14_079_540.0),
                (9, 9_156_894.0),
            ]),
            avg_revenue_per_front: YearSeries::new(),
            avg_revenue_per_lot: series(&[
                (4, 84_766.0),
                (5, 99_957.0),
                (6, 113_366.0),
                (7, 147_426.0),
                (8, 156_439.0),
                (9, 160_682.0),
            ]),
            pod_sales: YearSeries::new(),
            marketing_fee: series(&[
                (4, 626_068.0),
                (5, 793_533.0),
                (6, 1_067_134.0),
                (7, 1_047_523.0),
                (8, 896_017.0),
                (9, 654_338.0),
                (10, 160_643.0),
            ]),
            other_revenue: series(&[(4, 750.0), (5, 2_758.0), (6, 241_700.0)]),
            total_gross_revenue: YearSeries::new(),
        };
        ledger.recompute_totals();
        ledger
    }

    pub fn series(&self, row: LedgerRow) -> &YearSeries {
        match row {
            LedgerRow::LotsDeveloped => &self.lots_developed,
            LedgerRow::LotsSold => &self.lots_sold,
            LedgerRow::GrossLotSalesRevenue => &self.gross_lot_sales_revenue,
            LedgerRow::AvgRevenuePerFront => &self.avg_revenue_per_front,
            LedgerRow::AvgRevenuePerLot => &self.avg_revenue_per_lot,
            LedgerRow::PodSales => &self.pod_sales,
            LedgerRow::MarketingFee => &self.marketing_fee,
            LedgerRow::OtherRevenue => &self.other_revenue,
            LedgerRow::TotalGrossRevenue => &self.total_gross_revenue,
        }
    }

    pub fn series_mut(&mut self, row: LedgerRow) -> &mut YearSeries {
        match row {
            LedgerRow::LotsDeveloped => &mut self.lots_developed,
            LedgerRow::LotsSold => &mut self.lots_sold,
            LedgerRow::GrossLotSalesRevenue => &mut self.gross_lot_sales_revenue,
            LedgerRow::AvgRevenuePerFront => &mut self.avg_revenue_per_front,
            LedgerRow::AvgRevenuePerLot => &mut self.avg_revenue_per_lot,
            LedgerRow::PodSales => &mut self.pod_sales,
            LedgerRow::MarketingFee => &mut self.marketing_fee,
            LedgerRow::OtherRevenue => &mut self.other_revenue,
            LedgerRow::TotalGrossRevenue => &mut self.total_gross_revenue,
        }
    }

    pub fn value(&self, row: LedgerRow, year: &str) -> Option<f64> {
        self.series(row).get(year).copied().flatten()
    }

    /// Returns the ledger after one cell edit; `self` is left untouched.
    pub fn set_cell(&self, row: LedgerRow, year: &str, raw: &str) -> ForecastLedger {
        let mut next = self.clone();
        next.apply_edit(row, year, raw);
        next
    }

    /// Writes a cell and re-derives that year's gross revenue when the row
    /// feeds it. Direct writes to `total_gross_revenue` stick until the next
    /// contributor edit in the same year.
    pub fn apply_edit(&mut self, row: LedgerRow, year: &str, raw: &str) {
        let value = parse_cell(raw);
        self.series_mut(row).insert(year.to_string(), value);
        if row.is_revenue_contributor() {
            self.recompute_total(year);
        }
    }

    pub fn recompute_total(&mut self, year: &str) {
        let total = LedgerRow::REVENUE_CONTRIBUTORS
            .iter()
            .map(|&row| self.value(row, year).unwrap_or(0.0))
            .sum::<f64>();
        self.total_gross_revenue.insert(year.to_string(), Some(total));
    }

    /// Re-derives gross revenue for every year any contributor mentions.
    pub fn recompute_totals(&mut self) {
        let years: BTreeSet<String> = LedgerRow::REVENUE_CONTRIBUTORS
            .iter()
            .flat_map(|&row| self.series(row).keys().cloned())
            .collect();
        for year in &years {
            self.recompute_total(year);
        }
    }

    pub fn row_total(&self, row: LedgerRow) -> f64 {
        self.series(row).values().flatten().sum()
    }

    /// Row total per lot sold. `None` for rows without a per-unit column and
    /// whenever no lots were sold.
    pub fn per_unit(&self, row: LedgerRow) -> Option<f64> {
        if !row.has_per_unit() {
            return None;
        }
        let lots_sold = self.row_total(LedgerRow::LotsSold);
        if lots_sold == 0.0 {
            return None;
        }
        Some(self.row_total(row) / lots_sold)
    }

    /// Every year label used by any row, in string order.
    pub fn year_labels(&self) -> BTreeSet<&str> {
        LedgerRow::ALL
            .iter()
            .flat_map(|&row| self.series(row).keys().map(String::as_str))
            .collect()
    }

    pub fn summary(&self) -> Vec<RowSummary> {
        LedgerRow::ALL
            .iter()
            .map(|&row| {
                let total = self.row_total(row);
                let per_unit = self.per_unit(row);
                RowSummary {
                    row,
                    label: row.label(),
                    total,
                    per_unit,
                    formatted_total: format_cell(row, Some(total)),
                    formatted_per_unit: per_unit.map(|value| format_number(value, 2)),
                }
            })
            .collect()
    }
}
