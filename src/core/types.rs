use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Year label (e.g. `"Year 4"`) to cell value. Absent years are not zero.
pub type YearSeries = BTreeMap<String, Option<f64>>;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerRow {
    LotsDeveloped,
    LotsSold,
    GrossLotSalesRevenue,
    AvgRevenuePerFront,
    AvgRevenuePerLot,
    PodSales,
    MarketingFee,
    OtherRevenue,
    TotalGrossRevenue,
}

impl LedgerRow {
    pub const ALL: [LedgerRow; 9] = [
        LedgerRow::LotsDeveloped,
        LedgerRow::LotsSold,
        LedgerRow::GrossLotSalesRevenue,
        LedgerRow::AvgRevenuePerFront,
        LedgerRow::AvgRevenuePerLot,
        LedgerRow::PodSales,
        LedgerRow::MarketingFee,
        LedgerRow::OtherRevenue,
        LedgerRow::TotalGrossRevenue,
    ];

    /// Rows summed into `total_gross_revenue` for each year.
    pub const REVENUE_CONTRIBUTORS: [LedgerRow; 4] = [
        LedgerRow::GrossLotSalesRevenue,
        LedgerRow::PodSales,
        LedgerRow::MarketingFee,
        LedgerRow::OtherRevenue,
    ];

    pub fn key(self) -> &'static str {
        match self {
            LedgerRow::LotsDeveloped => "lots_developed",
            LedgerRow::LotsSold => "lots_sold",
            LedgerRow::GrossLotSalesRevenue => "gross_lot_sales_revenue",
            LedgerRow::AvgRevenuePerFront => "avg_revenue_per_front",
            LedgerRow::AvgRevenuePerLot => "avg_revenue_per_lot",
            LedgerRow::PodSales => "pod_sales",
            LedgerRow::MarketingFee => "marketing_fee",
            LedgerRow::OtherRevenue => "other_revenue",
            LedgerRow::TotalGrossRevenue => "total_gross_revenue",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LedgerRow::LotsDeveloped => "Lots Developed",
            LedgerRow::LotsSold => "Lots Sold",
            LedgerRow::GrossLotSalesRevenue => "Gross Lot Sales Revenue",
            LedgerRow::AvgRevenuePerFront => "Avg Revenue Per Front",
            LedgerRow::AvgRevenuePerLot => "Avg Revenue Per Lot",
            LedgerRow::PodSales => "Pod Sales",
            LedgerRow::MarketingFee => "Marketing Fee",
            LedgerRow::OtherRevenue => "Other Revenue",
            LedgerRow::TotalGrossRevenue => "Total Gross Revenue",
        }
    }

    pub fn is_revenue_contributor(self) -> bool {
        matches!(
            self,
            LedgerRow::GrossLotSalesRevenue
                | LedgerRow::PodSales
                | LedgerRow::MarketingFee
                | LedgerRow::OtherRevenue
        )
    }

    pub fn has_per_unit(self) -> bool {
        matches!(
            self,
            LedgerRow::GrossLotSalesRevenue | LedgerRow::MarketingFee | LedgerRow::TotalGrossRevenue
        )
    }

    /// Display precision is fixed per row, not per value.
    pub fn shows_decimals(self) -> bool {
        matches!(
            self,
            LedgerRow::MarketingFee
                | LedgerRow::GrossLotSalesRevenue
                | LedgerRow::TotalGrossRevenue
                | LedgerRow::PodSales
                | LedgerRow::OtherRevenue
        )
    }

    /// Rows rendered as dollar amounts in the assistant prompt.
    pub fn is_monetary(self) -> bool {
        let key = self.key();
        key.contains("revenue") || key.contains("fee") || key.contains("sales")
    }
}

impl fmt::Display for LedgerRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown ledger row `{0}`")]
pub struct UnknownRow(pub String);

impl FromStr for LedgerRow {
    type Err = UnknownRow;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LedgerRow::ALL
            .into_iter()
            .find(|row| row.key() == s)
            .ok_or_else(|| UnknownRow(s.to_string()))
    }
}

/// Order in which year labels are turned into a cash-flow sequence.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum YearOrdering {
    /// Plain string order, so `"Year 10"` comes before `"Year 2"`.
    #[default]
    Lexicographic,
    /// By the trailing year number; unnumbered labels go last.
    Numeric,
}

/// The nine forecast rows. Missing rows in incoming JSON are empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastLedger {
    pub lots_developed: YearSeries,
    pub lots_sold: YearSeries,
    pub gross_lot_sales_revenue: YearSeries,
    pub avg_revenue_per_front: YearSeries,
    pub avg_revenue_per_lot: YearSeries,
    pub pod_sales: YearSeries,
    pub marketing_fee: YearSeries,
    pub other_revenue: YearSeries,
    pub total_gross_revenue: YearSeries,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowSummary {
    pub row: LedgerRow,
    pub label: &'static str,
    pub total: f64,
    pub per_unit: Option<f64>,
    pub formatted_total: String,
    pub formatted_per_unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialMetrics {
    /// Percent, e.g. `12.5` for 12.5%.
    pub irr: f64,
    pub npv: f64,
    pub peak_equity: f64,
    /// False when no rate could be found and `irr` fell back to 0.
    pub irr_converged: bool,
    pub cash_flows: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsDisplay {
    pub irr: String,
    pub npv: String,
    pub peak_equity: String,
}
