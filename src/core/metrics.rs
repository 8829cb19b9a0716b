use super::format::{format_percent, format_usd};
use super::types::{FinancialMetrics, MetricsDisplay, YearOrdering, YearSeries};

pub const DISCOUNT_RATE: f64 = 0.10;

const NEWTON_GUESS: f64 = 0.10;
const NEWTON_MAX_ITERATIONS: u32 = 100;
const NEWTON_STEP_TOLERANCE: f64 = 1e-10;
const MAX_RATE: f64 = 1e6;
const BISECTION_MAX_ITERATIONS: u32 = 200;
const BISECTION_WIDTH_TOLERANCE: f64 = 1e-12;
const BRACKET_RATES: [f64; 19] = [
    -0.99, -0.95, -0.9, -0.8, -0.5, -0.3, -0.1, 0.0, 0.1, 0.2, 0.3, 0.5, 0.8, 1.0, 2.0, 5.0, 10.0,
    100.0, 1000.0,
];

impl YearOrdering {
    pub fn sort_labels(self, labels: &mut [&str]) {
        match self {
            YearOrdering::Lexicographic => labels.sort_unstable(),
            YearOrdering::Numeric => {
                labels.sort_unstable_by_key(|label| {
                    let number = year_number(label);
                    (number.is_none(), number, *label)
                });
            }
        }
    }
}

fn year_number(label: &str) -> Option<u64> {
    let digits_start = label
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    label[digits_start..].parse().ok()
}

/// Gross revenue per year as a cash-flow sequence; null years count as 0.
pub fn cash_flow_vector(series: &YearSeries, ordering: YearOrdering) -> Vec<f64> {
    let mut labels: Vec<&str> = series.keys().map(String::as_str).collect();
    ordering.sort_labels(&mut labels);
    labels
        .into_iter()
        .map(|label| series.get(label).copied().flatten().unwrap_or(0.0))
        .collect()
}

/// Present value of `flows` with the first flow at period 0.
pub fn npv(rate: f64, flows: &[f64]) -> f64 {
    let base = 1.0 + rate;
    flows
        .iter()
        .enumerate()
        .map(|(period, &cf)| cf / base.powi(period as i32))
        .sum()
}

/// Internal rate of return as a fraction.
///
/// An all-zero sequence has an IRR of exactly 0. Otherwise Newton-Raphson is
/// tried from 10%, then bisection inside the first sign change found on a
/// fixed rate grid. `None` when neither finds a root.
pub fn irr(flows: &[f64]) -> Option<f64> {
    if flows.iter().all(|&cf| cf == 0.0) {
        return Some(0.0);
    }

    newton_irr(flows).or_else(|| bisection_irr(flows))
}

fn newton_irr(flows: &[f64]) -> Option<f64> {
    let mut rate = NEWTON_GUESS;

    for _ in 0..NEWTON_MAX_ITERATIONS {
        let base = 1.0 + rate;
        let mut value = 0.0;
        let mut slope = 0.0;
        for (period, &cf) in flows.iter().enumerate() {
            let t = period as i32;
            value += cf / base.powi(t);
            if t > 0 {
                slope -= f64::from(t) * cf / base.powi(t + 1);
            }
        }

        if !value.is_finite() || !slope.is_finite() || slope.abs() < 1e-30 {
            return None;
        }

        let next = rate - value / slope;
        if !next.is_finite() || next <= -1.0 || next > MAX_RATE {
            return None;
        }
        if (next - rate).abs() < NEWTON_STEP_TOLERANCE {
            return Some(next);
        }
        rate = next;
    }

    None
}

fn bisection_irr(flows: &[f64]) -> Option<f64> {
    let mut bracket = None;
    let mut previous: Option<(f64, f64)> = None;

    for &rate in &BRACKET_RATES {
        let value = npv(rate, flows);
        if !value.is_finite() {
            previous = None;
            continue;
        }
        if value == 0.0 {
            return Some(rate);
        }
        if let Some((prev_rate, prev_value)) = previous {
            if prev_value.signum() != value.signum() {
                bracket = Some((prev_rate, rate, prev_value));
                break;
            }
        }
        previous = Some((rate, value));
    }

    let (mut lo, mut hi, lo_value) = bracket?;
    for _ in 0..BISECTION_MAX_ITERATIONS {
        let mid = (lo + hi) * 0.5;
        let mid_value = npv(mid, flows);
        if !mid_value.is_finite() {
            return None;
        }
        if mid_value == 0.0 || (hi - lo) < BISECTION_WIDTH_TOLERANCE {
            return Some(mid);
        }
        if mid_value.signum() == lo_value.signum() {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    Some((lo + hi) * 0.5)
}

/// Lowest single flow (not a running cumulative minimum); 0 when empty.
pub fn peak_equity(flows: &[f64]) -> f64 {
    flows.iter().copied().reduce(f64::min).unwrap_or(0.0)
}

pub fn compute_metrics(series: &YearSeries, ordering: YearOrdering) -> FinancialMetrics {
    let cash_flows = cash_flow_vector(series, ordering);
    let solved = irr(&cash_flows);
    if solved.is_none() {
        tracing::warn!(
            periods = cash_flows.len(),
            "no internal rate of return found; reporting 0"
        );
    }

    FinancialMetrics {
        irr: solved.unwrap_or(0.0) * 100.0,
        npv: npv(DISCOUNT_RATE, &cash_flows),
        peak_equity: peak_equity(&cash_flows),
        irr_converged: solved.is_some(),
        cash_flows,
    }
}

impl FinancialMetrics {
    pub fn display(&self) -> MetricsDisplay {
        MetricsDisplay {
            irr: format_percent(self.irr),
            npv: format_usd(self.npv),
            peak_equity: format_usd(self.peak_equity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop, prop_assert, prop_assert_eq, proptest};

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn series(values: &[(&str, Option<f64>)]) -> YearSeries {
        values
            .iter()
            .map(|&(label, value)| (label.to_string(), value))
            .collect()
    }

    #[test]
    fn irr_of_all_zero_flows_is_exactly_zero() {
        assert_eq!(irr(&[0.0, 0.0, 0.0]), Some(0.0));
        assert_eq!(irr(&[]), Some(0.0));

        let metrics = compute_metrics(
            &series(&[("Year 1", None), ("Year 2", Some(0.0))]),
            YearOrdering::Lexicographic,
        );
        assert_eq!(metrics.irr, 0.0);
        assert!(metrics.irr_converged);
    }

    #[test]
    fn irr_matches_hand_calculation() {
        assert_approx_tol(irr(&[-100.0, 110.0]).expect("root"), 0.10, 1e-9);
        assert_approx_tol(
            irr(&[-1_000.0, 500.0, 500.0, 500.0]).expect("root"),
            0.233_751_928_528,
            1e-8,
        );
    }

    #[test]
    fn irr_without_sign_change_falls_back_to_zero() {
        assert_eq!(irr(&[100.0, 200.0, 300.0]), None);

        let metrics = compute_metrics(
            &series(&[("Year 1", Some(100.0)), ("Year 2", Some(200.0))]),
            YearOrdering::Lexicographic,
        );
        assert_eq!(metrics.irr, 0.0);
        assert!(!metrics.irr_converged);
        assert_eq!(metrics.display().irr, "0.00%");
    }

    #[test]
    fn npv_of_single_flow_is_the_flow() {
        for rate in [0.0, 0.1, 0.5, 3.0] {
            assert_eq!(npv(rate, &[-12_345.67]), -12_345.67);
        }
    }

    #[test]
    fn npv_discounts_at_ten_percent() {
        assert_approx_tol(npv(DISCOUNT_RATE, &[0.0, 110.0, 121.0]), 200.0, 1e-9);
    }

    #[test]
    fn peak_equity_is_lowest_single_flow() {
        assert_eq!(peak_equity(&[100.0, -50.0, 200.0, -300.0, 0.0]), -300.0);
        assert_eq!(peak_equity(&[5.0, 3.0, 9.0]), 3.0);
        assert_eq!(peak_equity(&[]), 0.0);
    }

    #[test]
    fn lexicographic_ordering_puts_year_ten_before_year_two() {
        let mut labels = vec!["Year 2", "Year 10"];
        YearOrdering::Lexicographic.sort_labels(&mut labels);
        assert_eq!(labels, vec!["Year 10", "Year 2"]);

        let revenue = series(&[("Year 2", Some(-100.0)), ("Year 10", Some(150.0))]);
        let metrics = compute_metrics(&revenue, YearOrdering::Lexicographic);

        assert_eq!(metrics.cash_flows, vec![150.0, -100.0]);
        assert_approx_tol(metrics.npv, 150.0 - 100.0 / 1.1, 1e-9);
        assert_approx_tol(metrics.irr, -100.0 / 3.0, 1e-6);
        assert_eq!(metrics.peak_equity, -100.0);
    }

    #[test]
    fn numeric_ordering_follows_year_numbers() {
        let mut labels = vec!["Year 10", "Total", "Year 2", "Year 1"];
        YearOrdering::Numeric.sort_labels(&mut labels);
        assert_eq!(labels, vec!["Year 1", "Year 2", "Year 10", "Total"]);

        let revenue = series(&[("Year 2", Some(-100.0)), ("Year 10", Some(150.0))]);
        let metrics = compute_metrics(&revenue, YearOrdering::Numeric);

        assert_eq!(metrics.cash_flows, vec![-100.0, 150.0]);
        assert_approx_tol(metrics.npv, -100.0 + 150.0 / 1.1, 1e-9);
        assert_approx_tol(metrics.irr, 50.0, 1e-6);
    }

    #[test]
    fn cash_flow_vector_treats_null_as_zero() {
        let revenue = series(&[("Year 1", Some(10.0)), ("Year 2", None), ("Year 3", Some(-4.0))]);
        assert_eq!(
            cash_flow_vector(&revenue, YearOrdering::Lexicographic),
            vec![10.0, 0.0, -4.0]
        );
    }

    #[test]
    fn display_formats_currency_and_percent() {
        let metrics = FinancialMetrics {
            irr: 23.375_192_85,
            npv: 1_234_567.891,
            peak_equity: -300.0,
            irr_converged: true,
            cash_flows: Vec::new(),
        };
        let display = metrics.display();

        assert_eq!(display.irr, "23.38%");
        assert_eq!(display.npv, "$1,234,567.89");
        assert_eq!(display.peak_equity, "-$300.00");
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(128))]

        #[test]
        fn prop_irr_is_scale_invariant(
            outlay in 1u32..1_000_000,
            inflows in prop::collection::vec(0u32..500_000, 1..12),
            scale in 0.01f64..1_000.0,
        ) {
            let mut flows = vec![-f64::from(outlay)];
            flows.extend(inflows.iter().map(|&v| f64::from(v)));
            let scaled: Vec<f64> = flows.iter().map(|cf| cf * scale).collect();

            match (irr(&flows), irr(&scaled)) {
                (Some(base), Some(other)) => {
                    prop_assert!((base - other).abs() <= 1e-6 * base.abs().max(1.0));
                }
                (base, other) => prop_assert_eq!(base.is_some(), other.is_some()),
            }
        }

        #[test]
        fn prop_npv_at_irr_is_near_zero(
            outlay in 1_000u32..1_000_000,
            inflows in prop::collection::vec(1_000u32..500_000, 1..12),
        ) {
            let mut flows = vec![-f64::from(outlay)];
            flows.extend(inflows.iter().map(|&v| f64::from(v)));

            if let Some(rate) = irr(&flows) {
                let scale = flows.iter().map(|cf| cf.abs()).sum::<f64>();
                prop_assert!(npv(rate, &flows).abs() <= 1e-6 * scale);
            }
        }
    }
}
