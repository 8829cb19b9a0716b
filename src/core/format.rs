/// Fixed-precision number with en-US thousands separators (`1,234.50`).
pub fn format_number(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let magnitude = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match magnitude.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (magnitude.as_str(), None),
    };

    let mut out = String::with_capacity(magnitude.len() + magnitude.len() / 3 + 1);
    if value < 0.0 && !is_rounded_zero(&magnitude) {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(frac_part) = frac_part {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}

/// US dollars with cents; negatives as `-$1,234.56`.
pub fn format_usd(value: f64) -> String {
    let body = format_number(value.abs(), 2);
    if value < 0.0 && !is_rounded_zero(&body) {
        format!("-${body}")
    } else {
        format!("${body}")
    }
}

pub fn format_percent(percent: f64) -> String {
    format!("{}%", format_number(percent, 2))
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn is_rounded_zero(formatted: &str) -> bool {
    formatted.chars().all(|c| matches!(c, '0' | '.' | ','))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_groups_thousands() {
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_number(999.0, 0), "999");
        assert_eq!(format_number(1_000.0, 0), "1,000");
        assert_eq!(format_number(7_070_518.0, 2), "7,070,518.00");
        assert_eq!(format_number(123_456_789.125, 0), "123,456,789");
    }

    #[test]
    fn format_number_handles_negatives_without_negative_zero() {
        assert_eq!(format_number(-1_234.5, 2), "-1,234.50");
        assert_eq!(format_number(-0.001, 2), "0.00");
        assert_eq!(format_number(-0.4, 0), "0");
    }

    #[test]
    fn format_usd_places_sign_before_dollar() {
        assert_eq!(format_usd(1_234.5), "$1,234.50");
        assert_eq!(format_usd(-300.0), "-$300.00");
        assert_eq!(format_usd(0.0), "$0.00");
    }

    #[test]
    fn format_percent_uses_two_decimals() {
        assert_eq!(format_percent(12.3456), "12.35%");
        assert_eq!(format_percent(-33.333_333), "-33.33%");
        assert_eq!(format_percent(0.0), "0.00%");
    }
}
