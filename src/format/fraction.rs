//! Fraction rendering
//!
//! Two forms: a fixed denominator (`whole num/D`), or an accuracy limit of
//! N digits where the result is the best rational approximation whose
//! denominator stays below 10^N.

/// Render `value` against a fixed denominator.
///
/// The whole part is omitted when zero; a numerator that rounds to zero
/// renders as `"0"`.
pub fn float_to_fraction(value: f64, denominator: u64) -> String {
    let negative = value < 0.0;
    let value = value.abs();
    let whole = value.trunc() as u64;
    let numerator = (denominator as f64 * (value - whole as f64)).round() as u64;

    let formatted = if numerator == 0 && whole == 0 {
        return "0".to_string();
    } else if numerator == 0 {
        whole.to_string()
    } else if whole > 0 {
        format!("{} {}/{}", whole, numerator, denominator)
    } else {
        format!("{}/{}", numerator, denominator)
    };

    if negative {
        format!("-{}", formatted)
    } else {
        formatted
    }
}

/// Render `value` as the closest fraction whose denominator has at most
/// `max_digits` digits.
pub fn float_to_n_digit_fraction(value: f64, max_digits: u32) -> String {
    let max_denominator = 10u64.pow(max_digits) - 1;
    let negative = value < 0.0;
    let value = value.abs();

    let (numerator, denominator) = limit_denominator(value, max_denominator);
    let whole = value.trunc() as u64;
    let numerator = numerator.saturating_sub(whole * denominator);

    let formatted = if numerator == 0 && whole == 0 {
        return "0".to_string();
    } else if numerator == 0 {
        whole.to_string()
    } else if whole == 0 {
        format!("{}/{}", numerator, denominator)
    } else {
        format!("{} {}/{}", whole, numerator, denominator)
    };

    if negative {
        format!("-{}", formatted)
    } else {
        formatted
    }
}

/// Best rational approximation of a non-negative value with denominator at
/// most `max_denominator`, by continued-fraction expansion with a final
/// semiconvergent step. Ties prefer the last full convergent.
fn limit_denominator(value: f64, max_denominator: u64) -> (u64, u64) {
    if max_denominator == 0 {
        return (value.round() as u64, 1);
    }

    let (mut p0, mut q0, mut p1, mut q1) = (0u64, 1u64, 1u64, 0u64);
    let mut x = value;

    loop {
        let a = x.floor() as u64;
        let q2 = q0 + a.saturating_mul(q1);
        if q1 != 0 && q2 > max_denominator {
            // Semiconvergent bound against the last convergent.
            let k = (max_denominator - q0) / q1;
            let (bp, bq) = (p0 + k * p1, q0 + k * q1);
            let convergent_err = (p1 as f64 / q1 as f64 - value).abs();
            let bound_err = (bp as f64 / bq as f64 - value).abs();
            return if convergent_err <= bound_err {
                (p1, q1)
            } else {
                (bp, bq)
            };
        }

        let p2 = p0 + a * p1;
        (p0, q0, p1, q1) = (p1, q1, p2, q2);

        let frac = x - a as f64;
        if frac < 1.0e-12 {
            return (p1, q1);
        }
        x = 1.0 / frac;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_denominator() {
        assert_eq!(float_to_fraction(0.5, 2), "1/2");
        assert_eq!(float_to_fraction(1.25, 4), "1 1/4");
        assert_eq!(float_to_fraction(0.01, 4), "0");
        assert_eq!(float_to_fraction(3.0, 8), "3");
        assert_eq!(float_to_fraction(-0.75, 4), "-3/4");
    }

    #[test]
    fn test_two_digit_accuracy_picks_semiconvergent() {
        // 445/553 has no two-digit denominator; the best bound is 70/87.
        assert_eq!(float_to_n_digit_fraction(445.0 / 553.0, 2), "70/87");
    }

    #[test]
    fn test_three_digit_accuracy_is_exact() {
        // The exact denominator fits within three digits.
        assert_eq!(float_to_n_digit_fraction(445.0 / 553.0, 3), "445/553");
    }

    #[test]
    fn test_single_digit_accuracy() {
        assert_eq!(float_to_n_digit_fraction(0.3333333333333333, 1), "1/3");
        assert_eq!(float_to_n_digit_fraction(0.75, 1), "3/4");
    }

    #[test]
    fn test_whole_parts() {
        assert_eq!(float_to_n_digit_fraction(2.5, 1), "2 1/2");
        assert_eq!(float_to_n_digit_fraction(4.0, 2), "4");
        assert_eq!(float_to_n_digit_fraction(0.0, 2), "0");
    }
}
