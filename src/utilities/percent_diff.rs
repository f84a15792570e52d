use crate::price_data::PriceResult;

/// Percentage difference of `reference` against `comparison`, rounded to one decimal.
///
/// Positive when the reference is priced higher. Returns `None` when either price
/// is absent or `comparison` is zero.
///
/// The value is computed on integers: tenths are rounded half away from zero,
/// and a zero result is always rendered as `0.0`.
pub fn percent_diff(reference: &PriceResult, comparison: &PriceResult) -> Option<String> {
    let reference = reference.price()?;
    let comparison = comparison.price()?;
    if comparison == 0 {
        return None;
    }

    let numerator = (reference as i128 - comparison as i128) * 1000;
    let denominator = comparison as i128;

    let mut tenths = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder.abs() * 2 >= denominator {
        tenths += numerator.signum();
    }

    let sign = if tenths < 0 { "-" } else { "" };
    let tenths = tenths.abs();
    Some(format!("{}{}.{}", sign, tenths / 10, tenths % 10))
}
