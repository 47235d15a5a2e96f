//! Display formatting for prices, percent changes and large amounts.
//!
//! Prices go through `rust_decimal` so rounding happens on the decimal
//! representation rather than on binary floats, and so output is never
//! in scientific notation.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Significant digits kept for prices below 1.
const SMALL_PRICE_SIG_DIGITS: u32 = 6;

/// Decimal places for prices at or above 1, and the minimum for all prices.
const PRICE_DECIMALS: u32 = 2;

/// Below this magnitude `Decimal`'s 28-digit scale keeps fewer than six
/// significant digits.
const DECIMAL_FLOOR: f64 = 1e-22;

/// Render a price for display.
///
/// - `|v| >= 1`: two decimals, half away from zero (`1234.5` → `"1234.50"`).
/// - `0 < |v| < 1`: six significant digits, trailing zeros trimmed, at least
///   two decimals (`0.000123` → `"0.000123"`, `0.5` → `"0.50"`).
/// - zero → `"0.00"`; NaN / infinity → `"-"`.
/// - magnitudes too small for `Decimal` keep six significant digits too
///   (`1e-30` → `"0.000000000000000000000000000001"`), never `"0.00"`.
pub fn format_price(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    if value == 0.0 {
        return "0.00".to_string();
    }

    let d = match Decimal::from_f64(value) {
        Some(d) if value.abs() >= DECIMAL_FLOOR && !d.is_zero() => d,
        _ => return format_fixed(value),
    };

    let mut out = if d.abs() >= Decimal::ONE {
        d.round_dp_with_strategy(PRICE_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
    } else {
        d.round_sf_with_strategy(SMALL_PRICE_SIG_DIGITS, RoundingStrategy::MidpointAwayFromZero)
            .unwrap_or(d)
            .normalize()
    };

    if out.scale() < PRICE_DECIMALS {
        out.rescale(PRICE_DECIMALS);
    }
    out.to_string()
}

/// Fixed-point `f64` rendering for magnitudes `Decimal` cannot hold to six
/// significant digits, at either end of its range.
fn format_fixed(value: f64) -> String {
    let magnitude = value.abs().log10().floor() as i32;
    let dp = (SMALL_PRICE_SIG_DIGITS as i32 - 1 - magnitude).max(PRICE_DECIMALS as i32) as usize;
    let mut out = format!("{value:.dp$}");
    if let Some(dot) = out.find('.') {
        let keep = out
            .trim_end_matches('0')
            .len()
            .max(dot + 1 + PRICE_DECIMALS as usize);
        out.truncate(keep);
    }
    out
}

/// Render a 24h percentage change with an explicit sign: `"+1.23%"`.
pub fn format_change(percent: f64) -> String {
    if !percent.is_finite() {
        return "-".to_string();
    }
    format!("{percent:+.2}%")
}

/// Compact rendering for market cap and volume accessories: `"1.23B"`.
pub fn format_compact(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    let abs = value.abs();
    if abs >= 1e12 {
        format!("{:.2}T", value / 1e12)
    } else if abs >= 1e9 {
        format!("{:.2}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2}M", value / 1e6)
    } else if abs >= 1e3 {
        format!("{:.2}K", value / 1e3)
    } else {
        format_price(value)
    }
}
