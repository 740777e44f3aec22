//! Decimal helpers for prices, spreads and quantities

/// Tolerance absorbed before flooring so that 0.6 / 0.05 floors to 12, not 11.9999
const FLOOR_EPSILON: f64 = 1e-9;

/// Round to `decimals` places, halves away from zero
pub fn to_fixed(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Truncate towards negative infinity at `decimals` places
pub fn floor_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor + FLOOR_EPSILON).floor() / factor
}

/// Render a number for an exchange request: up to 8 decimals, no trailing zeros
pub fn format_decimal(value: f64) -> String {
    let rendered = format!("{:.8}", value);
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
