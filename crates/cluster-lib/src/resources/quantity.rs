//! Kubernetes resource quantity parsing
//!
//! Handles the three suffix families of the Kubernetes quantity format:
//! - binary SI: `Ki`, `Mi`, `Gi`, `Ti`, `Pi`, `Ei`
//! - decimal SI: `n`, `u`, `m`, `k`, `M`, `G`, `T`, `P`, `E`
//! - decimal exponent: `1e3`, `5E-2`

use crate::error::QuantityError;

/// Parse a quantity string such as `"500m"`, `"16Gi"` or `"2"` into a float
pub fn parse_quantity(raw: &str) -> Result<f64, QuantityError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(QuantityError::Empty);
    }

    let split = raw
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '+' || c == '-'))))
        .map(|(i, _)| i)
        .unwrap_or(raw.len());
    let (number, suffix) = raw.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| QuantityError::Invalid(raw.to_string()))?;

    let scaled = match suffix {
        "" => value,
        "Ki" => value * 1024.0,
        "Mi" => value * 1024f64.powi(2),
        "Gi" => value * 1024f64.powi(3),
        "Ti" => value * 1024f64.powi(4),
        "Pi" => value * 1024f64.powi(5),
        "Ei" => value * 1024f64.powi(6),
        "n" => value / 1e9,
        "u" => value / 1e6,
        "m" => value / 1e3,
        "k" => value * 1e3,
        "M" => value * 1e6,
        "G" => value * 1e9,
        "T" => value * 1e12,
        "P" => value * 1e15,
        "E" => value * 1e18,
        other => {
            let exponent = other
                .strip_prefix('e')
                .or_else(|| other.strip_prefix('E'))
                .and_then(|e| e.parse::<i32>().ok())
                .ok_or_else(|| QuantityError::Invalid(raw.to_string()))?;
            if exponent >= 0 {
                value * 10f64.powi(exponent)
            } else {
                value / 10f64.powi(-exponent)
            }
        }
    };

    if scaled.is_finite() {
        Ok(scaled)
    } else {
        Err(QuantityError::Invalid(raw.to_string()))
    }
}
