//! ==============================================================================
//! normalize.rs - raw record -> normalized reading
//! ==============================================================================
//!
//! purpose:
//!     turns a RawReading into a Reading:
//!     - epoch seconds -> millisecond timestamp
//!     - humidity / temperature -> whole numbers
//!     - millivolts -> volts with two decimals
//!
//! rounding:
//!     values are first rendered as a fixed-point string (half away from zero,
//!     applied to the exact binary value) and the integer fields are then
//!     parsed back out of that string. both steps are kept on purpose so that
//!     negative temperatures round the same way the dashboard always showed them.
//!
//! relationships:
//!     - used by: aggregate.rs (record_latest / record_historical)
//!
//! ==============================================================================

use crate::domain::{RawReading, Reading};
use crate::error::{ReadingError, Result};
use chrono::{DateTime, Utc};

/// largest magnitude a date can hold, in milliseconds (±100,000,000 days)
const MAX_TIME_MS: f64 = 8.64e15;

/// enough fractional digits to print any f64 exactly
const EXACT_DIGITS: usize = 1100;

/// normalize a raw record
///
/// never touches any state; fails only on non-finite or out-of-range fields.
pub fn normalize(raw: &RawReading) -> Result<Reading> {
    Ok(Reading {
        timestamp: decode_timestamp(raw.epoch_time)?,
        humidity: round_to_int("humidity", raw.humidity)?,
        temperature: round_to_int("temperature", raw.temperature)?,
        voltage: volts("voltage", raw.voltage)?,
    })
}

fn decode_timestamp(epoch_seconds: f64) -> Result<DateTime<Utc>> {
    let millis = (epoch_seconds * 1000.0).trunc();
    if !millis.is_finite() || millis.abs() > MAX_TIME_MS {
        return Err(ReadingError::malformed("epoch_time", epoch_seconds));
    }
    DateTime::from_timestamp_millis(millis as i64)
        .ok_or_else(|| ReadingError::malformed("epoch_time", epoch_seconds))
}

fn round_to_int(field: &'static str, value: f64) -> Result<i32> {
    if !value.is_finite() {
        return Err(ReadingError::malformed(field, value));
    }
    to_fixed(value, 0)
        .parse::<i32>()
        .map_err(|_| ReadingError::malformed(field, value))
}

fn volts(field: &'static str, millivolts: f64) -> Result<String> {
    if !millivolts.is_finite() {
        return Err(ReadingError::malformed(field, millivolts));
    }
    Ok(to_fixed(millivolts / 1000.0, 2))
}

/// render `value` with exactly `digits` fractional digits
///
/// rounds half away from zero on the exact binary value, keeps the sign of
/// negative inputs even when the result is zero (`-0.001` -> `"-0.00"`).
///
/// ```
/// use greenhouse_host::normalize::to_fixed;
///
/// assert_eq!(to_fixed(3.125, 2), "3.13");
/// assert_eq!(to_fixed(-2.5, 0), "-3");
/// // 1.005 is stored slightly below the halfway point
/// assert_eq!(to_fixed(1.005, 2), "1.00");
/// ```
pub fn to_fixed(value: f64, digits: usize) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value.abs() >= 1e21 {
        return value.to_string();
    }

    let exact = format!("{:.*}", EXACT_DIGITS, value.abs());
    let (int_part, frac_part) = exact.split_once('.').unwrap_or((exact.as_str(), ""));

    let mut kept: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes().take(digits))
        .collect();
    let round_up = frac_part.as_bytes().get(digits).is_some_and(|d| *d >= b'5');

    if round_up {
        let mut carry = true;
        for d in kept.iter_mut().rev() {
            if *d == b'9' {
                *d = b'0';
            } else {
                *d += 1;
                carry = false;
                break;
            }
        }
        if carry {
            kept.insert(0, b'1');
        }
    }

    let mut out = String::with_capacity(kept.len() + 2);
    if value < 0.0 {
        out.push('-');
    }
    let split = kept.len() - digits;
    out.extend(kept[..split].iter().map(|d| *d as char));
    if digits > 0 {
        out.push('.');
        out.extend(kept[split..].iter().map(|d| *d as char));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_fixed_rounds_half_away_from_zero() {
        assert_eq!(to_fixed(2.5, 0), "3");
        assert_eq!(to_fixed(-2.5, 0), "-3");
        assert_eq!(to_fixed(3.125, 2), "3.13");
        assert_eq!(to_fixed(0.5, 0), "1");
    }

    #[test]
    fn to_fixed_uses_the_exact_binary_value() {
        // 1.005 is stored as 1.00499999999999989...
        assert_eq!(to_fixed(1.005, 2), "1.00");
        assert_eq!(to_fixed(3.7, 2), "3.70");
    }

    #[test]
    fn to_fixed_carries_through_nines() {
        assert_eq!(to_fixed(9.995, 2), "9.99");
        assert_eq!(to_fixed(9.996, 2), "10.00");
        assert_eq!(to_fixed(99.5, 0), "100");
    }

    #[test]
    fn to_fixed_keeps_negative_sign_on_zero() {
        assert_eq!(to_fixed(-0.001, 2), "-0.00");
        assert_eq!(to_fixed(-0.4, 0), "-0");
        assert_eq!(to_fixed(-0.0, 0), "0");
    }

    #[test]
    fn negative_zero_parses_to_zero() {
        assert_eq!(round_to_int("temperature", -0.4), Ok(0));
    }

    #[test]
    fn rounding_matches_standard_rounding_for_non_negative_values() {
        for tenths in 0..1000 {
            let v = f64::from(tenths) / 10.0;
            assert_eq!(round_to_int("humidity", v), Ok(v.round() as i32), "value {v}");
        }
    }

    #[test]
    fn negative_temperatures_round_away_from_zero() {
        assert_eq!(round_to_int("temperature", -3.5), Ok(-4));
        assert_eq!(round_to_int("temperature", -3.4), Ok(-3));
    }

    #[test]
    fn normalize_scales_timestamp_and_voltage() {
        let raw = RawReading::new(1_700_000_000.0, 55.4, 21.6, 3700.0);
        let reading = normalize(&raw).unwrap();

        assert_eq!(reading.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(reading.humidity, 55);
        assert_eq!(reading.temperature, 22);
        assert_eq!(reading.voltage, "3.70");
    }

    #[test]
    fn normalize_rejects_non_finite_fields() {
        let raw = RawReading::new(1_700_000_000.0, f64::NAN, 21.6, 3700.0);
        assert!(matches!(
            normalize(&raw),
            Err(ReadingError::MalformedReading { field: "humidity", .. })
        ));

        let raw = RawReading::new(f64::INFINITY, 50.0, 21.6, 3700.0);
        assert!(matches!(
            normalize(&raw),
            Err(ReadingError::MalformedReading { field: "epoch_time", .. })
        ));
    }

    #[test]
    fn normalize_rejects_out_of_range_integers() {
        let raw = RawReading::new(1_700_000_000.0, 50.0, 1e12, 3700.0);
        assert!(matches!(
            normalize(&raw),
            Err(ReadingError::MalformedReading { field: "temperature", .. })
        ));
    }
}
