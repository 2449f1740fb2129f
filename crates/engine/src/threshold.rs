//! Count thresholds given either absolutely or as a percentage.
//!
//! Options such as `count: 3` or `count: "80%"` deserialize into a
//! [`Threshold`], which is resolved to a concrete number only once the total
//! population is known.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Hundredths of a percent in 100 %.
const FULL: u64 = 10_000;

/// A required count, absolute or relative to a total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawThreshold")]
pub enum Threshold {
    /// An exact number of items.
    Absolute(u64),
    /// Hundredths of a percent in `0..=10_000`, so `"16.1%"` is `1_610`.
    Percentage(u64),
}

impl Threshold {
    /// Resolve the threshold against a population of `total` items.
    ///
    /// Percentages round up, so `"50%"` of 3 requires 2.
    #[must_use]
    pub const fn required(&self, total: u64) -> u64 {
        match *self {
            Self::Absolute(count) => count,
            Self::Percentage(hundredths) => total.saturating_mul(hundredths).div_ceil(FULL),
        }
    }

    /// Check whether `count` out of `total` meets the threshold.
    #[must_use]
    pub const fn is_met(&self, count: u64, total: u64) -> bool {
        count >= self.required(total)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Absolute(count) => write!(f, "{count}"),
            Self::Percentage(hundredths) => {
                let (whole, fraction) = (hundredths / 100, hundredths % 100);
                match fraction {
                    0 => write!(f, "{whole}%"),
                    f10 if f10 % 10 == 0 => write!(f, "{whole}.{}%", f10 / 10),
                    _ => write!(f, "{whole}.{fraction:02}%"),
                }
            }
        }
    }
}

/// Parse `"16.1"` into hundredths (`1_610`). At most two decimals.
fn parse_hundredths(number: &str) -> Option<u64> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() || !digits(whole) || !digits(fraction) || fraction.len() > 2 {
        return None;
    }

    let whole: u64 = whole.parse().ok()?;
    let fraction: u64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<u64>().ok()?.checked_mul(10)?,
        _ => fraction.parse().ok()?,
    };
    whole.checked_mul(100)?.checked_add(fraction)
}

impl FromStr for Threshold {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.strip_suffix('%') {
            Some(number) => {
                let hundredths = parse_hundredths(number.trim()).ok_or_else(|| {
                    format!("'{s}' is not a valid percentage (at most two decimals)")
                })?;
                if hundredths > FULL {
                    return Err(format!("percentage '{s}' must be between 0% and 100%"));
                }
                Ok(Self::Percentage(hundredths))
            }
            None => trimmed
                .parse()
                .map(Self::Absolute)
                .map_err(|_| format!("'{s}' is neither a count nor a percentage like '80%'")),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawThreshold {
    Count(u64),
    Text(String),
}

impl TryFrom<RawThreshold> for Threshold {
    type Error = String;

    fn try_from(raw: RawThreshold) -> Result<Self, Self::Error> {
        match raw {
            RawThreshold::Count(count) => Ok(Self::Absolute(count)),
            RawThreshold::Text(text) => text.parse(),
        }
    }
}
