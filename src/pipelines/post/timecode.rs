// SPDX-License-Identifier: GPL-3.0-only

//! Trim offsets
//!
//! Two forms are accepted, both full-string:
//!
//! - clock: `[HH:]MM:SS[.frac]`, minutes and seconds one or two digits below 60
//! - magnitude: `N[.frac][s|ms|us]`, seconds when no unit is given
//!
//! Both are valid ffmpeg duration syntax, so the text is passed on unchanged.

use std::fmt;
use std::str::FromStr;

/// A parsed time offset into the recording
#[derive(Debug, Clone, PartialEq)]
pub struct Offset {
    text: String,
    seconds: f64,
}

/// Why an offset was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetError(String);

impl fmt::Display for OffsetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' is not a valid time; use [HH:]MM:SS[.frac] or N[.frac][s|ms|us]",
            self.0
        )
    }
}

impl std::error::Error for OffsetError {}

impl Offset {
    pub fn parse(input: &str) -> Result<Self, OffsetError> {
        let text = input.trim();
        let seconds = if text.contains(':') {
            parse_clock(text)
        } else {
            parse_magnitude(text)
        }
        .ok_or_else(|| OffsetError(input.to_string()))?;

        Ok(Self {
            text: text.to_string(),
            seconds,
        })
    }

    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    /// Argument for `-ss` / `-to`
    pub fn ffmpeg_arg(&self) -> &str {
        &self.text
    }
}

impl FromStr for Offset {
    type Err = OffsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// `N[.frac]` as a number; a fraction needs digits on both sides
fn decimal(s: &str) -> Option<f64> {
    let valid = match s.split_once('.') {
        Some((int, frac)) => all_digits(int) && all_digits(frac),
        None => all_digits(s),
    };
    if valid { s.parse().ok() } else { None }
}

/// One- or two-digit clock field below 60
fn sexagesimal(s: &str) -> Option<u32> {
    if s.len() > 2 || !all_digits(s) {
        return None;
    }
    s.parse().ok().filter(|&v| v < 60)
}

fn parse_clock(text: &str) -> Option<f64> {
    let parts: Vec<&str> = text.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [m, s] => (0, *m, *s),
        [h, m, s] if all_digits(h) => (h.parse::<u64>().ok()?, *m, *s),
        _ => return None,
    };

    let minutes = sexagesimal(minutes)?;
    let (whole, frac) = match seconds.split_once('.') {
        Some((whole, frac)) if all_digits(frac) => (whole, Some(frac)),
        Some(_) => return None,
        None => (seconds, None),
    };
    let whole = sexagesimal(whole)?;
    let frac = match frac {
        Some(frac) => format!("0.{}", frac).parse::<f64>().ok()?,
        None => 0.0,
    };

    Some(hours as f64 * 3600.0 + f64::from(minutes) * 60.0 + f64::from(whole) + frac)
}

fn parse_magnitude(text: &str) -> Option<f64> {
    let (number, scale) = if let Some(n) = text.strip_suffix("ms") {
        (n, 1e-3)
    } else if let Some(n) = text.strip_suffix("us") {
        (n, 1e-6)
    } else if let Some(n) = text.strip_suffix('s') {
        (n, 1.0)
    } else {
        (text, 1.0)
    };
    decimal(number).map(|v| v * scale)
}
