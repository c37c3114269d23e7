//! Forward-return horizons and their trading-day offsets.
//!
//! The canonical set covers one week to ten years using the usual
//! trading-day approximations (21 days per month, 252 per year). Anything
//! outside the canonical set is parsed as `<integer><unit>` on demand.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical horizon labels with their trading-day offsets.
pub const CANONICAL_HORIZONS: [(&str, usize); 8] = [
    ("1W", 5),
    ("1M", 21),
    ("3M", 63),
    ("6M", 126),
    ("1Y", 252),
    ("3Y", 756),
    ("5Y", 1260),
    ("10Y", 2520),
];

/// Horizon labels that carry a CAGR annualization, with their year counts.
const CAGR_YEARS: [(&str, f64); 3] = [("3Y", 3.0), ("5Y", 5.0), ("10Y", 10.0)];

/// A named forward-looking window measured in trading days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Horizon {
    label: String,
    days: usize,
}

/// Returned when a horizon label cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid period format: {label}")]
pub struct HorizonParseError {
    /// The label that failed to parse.
    pub label: String,
}

impl Horizon {
    /// Parses a horizon label.
    ///
    /// Canonical labels resolve through the fixed table; anything else must
    /// be `<integer><unit>` with unit one of D, W, M, Y (case-insensitive),
    /// mapping to 1, 5, 21, and 252 trading days respectively.
    ///
    /// # Errors
    ///
    /// Returns [`HorizonParseError`] when the label is not a canonical name
    /// and does not match the `<integer><unit>` form.
    pub fn parse(label: &str) -> Result<Self, HorizonParseError> {
        let trimmed = label.trim();
        for (name, days) in CANONICAL_HORIZONS {
            if trimmed.eq_ignore_ascii_case(name) {
                return Ok(Self {
                    label: name.to_string(),
                    days,
                });
            }
        }

        let err = || HorizonParseError {
            label: label.to_string(),
        };

        let unit = trimmed.chars().last().ok_or_else(err)?;
        let digits = &trimmed[..trimmed.len() - unit.len_utf8()];
        let count: usize = digits.parse().map_err(|_| err())?;
        if count == 0 {
            return Err(err());
        }
        let per_unit = match unit.to_ascii_uppercase() {
            'D' => 1,
            'W' => 5,
            'M' => 21,
            'Y' => 252,
            _ => return Err(err()),
        };

        Ok(Self {
            label: trimmed.to_uppercase(),
            days: count * per_unit,
        })
    }

    /// The normalized label, e.g. `"3M"`.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Offset in trading days.
    #[must_use]
    pub fn days(&self) -> usize {
        self.days
    }

    /// Years used for CAGR annualization, present only for 3Y/5Y/10Y.
    #[must_use]
    pub fn cagr_years(&self) -> Option<f64> {
        CAGR_YEARS
            .iter()
            .find(|(name, _)| *name == self.label)
            .map(|(_, years)| *years)
    }

    /// All canonical horizons in ascending order.
    #[must_use]
    pub fn canonical() -> Vec<Self> {
        CANONICAL_HORIZONS
            .iter()
            .map(|(name, days)| Self {
                label: (*name).to_string(),
                days: *days,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_labels_resolve_to_fixed_offsets() {
        for (label, days) in CANONICAL_HORIZONS {
            let horizon = Horizon::parse(label).unwrap();
            assert_eq!(horizon.days(), days, "offset for {label}");
            assert_eq!(horizon.label(), label);
        }
    }

    #[test]
    fn custom_labels_parse_by_unit() {
        assert_eq!(Horizon::parse("10D").unwrap().days(), 10);
        assert_eq!(Horizon::parse("2W").unwrap().days(), 10);
        assert_eq!(Horizon::parse("2M").unwrap().days(), 42);
        assert_eq!(Horizon::parse("2Y").unwrap().days(), 504);
    }

    #[test]
    fn lowercase_units_are_accepted() {
        assert_eq!(Horizon::parse("2y").unwrap().days(), 504);
        assert_eq!(Horizon::parse("1w").unwrap().days(), 5);
    }

    #[test]
    fn garbage_labels_are_rejected() {
        assert!(Horizon::parse("").is_err());
        assert!(Horizon::parse("Y").is_err());
        assert!(Horizon::parse("3X").is_err());
        assert!(Horizon::parse("0M").is_err());
        assert!(Horizon::parse("-1M").is_err());
        assert!(Horizon::parse("three months").is_err());
    }

    #[test]
    fn cagr_years_only_for_multi_year_canonicals() {
        assert_eq!(Horizon::parse("3Y").unwrap().cagr_years(), Some(3.0));
        assert_eq!(Horizon::parse("5Y").unwrap().cagr_years(), Some(5.0));
        assert_eq!(Horizon::parse("10Y").unwrap().cagr_years(), Some(10.0));
        assert_eq!(Horizon::parse("1Y").unwrap().cagr_years(), None);
        assert_eq!(Horizon::parse("2Y").unwrap().cagr_years(), None);
    }
}
