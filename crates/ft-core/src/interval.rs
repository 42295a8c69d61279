//! Half-open time intervals measured in seconds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::ValidationError;

/// A half-open time range `[begin, end)` in seconds.
///
/// Construction guarantees `0 <= begin < end` with both bounds finite, so
/// every `Interval` has a positive duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawInterval")]
pub struct Interval {
    begin: f64,
    end: f64,
}

#[derive(Deserialize)]
struct RawInterval {
    begin: f64,
    end: f64,
}

impl TryFrom<RawInterval> for Interval {
    type Error = ValidationError;

    fn try_from(raw: RawInterval) -> Result<Self, Self::Error> {
        Self::new(raw.begin, raw.end)
    }
}

impl Interval {
    /// Creates an interval after validation.
    pub fn new(begin: f64, end: f64) -> Result<Self, ValidationError> {
        if !begin.is_finite() || !end.is_finite() {
            return Err(ValidationError::NonFiniteInterval { begin, end });
        }
        if begin < 0.0 {
            return Err(ValidationError::NegativeBegin { begin });
        }
        if end <= begin {
            return Err(ValidationError::EmptyInterval { begin, end });
        }
        Ok(Self { begin, end })
    }

    /// Creates an interval from two endpoints given in either order.
    pub fn ordered(a: f64, b: f64) -> Result<Self, ValidationError> {
        if a <= b { Self::new(a, b) } else { Self::new(b, a) }
    }

    #[must_use]
    pub const fn begin(&self) -> f64 {
        self.begin
    }

    #[must_use]
    pub const fn end(&self) -> f64 {
        self.end
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end - self.begin
    }

    /// Whether two intervals share any instant. Touching endpoints do not.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.begin < other.end && other.begin < self.end
    }

    /// Whether `t` lies inside `[begin, end)`.
    #[must_use]
    pub fn contains(&self, t: f64) -> bool {
        self.begin <= t && t < self.end
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.begin, self.end)
    }
}

/// Sorts intervals (or anything carrying one) by begin time.
pub(crate) fn sort_by_begin<T>(items: &mut [T], interval: impl Fn(&T) -> &Interval) {
    items.sort_by(|a, b| interval(a).begin.total_cmp(&interval(b).begin));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(begin: f64, end: f64) -> Interval {
        Interval::new(begin, end).unwrap()
    }

    #[test]
    fn new_rejects_invalid_bounds() {
        assert!(matches!(
            Interval::new(-1.0, 2.0),
            Err(ValidationError::NegativeBegin { .. })
        ));
        assert!(matches!(
            Interval::new(3.0, 3.0),
            Err(ValidationError::EmptyInterval { .. })
        ));
        assert!(matches!(
            Interval::new(4.0, 2.0),
            Err(ValidationError::EmptyInterval { .. })
        ));
        assert!(matches!(
            Interval::new(0.0, f64::NAN),
            Err(ValidationError::NonFiniteInterval { .. })
        ));
        assert!(Interval::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    #[expect(clippy::float_cmp, reason = "exact endpoints are copied, not computed")]
    fn ordered_swaps_endpoints() {
        let interval = Interval::ordered(8.0, 2.0).unwrap();
        assert_eq!(interval.begin(), 2.0);
        assert_eq!(interval.end(), 8.0);
        assert!(Interval::ordered(5.0, 5.0).is_err());
    }

    #[test]
    fn overlap_is_half_open() {
        assert!(iv(0.0, 10.0).overlaps(&iv(5.0, 8.0)));
        assert!(iv(5.0, 8.0).overlaps(&iv(0.0, 10.0)));
        assert!(iv(0.0, 10.0).overlaps(&iv(9.5, 12.0)));
        assert!(!iv(0.0, 10.0).overlaps(&iv(10.0, 12.0)));
        assert!(!iv(10.0, 12.0).overlaps(&iv(0.0, 10.0)));
        assert!(!iv(0.0, 1.0).overlaps(&iv(2.0, 3.0)));
    }

    #[test]
    fn contains_excludes_end() {
        let interval = iv(1.0, 2.0);
        assert!(interval.contains(1.0));
        assert!(interval.contains(1.5));
        assert!(!interval.contains(2.0));
        assert!(!interval.contains(0.5));
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let parsed: Interval = serde_json::from_str(r#"{"begin":1.0,"end":2.5}"#).unwrap();
        assert_eq!(parsed, iv(1.0, 2.5));
        let result: Result<Interval, _> = serde_json::from_str(r#"{"begin":3.0,"end":2.0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn sort_by_begin_orders_intervals() {
        let mut items = vec![iv(5.0, 6.0), iv(0.0, 1.0), iv(2.0, 3.0)];
        sort_by_begin(&mut items, |i| i);
        assert_eq!(items, vec![iv(0.0, 1.0), iv(2.0, 3.0), iv(5.0, 6.0)]);
    }
}
