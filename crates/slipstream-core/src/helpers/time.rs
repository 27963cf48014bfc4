// crates/slipstream-core/src/helpers/time.rs
//
// Canonical time base and conversions.
//
// Every comparison, seek target and queue message in the pipeline uses one
// fixed time base: microseconds since stream start ("canonical ts", i64).
// Sources hand out packets stamped in their own stream time base; the decode
// dispatch rescales once, and nothing downstream ever sees a stream-local
// timestamp again.

/// Ticks per second of the canonical time base.
pub const TIME_BASE: i64 = 1_000_000;

/// A rational stream time base, `num / den` seconds per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    /// The canonical microsecond time base itself.
    pub const MICROS: TimeBase = TimeBase { num: 1, den: 1_000_000 };

    pub fn new(num: i32, den: i32) -> Self {
        TimeBase { num, den }
    }

    /// Rescale a timestamp in this time base to canonical microseconds.
    ///
    /// The intermediate product runs in i128 so a 90 kHz timestamp hours into
    /// a stream cannot overflow.
    ///
    /// ```
    /// use slipstream_core::helpers::time::TimeBase;
    /// let tb = TimeBase::new(1, 90_000);            // MPEG-TS style
    /// assert_eq!(tb.to_canonical(90_000), 1_000_000); // 1 s
    /// assert_eq!(tb.to_canonical(45_000),   500_000); // 0.5 s
    /// ```
    pub fn to_canonical(&self, pts: i64) -> i64 {
        if self.den == 0 {
            return pts;
        }
        let micros = pts as i128 * self.num as i128 * TIME_BASE as i128 / self.den as i128;
        micros as i64
    }

    /// Rescale a canonical-microsecond timestamp back into this time base.
    ///
    /// ```
    /// use slipstream_core::helpers::time::TimeBase;
    /// let tb = TimeBase::new(1, 25);                // 25 fps frame index
    /// assert_eq!(tb.from_canonical(1_000_000), 25);
    /// ```
    pub fn from_canonical(&self, ts: i64) -> i64 {
        let num = self.num as i128 * TIME_BASE as i128;
        if num == 0 {
            return ts;
        }
        (ts as i128 * self.den as i128 / num) as i64
    }
}

/// Convert client seconds (IEEE double) to canonical microseconds.
///
/// ```
/// use slipstream_core::helpers::time::secs_to_ts;
/// assert_eq!(secs_to_ts(0.0), 0);
/// assert_eq!(secs_to_ts(1.5), 1_500_000);
/// ```
pub fn secs_to_ts(secs: f64) -> i64 {
    (secs * TIME_BASE as f64).round() as i64
}

/// Convert canonical microseconds to seconds for client-facing reporting.
pub fn ts_to_secs(ts: i64) -> f64 {
    ts as f64 / TIME_BASE as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_round_trip_at_common_rates() {
        for den in [25, 30, 60, 1_000, 90_000] {
            let tb = TimeBase::new(1, den);
            // one hour of ticks
            let pts = 3_600 * den as i64;
            assert_eq!(tb.to_canonical(pts), 3_600 * TIME_BASE);
            assert_eq!(tb.from_canonical(3_600 * TIME_BASE), pts);
        }
    }

    #[test]
    fn no_overflow_hours_into_a_90khz_stream() {
        let tb = TimeBase::new(1, 90_000);
        // 24 hours at 90 kHz
        let pts = 24 * 3_600 * 90_000i64;
        assert_eq!(tb.to_canonical(pts), 24 * 3_600 * TIME_BASE);
    }

    #[test]
    fn zero_den_passes_through() {
        let tb = TimeBase::new(0, 0);
        assert_eq!(tb.to_canonical(1234), 1234);
        assert_eq!(tb.from_canonical(1234), 1234);
    }

    #[test]
    fn secs_conversion_rounds() {
        assert_eq!(secs_to_ts(1.0 / 60.0), 16_667);
        assert!((ts_to_secs(16_667) - 1.0 / 60.0).abs() < 1e-6);
    }
}
