use chrono::{DateTime, Duration, Utc};

/// Lower bound for the next upstream fetch.
///
/// Owned by the ingestion loop, which is its only writer. Adding more ingestion
/// workers would need this replaced by a compare-and-swap cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermark {
    value: DateTime<Utc>,
}

impl Watermark {
    pub fn new(initial: DateTime<Utc>) -> Self {
        Self { value: initial }
    }

    /// Watermark set `lookback` before `now`, clamped to the earliest representable time.
    pub fn from_lookback(now: DateTime<Utc>, lookback: Duration) -> Self {
        Self::new(
            now.checked_sub_signed(lookback)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        )
    }

    pub fn get(&self) -> DateTime<Utc> {
        self.value
    }

    /// Moves the watermark to `candidate` if it is later. Never moves backwards.
    /// Returns whether the value changed.
    pub fn advance(&mut self, candidate: DateTime<Utc>) -> bool {
        if candidate > self.value {
            self.value = candidate;
            true
        } else {
            false
        }
    }
}
