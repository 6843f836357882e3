use log::{debug, warn};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum UsageError {
    #[error("Timestamp {0:?} is too short to carry a day key")]
    TimestampFormat(String),
}

/// Register sums seen on the previous update. Absent until the first
/// reading after startup has been observed.
#[derive(Debug, Clone, Copy)]
struct Baseline {
    delivered: f64,
    returned: f64,
}

/// Running net energy total for the current day.
///
/// The cumulative tariff registers of the meter are monotonic counters, so
/// the day total is the accumulated first difference of (import - export)
/// between consecutive samples, reset whenever the date prefix of the
/// timestamp changes. The baseline starts out unset, which makes the first
/// sample after a process restart establish it without applying a delta --
/// the in-memory state says nothing about how far the counters moved while
/// we were gone.
pub struct DayUsage {
    day_key: String,
    day_total: f64,
    baseline: Option<Baseline>,
}

impl DayUsage {
    pub fn new() -> Self {
        return DayUsage {
            day_key: String::new(),
            day_total: 0.0,
            baseline: None,
        };
    }

    /// Fold one reading into the day total and return it. The timestamp
    /// must carry at least the 6 character date prefix used as day key.
    pub fn update(
        &mut self,
        timestamp: &str,
        delivered_tariff1: f64,
        delivered_tariff2: f64,
        returned_tariff1: f64,
        returned_tariff2: f64,
    ) -> Result<f64, UsageError> {
        let day_key = timestamp
            .get(..6)
            .ok_or_else(|| UsageError::TimestampFormat(timestamp.to_string()))?;

        /* Covers the very first call too, the stored key starts out empty */
        if day_key != self.day_key {
            debug!("Day boundary {} -> {}, total reset", self.day_key, day_key);
            self.day_key = day_key.to_string();
            self.day_total = 0.0;
        }

        let delivered = delivered_tariff1 + delivered_tariff2;
        let returned = returned_tariff1 + returned_tariff2;

        match self.baseline {
            Some(baseline) if delivered < baseline.delivered || returned < baseline.returned => {
                /* A monotonic register moved backwards, so the counter was
                 * reset or the meter replaced. Treat like a restart: this
                 * sample only re-establishes the baseline. */
                warn!(
                    "Cumulative registers moved backwards ({:.3}/{:.3} -> {:.3}/{:.3}), rebaselining",
                    baseline.delivered, baseline.returned, delivered, returned
                );
            }
            Some(baseline) => {
                self.day_total += (delivered - baseline.delivered) - (returned - baseline.returned);
            }
            None => {
                debug!("First reading, establishing baseline {delivered:.3}/{returned:.3}");
            }
        }

        self.baseline = Some(Baseline { delivered, returned });
        return Ok(self.day_total);
    }

    pub fn day_total(&self) -> f64 {
        return self.day_total;
    }
}
