use serde::Serialize;

/// One parsed meter reading, immutable once constructed and consumed once
/// per dispatch cycle.
#[derive(Debug, Clone, Serialize)]
pub struct MeterReading {
    /// Raw timestamp from 0-0:1.0.0, e.g. "240101123000W". The first six
    /// characters are the day key.
    pub timestamp: String,
    /// Cumulative tariff registers in kWh, monotonic counters kept by the
    /// meter itself.
    pub energy_delivered_tariff1: f64,
    pub energy_delivered_tariff2: f64,
    pub energy_returned_tariff1: f64,
    pub energy_returned_tariff2: f64,
    /// Instantaneous power in kW, one register per direction.
    pub power_delivered: f64,
    pub power_returned: f64,
}

impl MeterReading {
    /// Net power, negative while returning to the grid.
    pub fn net_power(&self) -> f64 {
        return self.power_delivered - self.power_returned;
    }
}
