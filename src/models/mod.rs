use std::time::Instant;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use tokio::sync::RwLock;

use crate::gauge::{format_fixed, GaugeState};

/// Latest computed numbers, shared between the dispatch loop (writer) and
/// the HTTP surface (reader).
#[derive(Clone)]
pub struct MeterStatus {
    pub net_power: f64,
    pub day_total: f64,
    pub day_total_text: String,
    pub gauge: Option<GaugeState>,
    pub last_reading: Option<DateTime<Utc>>,
    pub telegrams_received: u64,
    pub telegrams_dropped: u64,
    pub start_time: Instant,
}

impl MeterStatus {
    pub fn new() -> Self {
        return MeterStatus {
            net_power: 0.0,
            day_total: 0.0,
            day_total_text: "0.000kWh".to_string(),
            gauge: None,
            last_reading: None,
            telegrams_received: 0,
            telegrams_dropped: 0,
            start_time: Instant::now(),
        };
    }

    pub fn record_reading(&mut self, net_power: f64, day_total: f64, gauge: GaugeState) {
        self.net_power = net_power;
        self.day_total = day_total;
        self.day_total_text = format!("{}kWh", format_fixed(day_total, 3, 1));
        self.gauge = Some(gauge);
        self.last_reading = Some(Utc::now());
    }

    pub fn uptime_seconds(&self) -> u64 {
        return self.start_time.elapsed().as_secs();
    }
}

lazy_static! {
    pub static ref METER_STATUS: RwLock<MeterStatus> = RwLock::new(MeterStatus::new());
}

pub async fn get_meter_status() -> MeterStatus {
    return METER_STATUS.read().await.clone();
}
