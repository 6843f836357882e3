use std::time::Duration;

use log::{debug, error, info};
use thiserror::Error;
use tokio::sync::mpsc::Receiver;

use crate::config::ConfigBases;
use crate::gauge::{self, GaugeCalibration};
use crate::models::METER_STATUS;
use crate::relay::SharedConsumerSlot;
use crate::usage::{DayUsage, UsageError};
use crate::{get_config_or_panic, CONFIG};

pub mod parser;
pub mod structs;
pub mod utils;

pub use structs::MeterReading;

#[derive(Error, Debug)]
pub enum DsmrError {
    #[error("Telegram does not start with '/'")]
    MissingStart,
    #[error("Telegram has no '!' end marker")]
    MissingEnd,
    #[error("Telegram carries no parsable checksum trailer")]
    ChecksumMissing,
    #[error("Checksum mismatch, computed {computed:04X} but telegram says {expected:04X}")]
    ChecksumMismatch { computed: u16, expected: u16 },
    #[error("Telegram payload is not valid UTF-8")]
    InvalidEncoding,
    #[error("Malformed data line {0:?}")]
    InvalidDataLine(String),
    #[error("Unparsable value {value:?} for {code}")]
    InvalidNumber { code: String, value: String },
    #[error("Required field {0} is missing from the telegram")]
    MissingField(&'static str),
    #[error(transparent)]
    Usage(#[from] UsageError),
}

/// Receives reassembled telegrams from the source and runs the dispatch
/// cycle for each one: verify, parse, relay, aggregate, map. Strictly
/// sequential, one telegram at a time.
pub struct DsmrManager {
    receiver: Receiver<Vec<u8>>,
    slot: SharedConsumerSlot,
    usage: DayUsage,
    calibration: GaugeCalibration,
    write_timeout: Duration,
}

impl DsmrManager {
    pub fn new(receiver: Receiver<Vec<u8>>, slot: SharedConsumerSlot) -> Self {
        let gauge_config = get_config_or_panic!("gauge", ConfigBases::Gauge);
        let relay_config = get_config_or_panic!("relay", ConfigBases::Relay);

        return DsmrManager {
            receiver,
            slot,
            usage: DayUsage::new(),
            calibration: GaugeCalibration::from(&gauge_config),
            write_timeout: Duration::from_secs(relay_config.client_timeout),
        };
    }

    pub async fn start_thread(&mut self) {
        info!("Starting DSMR telegram processing");

        while let Some(raw) = self.receiver.recv().await {
            debug!("Received telegram of {} bytes", raw.len());
            METER_STATUS.write().await.telegrams_received += 1;

            if let Err(e) = self.process_telegram(&raw).await {
                error!("Dropping telegram: {e}");
                METER_STATUS.write().await.telegrams_dropped += 1;
            }
        }

        info!("Telegram channel closed, processing stops");
    }

    async fn process_telegram(&mut self, raw: &[u8]) -> Result<(), DsmrError> {
        utils::verify_crc(raw)?;
        let payload = utils::extract_payload(raw)?;
        let text = std::str::from_utf8(payload).map_err(|_| DsmrError::InvalidEncoding)?;
        let reading = parser::parse_reading(text)?;

        /* Forward the raw payload with a freshly computed checksum. The
           relay path does not depend on the aggregation below. */
        self.slot.lock().await.relay(payload, self.write_timeout).await;

        let day_total = self.usage.update(
            &reading.timestamp,
            reading.energy_delivered_tariff1,
            reading.energy_delivered_tariff2,
            reading.energy_returned_tariff1,
            reading.energy_returned_tariff2,
        )?;

        let net_power = reading.net_power();
        let gauge_state = gauge::map(net_power, &self.calibration);
        debug!(
            "Net power {net_power:.3}, day total {day_total:.3}, angle {:.1}",
            gauge_state.angle
        );

        METER_STATUS
            .write()
            .await
            .record_reading(net_power, day_total, gauge_state);

        return Ok(());
    }
}
