use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_yml;
use std::error::Error;
use std::fs::File;
use std::io::prelude::*;
use std::sync::RwLock;
use utoipa::ToSchema;

fn httpd_enabled_default() -> bool { return true }
fn httpd_port_default() -> u16 { return 8088 }

#[derive(Deserialize, Serialize, Clone, ToSchema)]
pub struct HttpdConfig {
    #[serde(default="httpd_enabled_default")]
    pub enabled: bool,
    #[serde(default="httpd_port_default")]
    pub port: u16
}

fn source_port_default() -> u16 { return 2001 }
fn source_reconnect_default() -> u64 { return 10 }

/// Where the meter's P1 byte stream comes from, a serial-over-TCP bridge.
#[derive(Deserialize, Serialize, Clone, ToSchema)]
pub struct SourceConfig {
    pub host: String,
    #[serde(default="source_port_default")]
    pub port: u16,
    #[serde(default="source_reconnect_default")]
    pub reconnect_interval: u64,
}

fn relay_enabled_default() -> bool { return true }
fn relay_port_default() -> u16 { return 2002 }
fn relay_client_timeout_default() -> u64 { return 5 }

#[derive(Deserialize, Serialize, Clone, ToSchema)]
pub struct RelayConfig {
    #[serde(default="relay_enabled_default")]
    pub enabled: bool,
    #[serde(default="relay_port_default")]
    pub port: u16,
    /* Seconds a write to the consumer may take before it counts as failed */
    #[serde(default="relay_client_timeout_default")]
    pub client_timeout: u64,
}

fn gauge_return_max_default() -> f64 { return crate::gauge::RETURN_MAX_DEFAULT }
fn gauge_consumption_max_default() -> f64 { return crate::gauge::CONSUMPTION_MAX_DEFAULT }
fn gauge_unit_default() -> String { return "kW".to_string() }

#[derive(Deserialize, Serialize, Clone, ToSchema)]
pub struct GaugeConfig {
    #[serde(default="gauge_return_max_default")]
    pub return_max: f64,
    #[serde(default="gauge_consumption_max_default")]
    pub consumption_max: f64,
    #[serde(default="gauge_unit_default")]
    pub unit: String,
}

fn httpd_default() -> HttpdConfig { return HttpdConfig { enabled: httpd_enabled_default(), port: httpd_port_default() } }
fn relay_default() -> RelayConfig { return RelayConfig { enabled: relay_enabled_default(), port: relay_port_default(), client_timeout: relay_client_timeout_default() } }
fn gauge_default() -> GaugeConfig { return GaugeConfig { return_max: gauge_return_max_default(), consumption_max: gauge_consumption_max_default(), unit: gauge_unit_default() } }

#[derive(Deserialize, Serialize, Clone)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default="relay_default")]
    pub relay: RelayConfig,
    #[serde(default="gauge_default")]
    pub gauge: GaugeConfig,
    #[serde(default="httpd_default")]
    pub httpd: HttpdConfig,
}

pub struct ConfigHolder {
    pub config: Config,
}

pub enum ConfigBases {
    Httpd(HttpdConfig),
    Source(SourceConfig),
    Relay(RelayConfig),
    Gauge(GaugeConfig),
}

impl ConfigHolder {
    pub fn load_from(path: &str) -> Result<Config, Box<dyn Error>> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let config: Config = serde_yml::from_str(&contents)?;
        return Ok(config);
    }

    pub fn load() -> Self {
        /* Check the two well known locations of the config file */
        let mut config = Self::load_from("config/p1gateway.yaml");
        if config.is_err() {
            config = Self::load_from("p1gateway.yaml");
        }

        let config = config
            .expect("Unable to read the config on config/p1gateway.yaml or p1gateway.yaml");
        return ConfigHolder { config };
    }

    pub fn get_copy(&self, base: &str) -> Result<ConfigBases, Box<dyn Error>> {
        match base {
            "httpd" => { return Ok(ConfigBases::Httpd(self.config.httpd.clone())) },
            "source" => { return Ok(ConfigBases::Source(self.config.source.clone())) },
            "relay" => { return Ok(ConfigBases::Relay(self.config.relay.clone())) },
            "gauge" => { return Ok(ConfigBases::Gauge(self.config.gauge.clone())) },
            _ => { Err("Type not known")? }
        }
    }

    pub fn get_complete_config(&self) -> Config {
        return self.config.clone();
    }
}

lazy_static! {
    pub static ref CONFIG: RwLock<ConfigHolder> = RwLock::new(ConfigHolder::load());
}

#[macro_export]
macro_rules! get_config_or_panic {
    ($base: expr, $pat: path) => {
        {
            let c = CONFIG.read().unwrap().get_copy($base).unwrap();
            if let $pat(a) = c {
                a
            } else {
                panic!(
                    "mismatch variant when cast to {}",
                    stringify!($pat));
            }
        }
    };
}
