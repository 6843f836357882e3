use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc::Sender;
use tokio::time::sleep;

use crate::config::ConfigBases;
use crate::metering_dsmr::utils::TelegramAssembler;
use crate::{get_config_or_panic, CONFIG};

/// Connects to the serial-over-TCP bridge in front of the meter's P1 port
/// and feeds complete telegrams into the dispatch channel.
pub struct SourceManager {
    sender: Sender<Vec<u8>>,
}

impl SourceManager {
    pub fn new(sender: Sender<Vec<u8>>) -> Self {
        return SourceManager { sender };
    }

    pub async fn start_thread(&mut self) {
        let config = get_config_or_panic!("source", ConfigBases::Source);
        let address = format!("{}:{}", config.host, config.port);

        info!("P1 source reading from {address}");
        loop {
            match TcpStream::connect(&address).await {
                Ok(stream) => {
                    let _ = stream.set_nodelay(true);
                    info!("Connected to P1 source {address}");
                    self.read_telegrams(stream).await;
                    warn!("Lost connection to P1 source {address}");
                }
                Err(e) => {
                    error!("Unable to connect to P1 source {address}: {e}");
                }
            }

            sleep(Duration::from_secs(config.reconnect_interval)).await;
        }
    }

    /* Runs until the connection drops. Telegrams split across reads are
       reassembled before they go on the channel. */
    async fn read_telegrams(&self, mut stream: TcpStream) {
        let mut assembler = TelegramAssembler::new();
        let mut buf = [0u8; 2048];

        loop {
            match stream.read(&mut buf).await {
                Ok(0) => {
                    debug!("P1 source closed the connection");
                    return;
                }
                Ok(n) => {
                    for telegram in assembler.push(&buf[..n]) {
                        if self.sender.send(telegram).await.is_err() {
                            error!("Telegram channel is gone, stopping the source");
                            return;
                        }
                    }
                }
                Err(e) => {
                    error!("Read error on P1 source: {e}");
                    return;
                }
            }
        }
    }
}
