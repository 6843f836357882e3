use std::sync::Arc;
use std::time::Duration;

use crc16::{State, ARC};
use log::{debug, error, info};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::config::ConfigBases;
use crate::{get_config_or_panic, CONFIG};

/// Checksum over '/', the payload and '!', the sequence the downstream
/// consumer verifies against the four hex digits that follow it.
pub fn telegram_checksum(payload: &[u8]) -> u16 {
    let mut state = State::<ARC>::new();
    state.update(b"/");
    state.update(payload);
    state.update(b"!");
    return state.get();
}

/// Wire framing: "/" + payload + "!" + HHHH + CRLF + NUL. The downstream
/// consumer depends on this layout bit for bit.
pub fn frame_telegram(payload: &[u8]) -> Vec<u8> {
    let checksum = telegram_checksum(payload);
    let mut frame = Vec::with_capacity(payload.len() + 9);
    frame.push(b'/');
    frame.extend_from_slice(payload);
    frame.push(b'!');
    frame.extend_from_slice(format!("{:04X}", checksum).as_bytes());
    frame.extend_from_slice(b"\r\n");
    frame.push(0x00);
    return frame;
}

/// The single downstream consumer slot. A new connection always wins and
/// the previous occupant is shut down before the replacement is installed,
/// there is no queueing and no multiplexing.
pub struct ConsumerSlot {
    active: Option<TcpStream>,
}

impl ConsumerSlot {
    pub fn new() -> Self {
        return ConsumerSlot { active: None };
    }

    pub fn is_attached(&self) -> bool {
        return self.active.is_some();
    }

    pub async fn replace(&mut self, stream: TcpStream) {
        if let Some(mut old) = self.active.take() {
            info!("New relay consumer, dropping the previous one");
            let _ = old.shutdown().await;
        }
        self.active = Some(stream);
    }

    /// Send one framed telegram to the consumer, if any. Write errors and
    /// timeouts are swallowed without touching the slot, the only recovery
    /// path is the acceptance of a new consumer.
    pub async fn relay(&mut self, payload: &[u8], write_timeout: Duration) {
        let stream = match self.active.as_mut() {
            Some(stream) => stream,
            None => return,
        };

        let frame = frame_telegram(payload);
        match tokio::time::timeout(write_timeout, stream.write_all(&frame)).await {
            Ok(Ok(_)) => debug!("Relayed {} bytes", frame.len()),
            Ok(Err(e)) => debug!("Relay write failed, ignoring: {e}"),
            Err(_) => debug!("Relay write timed out, ignoring"),
        }
    }
}

/* The accept loop and the telegram dispatch loop run on different tasks,
 * so the slot itself has to be behind a lock. */
pub type SharedConsumerSlot = Arc<Mutex<ConsumerSlot>>;

pub fn shared_slot() -> SharedConsumerSlot {
    return Arc::new(Mutex::new(ConsumerSlot::new()));
}

pub struct RelayManager {
    slot: SharedConsumerSlot,
}

impl RelayManager {
    pub fn new(slot: SharedConsumerSlot) -> Self {
        return RelayManager { slot };
    }

    pub async fn start_thread(&self) {
        let config = get_config_or_panic!("relay", ConfigBases::Relay);

        if !config.enabled {
            /* Park instead of returning, a finished task makes main shut
               down the whole gateway */
            info!("Telegram relay is disabled");
            loop {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }

        let listener = match TcpListener::bind(("0.0.0.0", config.port)).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Unable to listen for relay consumers on port {}: {e}", config.port);
                return;
            }
        };

        info!("Relay listening for consumers on port {}", config.port);
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    info!("Relay consumer connected from {peer}");
                    let _ = stream.set_nodelay(true);
                    self.slot.lock().await.replace(stream).await;
                }
                Err(e) => {
                    error!("Relay accept failed: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_checksum_reference_values() {
        assert_eq!(State::<ARC>::calculate(b"123456789"), 0xBB3D);
        assert_eq!(telegram_checksum(b"hello"), 0x87AA);
        /* The checksum is total, the empty payload has one too */
        assert_eq!(telegram_checksum(b""), 0x28DC);
    }

    #[test]
    fn test_checksum_is_deterministic() {
        assert_eq!(telegram_checksum(b"hello"), telegram_checksum(b"hello"));
    }

    #[test]
    fn test_frame_layout() {
        assert_eq!(frame_telegram(b"hello"), b"/hello!87AA\r\n\0");
    }

    async fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        return (client, server);
    }

    #[tokio::test]
    async fn test_relay_without_consumer_is_a_noop() {
        let mut slot = ConsumerSlot::new();
        assert!(!slot.is_attached());
        slot.relay(b"hello", Duration::from_secs(1)).await;
        assert!(!slot.is_attached());
    }

    #[tokio::test]
    async fn test_replace_detaches_previous_consumer() {
        let mut slot = ConsumerSlot::new();
        let (first, mut first_peer) = connected_pair().await;
        let (second, mut second_peer) = connected_pair().await;

        slot.replace(first).await;
        slot.replace(second).await;

        slot.relay(b"hello", Duration::from_secs(1)).await;

        /* The first consumer only ever sees the shutdown */
        let mut leftover = Vec::new();
        first_peer.read_to_end(&mut leftover).await.unwrap();
        assert!(leftover.is_empty());

        /* The second one gets the exact frame */
        let mut frame = vec![0u8; 14];
        second_peer.read_exact(&mut frame).await.unwrap();
        assert_eq!(frame, b"/hello!87AA\r\n\0");
    }

    #[tokio::test]
    async fn test_write_to_disconnected_consumer_is_ignored() {
        let mut slot = ConsumerSlot::new();
        let (stream, peer) = connected_pair().await;
        drop(peer);
        slot.replace(stream).await;

        slot.relay(b"hello", Duration::from_secs(1)).await;
        slot.relay(b"hello", Duration::from_secs(1)).await;

        /* The dead occupant stays in place until a new consumer arrives */
        assert!(slot.is_attached());
    }
}
