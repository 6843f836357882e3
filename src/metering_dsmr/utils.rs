use crc16::{State, ARC};
use log::warn;

use super::DsmrError;

/* '!' + 4 checksum digits + CR LF */
const TRAILER_LEN: usize = 7;

/* A sane meter never sends anything near this, give up on the buffer if it
 * grows past it without an end marker */
const MAX_TELEGRAM: usize = 8192;

/// Bytes strictly between the leading '/' and the final '!'.
pub fn extract_payload(telegram: &[u8]) -> Result<&[u8], DsmrError> {
    if telegram.first() != Some(&b'/') {
        return Err(DsmrError::MissingStart);
    }

    let bang = telegram
        .iter()
        .rposition(|&b| b == b'!')
        .ok_or(DsmrError::MissingEnd)?;

    return Ok(&telegram[1..bang]);
}

/// Check the checksum the meter appended after '!'. It covers everything
/// from '/' through '!' inclusive.
pub fn verify_crc(telegram: &[u8]) -> Result<(), DsmrError> {
    let bang = telegram
        .iter()
        .rposition(|&b| b == b'!')
        .ok_or(DsmrError::MissingEnd)?;

    if telegram.len() < bang + 5 {
        return Err(DsmrError::ChecksumMissing);
    }

    let expected = std::str::from_utf8(&telegram[bang + 1..bang + 5])
        .ok()
        .and_then(|hex| u16::from_str_radix(hex, 16).ok())
        .ok_or(DsmrError::ChecksumMissing)?;

    let computed = State::<ARC>::calculate(&telegram[..=bang]);
    if computed != expected {
        return Err(DsmrError::ChecksumMismatch { computed, expected });
    }

    return Ok(());
}

/// Reassembles complete telegrams from an arbitrarily chunked byte stream.
/// Noise in front of a '/' start marker is discarded, a telegram is
/// complete once the '!' plus checksum digits and CRLF have arrived.
pub struct TelegramAssembler {
    buffer: Vec<u8>,
}

impl TelegramAssembler {
    pub fn new() -> Self {
        return TelegramAssembler { buffer: Vec::new() };
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);

        let mut complete = Vec::new();
        loop {
            match self.buffer.iter().position(|&b| b == b'/') {
                Some(0) => {}
                Some(start) => {
                    self.buffer.drain(..start);
                }
                None => {
                    self.buffer.clear();
                    break;
                }
            }

            let bang = match self.buffer.iter().position(|&b| b == b'!') {
                Some(bang) => bang,
                None => {
                    if self.buffer.len() > MAX_TELEGRAM {
                        warn!("No end marker within {} bytes, discarding buffer", MAX_TELEGRAM);
                        self.buffer.clear();
                    }
                    break;
                }
            };

            let end = bang + TRAILER_LEN;
            if self.buffer.len() < end {
                break;
            }

            let telegram: Vec<u8> = self.buffer.drain(..end).collect();
            complete.push(telegram);
        }

        return complete;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PAYLOAD: &str = "ISK5\\2M550T-1012\r\n\r\n\
        1-3:0.2.8(50)\r\n\
        0-0:1.0.0(240101123000W)\r\n\
        1-0:1.8.1(002074.842*kWh)\r\n\
        1-0:1.8.2(001234.567*kWh)\r\n\
        1-0:2.8.1(000050.000*kWh)\r\n\
        1-0:2.8.2(000040.000*kWh)\r\n\
        1-0:1.7.0(01.193*kW)\r\n\
        1-0:2.7.0(00.000*kW)\r\n";

    fn sample_telegram() -> Vec<u8> {
        return format!("/{}!BCB2\r\n", SAMPLE_PAYLOAD).into_bytes();
    }

    #[test]
    fn test_verify_crc_accepts_reference_telegram() {
        assert!(verify_crc(&sample_telegram()).is_ok());
    }

    #[test]
    fn test_verify_crc_rejects_corruption() {
        let mut telegram = sample_telegram();
        telegram[10] ^= 0x01;
        assert!(matches!(
            verify_crc(&telegram),
            Err(DsmrError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_verify_crc_rejects_missing_trailer() {
        let telegram = b"/short!";
        assert!(matches!(verify_crc(telegram), Err(DsmrError::ChecksumMissing)));
    }

    #[test]
    fn test_extract_payload_strips_the_markers() {
        let payload = extract_payload(&sample_telegram()).unwrap().to_vec();
        assert_eq!(payload, SAMPLE_PAYLOAD.as_bytes());
    }

    #[test]
    fn test_extract_payload_requires_start_marker() {
        assert!(matches!(
            extract_payload(b"no marker here!0000\r\n"),
            Err(DsmrError::MissingStart)
        ));
    }

    #[test]
    fn test_assembler_whole_telegram_in_one_chunk() {
        let mut assembler = TelegramAssembler::new();
        let complete = assembler.push(&sample_telegram());
        assert_eq!(complete, vec![sample_telegram()]);
    }

    #[test]
    fn test_assembler_reassembles_small_chunks() {
        let telegram = sample_telegram();
        let mut assembler = TelegramAssembler::new();

        let mut complete = Vec::new();
        for chunk in telegram.chunks(7) {
            complete.extend(assembler.push(chunk));
        }

        assert_eq!(complete, vec![telegram]);
    }

    #[test]
    fn test_assembler_discards_leading_noise() {
        let mut stream = b"line noise before start".to_vec();
        stream.extend_from_slice(&sample_telegram());

        let mut assembler = TelegramAssembler::new();
        assert_eq!(assembler.push(&stream), vec![sample_telegram()]);
    }

    #[test]
    fn test_assembler_splits_back_to_back_telegrams() {
        let mut stream = sample_telegram();
        stream.extend_from_slice(&sample_telegram());

        let mut assembler = TelegramAssembler::new();
        let complete = assembler.push(&stream);
        assert_eq!(complete, vec![sample_telegram(), sample_telegram()]);
    }

    #[test]
    fn test_assembler_holds_incomplete_telegram() {
        let telegram = sample_telegram();
        let (head, tail) = telegram.split_at(telegram.len() - 3);

        let mut assembler = TelegramAssembler::new();
        assert!(assembler.push(head).is_empty());
        assert_eq!(assembler.push(tail), vec![telegram.clone()]);
    }
}
