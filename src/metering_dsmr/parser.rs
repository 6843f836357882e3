use log::debug;

use super::structs::MeterReading;
use super::DsmrError;

const OBIS_TIMESTAMP: &str = "0-0:1.0.0";
const OBIS_DELIVERED_TARIFF1: &str = "1-0:1.8.1";
const OBIS_DELIVERED_TARIFF2: &str = "1-0:1.8.2";
const OBIS_RETURNED_TARIFF1: &str = "1-0:2.8.1";
const OBIS_RETURNED_TARIFF2: &str = "1-0:2.8.2";
const OBIS_POWER_DELIVERED: &str = "1-0:1.7.0";
const OBIS_POWER_RETURNED: &str = "1-0:2.7.0";

/// Extract the reading from a telegram payload. The first line is the
/// identification, everything after is OBIS data lines. All seven fields
/// have to be present, a meter that sends less is not usable here.
pub fn parse_reading(payload: &str) -> Result<MeterReading, DsmrError> {
    let mut timestamp: Option<String> = None;
    let mut delivered_tariff1: Option<f64> = None;
    let mut delivered_tariff2: Option<f64> = None;
    let mut returned_tariff1: Option<f64> = None;
    let mut returned_tariff2: Option<f64> = None;
    let mut power_delivered: Option<f64> = None;
    let mut power_returned: Option<f64> = None;

    for line in payload.lines().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (code, value) = match parse_obis_line(line) {
            Ok(pair) => pair,
            Err(_) => {
                debug!("Skipping line without OBIS structure: {line:?}");
                continue;
            }
        };

        match code {
            OBIS_TIMESTAMP => timestamp = Some(value.to_string()),
            OBIS_DELIVERED_TARIFF1 => delivered_tariff1 = Some(numeric_value(code, value)?),
            OBIS_DELIVERED_TARIFF2 => delivered_tariff2 = Some(numeric_value(code, value)?),
            OBIS_RETURNED_TARIFF1 => returned_tariff1 = Some(numeric_value(code, value)?),
            OBIS_RETURNED_TARIFF2 => returned_tariff2 = Some(numeric_value(code, value)?),
            OBIS_POWER_DELIVERED => power_delivered = Some(numeric_value(code, value)?),
            OBIS_POWER_RETURNED => power_returned = Some(numeric_value(code, value)?),
            _ => {}
        }
    }

    return Ok(MeterReading {
        timestamp: timestamp.ok_or(DsmrError::MissingField(OBIS_TIMESTAMP))?,
        energy_delivered_tariff1: delivered_tariff1
            .ok_or(DsmrError::MissingField(OBIS_DELIVERED_TARIFF1))?,
        energy_delivered_tariff2: delivered_tariff2
            .ok_or(DsmrError::MissingField(OBIS_DELIVERED_TARIFF2))?,
        energy_returned_tariff1: returned_tariff1
            .ok_or(DsmrError::MissingField(OBIS_RETURNED_TARIFF1))?,
        energy_returned_tariff2: returned_tariff2
            .ok_or(DsmrError::MissingField(OBIS_RETURNED_TARIFF2))?,
        power_delivered: power_delivered.ok_or(DsmrError::MissingField(OBIS_POWER_DELIVERED))?,
        power_returned: power_returned.ok_or(DsmrError::MissingField(OBIS_POWER_RETURNED))?,
    });
}

/* Example formats:
   1-0:1.8.1(002074.842*kWh)
   0-0:1.0.0(240101123000W) */
fn parse_obis_line(line: &str) -> Result<(&str, &str), DsmrError> {
    let paren_start = line
        .find('(')
        .ok_or_else(|| DsmrError::InvalidDataLine(line.to_string()))?;
    let paren_end = line
        .rfind(')')
        .ok_or_else(|| DsmrError::InvalidDataLine(line.to_string()))?;

    if paren_start >= paren_end {
        return Err(DsmrError::InvalidDataLine(line.to_string()));
    }

    return Ok((&line[..paren_start], &line[paren_start + 1..paren_end]));
}

/* Extract the number in front of the unit from strings like "001.193*kW" */
fn numeric_value(code: &str, value: &str) -> Result<f64, DsmrError> {
    let cleaned: String = value
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+')
        .collect();

    return cleaned.parse::<f64>().map_err(|_| DsmrError::InvalidNumber {
        code: code.to_string(),
        value: value.to_string(),
    });
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

    #[test]
    fn test_parse_reference_payload() {
        let reading = parse_reading(SAMPLE_PAYLOAD).unwrap();
        assert_eq!(reading.timestamp, "240101123000W");
        assert_eq!(reading.energy_delivered_tariff1, 2074.842);
        assert_eq!(reading.energy_delivered_tariff2, 1234.567);
        assert_eq!(reading.energy_returned_tariff1, 50.0);
        assert_eq!(reading.energy_returned_tariff2, 40.0);
        assert_eq!(reading.power_delivered, 1.193);
        assert_eq!(reading.power_returned, 0.0);
        assert_eq!(reading.net_power(), 1.193);
    }

    #[test]
    fn test_missing_register_is_rejected() {
        let payload = SAMPLE_PAYLOAD
            .lines()
            .filter(|line| !line.starts_with("1-0:2.7.0"))
            .collect::<Vec<_>>()
            .join("\r\n");

        let result = parse_reading(&payload);
        assert!(matches!(result, Err(DsmrError::MissingField("1-0:2.7.0"))));
    }

    #[test]
    fn test_lines_without_obis_structure_are_skipped() {
        let payload = format!("{}some stray line\r\n", SAMPLE_PAYLOAD);
        assert!(parse_reading(&payload).is_ok());
    }

    #[test]
    fn test_unparsable_number_is_an_error() {
        let payload = SAMPLE_PAYLOAD.replace("(01.193*kW)", "(*kW)");
        let result = parse_reading(&payload);
        assert!(matches!(result, Err(DsmrError::InvalidNumber { .. })));
    }

    #[test]
    fn test_parse_obis_line() {
        let (code, value) = parse_obis_line("1-0:1.8.1(002074.842*kWh)").unwrap();
        assert_eq!(code, "1-0:1.8.1");
        assert_eq!(value, "002074.842*kWh");
    }
}
