use serde::Serialize;

use crate::config::GaugeConfig;

pub const RETURN_MAX_DEFAULT: f64 = 6.0;
pub const CONSUMPTION_MAX_DEFAULT: f64 = 18.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PowerDirection {
    Import,
    Export,
}

/// One fully recomputed dial position, no identity across calls.
#[derive(Debug, Clone, Serialize)]
pub struct GaugeState {
    /// Degrees, -90 at full return and 90 at full consumption. Not clamped,
    /// readings outside the calibrated range land outside that arc.
    pub angle: f64,
    pub direction: PowerDirection,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct GaugeCalibration {
    pub return_max: f64,
    pub consumption_max: f64,
    pub unit: String,
}

impl Default for GaugeCalibration {
    fn default() -> Self {
        return GaugeCalibration {
            return_max: RETURN_MAX_DEFAULT,
            consumption_max: CONSUMPTION_MAX_DEFAULT,
            unit: "kW".to_string(),
        };
    }
}

impl From<&GaugeConfig> for GaugeCalibration {
    fn from(config: &GaugeConfig) -> Self {
        return GaugeCalibration {
            return_max: config.return_max,
            consumption_max: config.consumption_max,
            unit: config.unit.clone(),
        };
    }
}

/// Map a signed net power reading onto the dial. Negative values are power
/// returned to the grid, positive values are consumption.
pub fn map(net_power: f64, calibration: &GaugeCalibration) -> GaugeState {
    let span = calibration.return_max + calibration.consumption_max;
    let angle = -90.0 + ((net_power + calibration.return_max) / span) * 180.0;

    let direction = match net_power < 0.0 {
        true => PowerDirection::Export,
        false => PowerDirection::Import,
    };

    /* Width 4 once the rounded magnitude reaches 10, width 3 below */
    let magnitude = net_power.abs();
    let width = match round_to(magnitude, 1) >= 10.0 {
        true => 4,
        false => 3,
    };
    let text = format!("{}{}", format_fixed(magnitude, 1, width), calibration.unit);

    return GaugeState { angle, direction, text };
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    /* f64::round ties away from zero, which is what the display wants */
    return (value * factor).round() / factor;
}

/// Fixed-point rendering with a minimum total width, space padded on the
/// left. Decoupled from any display call so it can be tested on its own.
pub fn format_fixed(value: f64, decimals: usize, min_width: usize) -> String {
    let rounded = round_to(value, decimals as i32);
    return format!("{:>width$.prec$}", rounded, width = min_width, prec = decimals);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_default_calibration_anchors() {
        let calibration = GaugeCalibration::default();
        assert_eq!(map(0.0, &calibration).angle, -45.0);
        assert_eq!(map(18.0, &calibration).angle, 90.0);
        assert_eq!(map(-6.0, &calibration).angle, -90.0);
    }

    #[test]
    fn test_map_does_not_clamp() {
        let calibration = GaugeCalibration::default();
        assert!(map(20.0, &calibration).angle > 90.0);
        assert!(map(-8.0, &calibration).angle < -90.0);
    }

    #[test]
    fn test_map_direction() {
        let calibration = GaugeCalibration::default();
        assert_eq!(map(-0.001, &calibration).direction, PowerDirection::Export);
        assert_eq!(map(-6.0, &calibration).direction, PowerDirection::Export);
        assert_eq!(map(0.0, &calibration).direction, PowerDirection::Import);
        assert_eq!(map(1.5, &calibration).direction, PowerDirection::Import);
    }

    #[test]
    fn test_map_text_crosses_ten_after_rounding() {
        let calibration = GaugeCalibration::default();
        assert_eq!(map(9.96, &calibration).text, "10.0kW");
    }

    #[test]
    fn test_map_text_below_ten() {
        let calibration = GaugeCalibration::default();
        assert_eq!(map(1.5, &calibration).text, "1.5kW");
        assert_eq!(map(-2.5, &calibration).text, "2.5kW");
    }

    #[test]
    fn test_format_fixed_rounds_half_away_from_zero() {
        assert_eq!(format_fixed(9.96, 1, 4), "10.0");
        assert_eq!(format_fixed(-1.25, 1, 1), "-1.3");
        assert_eq!(format_fixed(2.5, 0, 1), "3");
    }

    #[test]
    fn test_format_fixed_pads_to_minimum_width() {
        assert_eq!(format_fixed(0.5, 1, 5), "  0.5");
        assert_eq!(format_fixed(1.0, 1, 3), "1.0");
        assert_eq!(format_fixed(123.456, 3, 1), "123.456");
    }
}
