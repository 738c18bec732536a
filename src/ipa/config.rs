//! IPA configuration

use std::time::Duration;

use crate::ipa::common::{IpaError, Result};
use crate::ipa::fc_queue::MAX_FRAME_CONTEXTS;

/// Tuning of the IPA, fixed for the lifetime of an [`Ipu3Ipa`](crate::ipa::Ipu3Ipa).
#[derive(Debug, Clone, PartialEq)]
pub struct IpaConfig {
    /// Frames between queueing a request and preparing its parameters.
    /// Must stay below the frame context queue capacity.
    pub pipeline_delay: u32,
    /// Number of statistics grids that may be in flight.
    pub stats_pool_capacity: usize,
    /// Default gamma of the tone mapping curve.
    pub gamma: f64,
    /// Minimum number of unsaturated cells for an AWB zone to be used.
    pub awb_min_cells_per_zone: u32,
    /// Minimum average green level for an AWB zone to be used.
    pub awb_min_green_level: f64,
    /// Minimum number of usable zones to recompute the AWB gains.
    pub awb_min_valid_zones: usize,
}

impl Default for IpaConfig {
    fn default() -> Self {
        Self {
            pipeline_delay: 4,
            stats_pool_capacity: 4,
            gamma: 1.1,
            awb_min_cells_per_zone: 16,
            awb_min_green_level: 32.0,
            awb_min_valid_zones: 10,
        }
    }
}

impl IpaConfig {
    pub fn builder() -> IpaConfigBuilder {
        IpaConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline_delay as usize >= MAX_FRAME_CONTEXTS {
            return Err(IpaError::InvalidConfiguration(format!(
                "pipeline delay {} does not fit in {} frame contexts",
                self.pipeline_delay, MAX_FRAME_CONTEXTS
            )));
        }

        if self.stats_pool_capacity == 0 {
            return Err(IpaError::InvalidConfiguration(
                "statistics pool capacity must be at least 1".to_string(),
            ));
        }

        if self.gamma.is_nan() || self.gamma <= 0.0 {
            return Err(IpaError::InvalidConfiguration(format!(
                "gamma must be positive, got {}",
                self.gamma
            )));
        }

        Ok(())
    }
}

/// Builder for IpaConfig
#[derive(Default)]
pub struct IpaConfigBuilder {
    pipeline_delay: Option<u32>,
    stats_pool_capacity: Option<usize>,
    gamma: Option<f64>,
    awb_min_cells_per_zone: Option<u32>,
    awb_min_green_level: Option<f64>,
    awb_min_valid_zones: Option<usize>,
}

impl IpaConfigBuilder {
    pub fn pipeline_delay(mut self, frames: u32) -> Self {
        self.pipeline_delay = Some(frames);
        self
    }

    pub fn stats_pool_capacity(mut self, capacity: usize) -> Self {
        self.stats_pool_capacity = Some(capacity);
        self
    }

    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = Some(gamma);
        self
    }

    pub fn awb_min_cells_per_zone(mut self, cells: u32) -> Self {
        self.awb_min_cells_per_zone = Some(cells);
        self
    }

    pub fn awb_min_green_level(mut self, level: f64) -> Self {
        self.awb_min_green_level = Some(level);
        self
    }

    pub fn awb_min_valid_zones(mut self, zones: usize) -> Self {
        self.awb_min_valid_zones = Some(zones);
        self
    }

    pub fn build(self) -> IpaConfig {
        let default = IpaConfig::default();
        IpaConfig {
            pipeline_delay: self.pipeline_delay.unwrap_or(default.pipeline_delay),
            stats_pool_capacity: self.stats_pool_capacity.unwrap_or(default.stats_pool_capacity),
            gamma: self.gamma.unwrap_or(default.gamma),
            awb_min_cells_per_zone: self
                .awb_min_cells_per_zone
                .unwrap_or(default.awb_min_cells_per_zone),
            awb_min_green_level: self.awb_min_green_level.unwrap_or(default.awb_min_green_level),
            awb_min_valid_zones: self.awb_min_valid_zones.unwrap_or(default.awb_min_valid_zones),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Camera sensor timings and control limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorInfo {
    /// Line length in pixels, blanking included.
    pub line_length: u32,
    /// Pixel rate in Hz.
    pub pixel_rate: u64,
    pub output_height: u32,
    /// Default vertical blanking in lines.
    pub vblank: u32,
    /// Exposure limits in lines.
    pub min_exposure: u32,
    pub max_exposure: u32,
    pub min_gain: f64,
    pub max_gain: f64,
    /// Exposure in lines when streaming starts.
    pub exposure: u32,
    /// Analogue gain when streaming starts.
    pub gain: f64,
}

impl Default for SensorInfo {
    fn default() -> Self {
        Self {
            line_length: 3448,
            pixel_rate: 199_200_000,
            output_height: 1456,
            vblank: 94,
            min_exposure: 1,
            max_exposure: 1976,
            min_gain: 1.0,
            max_gain: 15.0,
            exposure: 100,
            gain: 1.0,
        }
    }
}

impl SensorInfo {
    pub fn line_duration(&self) -> Duration {
        Duration::from_secs_f64(f64::from(self.line_length) / self.pixel_rate as f64)
    }

    /// Frame duration with the default vertical blanking, in microseconds.
    pub fn frame_duration_us(&self) -> i64 {
        let frame_lines = u64::from(self.vblank) + u64::from(self.output_height);
        (u64::from(self.line_length) * frame_lines * 1_000_000 / self.pixel_rate) as i64
    }

    pub fn validate(&self) -> Result<()> {
        if self.pixel_rate == 0 || self.line_length == 0 {
            return Err(IpaError::InvalidConfiguration(
                "sensor line length and pixel rate must be non-zero".to_string(),
            ));
        }
        if self.min_exposure == 0 || self.min_exposure > self.max_exposure {
            return Err(IpaError::InvalidConfiguration(format!(
                "invalid exposure range {}..{}",
                self.min_exposure, self.max_exposure
            )));
        }
        if !self.min_gain.is_finite()
            || !self.max_gain.is_finite()
            || self.min_gain <= 0.0
            || self.min_gain > self.max_gain
        {
            return Err(IpaError::InvalidConfiguration(format!(
                "invalid gain range {}..{}",
                self.min_gain, self.max_gain
            )));
        }
        if !self.gain.is_finite() {
            return Err(IpaError::InvalidConfiguration(format!(
                "invalid initial gain {}",
                self.gain
            )));
        }
        Ok(())
    }
}

/// Per-session configuration handed to [`Ipu3Ipa::configure`](crate::ipa::Ipu3Ipa::configure).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IpaConfigInfo {
    /// Output size of the Bayer down scaler, the area statistics cover.
    pub bds_output_size: Size,
    pub sensor: SensorInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_fills_defaults() {
        let config = IpaConfig::builder().gamma(2.2).pipeline_delay(2).build();
        assert_eq!(config.gamma, 2.2);
        assert_eq!(config.pipeline_delay, 2);
        assert_eq!(config.stats_pool_capacity, 4);
        assert_eq!(config.awb_min_valid_zones, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_long_pipeline() {
        let config = IpaConfig::builder()
            .pipeline_delay(MAX_FRAME_CONTEXTS as u32)
            .build();
        assert!(matches!(
            config.validate(),
            Err(IpaError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(IpaConfig::builder().stats_pool_capacity(0).build().validate().is_err());
        assert!(IpaConfig::builder().gamma(0.0).build().validate().is_err());
        assert!(IpaConfig::builder().gamma(f64::NAN).build().validate().is_err());
    }

    #[test]
    fn test_sensor_timings() {
        let sensor = SensorInfo {
            line_length: 2000,
            pixel_rate: 100_000_000,
            output_height: 980,
            vblank: 20,
            ..Default::default()
        };
        assert!((sensor.line_duration().as_secs_f64() - 20e-6).abs() < 1e-12);
        assert_eq!(sensor.frame_duration_us(), 20_000);
        assert!(sensor.validate().is_ok());

        let broken = SensorInfo {
            pixel_rate: 0,
            ..sensor
        };
        assert!(broken.validate().is_err());
    }

    #[test]
    fn test_sensor_rejects_non_finite_gains() {
        for sensor in [
            SensorInfo {
                max_gain: f64::NAN,
                ..Default::default()
            },
            SensorInfo {
                max_gain: f64::INFINITY,
                ..Default::default()
            },
            SensorInfo {
                gain: f64::NAN,
                ..Default::default()
            },
        ] {
            assert!(matches!(
                sensor.validate(),
                Err(IpaError::InvalidConfiguration(_))
            ));
        }
    }
}
