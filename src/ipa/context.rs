//! Shared IPA state
//!
//! Three kinds of state are shared by the algorithms:
//!
//! * [`SessionConfiguration`] is computed at `configure()` and read-only
//!   while streaming.
//! * [`ActiveState`] holds the most recent result of each algorithm. It is
//!   what the next `prepare()` applies, whatever frame produced it.
//! * [`FrameContext`] records what was requested and what was applied for
//!   one frame. It lives in the [`FcQueue`](crate::ipa::FcQueue).
//!
//! Algorithms never call each other. Where one consumes the output of
//! another it reads the other's substructure:
//!
//! * The BNR block written by AWB in `prepare()` takes its white balance
//!   gains from `awb.gains`, so AWB owns both the AWB and BNR
//!   configuration.
//! * The sensor controls reported after `process()` read `agc.exposure`
//!   and `agc.gain`.
//!
//! Tone mapping and colour processing read nothing from other algorithms.

use std::time::Duration;

use crate::ipa::config::{IpaConfig, SensorInfo, Size};
use crate::ipa::fc_queue::{FrameContextRecord, IpaFrameContext};
use crate::ipa::fixed_point::{Q, UQ};
use crate::ipa::params::GAMMA_CORR_LUT_ENTRIES;
use crate::ipa::stats::GridConfig;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionConfiguration {
    pub grid: GridConfig,
    pub bds_output_size: Size,
    pub sensor: SensorInfo,
    pub line_duration: Duration,
    pub tuning: IpaConfig,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AwbGains {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl Default for AwbGains {
    fn default() -> Self {
        Self {
            red: 1.0,
            green: 1.0,
            blue: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AwbState {
    pub gains: AwbGains,
    pub temperature_k: f64,
}

impl Default for AwbState {
    fn default() -> Self {
        Self {
            gains: AwbGains::default(),
            temperature_k: 4500.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgcState {
    /// Exposure in lines.
    pub exposure: u32,
    pub gain: f64,
    pub locked: bool,
}

impl Default for AgcState {
    fn default() -> Self {
        Self {
            exposure: 0,
            gain: 1.0,
            locked: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToneMappingState {
    /// Gamma requested by the application. In a frame context, the value
    /// of the request for that frame. In the active state, the last request
    /// applied, which stays in force until another one is applied.
    pub requested_gamma: Option<f64>,
    /// Gamma `lut` was computed for, 0 when no table has been computed.
    pub gamma: f64,
    pub lut: [u16; GAMMA_CORR_LUT_ENTRIES],
}

impl Default for ToneMappingState {
    fn default() -> Self {
        Self {
            requested_gamma: None,
            gamma: 0.0,
            lut: [0; GAMMA_CORR_LUT_ENTRIES],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CprocState {
    pub brightness: Q<1, 7>,
    pub contrast: UQ<1, 7>,
    pub hue: Q<1, 7>,
    pub saturation: UQ<1, 7>,
    /// Whether the registers differ from the previous request.
    pub update: bool,
}

impl Default for CprocState {
    fn default() -> Self {
        Self {
            brightness: Q::from_float(0.0),
            contrast: UQ::from_float(1.0),
            hue: Q::from_float(0.0),
            saturation: UQ::from_float(1.0),
            update: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveState {
    pub awb: AwbState,
    pub agc: AgcState,
    pub tone_mapping: ToneMappingState,
    pub cproc: CprocState,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IpaContext {
    pub configuration: SessionConfiguration,
    pub active_state: ActiveState,
}

/// Sensor settings a frame was captured with.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorState {
    pub exposure: u32,
    pub gain: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameContext {
    pub base: IpaFrameContext,
    pub awb: AwbState,
    pub agc: AgcState,
    pub tone_mapping: ToneMappingState,
    pub cproc: CprocState,
    pub sensor: SensorState,
}

impl FrameContextRecord for FrameContext {
    fn base(&self) -> &IpaFrameContext {
        &self.base
    }

    fn base_mut(&mut self) -> &mut IpaFrameContext {
        &mut self.base
    }
}
