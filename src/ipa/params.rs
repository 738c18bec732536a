//! ISP parameter buffer
//!
//! Accelerator configuration blocks written by the algorithms in their
//! `prepare` phase. Only blocks whose bit is set in
//! [`ParamsBuffer::use_flags`] are applied by the ISP.

use bitflags::bitflags;

use crate::ipa::fixed_point::UQ;
use crate::ipa::stats::GridConfig;

/// Number of entries of the gamma correction table.
pub const GAMMA_CORR_LUT_ENTRIES: usize = 256;

/// Count saturated pixels in the AWB statistics.
pub const AWB_RGBS_THR_B_INCL_SAT: u16 = 1 << 15;
/// Enable thresholding of the AWB statistics.
pub const AWB_RGBS_THR_B_EN: u16 = 1 << 14;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct UseFlags: u32 {
        const ACC_AWB = 1 << 0;
        const ACC_BNR = 1 << 1;
        const ACC_CCM = 1 << 2;
        const ACC_GAMMA = 1 << 3;
        const ACC_CPROC = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AwbConfig {
    pub rgbs_thr_gr: u16,
    pub rgbs_thr_r: u16,
    pub rgbs_thr_gb: u16,
    /// Threshold in the low bits, enable flags in the high ones.
    pub rgbs_thr_b: u16,
    pub grid: GridConfig,
}

/// White balance gains applied by the Bayer noise reduction block.
///
/// Red and blue are UQ4.12 codes, both greens are UQ12.4 codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WbGains {
    pub gr: u16,
    pub r: u16,
    pub b: u16,
    pub gb: u16,
}

impl WbGains {
    pub fn from_gains(red: f64, green: f64, blue: f64) -> Self {
        let green = UQ::<12, 4>::from_float(green as f32).quantized();
        Self {
            gr: green,
            r: UQ::<4, 12>::from_float(red as f32).quantized(),
            b: UQ::<4, 12>::from_float(blue as f32).quantized(),
            gb: green,
        }
    }
}

impl Default for WbGains {
    fn default() -> Self {
        Self {
            gr: 16,
            r: 16,
            b: 16,
            gb: 16,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BnrOpticalCenter {
    pub x_reset: i32,
    pub y_reset: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BnrOpticalCenterSqr {
    pub x_sqr_reset: u32,
    pub y_sqr_reset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BnrConfig {
    pub wb_gains: WbGains,
    pub wb_gains_thr: [u8; 4],
    pub thr_coeffs: [u16; 6],
    pub thr_ctrl_shd: [u8; 4],
    pub opt_center: BnrOpticalCenter,
    pub lut: [u8; 32],
    pub bp_ctrl: [u8; 9],
    pub dn_detect_ctrl: [u8; 11],
    pub column_size: u16,
    pub opt_center_sqr: BnrOpticalCenterSqr,
}

impl Default for BnrConfig {
    /// Kernel defaults.
    fn default() -> Self {
        Self {
            wb_gains: WbGains::default(),
            wb_gains_thr: [255; 4],
            thr_coeffs: [1700, 0, 31, 31, 0, 16],
            thr_ctrl_shd: [26; 4],
            opt_center: BnrOpticalCenter {
                x_reset: -648,
                y_reset: -366,
            },
            lut: [
                17, 23, 28, 32, 36, 39, 42, 45, 48, 51, 53, 55, 58, 60, 62, 64, 66, 68, 70, 72,
                73, 75, 77, 78, 80, 82, 83, 85, 86, 88, 89, 90,
            ],
            bp_ctrl: [20, 0, 1, 40, 0, 6, 0, 6, 0],
            dn_detect_ctrl: [9, 3, 4, 0, 8, 0, 1, 1, 1, 1, 0],
            column_size: 1296,
            opt_center_sqr: BnrOpticalCenterSqr {
                x_sqr_reset: 419_904,
                y_sqr_reset: 133_956,
            },
        }
    }
}

/// 3x4 colour correction matrix, coefficients in Q2.13 with 8191 ≈ 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcmConfig {
    pub coeffs: [i16; 12],
}

impl CcmConfig {
    pub const IDENTITY: Self = Self {
        coeffs: [8191, 0, 0, 0, 0, 8191, 0, 0, 0, 0, 8191, 0],
    };
}

impl Default for CcmConfig {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GammaConfig {
    pub enabled: bool,
    /// 13-bit output values.
    pub lut: [u16; GAMMA_CORR_LUT_ENTRIES],
}

impl Default for GammaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lut: [0; GAMMA_CORR_LUT_ENTRIES],
        }
    }
}

/// Colour processing registers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CprocConfig {
    pub enabled: bool,
    /// Q1.7
    pub brightness: u8,
    /// UQ1.7
    pub contrast: u8,
    /// Q1.7, fraction of 90 degrees with the sign inverted.
    pub hue: u8,
    /// UQ1.7
    pub saturation: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamsBuffer {
    pub use_flags: UseFlags,
    pub awb: AwbConfig,
    pub bnr: BnrConfig,
    pub ccm: CcmConfig,
    pub gamma: GammaConfig,
    pub cproc: CprocConfig,
}
