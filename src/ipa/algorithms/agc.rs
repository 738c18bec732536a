//! Mean based auto exposure and gain control
//!
//! The brightness of a frame is measured as the mean of the top 2% of the
//! green histogram of unsaturated cells. The total exposure (shutter time
//! multiplied by analogue gain) is scaled so that this mean reaches half of
//! the histogram range, then filtered to converge over several frames.
//! Shutter time is favoured over gain to keep noise low.

use tracing::{debug, instrument, trace};

use crate::ipa::algorithms::Algorithm;
use crate::ipa::common::Result;
use crate::ipa::config::IpaConfigInfo;
use crate::ipa::context::{AgcState, FrameContext, IpaContext};
use crate::ipa::controls::{ControlId, ControlList};
use crate::ipa::histogram::Histogram;
use crate::ipa::params::ParamsBuffer;
use crate::ipa::stats::RgbsGrid;

/// Frames to wait before the first estimation.
const INITIAL_FRAME_MIN_AE_COUNT: u32 = 4;
/// Frames between two estimations, letting the sensor apply the previous one.
const FRAME_SKIP_COUNT: u32 = 6;

const NUM_HISTOGRAM_BINS: usize = 256;
const EV_GAIN_TARGET: f64 = 0.5;

/// Filter speed far from the target. Closer than 20% the square root is
/// used to converge faster.
const FILTER_SPEED: f64 = 0.2;
const FAST_REDUCE_THRESHOLD: f64 = 0.4;

#[derive(Debug, Default)]
pub struct Agc {
    frame_count: u32,
    last_frame: u32,
    iq_mean: f64,
    /// Seconds.
    line_duration: f64,
    min_exposure: u32,
    max_exposure: u32,
    min_gain: f64,
    max_gain: f64,
    /// Filtered total exposure, in seconds times gain. Zero until the first
    /// estimation.
    filtered_exposure: f64,
    filtered_exposure_no_dg: f64,
}

impl Agc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Measures the frame brightness. Returns false, leaving the previous
    /// measurement in place, when no cell can be used.
    fn process_brightness(&mut self, stats: &RgbsGrid) -> bool {
        let mut hist = [0u32; NUM_HISTOGRAM_BINS];
        let mut count = 0;
        for cell in stats.cells.iter().take(stats.grid.cells()) {
            if !cell.is_saturated() {
                let green = (cell.green() as usize).min(NUM_HISTOGRAM_BINS - 1);
                hist[green] += 1;
                count += 1;
            }
        }

        if count == 0 {
            return false;
        }

        self.iq_mean = Histogram::new(&hist).inter_quantile_mean(0.98, 1.0);
        true
    }

    fn filter_exposure(&mut self, target: f64, target_no_dg: f64) {
        if self.filtered_exposure == 0.0 {
            self.filtered_exposure = target;
            self.filtered_exposure_no_dg = target_no_dg;
        } else {
            let mut speed = FILTER_SPEED;
            if self.filtered_exposure < 1.2 * target && self.filtered_exposure > 0.8 * target {
                speed = speed.sqrt();
            }

            self.filtered_exposure = speed * target + self.filtered_exposure * (1.0 - speed);
            self.filtered_exposure_no_dg =
                speed * target_no_dg + self.filtered_exposure_no_dg * (1.0 - speed);
        }

        // Without enough digital gain in the ISP to compensate, letting the
        // no-DG exposure drop far below the total one oscillates.
        let floor = self.filtered_exposure * FAST_REDUCE_THRESHOLD;
        if self.filtered_exposure_no_dg < floor {
            self.filtered_exposure_no_dg = floor;
        }

        trace!(total_exposure = self.filtered_exposure, "After filtering");
    }

    /// Updates `agc` towards the exposure target. Returns whether the frame
    /// was found correctly exposed.
    fn lock_exposure_gain(&mut self, agc: &mut AgcState) -> bool {
        if self.frame_count < INITIAL_FRAME_MIN_AE_COUNT
            || self.frame_count.wrapping_sub(self.last_frame) < FRAME_SKIP_COUNT
        {
            return agc.locked;
        }
        self.last_frame = self.frame_count;

        let target_mean = EV_GAIN_TARGET * NUM_HISTOGRAM_BINS as f64;
        if (self.iq_mean - target_mean).abs() <= 1.0 {
            debug!(iq_mean = self.iq_mean, "Good exposure");
            return true;
        }

        let new_gain = target_mean / self.iq_mean.max(1.0);

        let shutter = f64::from(agc.exposure.max(1)) * self.line_duration;
        let current_no_dg = shutter * agc.gain;
        let max_total = f64::from(self.max_exposure) * self.line_duration * self.max_gain;
        let target = (current_no_dg * new_gain).min(max_total);
        debug!(
            current = current_no_dg,
            target, "Adjusting total exposure"
        );

        self.filter_exposure(target, current_no_dg);

        // Reach the filtered exposure with shutter time first, then gain.
        let lines = (self.filtered_exposure / self.line_duration).floor();
        agc.exposure = (lines as u32).clamp(self.min_exposure, self.max_exposure);

        let applied_shutter = f64::from(agc.exposure) * self.line_duration;
        agc.gain = (self.filtered_exposure / applied_shutter).clamp(self.min_gain, self.max_gain);

        debug!(exposure = agc.exposure, gain = agc.gain, "Adjust exposure and gain");
        false
    }
}

impl Algorithm for Agc {
    fn name(&self) -> &'static str {
        "Agc"
    }

    fn configure(&mut self, context: &mut IpaContext, info: &IpaConfigInfo) -> Result<()> {
        let sensor = &info.sensor;
        *self = Self {
            line_duration: sensor.line_duration().as_secs_f64(),
            min_exposure: sensor.min_exposure,
            max_exposure: sensor.max_exposure,
            min_gain: sensor.min_gain,
            max_gain: sensor.max_gain,
            ..Self::default()
        };

        context.active_state.agc = AgcState {
            exposure: sensor.exposure.clamp(sensor.min_exposure, sensor.max_exposure),
            gain: sensor.gain.clamp(sensor.min_gain, sensor.max_gain),
            locked: false,
        };
        Ok(())
    }

    #[instrument(level = "debug", skip_all, fields(frame = frame))]
    fn process(
        &mut self,
        context: &mut IpaContext,
        frame: u32,
        frame_context: &mut FrameContext,
        stats: &RgbsGrid,
        metadata: &mut ControlList,
    ) {
        let mut agc = context.active_state.agc;

        if self.process_brightness(stats) {
            agc.locked = self.lock_exposure_gain(&mut agc);
        } else {
            debug!("No usable cell in statistics, keeping exposure");
        }
        self.frame_count = self.frame_count.wrapping_add(1);

        context.active_state.agc = agc;
        frame_context.agc = agc;

        let exposure_us = f64::from(agc.exposure) * self.line_duration * 1e6;
        metadata.set(ControlId::ExposureTime, exposure_us as i32);
        metadata.set(ControlId::AnalogueGain, agc.gain as f32);
        metadata.set(ControlId::AeLocked, agc.locked);
    }

    fn prepare(
        &mut self,
        _context: &mut IpaContext,
        _frame: u32,
        _frame_context: &mut FrameContext,
        _params: &mut ParamsBuffer,
    ) {
        // Exposure and gain are sensor controls, the ISP has nothing to apply.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipa::config::SensorInfo;
    use crate::ipa::stats::{AwbCell, GridConfig};

    fn grid() -> GridConfig {
        GridConfig {
            width: 16,
            height: 12,
            block_width_log2: 6,
            block_height_log2: 6,
            ..Default::default()
        }
    }

    fn configured() -> (Agc, IpaContext) {
        let mut agc = Agc::new();
        let mut context = IpaContext::default();
        let info = IpaConfigInfo {
            sensor: SensorInfo {
                exposure: 100,
                gain: 1.0,
                ..Default::default()
            },
            ..Default::default()
        };
        agc.configure(&mut context, &info).unwrap();
        (agc, context)
    }

    fn run_frames(agc: &mut Agc, context: &mut IpaContext, stats: &RgbsGrid, frames: u32) -> ControlList {
        let mut metadata = ControlList::new();
        for frame in 0..frames {
            let mut fc = FrameContext::default();
            metadata = ControlList::new();
            agc.process(context, frame, &mut fc, stats, &mut metadata);
            assert_eq!(fc.agc, context.active_state.agc);
        }
        metadata
    }

    #[test]
    fn test_waits_before_first_estimation() {
        let (mut agc, mut context) = configured();
        let dark = RgbsGrid::uniform(grid(), AwbCell::new(10, 10, 10, 10));

        run_frames(&mut agc, &mut context, &dark, 6);
        assert_eq!(context.active_state.agc.exposure, 100);
        assert_eq!(context.active_state.agc.gain, 1.0);
    }

    #[test]
    fn test_dark_scene_raises_exposure() {
        let (mut agc, mut context) = configured();
        let dark = RgbsGrid::uniform(grid(), AwbCell::new(10, 10, 10, 10));

        let metadata = run_frames(&mut agc, &mut context, &dark, 7);
        let state = context.active_state.agc;
        assert!(state.exposure > 100, "exposure {}", state.exposure);
        assert!(state.exposure <= 1976);
        assert!(state.gain >= 1.0);
        assert_eq!(metadata.get_bool(ControlId::AeLocked), Some(false));
        assert!(metadata.get_i64(ControlId::ExposureTime).unwrap() > 0);
    }

    #[test]
    fn test_bright_scene_lowers_exposure() {
        let (mut agc, mut context) = configured();
        let bright = RgbsGrid::uniform(grid(), AwbCell::new(250, 250, 250, 250));

        run_frames(&mut agc, &mut context, &bright, 7);
        assert!(context.active_state.agc.exposure < 100);
    }

    #[test]
    fn test_well_exposed_scene_locks() {
        let (mut agc, mut context) = configured();
        let target = RgbsGrid::uniform(grid(), AwbCell::new(127, 127, 127, 127));

        let metadata = run_frames(&mut agc, &mut context, &target, 7);
        assert_eq!(context.active_state.agc.exposure, 100);
        assert_eq!(metadata.get_bool(ControlId::AeLocked), Some(true));
    }

    #[test]
    fn test_saturated_cells_are_ignored() {
        let (mut agc, _) = configured();
        let mut stats = RgbsGrid::uniform(grid(), AwbCell::new(127, 127, 127, 127));
        for cell in stats.cells.iter_mut().take(100) {
            *cell = AwbCell::new(255, 255, 255, 255).saturated();
        }

        assert!(agc.process_brightness(&stats));
        assert!((agc.iq_mean - 127.5).abs() < 1e-9);

        let saturated = RgbsGrid::uniform(grid(), AwbCell::new(255, 255, 255, 255).saturated());
        assert!(!agc.process_brightness(&saturated));
        assert!((agc.iq_mean - 127.5).abs() < 1e-9);
    }

    #[test]
    fn test_frame_counter_wraps() {
        let (mut agc, mut context) = configured();
        agc.frame_count = u32::MAX - 1;
        agc.last_frame = u32::MAX - 8;
        let dark = RgbsGrid::uniform(grid(), AwbCell::new(10, 10, 10, 10));

        run_frames(&mut agc, &mut context, &dark, 1);
        let raised = context.active_state.agc.exposure;
        assert!(raised > 100);
        assert_eq!(agc.last_frame, u32::MAX - 1);

        // Counter wraps to 0 and 1: still within the skip window.
        run_frames(&mut agc, &mut context, &dark, 3);
        assert_eq!(agc.frame_count, 2);
        assert_eq!(context.active_state.agc.exposure, raised);
    }

    #[test]
    fn test_empty_statistics_keep_exposure() {
        let (mut agc, mut context) = configured();
        run_frames(&mut agc, &mut context, &RgbsGrid::default(), 8);
        assert_eq!(context.active_state.agc.exposure, 100);
    }
}
