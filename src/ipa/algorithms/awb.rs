//! Grey world auto white balance
//!
//! The statistics grid is re-binned into a fixed array of
//! [`AWB_STATS_SIZE_X`] x [`AWB_STATS_SIZE_Y`] zones. Saturated cells are
//! left out, and so are zones with too few cells or too little green to
//! carry a reliable colour estimate.
//!
//! The remaining zones are sorted by their red/green ratio and, separately,
//! by their blue/green ratio. A quarter of the zones is discarded at each
//! end of both orders and the red and blue gains are derived from what is
//! left, so strongly coloured parts of the scene do not drag the estimate.

use tracing::{debug, instrument, warn};

use crate::ipa::algorithms::Algorithm;
use crate::ipa::config::IpaConfig;
use crate::ipa::context::{AwbGains, AwbState, FrameContext, IpaContext};
use crate::ipa::controls::{ControlId, ControlList};
use crate::ipa::params::{
    AWB_RGBS_THR_B_EN, AWB_RGBS_THR_B_INCL_SAT, AwbConfig, BnrConfig, CcmConfig, ParamsBuffer,
    UseFlags, WbGains,
};
use crate::ipa::stats::RgbsGrid;

pub const AWB_STATS_SIZE_X: usize = 16;
pub const AWB_STATS_SIZE_Y: usize = 12;

const AWB_ZONES: usize = AWB_STATS_SIZE_X * AWB_STATS_SIZE_Y;

/// AWB statistics threshold, the maximum 13-bit channel value.
const RGBS_THRESHOLD: u16 = 8191;

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    counted: u32,
    red: u64,
    green: u64,
    blue: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Rgb {
    r: f64,
    g: f64,
    b: f64,
}

impl std::ops::AddAssign for Rgb {
    fn add_assign(&mut self, other: Self) {
        self.r += other.r;
        self.g += other.g;
        self.b += other.b;
    }
}

pub struct Awb {
    min_cells_per_zone: u32,
    min_green_level: f64,
    min_valid_zones: usize,
    accumulators: [Accumulator; AWB_ZONES],
    zones: Vec<Rgb>,
}

impl Default for Awb {
    fn default() -> Self {
        Self::new(&IpaConfig::default())
    }
}

impl Awb {
    pub fn new(config: &IpaConfig) -> Self {
        Self {
            min_cells_per_zone: config.awb_min_cells_per_zone,
            min_green_level: config.awb_min_green_level,
            min_valid_zones: config.awb_min_valid_zones,
            accumulators: [Accumulator::default(); AWB_ZONES],
            zones: Vec::with_capacity(AWB_ZONES),
        }
    }

    /// Correlated colour temperature of an RGB triplet, through CIE XYZ and
    /// McCamy's cubic approximation of the Planckian locus.
    pub fn estimate_cct(red: f64, green: f64, blue: f64) -> f64 {
        let x = -0.14282 * red + 1.54924 * green - 0.95641 * blue;
        let y = -0.32466 * red + 1.57837 * green - 0.73191 * blue;
        let z = -0.68202 * red + 0.77073 * green + 0.56332 * blue;

        let sum = x + y + z;
        if sum == 0.0 {
            return 0.0;
        }

        let x = x / sum;
        let y = y / sum;

        let n = (x - 0.3320) / (0.1858 - y);
        449.0 * n * n * n + 3525.0 * n * n + 6823.3 * n + 5520.33
    }

    fn accumulate(&mut self, stats: &RgbsGrid) {
        self.accumulators = [Accumulator::default(); AWB_ZONES];

        let grid = &stats.grid;
        let cells_per_zone_x = (f64::from(grid.width) / AWB_STATS_SIZE_X as f64).round() as usize;
        let cells_per_zone_y = (f64::from(grid.height) / AWB_STATS_SIZE_Y as f64).round() as usize;
        if cells_per_zone_x == 0 || cells_per_zone_y == 0 {
            return;
        }

        for cell_y in 0..AWB_STATS_SIZE_Y * cells_per_zone_y {
            for cell_x in 0..AWB_STATS_SIZE_X * cells_per_zone_x {
                let Some(cell) = stats.cell(cell_x, cell_y) else {
                    continue;
                };
                if cell.is_saturated() {
                    continue;
                }

                let zone = (cell_y / cells_per_zone_y) * AWB_STATS_SIZE_X + cell_x / cells_per_zone_x;
                let acc = &mut self.accumulators[zone];
                acc.counted += 1;
                acc.green += u64::from(cell.green());
                acc.red += u64::from(cell.r_avg);
                acc.blue += u64::from(cell.b_avg);
            }
        }
    }

    fn generate_zones(&mut self) {
        self.zones.clear();
        for acc in &self.accumulators {
            if acc.counted == 0 || acc.counted < self.min_cells_per_zone {
                continue;
            }

            let counted = f64::from(acc.counted);
            let g = acc.green as f64 / counted;
            if g < self.min_green_level {
                continue;
            }

            self.zones.push(Rgb {
                r: acc.red as f64 / counted,
                g,
                b: acc.blue as f64 / counted,
            });
        }
    }

    fn grey_world(&mut self) -> AwbState {
        let mut blue_derivative = self.zones.clone();
        let red_derivative = &mut self.zones;

        red_derivative.sort_by(|a, b| (a.r * b.g).total_cmp(&(b.r * a.g)));
        blue_derivative.sort_by(|a, b| (a.b * b.g).total_cmp(&(b.b * a.g)));

        let discard = red_derivative.len() / 4;
        let end = red_derivative.len() - discard;

        let mut sum_red = Rgb::default();
        let mut sum_blue = Rgb::default();
        for (r, b) in red_derivative[discard..end]
            .iter()
            .zip(&blue_derivative[discard..end])
        {
            sum_red += *r;
            sum_blue += *b;
        }

        AwbState {
            gains: AwbGains {
                red: sum_red.g / (sum_red.r + 1.0),
                green: 1.0,
                blue: sum_blue.g / (sum_blue.b + 1.0),
            },
            temperature_k: Self::estimate_cct(sum_red.r, sum_red.g, sum_blue.b),
        }
    }

    /// Computes new gains from `stats`, or returns `None` when the
    /// statistics cannot support an estimate.
    fn calculate_wb_gains(&mut self, stats: &RgbsGrid) -> Option<AwbState> {
        self.accumulate(stats);
        self.generate_zones();

        debug!(zones = self.zones.len(), "Valid zones");
        if self.zones.len() < self.min_valid_zones || self.zones.is_empty() {
            return None;
        }

        let state = self.grey_world();
        debug!(
            red = state.gains.red,
            blue = state.gains.blue,
            "Gains found"
        );
        Some(state)
    }
}

impl Algorithm for Awb {
    fn name(&self) -> &'static str {
        "Awb"
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
        if !stats.awb_enabled {
            debug!("AWB statistics disabled, keeping previous gains");
        } else if !stats.is_consistent() {
            warn!(
                cells = stats.cells.len(),
                expected = stats.grid.cells(),
                "Statistics grid is truncated, keeping previous gains"
            );
        } else if let Some(state) = self.calculate_wb_gains(stats) {
            context.active_state.awb = state;
        }

        // New gains reach the frames prepared from now on. The metadata
        // reports the gains this frame was captured with.
        let awb = &frame_context.awb;
        metadata.set(ControlId::ColourTemperature, awb.temperature_k as i32);
        metadata.set(
            ControlId::ColourGains,
            (awb.gains.red as f32, awb.gains.blue as f32),
        );
    }

    fn prepare(
        &mut self,
        context: &mut IpaContext,
        frame: u32,
        frame_context: &mut FrameContext,
        params: &mut ParamsBuffer,
    ) {
        let configuration = &context.configuration;
        let grid = configuration.grid;
        let bds = configuration.bds_output_size;

        params.awb = AwbConfig {
            rgbs_thr_gr: RGBS_THRESHOLD,
            rgbs_thr_r: RGBS_THRESHOLD,
            rgbs_thr_gb: RGBS_THRESHOLD,
            rgbs_thr_b: AWB_RGBS_THR_B_INCL_SAT | AWB_RGBS_THR_B_EN | RGBS_THRESHOLD,
            grid,
        };

        // The optical centre is approximated by the centre of the BDS
        // output until shading parameters are available.
        let mut bnr = BnrConfig {
            column_size: u16::try_from(bds.width).unwrap_or(u16::MAX),
            ..BnrConfig::default()
        };
        bnr.opt_center.x_reset = i32::from(grid.x_start) - (bds.width / 2) as i32;
        bnr.opt_center.y_reset = i32::from(grid.y_start) - (bds.height / 2) as i32;
        bnr.opt_center_sqr.x_sqr_reset = bnr.opt_center.x_reset.unsigned_abs().saturating_pow(2);
        bnr.opt_center_sqr.y_sqr_reset = bnr.opt_center.y_reset.unsigned_abs().saturating_pow(2);

        frame_context.awb = context.active_state.awb;
        let gains = frame_context.awb.gains;
        bnr.wb_gains = WbGains::from_gains(gains.red, gains.green, gains.blue);
        params.bnr = bnr;

        debug!(
            frame,
            red = gains.red,
            blue = gains.blue,
            temperature = frame_context.awb.temperature_k,
            "White balance applied"
        );

        // The CCM may depend on the colour temperature once it is tuned.
        params.ccm = CcmConfig::IDENTITY;

        params.use_flags |= UseFlags::ACC_AWB | UseFlags::ACC_BNR | UseFlags::ACC_CCM;
    }
}
