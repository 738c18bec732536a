//! IPU3 IPA driver
//!
//! [`Ipu3Ipa`] owns the shared context, the frame context queue, the
//! statistics pool and the ordered list of algorithms. It is driven by the
//! pipeline handler with one call per event of a frame:
//!
//! 1. [`queue_request`](Ipu3Ipa::queue_request) when the application queues
//!    a request,
//! 2. [`fill_params`](Ipu3Ipa::fill_params) when the ISP needs the
//!    parameters of the frame,
//! 3. [`process_statistics`](Ipu3Ipa::process_statistics) when the ISP has
//!    produced the statistics of the frame.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::ipa::algorithms::{Algorithm, default_algorithms};
use crate::ipa::common::{IpaError, Result};
use crate::ipa::config::{IpaConfig, IpaConfigInfo, Size};
use crate::ipa::context::{ActiveState, FrameContext, IpaContext, SensorState, SessionConfiguration};
use crate::ipa::controls::{ControlId, ControlList};
use crate::ipa::fc_queue::{ErrorFlags, FcQueue};
use crate::ipa::params::ParamsBuffer;
use crate::ipa::sequence::Sequence;
use crate::ipa::stats::pool::SharedItemPool;
use crate::ipa::stats::{GridConfig, MAX_CELL_HEIGHT_PER_SET, MAX_CELL_WIDTH_PER_SET, RgbsGrid};

const STATS_POOL_NAME: &str = "ipu3-stats";

/// Cell sizes supported by the ImgU, as log2 of the side in pixels.
const CELL_LOG2_MIN: u8 = 3;
const CELL_LOG2_MAX: u8 = 7;

/// Everything reported back for a frame once its statistics are processed.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMetadata {
    pub frame: u32,
    /// Metadata returned to the application with the request.
    pub controls: ControlList,
    pub error: ErrorFlags,
    /// Sensor controls to apply.
    pub sensor: SensorState,
    /// Frames missing since the previous statistics, negative when the
    /// sequence went backwards.
    pub dropped_frames: i32,
}

/// Finds the statistics grid covering `bds_output_size` with the smallest
/// error, preferring the smallest cells when several grids fit as well.
pub fn calculate_bds_grid(bds_output_size: Size) -> GridConfig {
    let mut min_error = u32::MAX;
    let mut best = GridConfig::default();

    for width_log2 in CELL_LOG2_MIN..=CELL_LOG2_MAX {
        let cells_x = (bds_output_size.width >> width_log2).min(MAX_CELL_WIDTH_PER_SET);
        let width = cells_x << width_log2;

        for height_log2 in CELL_LOG2_MIN..=CELL_LOG2_MAX {
            let cells_y = (bds_output_size.height >> height_log2).min(MAX_CELL_HEIGHT_PER_SET);
            let height = cells_y << height_log2;

            let error = bds_output_size.width.abs_diff(width) + bds_output_size.height.abs_diff(height);
            if error >= min_error {
                continue;
            }

            min_error = error;
            best = GridConfig {
                width: cells_x as u8,
                height: cells_y as u8,
                block_width_log2: width_log2,
                block_height_log2: height_log2,
                x_start: 0,
                y_start: 0,
            };
        }
    }

    debug!(
        width = best.width,
        block_width_log2 = best.block_width_log2,
        height = best.height,
        block_height_log2 = best.block_height_log2,
        "Best grid found"
    );
    best
}

pub struct Ipu3Ipa {
    config: IpaConfig,
    context: IpaContext,
    frame_contexts: FcQueue<FrameContext>,
    algorithms: Vec<Box<dyn Algorithm>>,
    stats_pool: Arc<SharedItemPool<RgbsGrid>>,
    sequence: Sequence,
    configured: bool,
}

impl Ipu3Ipa {
    /// Creates an IPA running the AGC, AWB, tone mapping and colour
    /// processing algorithms.
    pub fn new(config: IpaConfig) -> Result<Self> {
        let algorithms = default_algorithms(&config);
        Self::with_algorithms(config, algorithms)
    }

    /// Creates an IPA running `algorithms`, in order.
    pub fn with_algorithms(config: IpaConfig, algorithms: Vec<Box<dyn Algorithm>>) -> Result<Self> {
        config.validate()?;

        let frame_contexts: FcQueue<FrameContext> = FcQueue::new();
        if !frame_contexts.supports_latency(config.pipeline_delay) {
            return Err(IpaError::InvalidConfiguration(format!(
                "pipeline delay {} exceeds the frame context queue",
                config.pipeline_delay
            )));
        }

        let stats_pool = SharedItemPool::new(STATS_POOL_NAME);
        stats_pool.init(config.stats_pool_capacity, Some(RgbsGrid::clear))?;

        info!(
            algorithms = algorithms.len(),
            pipeline_delay = config.pipeline_delay,
            stats_pool_capacity = config.stats_pool_capacity,
            "IPA created"
        );

        Ok(Self {
            config,
            context: IpaContext::default(),
            frame_contexts,
            algorithms,
            stats_pool,
            sequence: Sequence::new(),
            configured: false,
        })
    }

    pub fn config(&self) -> &IpaConfig {
        &self.config
    }

    pub fn context(&self) -> &IpaContext {
        &self.context
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Pool the statistics grids of [`process_raw_statistics`](Self::process_raw_statistics)
    /// are taken from.
    pub fn stats_pool(&self) -> &Arc<SharedItemPool<RgbsGrid>> {
        &self.stats_pool
    }

    /// The frame context of `frame`, if it is still held by the queue.
    pub fn frame_context(&self, frame: u32) -> Option<&FrameContext> {
        self.frame_contexts.peek(frame)
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.configured {
            Ok(())
        } else {
            Err(IpaError::NotConfigured)
        }
    }

    /// Starts a new session.
    ///
    /// The statistics grid is computed from the BDS output size, the shared
    /// context and the frame contexts are reset, and every algorithm is
    /// configured in order. If any step fails the IPA stays unconfigured.
    #[instrument(
        skip(self, info),
        fields(width = info.bds_output_size.width, height = info.bds_output_size.height)
    )]
    pub fn configure(&mut self, info: &IpaConfigInfo) -> Result<()> {
        self.configured = false;

        if info.bds_output_size.is_empty() {
            return Err(IpaError::InvalidConfiguration(format!(
                "empty BDS output size {}x{}",
                info.bds_output_size.width, info.bds_output_size.height
            )));
        }
        info.sensor.validate()?;

        let grid = calculate_bds_grid(info.bds_output_size);
        self.context = IpaContext {
            configuration: SessionConfiguration {
                grid,
                bds_output_size: info.bds_output_size,
                sensor: info.sensor,
                line_duration: info.sensor.line_duration(),
                tuning: self.config.clone(),
            },
            active_state: ActiveState::default(),
        };
        self.frame_contexts.clear();
        self.sequence.reset();

        for algorithm in self.algorithms.iter_mut() {
            let _span = tracing::debug_span!("configure_algorithm", algorithm = algorithm.name()).entered();
            algorithm.configure(&mut self.context, info)?;
        }

        self.configured = true;
        info!(
            grid_width = grid.width,
            grid_height = grid.height,
            "IPA configured"
        );
        Ok(())
    }

    /// Records the controls of the request for `frame`.
    #[instrument(level = "debug", skip(self, controls), fields(controls = controls.len()))]
    pub fn queue_request(&mut self, frame: u32, controls: &ControlList) -> Result<()> {
        self.ensure_configured()?;

        let frame_context = self.frame_contexts.initialise(frame);
        for algorithm in self.algorithms.iter_mut() {
            algorithm.queue_request(&mut self.context, frame, frame_context, controls);
        }
        Ok(())
    }

    /// Computes the ISP parameters of `frame`.
    #[instrument(level = "debug", skip(self))]
    pub fn fill_params(&mut self, frame: u32) -> Result<ParamsBuffer> {
        self.ensure_configured()?;

        let mut params = ParamsBuffer::default();
        let frame_context = self.frame_contexts.get(frame);
        for algorithm in self.algorithms.iter_mut() {
            algorithm.prepare(&mut self.context, frame, frame_context, &mut params);
        }

        debug!(use_flags = ?params.use_flags, "Parameters filled");
        Ok(params)
    }

    /// Runs every algorithm on the statistics of `frame`.
    #[instrument(level = "debug", skip(self, stats), fields(cells = stats.cells.len()))]
    pub fn process_statistics(&mut self, frame: u32, stats: &RgbsGrid) -> Result<FrameMetadata> {
        self.ensure_configured()?;

        let dropped_frames = self.sequence.update(frame);
        if dropped_frames != 0 {
            warn!(frame, dropped_frames, "Statistics sequence discontinuity");
        }

        let mut controls = ControlList::new();
        let frame_context = self.frame_contexts.get(frame);
        for algorithm in self.algorithms.iter_mut() {
            algorithm.process(&mut self.context, frame, frame_context, stats, &mut controls);
        }

        frame_context.sensor = SensorState {
            exposure: frame_context.agc.exposure,
            gain: frame_context.agc.gain,
        };
        controls.set(
            ControlId::FrameDuration,
            self.context.configuration.sensor.frame_duration_us(),
        );

        Ok(FrameMetadata {
            frame,
            controls,
            error: frame_context.base.error,
            sensor: frame_context.sensor,
            dropped_frames,
        })
    }

    /// Decodes a raw statistics buffer into a pooled grid and processes it.
    ///
    /// Fails without touching any state when no grid is available or the
    /// buffer is too short for the configured grid.
    #[instrument(level = "debug", skip(self, raw), fields(raw_size = raw.len()))]
    pub fn process_raw_statistics(&mut self, frame: u32, raw: &[u8]) -> Result<FrameMetadata> {
        self.ensure_configured()?;

        let mut stats = self.stats_pool.acquire_item()?;
        {
            let _span = tracing::debug_span!("decode_statistics").entered();
            let grid = Arc::get_mut(&mut stats).ok_or_else(|| {
                IpaError::InvalidStatistics("statistics grid is already shared".to_string())
            })?;
            grid.fill_from_raw(self.context.configuration.grid, raw)?;
        }

        self.process_statistics(frame, &stats)
    }

    /// Ends the session. [`configure`](Self::configure) must be called again
    /// before the next frame.
    pub fn stop(&mut self) {
        self.frame_contexts.clear();
        self.sequence.reset();
        self.configured = false;
        info!("IPA stopped");
    }
}
