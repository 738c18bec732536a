//! Image processing algorithms
//!
//! Each algorithm takes part in up to four phases:
//!
//! * `configure` when streaming starts,
//! * `queue_request` when the application queues a request for a frame,
//! * `process` when the statistics of a frame are available,
//! * `prepare` when the ISP needs the parameters of a frame.
//!
//! `process` for a frame always runs before the `prepare` that applies its
//! results. Because of the pipeline delay that `prepare` is for a later
//! frame, so results travel through [`ActiveState`](crate::ipa::context::ActiveState)
//! and are recorded in the frame context of the frame they are applied to.

pub mod agc;
pub mod awb;
pub mod cproc;
pub mod tone_mapping;

pub use agc::Agc;
pub use awb::Awb;
pub use cproc::ColourProcessing;
pub use tone_mapping::ToneMapping;

use crate::ipa::common::Result;
use crate::ipa::config::{IpaConfig, IpaConfigInfo};
use crate::ipa::context::{FrameContext, IpaContext};
use crate::ipa::controls::ControlList;
use crate::ipa::params::ParamsBuffer;
use crate::ipa::stats::RgbsGrid;

pub trait Algorithm: Send {
    fn name(&self) -> &'static str;

    fn configure(&mut self, _context: &mut IpaContext, _info: &IpaConfigInfo) -> Result<()> {
        Ok(())
    }

    fn queue_request(
        &mut self,
        _context: &mut IpaContext,
        _frame: u32,
        _frame_context: &mut FrameContext,
        _controls: &ControlList,
    ) {
    }

    fn process(
        &mut self,
        context: &mut IpaContext,
        frame: u32,
        frame_context: &mut FrameContext,
        stats: &RgbsGrid,
        metadata: &mut ControlList,
    );

    fn prepare(
        &mut self,
        context: &mut IpaContext,
        frame: u32,
        frame_context: &mut FrameContext,
        params: &mut ParamsBuffer,
    );
}

/// Algorithms of the IPU3 IPA, in the order they run.
pub fn default_algorithms(config: &IpaConfig) -> Vec<Box<dyn Algorithm>> {
    vec![
        Box::new(Agc::new()),
        Box::new(Awb::new(config)),
        Box::new(ToneMapping::new()),
        Box::new(ColourProcessing::new()),
    ]
}
