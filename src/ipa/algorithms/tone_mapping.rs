//! Gamma tone mapping

use tracing::debug;

use crate::ipa::algorithms::Algorithm;
use crate::ipa::common::Result;
use crate::ipa::config::IpaConfigInfo;
use crate::ipa::context::{FrameContext, IpaContext, ToneMappingState};
use crate::ipa::controls::{ControlId, ControlList};
use crate::ipa::params::{GAMMA_CORR_LUT_ENTRIES, ParamsBuffer, UseFlags};
use crate::ipa::stats::RgbsGrid;

/// Largest value of the 13-bit gamma table.
const LUT_MAX: f64 = 8191.0;

#[derive(Debug, Default)]
pub struct ToneMapping;

impl ToneMapping {
    pub fn new() -> Self {
        Self
    }

    fn update_lut(state: &mut ToneMappingState, gamma: f64) {
        if state.gamma == gamma {
            return;
        }

        let last = (GAMMA_CORR_LUT_ENTRIES - 1) as f64;
        for (i, entry) in state.lut.iter_mut().enumerate() {
            let position = i as f64 / last;
            *entry = (position.powf(1.0 / gamma) * LUT_MAX) as u16;
        }
        state.gamma = gamma;

        debug!(gamma, "Gamma table updated");
    }
}

impl Algorithm for ToneMapping {
    fn name(&self) -> &'static str {
        "ToneMapping"
    }

    fn configure(&mut self, context: &mut IpaContext, _info: &IpaConfigInfo) -> Result<()> {
        let gamma = context.configuration.tuning.gamma;
        let state = &mut context.active_state.tone_mapping;
        state.requested_gamma = None;
        Self::update_lut(state, gamma);
        Ok(())
    }

    fn queue_request(
        &mut self,
        _context: &mut IpaContext,
        frame: u32,
        frame_context: &mut FrameContext,
        controls: &ControlList,
    ) {
        let Some(gamma) = controls.get_f32(ControlId::Gamma) else {
            return;
        };

        if gamma > 0.0 {
            frame_context.tone_mapping.requested_gamma = Some(f64::from(gamma));
        } else {
            debug!(frame, gamma, "Ignoring non-positive gamma");
        }
    }

    fn process(
        &mut self,
        context: &mut IpaContext,
        _frame: u32,
        frame_context: &mut FrameContext,
        _stats: &RgbsGrid,
        metadata: &mut ControlList,
    ) {
        // Frames that never had their parameters prepared report the curve
        // currently in force.
        let mut gamma = frame_context.tone_mapping.gamma;
        if gamma == 0.0 {
            gamma = context.active_state.tone_mapping.gamma;
        }
        metadata.set(ControlId::Gamma, gamma as f32);
    }

    /// Applies the gamma requested for `frame`, or the last one applied,
    /// and records the curve in the frame context.
    fn prepare(
        &mut self,
        context: &mut IpaContext,
        _frame: u32,
        frame_context: &mut FrameContext,
        params: &mut ParamsBuffer,
    ) {
        let default_gamma = context.configuration.tuning.gamma;
        let state = &mut context.active_state.tone_mapping;
        if let Some(requested) = frame_context.tone_mapping.requested_gamma {
            state.requested_gamma = Some(requested);
        }
        let gamma = state.requested_gamma.unwrap_or(default_gamma);
        Self::update_lut(state, gamma);

        frame_context.tone_mapping = state.clone();
        params.gamma.lut = frame_context.tone_mapping.lut;
        params.gamma.enabled = true;
        params.use_flags |= UseFlags::ACC_GAMMA;
    }
}
