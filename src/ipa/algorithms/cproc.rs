//! Colour processing
//!
//! Brightness, contrast, hue and saturation are applied by the ISP from
//! controls set by the application. Values are quantized when the request is
//! queued, so the frame context records exactly what the registers receive.

use tracing::debug;

use crate::ipa::algorithms::Algorithm;
use crate::ipa::common::Result;
use crate::ipa::config::IpaConfigInfo;
use crate::ipa::context::{CprocState, FrameContext, IpaContext};
use crate::ipa::controls::{ControlId, ControlList};
use crate::ipa::fixed_point::{Q, UQ};
use crate::ipa::params::{CprocConfig, ParamsBuffer, UseFlags};
use crate::ipa::stats::RgbsGrid;

/// The hue register holds a rotation in units of -90 degrees.
const HUE_SCALE: f32 = -90.0;

#[derive(Debug, Default)]
pub struct ColourProcessing {
    /// The first request after `configure()` always programs the block.
    pending_initial_write: bool,
}

impl ColourProcessing {
    pub fn new() -> Self {
        Self::default()
    }
}

fn update_value<T: PartialEq + Copy>(current: &mut T, value: T) -> bool {
    if *current == value {
        return false;
    }
    *current = value;
    true
}

impl Algorithm for ColourProcessing {
    fn name(&self) -> &'static str {
        "ColourProcessing"
    }

    fn configure(&mut self, context: &mut IpaContext, _info: &IpaConfigInfo) -> Result<()> {
        context.active_state.cproc = CprocState::default();
        self.pending_initial_write = true;
        Ok(())
    }

    fn queue_request(
        &mut self,
        context: &mut IpaContext,
        frame: u32,
        frame_context: &mut FrameContext,
        controls: &ControlList,
    ) {
        let cproc = &mut context.active_state.cproc;
        let mut update = std::mem::take(&mut self.pending_initial_write);

        if let Some(brightness) = controls.get_f32(ControlId::Brightness) {
            let value = Q::<1, 7>::from_float(brightness);
            update |= update_value(&mut cproc.brightness, value);
            debug!(frame, %value, "Set brightness");
        }

        if let Some(contrast) = controls.get_f32(ControlId::Contrast) {
            let value = UQ::<1, 7>::from_float(contrast);
            update |= update_value(&mut cproc.contrast, value);
            debug!(frame, %value, "Set contrast");
        }

        if let Some(hue) = controls.get_f32(ControlId::Hue) {
            let value = Q::<1, 7>::from_float(hue / HUE_SCALE);
            update |= update_value(&mut cproc.hue, value);
            debug!(frame, %value, "Set hue");
        }

        if let Some(saturation) = controls.get_f32(ControlId::Saturation) {
            let value = UQ::<1, 7>::from_float(saturation);
            update |= update_value(&mut cproc.saturation, value);
            debug!(frame, %value, "Set saturation");
        }

        cproc.update = update;
        frame_context.cproc = *cproc;
    }

    fn process(
        &mut self,
        _context: &mut IpaContext,
        _frame: u32,
        frame_context: &mut FrameContext,
        _stats: &RgbsGrid,
        metadata: &mut ControlList,
    ) {
        let cproc = &frame_context.cproc;
        metadata.set(ControlId::Brightness, cproc.brightness.value());
        metadata.set(ControlId::Contrast, cproc.contrast.value());
        metadata.set(ControlId::Hue, cproc.hue.value() * HUE_SCALE);
        metadata.set(ControlId::Saturation, cproc.saturation.value());
    }

    fn prepare(
        &mut self,
        _context: &mut IpaContext,
        _frame: u32,
        frame_context: &mut FrameContext,
        params: &mut ParamsBuffer,
    ) {
        let cproc = &frame_context.cproc;
        if !cproc.update {
            return;
        }

        params.cproc = CprocConfig {
            enabled: true,
            brightness: cproc.brightness.quantized(),
            contrast: cproc.contrast.quantized(),
            hue: cproc.hue.quantized(),
            saturation: cproc.saturation.quantized(),
        };
        params.use_flags |= UseFlags::ACC_CPROC;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(
        cproc: &mut ColourProcessing,
        context: &mut IpaContext,
        frame: u32,
        controls: &ControlList,
    ) -> FrameContext {
        let mut fc = FrameContext::default();
        cproc.queue_request(context, frame, &mut fc, controls);
        fc
    }

    #[test]
    fn test_first_frame_always_updates() {
        let mut cproc = ColourProcessing::new();
        let mut context = IpaContext::default();
        cproc.configure(&mut context, &IpaConfigInfo::default()).unwrap();

        let mut fc = queue(&mut cproc, &mut context, 42, &ControlList::new());
        assert!(fc.cproc.update);
        assert!(!queue(&mut cproc, &mut context, 43, &ControlList::new()).cproc.update);

        let mut params = ParamsBuffer::default();
        cproc.prepare(&mut context, 42, &mut fc, &mut params);
        assert!(params.use_flags.contains(UseFlags::ACC_CPROC));
        assert_eq!(params.cproc.brightness, 0x00);
        assert_eq!(params.cproc.contrast, 0x80);
        assert_eq!(params.cproc.saturation, 0x80);
    }

    #[test]
    fn test_registers_written_only_on_change() {
        let mut cproc = ColourProcessing::new();
        let mut context = IpaContext::default();
        cproc.configure(&mut context, &IpaConfigInfo::default()).unwrap();
        queue(&mut cproc, &mut context, 0, &ControlList::new());

        let controls = ControlList::new()
            .with(ControlId::Brightness, -1.0f32)
            .with(ControlId::Hue, 45.0f32);
        let mut fc = queue(&mut cproc, &mut context, 1, &controls);
        assert!(fc.cproc.update);

        let mut params = ParamsBuffer::default();
        cproc.prepare(&mut context, 1, &mut fc, &mut params);
        assert_eq!(params.cproc.brightness, 0x80);
        // 45 degrees is -0.5 in hue units.
        assert_eq!(params.cproc.hue, 0xc0);

        // Same values again: nothing to write.
        let mut fc = queue(&mut cproc, &mut context, 2, &controls);
        assert!(!fc.cproc.update);
        let mut params = ParamsBuffer::default();
        cproc.prepare(&mut context, 2, &mut fc, &mut params);
        assert!(params.use_flags.is_empty());
    }

    #[test]
    fn test_floats_with_same_code_do_not_update() {
        let mut cproc = ColourProcessing::new();
        let mut context = IpaContext::default();
        cproc.configure(&mut context, &IpaConfigInfo::default()).unwrap();

        queue(
            &mut cproc,
            &mut context,
            1,
            &ControlList::new().with(ControlId::Contrast, 1.007f32),
        );
        let fc = queue(
            &mut cproc,
            &mut context,
            2,
            &ControlList::new().with(ControlId::Contrast, 1.008f32),
        );
        assert!(!fc.cproc.update);
    }

    #[test]
    fn test_metadata_reports_quantized_values() {
        let mut cproc = ColourProcessing::new();
        let mut context = IpaContext::default();
        cproc.configure(&mut context, &IpaConfigInfo::default()).unwrap();

        let controls = ControlList::new()
            .with(ControlId::Hue, -90.0f32)
            .with(ControlId::Saturation, 3.0f32);
        let mut fc = queue(&mut cproc, &mut context, 0, &controls);

        let mut metadata = ControlList::new();
        cproc.process(&mut context, 0, &mut fc, &RgbsGrid::default(), &mut metadata);
        let hue = metadata.get_f32(ControlId::Hue).unwrap();
        assert!((hue + 89.296875).abs() < 1e-4, "hue {}", hue);
        let saturation = metadata.get_f32(ControlId::Saturation).unwrap();
        assert!((saturation - 1.9921875).abs() < 1e-6);
    }
}
