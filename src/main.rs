use anyhow::Context;
use ipa_core::ipa::{
    AwbCell, ControlId, ControlList, IpaConfig, IpaConfigInfo, Ipu3Ipa, RgbsGrid, SensorInfo, Size,
};
use ipa_core::logger;

use tracing::{info, warn};

const FRAMES: u32 = 30;

/// Statistics of a dim, slightly blue scene.
fn synthetic_statistics(ipa: &Ipu3Ipa) -> RgbsGrid {
    RgbsGrid::uniform(
        ipa.context().configuration.grid,
        AwbCell::new(60, 45, 70, 60),
    )
}

fn main() -> anyhow::Result<()> {
    logger::init();

    info!("Starting IPU3 IPA simulation...");

    let config = IpaConfig::builder()
        .gamma(2.2)
        .stats_pool_capacity(4)
        .build();
    let delay = config.pipeline_delay;
    let mut ipa = Ipu3Ipa::new(config).context("creating the IPA")?;

    let info = IpaConfigInfo {
        bds_output_size: Size::new(1280, 720),
        sensor: SensorInfo::default(),
    };
    ipa.configure(&info).context("configuring the IPA")?;

    let grid = ipa.context().configuration.grid;
    info!(
        "Statistics grid: {}x{} cells of {}x{} pixels",
        grid.width,
        grid.height,
        1u32 << grid.block_width_log2,
        1u32 << grid.block_height_log2
    );

    for frame in 0..delay {
        ipa.queue_request(frame, &ControlList::new())?;
    }

    let raw = synthetic_statistics(&ipa).to_raw();
    for frame in 0..FRAMES {
        let controls = ControlList::new().with(ControlId::Saturation, 1.2f32);
        ipa.queue_request(frame + delay, &controls)?;

        let params = ipa.fill_params(frame)?;
        let metadata = ipa
            .process_raw_statistics(frame, &raw)
            .with_context(|| format!("processing statistics of frame {frame}"))?;

        if !metadata.error.is_empty() {
            warn!("Frame {} completed with errors {:?}", frame, metadata.error);
        }

        info!(
            "Frame {}: exposure {} lines, gain {:.2}, gains {:?}, flags {:?}",
            frame,
            metadata.sensor.exposure,
            metadata.sensor.gain,
            metadata.controls.get_pair(ControlId::ColourGains),
            params.use_flags
        );
    }

    ipa.stop();
    info!("Simulation complete");

    Ok(())
}
