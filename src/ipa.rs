//! Image processing algorithms for the IPU3 ISP
//!
//! This module turns the statistics produced by the ImgU for each frame into
//! ISP parameters and sensor controls for the frames that follow, with
//! separate modules for fixed point register formats, per-frame state,
//! statistics pooling and the algorithms themselves.

pub mod algorithms;
pub mod common;
pub mod config;
pub mod context;
pub mod controls;
pub mod fc_queue;
pub mod fixed_point;
pub mod histogram;
pub mod params;
pub mod pipeline;
pub mod quantized;
pub mod sequence;
pub mod stats;

pub use common::{
    IpaError,
    Result,
};

pub use config::{
    IpaConfig,
    IpaConfigBuilder,
    IpaConfigInfo,
    SensorInfo,
    Size,
};

pub use controls::{
    ControlId,
    ControlList,
    ControlValue,
};

pub use fc_queue::{
    ErrorFlags,
    FcQueue,
    FrameContextRecord,
    IpaFrameContext,
};

pub use fixed_point::{
    FixedPoint,
    Q,
    QTraits,
    UQ,
    UQTraits,
};

pub use quantized::{
    Quantized,
    QuantizerTraits,
};

pub use stats::{
    AwbCell,
    GridConfig,
    RgbsGrid,
    pool::{SharedItem, SharedItemPool},
};

pub use params::ParamsBuffer;

pub use pipeline::{
    FrameMetadata,
    Ipu3Ipa,
};
