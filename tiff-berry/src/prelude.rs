//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::data::{
    read_volume, AxisLayout, CanonicalVolume, DisplayRange, ImgWriteVis, Plane,
};

pub use crate::patch::{
    random_patches, random_patches_with_seed, sequential_patches, stitch, tiled_patches, Extents,
    ExtractionMode, InvalidPatchSpec, TilePatch, TileRegion,
};

pub use crate::stats::Stats;

pub use crate::dataset::{
    self, home_dataset_dir_with, list_tiff_files, PatchStream, StreamPatch, TiffDataset,
    WorkerContext,
};

pub use crate::consts::AXIS_ORDER;
