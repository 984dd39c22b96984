//! 数据集流水线.
//!
//! 把目录下的 TIFF 文件变成一条惰性的补丁序列:
//! 读取 → 轴规范化 → 按模式提取 → 归一化 → 变换 → 产出.
//! 体数据逐文件短暂持有, 补丁产尽即释放; 任意时刻内存中至多一个文件.
//!
//! 多工作进程并行加载时, 每个副本独立发现同一份有序文件列表,
//! 并按 `文件序号 % 进程总数 == 进程编号` 认领文件, 彼此不重不漏,
//! 无需任何跨进程通信.

use super::{list_tiff_files, DatasetError};
use crate::data::{read_volume, AxisLayout, CanonicalVolume, ReadVolumeError, ShapeMismatch};
use crate::patch::{
    check_overlap, check_patch_dims, Extents, ExtractionMode, InvalidPatchSpec, RandomPatches,
    SequentialPatches, TileRegion, TiledPatches,
};
use crate::stats::{EstimateError, Stats};
use log::error;
use ndarray::ArrayD;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// 工作进程上下文: 编号与总数.
///
/// 并行加载的每个副本显式携带自己的上下文, 而不是从环境查询,
/// 因此划分逻辑无需真的拉起多个进程即可测试.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WorkerContext {
    id: usize,
    count: NonZeroUsize,
}

impl WorkerContext {
    /// 构建. `id` 必须小于 `count`, 否则返回 `None`.
    pub fn new(id: usize, count: NonZeroUsize) -> Option<Self> {
        (id < count.get()).then_some(Self { id, count })
    }

    /// 单进程上下文: 编号 0, 总数 1.
    #[inline]
    pub const fn solo() -> Self {
        Self {
            id: 0,
            count: NonZeroUsize::MIN,
        }
    }

    /// 进程编号.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// 进程总数.
    #[inline]
    pub fn count(&self) -> usize {
        self.count.get()
    }
}

impl Default for WorkerContext {
    #[inline]
    fn default() -> Self {
        Self::solo()
    }
}

/// 补丁变换: 归一化之后依序作用于每块补丁.
///
/// 需要产生辅助输出的变换 (如 Noise2Void 的像素操纵掩码)
/// 按约定把辅助平面作为附加通道拼在输出里携带.
pub type Transform = Box<dyn Fn(ArrayD<f32>) -> ArrayD<f32> + Send + Sync>;

/// 流式迭代错误. 每个变体都携带出错文件的路径.
#[derive(Debug)]
pub enum StreamError {
    /// 文件读取/解码失败.
    Read(PathBuf, ReadVolumeError),

    /// 轴描述符与该文件的维度不符.
    AxisMismatch(PathBuf, ShapeMismatch),

    /// 补丁规格与该文件的尺寸不符.
    Patch(PathBuf, InvalidPatchSpec),
}

/// 流水线产出的一块补丁.
#[derive(Debug)]
pub struct StreamPatch {
    /// 补丁数据, 形状 `(C, [Z,] Y, X)`, 已归一化并依序应用全部变换.
    pub data: ArrayD<f32>,

    /// 来源文件在数据集有序文件列表中的序号.
    pub file_index: usize,

    /// 来源样本在其文件内的序号.
    pub sample: usize,

    /// 推理切块模式下的拼接信息; 其余模式为 `None`.
    pub region: Option<TileRegion>,
}

/// TIFF 补丁流数据集.
///
/// 构建时完成文件发现与 (必要的话) 统计量估计; 此后可多次创建
/// 相互独立的惰性补丁流.
pub struct TiffDataset {
    files: Vec<PathBuf>,
    layout: AxisLayout,
    patch: Extents,
    mode: ExtractionMode,
    stats: Stats,
    transforms: Vec<Transform>,
}

impl std::fmt::Debug for TiffDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiffDataset")
            .field("files", &self.files)
            .field("layout", &self.layout)
            .field("patch", &self.patch)
            .field("mode", &self.mode)
            .field("stats", &self.stats)
            .field("transforms", &format_args!("<{} transforms>", self.transforms.len()))
            .finish()
    }
}

impl TiffDataset {
    /// 构建数据集.
    ///
    /// 递归发现 `dir` 下全部 TIFF 文件 (按路径排序); 目录没有任何匹配文件时
    /// 返回 [`DatasetError::NoInputFiles`], 不会读任何文件.
    /// 与图像无关的规格错误 (分量数, 零分量, 重叠量过大) 也在此时报出.
    ///
    /// `stats` 取 `None` 时, 同步流式估计全部文件的统计量,
    /// 该步骤完成之前不会产出任何补丁.
    pub fn new<P: AsRef<Path>>(
        dir: P,
        layout: AxisLayout,
        patch: Extents,
        mode: ExtractionMode,
        stats: Option<Stats>,
    ) -> Result<Self, DatasetError> {
        check_patch_dims(layout.spatial_ndim(), &patch).map_err(DatasetError::Patch)?;
        if let ExtractionMode::Predict(overlap) = &mode {
            check_overlap(&patch, overlap).map_err(DatasetError::Patch)?;
        }

        let files = list_tiff_files(dir.as_ref())?;
        let stats = match stats {
            Some(s) => s,
            None => Stats::estimate(&files).map_err(|e| match e {
                EstimateError::Read(path, err) => DatasetError::Read(path, err),
                // 文件列表非空, 估计阶段不会报空输入.
                EstimateError::NoInputFiles => unreachable!(),
            })?,
        };

        Ok(Self {
            files,
            layout,
            patch,
            mode,
            stats,
            transforms: Vec::new(),
        })
    }

    /// 数据集的有序文件列表.
    #[inline]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// 数据集统计量.
    #[inline]
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// 提取模式.
    #[inline]
    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }

    /// 在变换流水线末尾追加一个补丁变换.
    pub fn push_transform(&mut self, transform: Transform) {
        self.transforms.push(transform);
    }

    /// 以给定工作进程上下文创建惰性补丁流.
    ///
    /// 任何文件上的错误 (读取, 轴不符, 规格不符) 会被记录日志,
    /// 作为 `Err` 产出一次, 然后整条流终止; 没有跳过坏文件的模式.
    pub fn patches(&self, worker: WorkerContext) -> PatchStream<'_> {
        self.stream(worker, false)
    }

    /// 以给定工作进程上下文创建整样本流: 不做补丁提取,
    /// 逐样本产出归一化后的 `(C, [Z,] Y, X)` 数据.
    ///
    /// 用于小图直接推理等不需要切块的场合. 错误处理与 [`Self::patches`] 一致.
    pub fn samples(&self, worker: WorkerContext) -> PatchStream<'_> {
        self.stream(worker, true)
    }

    fn stream(&self, worker: WorkerContext, whole: bool) -> PatchStream<'_> {
        let mut files_rev: Vec<usize> = (0..self.files.len())
            .filter(|i| i % worker.count() == worker.id())
            .collect();
        files_rev.reverse();

        PatchStream {
            dataset: self,
            whole,
            files_rev,
            cursor: None,
            cur_file: 0,
            dead: false,
        }
    }
}

/// 单个文件的提取游标. 体数据的所有权在此, 游标弃置即释放.
enum FileCursor {
    Seq(SequentialPatches<CanonicalVolume>),
    Rand(RandomPatches<CanonicalVolume>),
    Tiled(TiledPatches<CanonicalVolume>),
    Whole { volume: CanonicalVolume, next: usize },
}

impl FileCursor {
    /// 产出 `(样本序号, 拼接信息, 数据)`. 文件耗尽时返回 `None`.
    fn next_patch(&mut self) -> Option<(usize, Option<TileRegion>, ArrayD<f32>)> {
        match self {
            Self::Seq(it) => it.next_indexed().map(|(s, d)| (s, None, d)),
            Self::Rand(it) => it.next_indexed().map(|(s, d)| (s, None, d)),
            Self::Tiled(it) => it.next().map(|t| (t.region.sample, Some(t.region), t.data)),
            Self::Whole { volume, next } => {
                if *next == volume.samples() {
                    return None;
                }
                let sample = *next;
                *next += 1;
                Some((sample, None, volume.sample(sample).to_owned()))
            }
        }
    }
}

/// 惰性补丁流. 见 [`TiffDataset::patches`].
pub struct PatchStream<'a> {
    dataset: &'a TiffDataset,
    whole: bool,
    /// 分派给本工作进程的文件序号, 逆序存储.
    files_rev: Vec<usize>,
    cursor: Option<FileCursor>,
    cur_file: usize,
    dead: bool,
}

impl PatchStream<'_> {
    /// 打开文件并建立对应模式的游标.
    fn open_cursor(&self, index: usize) -> Result<FileCursor, StreamError> {
        let path = &self.dataset.files[index];

        let raw = read_volume(path).map_err(|e| {
            error!("读取文件 {} 失败: {e:?}", path.display());
            StreamError::Read(path.clone(), e)
        })?;
        let volume = CanonicalVolume::from_array(raw, &self.dataset.layout).map_err(|e| {
            error!("文件 {} 维度与轴描述符不符: {e:?}", path.display());
            StreamError::AxisMismatch(path.clone(), e)
        })?;

        if self.whole {
            return Ok(FileCursor::Whole { volume, next: 0 });
        }

        let patch = self.dataset.patch;
        let spec_err = |e| {
            error!("文件 {} 与补丁规格不符: {e:?}", path.display());
            StreamError::Patch(path.clone(), e)
        };
        Ok(match self.dataset.mode {
            ExtractionMode::Sequential => {
                FileCursor::Seq(SequentialPatches::new(volume, patch).map_err(spec_err)?)
            }
            ExtractionMode::Random => FileCursor::Rand(
                RandomPatches::new(volume, patch, None, StdRng::from_entropy())
                    .map_err(spec_err)?,
            ),
            ExtractionMode::Predict(overlap) => {
                FileCursor::Tiled(TiledPatches::new(volume, patch, overlap).map_err(spec_err)?)
            }
        })
    }

    /// 归一化并依序应用全部变换.
    fn post_process(&self, mut data: ArrayD<f32>) -> ArrayD<f32> {
        data = self.dataset.stats.normalize(data);
        for transform in &self.dataset.transforms {
            data = transform(data);
        }
        data
    }
}

impl Iterator for PatchStream<'_> {
    type Item = Result<StreamPatch, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.dead {
            return None;
        }
        loop {
            if let Some(cursor) = self.cursor.as_mut() {
                match cursor.next_patch() {
                    Some((sample, region, data)) => {
                        return Some(Ok(StreamPatch {
                            data: self.post_process(data),
                            file_index: self.cur_file,
                            sample,
                            region,
                        }));
                    }
                    // 当前文件耗尽: 弃置游标, 释放体数据.
                    None => self.cursor = None,
                }
            }

            let index = self.files_rev.pop()?;
            self.cur_file = index;
            match self.open_cursor(index) {
                Ok(cursor) => self.cursor = Some(cursor),
                Err(e) => {
                    // 错误即终止, 不跳过坏文件.
                    self.dead = true;
                    self.files_rev.clear();
                    return Some(Err(e));
                }
            }
        }
    }
}
