use std::fs::File;
use std::io::BufReader;
use std::ops::Index;
use std::path::Path;

use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, ArrayView2, Axis, Ix2, IxDyn};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::{ColorType, TiffError};

use crate::Idx2d;

mod axes;
mod save;
mod window;

pub use axes::{AxisLayout, AxisParseError, ShapeMismatch};
pub use save::ImgWriteVis;
pub use window::DisplayRange;

/// 读取 TIFF 文件错误.
#[derive(Debug)]
pub enum ReadVolumeError {
    /// 底层 I/O 错误.
    Io(std::io::Error),

    /// TIFF 解码错误.
    Decode(TiffError),

    /// 不支持的颜色类型. 目前仅支持单通道灰度 (任意位深).
    UnsupportedColor(ColorType),

    /// 多页 TIFF 中各页尺寸不一致.
    RaggedPages,
}

/// 将单页解码结果统一转换为 `f32` 缓冲.
fn page_to_f32(page: DecodingResult) -> Vec<f32> {
    match page {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|p| p as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|p| p as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|p| p as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|p| p as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|p| p as f32).collect(),
    }
}

/// 读取 TIFF 文件为 `f32` 数组.
///
/// 单页文件读出 `(Y, X)`; 多页文件按页序堆叠为 `(P, Y, X)`,
/// 页轴的语义 (样本/时间/通道/深度) 由数据集级的轴描述符决定.
/// 各种灰度位深统一转换为 `f32`; 不做任何尺寸压缩 (squeeze),
/// 文件里有什么轴, 结果里就有什么轴.
pub fn read_volume<P: AsRef<Path>>(path: P) -> Result<ArrayD<f32>, ReadVolumeError> {
    let file = File::open(path.as_ref()).map_err(ReadVolumeError::Io)?;
    let mut decoder = Decoder::new(BufReader::new(file)).map_err(ReadVolumeError::Decode)?;

    let mut pages: Vec<f32> = Vec::new();
    let mut page_cnt = 0usize;
    let mut dims: Option<Idx2d> = None;

    loop {
        let color = decoder.colortype().map_err(ReadVolumeError::Decode)?;
        if !matches!(color, ColorType::Gray(_)) {
            return Err(ReadVolumeError::UnsupportedColor(color));
        }

        let (w, h) = decoder.dimensions().map_err(ReadVolumeError::Decode)?;
        let cur = (h as usize, w as usize);
        match dims {
            None => dims = Some(cur),
            Some(first) if first != cur => return Err(ReadVolumeError::RaggedPages),
            Some(_) => {}
        }

        let page = decoder.read_image().map_err(ReadVolumeError::Decode)?;
        pages.extend(page_to_f32(page));
        page_cnt += 1;

        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(ReadVolumeError::Decode)?;
    }

    // 循环至少执行一次, `dims` 必有值.
    let (h, w) = dims.unwrap();
    let shape: Vec<usize> = if page_cnt == 1 {
        vec![h, w]
    } else {
        vec![page_cnt, h, w]
    };

    // 缓冲长度等于各页长度之和, 该操作不会生成 `Err`, 可直接 unwrap.
    Ok(ArrayD::from_shape_vec(IxDyn(&shape), pages).unwrap())
}

/// 规范轴序的显微图像体数据: `(N, C, [Z,] Y, X)`. 强度值以 `f32` 保存.
///
/// 2D 数据秩为 4, 3D 数据秩为 5; 样本轴与通道轴恒存在 (尺寸可为 1).
#[derive(Debug, Clone)]
pub struct CanonicalVolume {
    data: ArrayD<f32>,
    is_3d: bool,
}

/// 打开体数据文件错误.
#[derive(Debug)]
pub enum OpenVolumeError {
    /// 读取/解码失败.
    Read(ReadVolumeError),

    /// 轴描述符与文件维度不符.
    Shape(ShapeMismatch),
}

impl CanonicalVolume {
    /// 打开 TIFF 文件并按 `layout` 规范化. 如果打开成功, 则返回 `Ok(Self)`,
    /// 否则返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P, layout: &AxisLayout) -> Result<Self, OpenVolumeError> {
        let raw = read_volume(path).map_err(OpenVolumeError::Read)?;
        Self::from_array(raw, layout).map_err(OpenVolumeError::Shape)
    }

    /// 从已在内存中的原始数组直接构建 (如外部读入的 hyperstack).
    ///
    /// 数组秩必须等于 `layout` 的描述符长度, 否则返回 [`ShapeMismatch`].
    pub fn from_array(arr: ArrayD<f32>, layout: &AxisLayout) -> Result<Self, ShapeMismatch> {
        let data = layout.canonicalize(arr)?;
        Ok(Self {
            data,
            is_3d: layout.is_3d(),
        })
    }

    /// 样本个数 (N >= 1).
    #[inline]
    pub fn samples(&self) -> usize {
        self.data.shape()[0]
    }

    /// 通道个数 (C >= 1).
    #[inline]
    pub fn channels(&self) -> usize {
        self.data.shape()[1]
    }

    /// 深度尺寸. 2D 数据返回 `None`.
    #[inline]
    pub fn depth(&self) -> Option<usize> {
        self.is_3d.then(|| self.data.shape()[2])
    }

    /// 高度尺寸.
    #[inline]
    pub fn height(&self) -> usize {
        self.data.shape()[self.data.ndim() - 2]
    }

    /// 宽度尺寸.
    #[inline]
    pub fn width(&self) -> usize {
        self.data.shape()[self.data.ndim() - 1]
    }

    /// 数据是否含深度轴 (3D)?
    #[inline]
    pub fn is_3d(&self) -> bool {
        self.is_3d
    }

    /// 空间维数: 2D 为 2, 3D 为 3.
    #[inline]
    pub fn spatial_ndim(&self) -> usize {
        if self.is_3d {
            3
        } else {
            2
        }
    }

    /// 规范布局的完整形状.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// 空间轴形状: `[Z,] Y, X`.
    #[inline]
    pub fn spatial_shape(&self) -> &[usize] {
        &self.data.shape()[2..]
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayViewD<'_, f32> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMutD<'_, f32> {
        self.data.view_mut()
    }

    /// 取出底层数组, 消耗 `self`.
    #[inline]
    pub fn into_data(self) -> ArrayD<f32> {
        self.data
    }

    /// 获取第 `index` 个样本的视图, 形状 `(C, [Z,] Y, X)`.
    ///
    /// 当 `index` 越界时 panic.
    #[inline]
    pub fn sample(&self, index: usize) -> ArrayViewD<'_, f32> {
        self.data.index_axis(Axis(0), index)
    }

    /// 获取 `(sample, channel[, depth])` 对应的 Y-X 平面视图.
    ///
    /// 2D 数据 `depth` 必须为 `None`, 3D 数据必须为 `Some`;
    /// 任一索引越界或深度参数与维数不符时 panic.
    pub fn plane(&self, sample: usize, channel: usize, depth: Option<usize>) -> Plane<'_> {
        assert_eq!(
            self.is_3d,
            depth.is_some(),
            "深度参数必须与数据维数一致 (2D 取 None, 3D 取 Some)"
        );
        let mut view = self.data.view();
        view = view.index_axis_move(Axis(0), sample);
        view = view.index_axis_move(Axis(0), channel);
        if let Some(z) = depth {
            view = view.index_axis_move(Axis(0), z);
        }
        // 此时只剩 Y, X 两根轴, 该操作不会生成 `Err`, 可直接 unwrap.
        Plane {
            data: view.into_dimensionality::<Ix2>().unwrap(),
        }
    }
}

/// 体数据中单个 `(样本, 通道 [, 深度])` 的不可变 Y-X 平面视图.
pub struct Plane<'a> {
    /// 底层数据的轻量级视图, 借用于 [`CanonicalVolume`].
    ///
    /// 这里有意把代码写死为 `ArrayView` 降低灵活性, 但使结构的意图更加明确.
    data: ArrayView2<'a, f32>,
}

impl Index<Idx2d> for Plane<'_> {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl Plane<'_> {
    /// 平面形状 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 获取给定位置 (高, 宽) 的强度值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<&f32> {
        self.data.get(pos)
    }

    /// 获得底层视图的一份 shallow copy.
    #[inline]
    pub fn array_view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl CanonicalVolume {
    /// 借助 `rayon`, 并行地对每个样本的可变视图实施 `op` 操作.
    ///
    /// 适用于在流水线外预先施加图像级变换.
    pub fn par_for_each_sample_mut<F>(&mut self, op: F)
    where
        F: Fn(ArrayViewMutD<f32>) + Sync + Send,
    {
        self.data
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .for_each(op);
    }

    /// 借助 `rayon`, 并行地对每个样本的不可变视图实施 `op` 操作.
    pub fn par_for_each_sample<F>(&self, op: F)
    where
        F: Fn(ArrayViewD<f32>) + Sync + Send,
    {
        self.data.axis_iter(Axis(0)).into_par_iter().for_each(op);
    }
}
