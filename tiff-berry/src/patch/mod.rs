//! 补丁提取.
//!
//! 三种策略把规范体数据切成定长补丁:
//!
//! 1. 顺序平铺 ([`sequential_patches`]): 步长等于补丁尺寸, 末块贴齐边界,
//!   每个像素至少被覆盖一次. 用于确定性训练集.
//! 2. 均匀随机 ([`random_patches`]): 每个样本在合法范围内均匀采样若干补丁.
//! 3. 推理切块 ([`tiled_patches`]): 带重叠量平铺, 每块携带拼接坐标,
//!   供 [`stitch`](crate::patch::stitch()) 还原完整图像.
//!
//! 三种策略都只平铺空间轴; 通道轴整体随补丁携带, 样本轴作为外层循环.

use crate::data::CanonicalVolume;
use crate::{Idx2d, Idx3d};
use ndarray::{ArrayD, Axis, Slice};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod grid;
mod random;
mod sequential;
mod stitch;
mod tiled;

pub use random::{random_patches, random_patches_with_seed, RandomPatches};
pub use sequential::{sequential_patches, SequentialPatches};
pub use stitch::stitch;
pub use tiled::{tiled_patches, TilePatch, TileRegion, TiledPatches};

/// 空间尺寸规格: 依空间维数为 2 或 3 个分量.
///
/// 既用作补丁尺寸, 也用作重叠量. 分量顺序与规范布局一致: `[深,] 高, 宽`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Extents {
    /// 平面 (高, 宽).
    D2(Idx2d),

    /// 立体 (深, 高, 宽).
    D3(Idx3d),
}

impl Extents {
    /// 从切片构建. 长度不是 2 或 3 时返回 `None`.
    pub fn from_slice(v: &[usize]) -> Option<Self> {
        match *v {
            [h, w] => Some(Self::D2((h, w))),
            [d, h, w] => Some(Self::D3((d, h, w))),
            _ => None,
        }
    }

    /// 分量个数 (2 或 3).
    #[inline]
    pub fn ndim(&self) -> usize {
        match self {
            Self::D2(_) => 2,
            Self::D3(_) => 3,
        }
    }

    /// 按 `[深,] 高, 宽` 顺序展开为 `Vec`.
    #[inline]
    pub fn to_vec(self) -> Vec<usize> {
        match self {
            Self::D2((h, w)) => vec![h, w],
            Self::D3((d, h, w)) => vec![d, h, w],
        }
    }
}

/// 补丁提取模式.
///
/// 每个变体只携带自己需要的参数, 非法的模式/参数组合在类型层面即不可表达.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ExtractionMode {
    /// 顺序平铺, 完整覆盖.
    Sequential,

    /// 均匀随机采样.
    Random,

    /// 推理切块, 携带给定重叠量与拼接坐标.
    Predict(Extents),
}

/// 补丁/重叠规格错误.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InvalidPatchSpec {
    /// 规格分量数与空间维数不符. `(期望, 实际)`
    DimMismatch(usize, usize),

    /// 某分量为零.
    ZeroExtent,

    /// 补丁尺寸超过图像对应尺寸. `(空间轴序号, 补丁值, 图像值)`
    TooLarge(usize, usize, usize),

    /// 深度分量为 1. 单层深度的数据应当按 2D 处理.
    DepthTooThin,

    /// 重叠量分量数与补丁不符. `(补丁分量数, 重叠分量数)`
    OverlapDimMismatch(usize, usize),

    /// 重叠量不小于补丁尺寸. `(空间轴序号, 重叠值, 补丁值)`
    OverlapTooLarge(usize, usize, usize),
}

/// 仅依赖空间维数的规格自检: 分量数, 零分量, 深度下限.
///
/// 数据集构建时用它提前拦截与图像无关的错误, 不必等到读第一个文件.
pub(crate) fn check_patch_dims(spatial_ndim: usize, patch: &Extents) -> Result<(), InvalidPatchSpec> {
    if patch.ndim() != spatial_ndim {
        return Err(InvalidPatchSpec::DimMismatch(spatial_ndim, patch.ndim()));
    }
    if patch.to_vec().contains(&0) {
        return Err(InvalidPatchSpec::ZeroExtent);
    }
    if let Extents::D3((1, _, _)) = patch {
        return Err(InvalidPatchSpec::DepthTooThin);
    }
    Ok(())
}

/// 校验补丁尺寸与图像空间形状的相容性.
///
/// 规则: 分量数等于空间维数; 每个分量在 `1..=图像尺寸` 内
/// (高/宽允许与图像等大); 深度分量必须大于 1.
pub(crate) fn check_patch(spatial: &[usize], patch: &Extents) -> Result<(), InvalidPatchSpec> {
    check_patch_dims(spatial.len(), patch)?;
    for (axis, (&pe, &ie)) in patch.to_vec().iter().zip(spatial).enumerate() {
        if pe > ie {
            return Err(InvalidPatchSpec::TooLarge(axis, pe, ie));
        }
    }
    Ok(())
}

/// 校验重叠量与补丁尺寸的相容性: 分量数一致, 且每个分量严格小于补丁分量.
pub(crate) fn check_overlap(patch: &Extents, overlap: &Extents) -> Result<(), InvalidPatchSpec> {
    if overlap.ndim() != patch.ndim() {
        return Err(InvalidPatchSpec::OverlapDimMismatch(
            patch.ndim(),
            overlap.ndim(),
        ));
    }
    for (axis, (&o, &p)) in overlap.to_vec().iter().zip(&patch.to_vec()).enumerate() {
        if o >= p {
            return Err(InvalidPatchSpec::OverlapTooLarge(axis, o, p));
        }
    }
    Ok(())
}

/// 从体数据中切出一块: 固定样本, 保留全部通道, 空间轴按区间裁剪.
pub(crate) fn cut(volume: &CanonicalVolume, sample: usize, ranges: &[Idx2d]) -> ArrayD<f32> {
    debug_assert_eq!(ranges.len(), volume.spatial_ndim());

    let mut view = volume.data().index_axis_move(Axis(0), sample);
    for (k, &(lo, hi)) in ranges.iter().enumerate() {
        view.slice_axis_inplace(Axis(1 + k), Slice::from(lo..hi));
    }
    view.to_owned()
}

#[cfg(test)]
mod tests {
    use super::{check_overlap, check_patch, Extents, InvalidPatchSpec};

    /// 规格构建的基本行为.
    #[test]
    fn test_extents_from_slice() {
        assert_eq!(Extents::from_slice(&[4, 4]), Some(Extents::D2((4, 4))));
        assert_eq!(Extents::from_slice(&[2, 4, 4]), Some(Extents::D3((2, 4, 4))));
        assert_eq!(Extents::from_slice(&[4]), None);
        assert_eq!(Extents::from_slice(&[4, 4, 4, 4]), None);
    }

    /// 补丁校验的各种违规情形.
    #[test]
    fn test_check_patch() {
        // X 补丁超过 X 尺寸.
        assert_eq!(
            check_patch(&[10, 10], &Extents::D2((5, 11))),
            Err(InvalidPatchSpec::TooLarge(1, 11, 10))
        );
        // 分量数与空间维数不符.
        assert_eq!(
            check_patch(&[10, 10], &Extents::D3((5, 5, 5))),
            Err(InvalidPatchSpec::DimMismatch(2, 3))
        );
        assert_eq!(
            check_patch(&[10, 10, 10], &Extents::D2((5, 5))),
            Err(InvalidPatchSpec::DimMismatch(3, 2))
        );
        // 深度为 1.
        assert_eq!(
            check_patch(&[10, 10, 10], &Extents::D3((1, 5, 5))),
            Err(InvalidPatchSpec::DepthTooThin)
        );
        // 零分量.
        assert_eq!(
            check_patch(&[10, 10], &Extents::D2((0, 5))),
            Err(InvalidPatchSpec::ZeroExtent)
        );
        // 合法: 与图像等大也可以.
        assert!(check_patch(&[10, 10], &Extents::D2((10, 10))).is_ok());
        assert!(check_patch(&[5, 10, 9], &Extents::D3((5, 5, 3))).is_ok());
    }

    /// 重叠校验: 分量数一致且严格小于补丁.
    #[test]
    fn test_check_overlap() {
        let patch = Extents::D2((4, 4));
        assert!(check_overlap(&patch, &Extents::D2((0, 3))).is_ok());
        assert_eq!(
            check_overlap(&patch, &Extents::D2((4, 0))),
            Err(InvalidPatchSpec::OverlapTooLarge(0, 4, 4))
        );
        assert_eq!(
            check_overlap(&patch, &Extents::D3((1, 1, 1))),
            Err(InvalidPatchSpec::OverlapDimMismatch(2, 3))
        );
    }
}
