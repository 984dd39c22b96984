//! 推理切块提取.

use super::{check_overlap, check_patch, cut, grid, Extents, InvalidPatchSpec};
use crate::data::CanonicalVolume;
use crate::Idx2d;
use ndarray::ArrayD;
use std::borrow::Borrow;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 预测补丁的拼接信息.
///
/// 记录补丁从哪里来, 拼回去时保留哪一部分, 放到画布的什么位置.
/// 所有区间均为左闭右开.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TileRegion {
    /// 所属样本序号.
    pub sample: usize,

    /// 每根空间轴上, 相对补丁数据的有效 (非重叠) 区间.
    pub crop: Vec<Idx2d>,

    /// 每根空间轴上, 画布坐标系中的放置区间.
    pub stitch: Vec<Idx2d>,

    /// 画布的完整规范形状 `(N, C, [Z,] Y, X)`, 即源体数据的形状.
    pub shape: Vec<usize>,
}

/// 预测模式补丁: 数据与拼接信息.
///
/// 该结构完全透明. 模型推理后, 用预测结果替换 `data` (保持形状),
/// 携带原 `region` 交给 [`stitch`](super::stitch()) 即可还原完整图像.
#[derive(Clone, Debug)]
pub struct TilePatch {
    /// 补丁数据, 形状 `(C, [Z,] Y, X)`, 含重叠边缘.
    pub data: ArrayD<f32>,

    /// 拼接信息.
    pub region: TileRegion,
}

/// 以推理切块模式创建补丁提取器.
///
/// 类似顺序平铺, 但相邻块之间带 `overlap` 的重叠; 重叠带在中点
/// 一分为二划归两侧 (图像边界侧不裁剪), 使得全部有效区间恰好划分画布:
/// 拼接时每个像素恰好被写一次.
///
/// 规格不合法 (含重叠量不小于补丁尺寸) 时返回 [`InvalidPatchSpec`].
pub fn tiled_patches(
    volume: &CanonicalVolume,
    patch: Extents,
    overlap: Extents,
) -> Result<TiledPatches<&CanonicalVolume>, InvalidPatchSpec> {
    TiledPatches::new(volume, patch, overlap)
}

/// 推理切块迭代器. 产出携带拼接信息的 [`TilePatch`].
#[derive(Debug)]
pub struct TiledPatches<V> {
    volume: V,
    /// `(样本序号, 各空间轴坐标三元组)`, 逆序存储.
    combos_rev: Vec<(usize, Vec<(Idx2d, Idx2d, Idx2d)>)>,
}

impl<V: Borrow<CanonicalVolume>> TiledPatches<V> {
    pub(crate) fn new(volume: V, patch: Extents, overlap: Extents) -> Result<Self, InvalidPatchSpec> {
        let v = volume.borrow();
        check_patch(v.spatial_shape(), &patch)?;
        check_overlap(&patch, &overlap)?;

        let coords_each: Vec<Vec<(Idx2d, Idx2d, Idx2d)>> = v
            .spatial_shape()
            .iter()
            .zip(patch.to_vec())
            .zip(overlap.to_vec())
            .map(|((&extent, p), o)| grid::crop_and_stitch_coords(extent, p, o))
            .collect();

        let mut combos_rev: Vec<(usize, Vec<(Idx2d, Idx2d, Idx2d)>)> = (0..v.samples())
            .flat_map(|sample| {
                grid::cartesian(&coords_each)
                    .into_iter()
                    .map(move |coords| (sample, coords))
            })
            .collect();
        combos_rev.reverse();

        Ok(Self { volume, combos_rev })
    }
}

impl<V: Borrow<CanonicalVolume>> Iterator for TiledPatches<V> {
    type Item = TilePatch;

    fn next(&mut self) -> Option<Self::Item> {
        let (sample, coords) = self.combos_rev.pop()?;

        let tile: Vec<Idx2d> = coords.iter().map(|&(t, _, _)| t).collect();
        let crop: Vec<Idx2d> = coords.iter().map(|&(_, c, _)| c).collect();
        let stitch: Vec<Idx2d> = coords.iter().map(|&(_, _, s)| s).collect();

        let volume = self.volume.borrow();
        Some(TilePatch {
            data: cut(volume, sample, &tile),
            region: TileRegion {
                sample,
                crop,
                stitch,
                shape: volume.shape().to_vec(),
            },
        })
    }
}

impl<V: Borrow<CanonicalVolume>> ExactSizeIterator for TiledPatches<V> {
    #[inline]
    fn len(&self) -> usize {
        self.combos_rev.len()
    }
}
