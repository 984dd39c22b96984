//! 平铺网格计算.
//!
//! 所有逐轴几何都在这里: 顺序平铺的起点序列, 以及推理切块的
//! (切块, 裁剪, 拼接) 坐标三元组. 上层迭代器只做笛卡尔积与切片.

use crate::Idx2d;
use itertools::Itertools;
use num::integer::div_ceil;

/// 单轴顺序平铺的补丁个数: `ceil(extent / patch)`.
#[inline]
pub(crate) fn tiles_per_axis(extent: usize, patch: usize) -> usize {
    debug_assert!(0 < patch && patch <= extent);
    div_ceil(extent, patch)
}

/// 单轴顺序平铺起点: `0, p, 2p, ...`, 末块左移贴齐边界.
///
/// 尺寸不整除时末块与前一块部分重叠, 不做零填充.
pub(crate) fn tile_starts(extent: usize, patch: usize) -> Vec<usize> {
    (0..tiles_per_axis(extent, patch))
        .map(|k| (k * patch).min(extent - patch))
        .collect()
}

/// 推理切块的单轴坐标三元组: (切块区间, 块内有效区间, 画布拼接区间).
///
/// 步长为 `tile - overlap`; 相邻两块的重叠带在中点一分为二:
/// 前块保留到 `tile - overlap / 2`, 后块从 `overlap - overlap / 2` 起,
/// 奇数重叠量也不会重写像素. 图像边界侧不裁剪; 末块左移贴齐边界,
/// 其有效区间顺接前一块的拼接终点. 保证全部拼接区间恰好划分
/// `[0, extent)`: 每个画布像素恰好被写一次.
pub(crate) fn crop_and_stitch_coords(
    extent: usize,
    tile: usize,
    overlap: usize,
) -> Vec<(Idx2d, Idx2d, Idx2d)> {
    debug_assert!(0 < tile && tile <= extent);
    debug_assert!(overlap < tile);

    let step = tile - overlap;
    let mut out: Vec<(Idx2d, Idx2d, Idx2d)> = Vec::with_capacity(div_ceil(extent, step));
    let mut i = 0usize;

    while i < (extent - overlap).max(1) {
        if i + tile <= extent {
            let lo = if i > 0 { overlap - overlap / 2 } else { 0 };
            let hi = if i + tile < extent {
                tile - overlap / 2
            } else {
                tile
            };
            out.push(((i, i + tile), (lo, hi), (i + lo, i + hi)));
        } else {
            // 末块贴齐边界. 首块必然放得下, 此时 `out` 非空.
            let prev_end = out.last().unwrap().2 .1;
            out.push((
                (extent - tile, extent),
                (tile - (extent - prev_end), tile),
                (prev_end, extent),
            ));
        }
        i += step;
    }
    out
}

/// 各轴候选值的笛卡尔积, 行优先序 (最后一根轴变化最快).
pub(crate) fn cartesian<T: Clone>(axes: &[Vec<T>]) -> Vec<Vec<T>> {
    axes.iter()
        .map(|v| v.iter().cloned())
        .multi_cartesian_product()
        .collect()
}
