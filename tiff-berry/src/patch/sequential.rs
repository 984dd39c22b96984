//! 顺序平铺提取.

use super::{check_patch, cut, grid, Extents, InvalidPatchSpec};
use crate::data::CanonicalVolume;
use crate::Idx2d;
use ndarray::ArrayD;
use std::borrow::Borrow;

/// 以顺序平铺模式创建补丁提取器.
///
/// 每根空间轴以补丁尺寸为步长平铺, 尺寸不整除时末块左移贴齐边界,
/// 因此每个像素至少被一块补丁覆盖; 单轴块数为 `ceil(extent / patch)`.
/// 外层循环遍历样本, 通道不平铺, 整体随补丁携带.
///
/// 规格不合法时返回 [`InvalidPatchSpec`], 此时不产出任何补丁.
pub fn sequential_patches(
    volume: &CanonicalVolume,
    patch: Extents,
) -> Result<SequentialPatches<&CanonicalVolume>, InvalidPatchSpec> {
    SequentialPatches::new(volume, patch)
}

/// 顺序平铺补丁迭代器. 产出形状为 `(C, [Z,] Y, X)` 的补丁.
///
/// `V` 即可以是体数据的借用 (独立使用, 见 [`sequential_patches`]),
/// 也可以是所有权本身 (流水线内部逐文件持有).
#[derive(Debug)]
pub struct SequentialPatches<V> {
    volume: V,
    sizes: Vec<usize>,
    /// `(样本序号, 各空间轴起点)`, 逆序存储.
    combos_rev: Vec<(usize, Vec<usize>)>,
}

impl<V: Borrow<CanonicalVolume>> SequentialPatches<V> {
    pub(crate) fn new(volume: V, patch: Extents) -> Result<Self, InvalidPatchSpec> {
        let v = volume.borrow();
        check_patch(v.spatial_shape(), &patch)?;

        let sizes = patch.to_vec();
        let starts_each: Vec<Vec<usize>> = v
            .spatial_shape()
            .iter()
            .zip(&sizes)
            .map(|(&extent, &p)| grid::tile_starts(extent, p))
            .collect();

        let mut combos_rev: Vec<(usize, Vec<usize>)> = (0..v.samples())
            .flat_map(|sample| {
                grid::cartesian(&starts_each)
                    .into_iter()
                    .map(move |starts| (sample, starts))
            })
            .collect();
        combos_rev.reverse();

        Ok(Self {
            volume,
            sizes,
            combos_rev,
        })
    }

    /// 产出下一块补丁及其样本序号.
    pub(crate) fn next_indexed(&mut self) -> Option<(usize, ArrayD<f32>)> {
        let (sample, starts) = self.combos_rev.pop()?;
        let ranges: Vec<Idx2d> = starts
            .iter()
            .zip(&self.sizes)
            .map(|(&s, &len)| (s, s + len))
            .collect();
        Some((sample, cut(self.volume.borrow(), sample, &ranges)))
    }
}

impl<V: Borrow<CanonicalVolume>> Iterator for SequentialPatches<V> {
    type Item = ArrayD<f32>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_indexed().map(|(_, patch)| patch)
    }
}

impl<V: Borrow<CanonicalVolume>> ExactSizeIterator for SequentialPatches<V> {
    #[inline]
    fn len(&self) -> usize {
        self.combos_rev.len()
    }
}

#[cfg(test)]
mod tests {
    use super::sequential_patches;
    use crate::patch::{Extents, InvalidPatchSpec};
    use crate::{AxisLayout, CanonicalVolume};
    use ndarray::{ArrayD, IxDyn};
    use std::collections::HashSet;

    fn volume(axes: &str, shape: &[usize]) -> CanonicalVolume {
        let layout = AxisLayout::parse(axes).unwrap();
        let total: usize = shape.iter().product();
        let data: Vec<f32> = (0..total).map(|v| v as f32).collect();
        let arr = ArrayD::from_shape_vec(IxDyn(shape), data).unwrap();
        CanonicalVolume::from_array(arr, &layout).unwrap()
    }

    /// 8x8 单通道图像, (4, 4) 补丁: 恰好 4 块, 每块形状 (1, 4, 4),
    /// 共同覆盖全部 64 个像素.
    #[test]
    fn test_sequential_8x8() {
        let vol = volume("YX", &[8, 8]);
        let patches: Vec<_> =
            sequential_patches(&vol, Extents::D2((4, 4))).unwrap().collect();

        assert_eq!(patches.len(), 4);
        let mut seen = HashSet::new();
        for p in &patches {
            assert_eq!(p.shape(), &[1, 4, 4]);
            seen.extend(p.iter().map(|&v| v as usize));
        }
        assert_eq!(seen.len(), 64);
    }

    /// 尺寸不整除时, 块数为各轴 `ceil` 之积, 且边界像素均被覆盖.
    #[test]
    fn test_sequential_uneven_cover() {
        let vol = volume("YX", &[10, 9]);
        let it = sequential_patches(&vol, Extents::D2((4, 3))).unwrap();
        // ceil(10/4) * ceil(9/3) = 3 * 3.
        assert_eq!(it.len(), 9);

        let mut seen = HashSet::new();
        for p in it {
            seen.extend(p.iter().map(|&v| v as usize));
        }
        // 完整覆盖 (值各不相同, 可直接数像素).
        assert_eq!(seen.len(), 90);
    }

    /// 3D 多样本多通道: 通道不平铺, 样本逐一展开.
    #[test]
    fn test_sequential_3d_multi_sample() {
        let vol = volume("SCZYX", &[2, 3, 4, 6, 6]);
        let it = sequential_patches(&vol, Extents::D3((2, 3, 3))).unwrap();
        // 2 样本 * (2 * 2 * 2) 块.
        assert_eq!(it.len(), 16);
        for p in it {
            assert_eq!(p.shape(), &[3, 2, 3, 3]);
        }
    }

    /// 非法规格在产出任何补丁之前报错.
    #[test]
    fn test_sequential_invalid_spec() {
        let vol = volume("SYX", &[1, 10, 10]);
        assert_eq!(
            sequential_patches(&vol, Extents::D2((5, 11))).unwrap_err(),
            InvalidPatchSpec::TooLarge(1, 11, 10)
        );
        assert_eq!(
            sequential_patches(&vol, Extents::D3((5, 5, 5))).unwrap_err(),
            InvalidPatchSpec::DimMismatch(2, 3)
        );

        let vol3 = volume("ZYX", &[10, 10, 10]);
        assert_eq!(
            sequential_patches(&vol3, Extents::D3((1, 5, 5))).unwrap_err(),
            InvalidPatchSpec::DepthTooThin
        );
        assert_eq!(
            sequential_patches(&vol3, Extents::D2((5, 5))).unwrap_err(),
            InvalidPatchSpec::DimMismatch(3, 2)
        );
    }
}
