//! 均匀随机提取.

use super::{check_patch, cut, grid, Extents, InvalidPatchSpec};
use crate::data::CanonicalVolume;
use crate::Idx2d;
use ndarray::ArrayD;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::borrow::Borrow;
use std::num::NonZeroUsize;

/// 以均匀随机模式创建补丁提取器. 随机源取自系统熵.
///
/// 每个样本独立采样 `per_sample` 块补丁, 每根空间轴的起点在
/// `0..=extent - patch` 上均匀抽取 (有放回). `per_sample` 取 `None`
/// 时默认为同一图像顺序平铺的块数, 使随机模式具有与顺序模式相当的
/// 单轮数据量; 调用方也可以提前停止消费或用 `take(n)` 截断.
///
/// 规格不合法时返回 [`InvalidPatchSpec`], 此时不产出任何补丁.
pub fn random_patches(
    volume: &CanonicalVolume,
    patch: Extents,
    per_sample: Option<NonZeroUsize>,
) -> Result<RandomPatches<&CanonicalVolume>, InvalidPatchSpec> {
    RandomPatches::new(volume, patch, per_sample, StdRng::from_entropy())
}

/// 与 [`random_patches`] 相同, 但使用给定种子, 序列可复现.
pub fn random_patches_with_seed(
    volume: &CanonicalVolume,
    patch: Extents,
    per_sample: Option<NonZeroUsize>,
    seed: u64,
) -> Result<RandomPatches<&CanonicalVolume>, InvalidPatchSpec> {
    RandomPatches::new(volume, patch, per_sample, StdRng::seed_from_u64(seed))
}

/// 均匀随机补丁迭代器. 产出形状为 `(C, [Z,] Y, X)` 的补丁.
#[derive(Debug)]
pub struct RandomPatches<V> {
    volume: V,
    sizes: Vec<usize>,
    /// 每根空间轴的起点上界 (含).
    max_start: Vec<usize>,
    per_sample: usize,
    emitted: usize,
    rng: StdRng,
}

impl<V: Borrow<CanonicalVolume>> RandomPatches<V> {
    pub(crate) fn new(
        volume: V,
        patch: Extents,
        per_sample: Option<NonZeroUsize>,
        rng: StdRng,
    ) -> Result<Self, InvalidPatchSpec> {
        let v = volume.borrow();
        check_patch(v.spatial_shape(), &patch)?;

        let sizes = patch.to_vec();
        let max_start: Vec<usize> = v
            .spatial_shape()
            .iter()
            .zip(&sizes)
            .map(|(&extent, &p)| extent - p)
            .collect();
        let per_sample = match per_sample {
            Some(n) => n.get(),
            None => v
                .spatial_shape()
                .iter()
                .zip(&sizes)
                .map(|(&extent, &p)| grid::tiles_per_axis(extent, p))
                .product(),
        };

        Ok(Self {
            volume,
            sizes,
            max_start,
            per_sample,
            emitted: 0,
            rng,
        })
    }

    /// 每个样本采样的补丁数.
    #[inline]
    pub fn per_sample(&self) -> usize {
        self.per_sample
    }

    /// 产出下一块补丁及其样本序号.
    pub(crate) fn next_indexed(&mut self) -> Option<(usize, ArrayD<f32>)> {
        if self.emitted == self.volume.borrow().samples() * self.per_sample {
            return None;
        }
        let sample = self.emitted / self.per_sample;
        self.emitted += 1;

        let rng = &mut self.rng;
        let ranges: Vec<Idx2d> = self
            .max_start
            .iter()
            .zip(&self.sizes)
            .map(|(&hi, &len)| {
                let s = rng.gen_range(0..=hi);
                (s, s + len)
            })
            .collect();
        Some((sample, cut(self.volume.borrow(), sample, &ranges)))
    }
}

impl<V: Borrow<CanonicalVolume>> Iterator for RandomPatches<V> {
    type Item = ArrayD<f32>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_indexed().map(|(_, patch)| patch)
    }
}

impl<V: Borrow<CanonicalVolume>> ExactSizeIterator for RandomPatches<V> {
    #[inline]
    fn len(&self) -> usize {
        self.volume.borrow().samples() * self.per_sample - self.emitted
    }
}

#[cfg(test)]
mod tests {
    use super::{random_patches, random_patches_with_seed};
    use crate::patch::{Extents, InvalidPatchSpec};
    use crate::{AxisLayout, CanonicalVolume};
    use ndarray::{ArrayD, IxDyn};
    use std::num::NonZeroUsize;

    fn volume(axes: &str, shape: &[usize]) -> CanonicalVolume {
        let layout = AxisLayout::parse(axes).unwrap();
        let total: usize = shape.iter().product();
        let data: Vec<f32> = (0..total).map(|v| v as f32).collect();
        let arr = ArrayD::from_shape_vec(IxDyn(shape), data).unwrap();
        CanonicalVolume::from_array(arr, &layout).unwrap()
    }

    /// 每块补丁都完整落在图像内: 形状正确, 且左上角值对应合法起点.
    #[test]
    fn test_random_in_bounds() {
        let vol = volume("YX", &[10, 8]);
        let n = NonZeroUsize::new(64).unwrap();
        for p in random_patches_with_seed(&vol, Extents::D2((4, 3)), Some(n), 7).unwrap() {
            assert_eq!(p.shape(), &[1, 4, 3]);
            // 图像值即行优先序号, 由左上角值反推起点.
            let top_left = p[[0, 0, 0]] as usize;
            let (h, w) = (top_left / 8, top_left % 8);
            assert!(h <= 10 - 4 && w <= 8 - 3);
            // 同一块内的值必须与该起点的切块一致.
            assert_eq!(p[[0, 3, 2]] as usize, (h + 3) * 8 + (w + 2));
        }
    }

    /// 默认块数等于顺序平铺块数; 相同种子下序列可复现.
    #[test]
    fn test_random_count_and_seed() {
        let vol = volume("SYX", &[3, 10, 8]);
        let it = random_patches(&vol, Extents::D2((4, 4)), None).unwrap();
        // 3 样本 * ceil(10/4) * ceil(8/4).
        assert_eq!(it.per_sample(), 6);
        assert_eq!(it.len(), 18);

        let a: Vec<_> = random_patches_with_seed(&vol, Extents::D2((4, 4)), None, 42)
            .unwrap()
            .collect();
        let b: Vec<_> = random_patches_with_seed(&vol, Extents::D2((4, 4)), None, 42)
            .unwrap()
            .collect();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x, y);
        }
    }

    /// 非法规格在产出任何补丁之前报错.
    #[test]
    fn test_random_invalid_spec() {
        let vol = volume("YX", &[10, 10]);
        assert_eq!(
            random_patches(&vol, Extents::D2((12, 5)), None).unwrap_err(),
            InvalidPatchSpec::TooLarge(0, 12, 10)
        );
    }
}
