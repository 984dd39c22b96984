//! 推理补丁拼接还原.

use super::TilePatch;
use ndarray::{ArrayD, Axis, IxDyn, Slice};

/// 将推理补丁拼回完整画布.
///
/// 画布形状取自补丁记录的源体数据形状. 每块补丁先按其 `crop`
/// 区间裁掉重叠边缘, 再写入画布上的 `stitch` 区间. 切块几何
/// (见 [`tiled_patches`](super::tiled_patches)) 保证全部有效区间
/// 恰好划分画布: 每个画布像素恰好被写一次, 因此
/// `stitch(tiled_patches(v, p, o)) == v` 精确成立.
///
/// # 注意
///
/// `tiles` 必须非空, 且所有补丁记录的画布形状一致, 否则程序 panic.
/// 补丁集合不完整时, 画布的未覆盖区域保持为 0.
pub fn stitch(tiles: &[TilePatch]) -> ArrayD<f32> {
    assert!(!tiles.is_empty(), "补丁集合不能为空");

    let shape = &tiles[0].region.shape;
    let mut canvas = ArrayD::<f32>::zeros(IxDyn(shape));

    for t in tiles {
        assert_eq!(&t.region.shape, shape, "补丁记录的画布形状不一致");

        // 裁掉重叠边缘, 只保留有效区间.
        let mut src = t.data.view();
        for (k, &(c0, c1)) in t.region.crop.iter().enumerate() {
            src.slice_axis_inplace(Axis(1 + k), Slice::from(c0..c1));
        }

        // 写入画布的放置区间.
        let mut dst = canvas.view_mut().index_axis_move(Axis(0), t.region.sample);
        for (k, &(s0, s1)) in t.region.stitch.iter().enumerate() {
            dst.slice_axis_inplace(Axis(1 + k), Slice::from(s0..s1));
        }
        dst.assign(&src);
    }
    canvas
}
