use ndarray::ArrayView2;
use ordered_float::NotNan;

/// 显示窗口, 包含强度下限与上限.
///
/// 显微强度数据没有 CT HU 那样的固定物理标尺, 可视化时需要先把
/// `[lo, hi]` 区间线性映射到 8-bit 灰度. 该窗口是只读的.
/// 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug)]
pub struct DisplayRange {
    lo: f32,
    hi: f32,
}

impl DisplayRange {
    /// 构建显示窗口.
    ///
    /// `lo` 和 `hi` 必须有限且 `lo < hi`, 否则返回 `None`.
    pub fn new(lo: f32, hi: f32) -> Option<DisplayRange> {
        if lo.is_finite() && hi.is_finite() && lo < hi {
            Some(Self { lo, hi })
        } else {
            None
        }
    }

    /// 从平面数据的有限值 min/max 构建显示窗口.
    ///
    /// 数据为空, 全部非有限, 或 min == max (平坦图像) 时返回 `None`.
    pub fn from_data(data: ArrayView2<f32>) -> Option<DisplayRange> {
        let finite = || {
            data.iter()
                .copied()
                .filter(|v| v.is_finite())
                // 已过滤 NaN, 该操作不会生成 `Err`, 可直接 unwrap.
                .map(|v| NotNan::new(v).unwrap())
        };
        let lo = finite().min()?.into_inner();
        let hi = finite().max()?.into_inner();
        Self::new(lo, hi)
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f32 {
        self.lo
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.hi
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.hi - self.lo
    }

    /// 求在当前窗口设置下, 强度 `v` 对应的灰度图像素整数值 (0 <= value <= 255).
    ///
    /// 如果 `v` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval(&self, v: f32) -> Option<u8> {
        if !v.is_finite() {
            return None;
        }
        if v <= self.lo {
            Some(u8::MIN)
        } else if v >= self.hi {
            Some(u8::MAX)
        } else {
            // 255, not 256.
            Some((((v - self.lo) / self.width()) * 255.0) as u8)
        }
    }

    /// 求在当前窗口设置下, 强度 `v` 对应的灰度图像素分布点 (0.0 <= value <= 255.0).
    ///
    /// 如果 `v` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval_f32(&self, v: f32) -> Option<f32> {
        if !v.is_finite() {
            return None;
        }
        if v <= self.lo {
            Some(0.0)
        } else if v >= self.hi {
            Some(255.0)
        } else {
            Some((v - self.lo) / self.width() * 255.0)
        }
    }
}
