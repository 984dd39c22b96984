//! 轴描述符解析与规范化.
//!
//! 原始数组的语义轴由一个 `STCZYX` 子序列描述 (如 `"TYX"`, `"CZYX"`).
//! 规范化将样本/时间轴合并为单一前导样本轴, 并补齐缺失的样本/通道轴,
//! 得到 `(N, C, [Z,] Y, X)` 布局.

use crate::consts::AXIS_ORDER;
use ndarray::{ArrayD, IxDyn};

/// 轴描述符解析错误.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AxisParseError {
    /// 非法轴符号. 仅允许 `S`, `T`, `C`, `Z`, `Y`, `X` (忽略大小写).
    BadSymbol(char),

    /// 轴符号重复出现.
    DupSymbol(char),

    /// 缺少 `Y` 或 `X` 轴.
    MissingYx,

    /// 轴顺序不符合 `STCZYX` 约定.
    BadOrder,
}

/// 轴描述符与数组实际维数不一致. `(描述符长度, 数组秩)`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ShapeMismatch(pub usize, pub usize);

/// 已解析的轴描述符.
///
/// 该结构是只读的, 对整个数据集共用一份. 构建见 [`AxisLayout::parse`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AxisLayout {
    s: bool,
    t: bool,
    c: bool,
    z: bool,
}

impl AxisLayout {
    /// 解析轴描述符.
    ///
    /// 描述符必须是 [`AXIS_ORDER`] 的子序列 (忽略大小写), 每个符号至多出现一次,
    /// 且必须包含 `Y` 和 `X`. 违反约定时返回对应的 [`AxisParseError`].
    pub fn parse(axes: &str) -> Result<Self, AxisParseError> {
        let mut seen = [false; 6];
        let mut last: Option<usize> = None;

        for ch in axes.chars() {
            let pos = AXIS_ORDER
                .find(ch.to_ascii_uppercase())
                .ok_or(AxisParseError::BadSymbol(ch))?;
            if seen[pos] {
                return Err(AxisParseError::DupSymbol(ch));
            }
            if last.is_some_and(|prev| pos < prev) {
                return Err(AxisParseError::BadOrder);
            }
            seen[pos] = true;
            last = Some(pos);
        }

        let [s, t, c, z, y, x] = seen;
        if !(y && x) {
            return Err(AxisParseError::MissingYx);
        }
        Ok(Self { s, t, c, z })
    }

    /// 描述符长度, 即原始数组应有的秩.
    #[inline]
    pub fn ndim(&self) -> usize {
        2 + usize::from(self.s) + usize::from(self.t) + usize::from(self.c) + usize::from(self.z)
    }

    /// 数据是否含深度轴 (3D)?
    #[inline]
    pub fn is_3d(&self) -> bool {
        self.z
    }

    /// 空间维数: 2D 为 2, 3D 为 3.
    #[inline]
    pub fn spatial_ndim(&self) -> usize {
        if self.z {
            3
        } else {
            2
        }
    }

    /// 是否声明了通道轴?
    #[inline]
    pub fn has_channel(&self) -> bool {
        self.c
    }

    /// 是否声明了样本/时间轴?
    #[inline]
    pub fn has_sample(&self) -> bool {
        self.s || self.t
    }

    /// 将原始数组重排为规范布局 `(N, C, [Z,] Y, X)`.
    ///
    /// - `S`/`T` 若存在, 合并为单一前导样本轴 (尺寸为二者尺寸之积);
    /// - 缺失的样本轴/通道轴补为尺寸 1;
    /// - `Z` 若存在, 结果秩为 5, 否则为 4.
    ///
    /// 数组秩与描述符长度不符时返回 [`ShapeMismatch`].
    pub fn canonicalize(&self, arr: ArrayD<f32>) -> Result<ArrayD<f32>, ShapeMismatch> {
        if arr.ndim() != self.ndim() {
            return Err(ShapeMismatch(self.ndim(), arr.ndim()));
        }

        // 依 STCZYX 序逐轴读取尺寸.
        let shape = arr.shape();
        let mut dim = shape.iter().copied();
        let mut n = 1usize;
        if self.s {
            n *= dim.next().unwrap();
        }
        if self.t {
            n *= dim.next().unwrap();
        }
        let c = if self.c { dim.next().unwrap() } else { 1 };
        let target: Vec<usize> = if self.z {
            vec![n, c, dim.next().unwrap(), dim.next().unwrap(), dim.next().unwrap()]
        } else {
            vec![n, c, dim.next().unwrap(), dim.next().unwrap()]
        };

        // 轴序既已符合 STCZYX 约定, 合并/补轴等价于按标准布局重塑.
        let arr = if arr.is_standard_layout() {
            arr
        } else {
            arr.as_standard_layout().to_owned()
        };

        // 尺寸乘积不变, 该操作不会生成 `Err`, 可直接 unwrap.
        Ok(arr.into_shape(IxDyn(&target)).unwrap())
    }
}
