//! 通用常量.

/// 轴符号全序. 轴描述符必须是该串的子序列 (忽略大小写).
///
/// 依次为: 样本 (S), 时间 (T), 通道 (C), 深度 (Z), 高 (Y), 宽 (X).
pub const AXIS_ORDER: &str = "STCZYX";

/// 数据集目录下 TIFF 文件的匹配模式. 同时涵盖 `.tif` 与 `.tiff`.
pub const TIFF_PATTERN: &str = "*.tif*";
