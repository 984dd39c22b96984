#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 面向大尺寸显微图像自监督去噪训练 (Noise2Void 系列)
//! 的 TIFF 数据流水线: 轴规范化, 补丁提取, 统计量估计与推理拼接.
//!
//! 该 crate 目前仅提供 `safe` 接口. 将来可能为部分高性能场景关键路径提供 `unsafe` 接口.
//!
//! # 注意
//!
//! 1. 该 crate 假设同一数据集下的所有 TIFF 文件共享同一个轴描述符
//!   (如 `"TYX"`), 不做逐文件自动推断.
//! 2. 在非期望情况下 (几何契约被破坏), 程序会直接 panic, 而不会导致内存错误.
//!   As what Rust promises. 可恢复的失败 (I/O, 解码, 规格校验) 一律走 `Result`.
//!
//! # 开发计划
//!
//! ### 轴描述符解析与规范化 ✅
//!
//! 将任意 `STCZYX` 子序列描述的数组合并/补齐为规范的
//! `(N, C, [Z,] Y, X)` 布局.
//!
//! 实现位于 `tiff-berry/src/data/axes.rs`.
//!
//! ### TIFF 体数据读取 ✅
//!
//! 多页 TIFF 按页堆叠为前导轴, 各种灰度位深统一转换为 `f32`.
//!
//! 实现位于 `tiff-berry/src/data`.
//!
//! ### 三种补丁提取策略 ✅
//!
//! 顺序平铺 (训练, 完整覆盖), 均匀随机采样 (训练),
//! 带重叠切块 (推理, 携带拼接坐标).
//!
//! 实现位于 `tiff-berry/src/patch`.
//!
//! ### 推理补丁拼接还原 ✅
//!
//! 裁剪重叠边缘并按记录坐标写回画布, 每个像素恰好写一次.
//!
//! 实现位于 `tiff-berry/src/patch/stitch.rs`.
//!
//! ### 流式统计量估计 ✅
//!
//! 逐文件计算各图像均值/标准差的简单平均, 任意时刻内存中至多一幅图像.
//!
//! 实现位于 `tiff-berry/src/stats.rs`.
//!
//! ### 数据集流水线 ✅
//!
//! 文件发现, 按工作进程划分, 读取 → 规范化 → 提取 → 归一化 → 变换 → 产出.
//!
//! 实现位于 `tiff-berry/src/dataset/stream.rs`.
//!
//! ### 显示窗口与平面预览 ✅
//!
//! 将浮点强度按显示窗口映射为 8-bit 灰度并保存.
//!
//! 实现位于 `tiff-berry/src/data/window.rs`.
//!
//! ### 完善代码文档 ✅
//!
//! 给每个 public API 提供文档, 并视情况给 private API 提供文档.

/// 二维索引, 同时也用作左闭右开区间的端点对.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 显微图像体数据基础结构.
mod data;

pub use data::{
    read_volume, AxisLayout, AxisParseError, CanonicalVolume, DisplayRange, ImgWriteVis,
    OpenVolumeError, Plane, ReadVolumeError, ShapeMismatch,
};

pub mod consts;

pub mod patch;

pub mod stats;

pub mod dataset;
pub mod prelude;
