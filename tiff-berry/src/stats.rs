//! 数据集统计量的流式估计.
//!
//! 归一化所需的全局 mean/std 在数据集构建时计算一次, 此后对所有工作进程只读共享.

use crate::data::{read_volume, ReadVolumeError};
use log::info;
use ndarray::ArrayD;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 统计量估计错误.
#[derive(Debug)]
pub enum EstimateError {
    /// 输入文件列表为空.
    NoInputFiles,

    /// 某个文件读取/解码失败.
    Read(PathBuf, ReadVolumeError),
}

/// 数据集统计量: 全局均值与标准差.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Stats {
    /// 全局均值.
    pub mean: f32,

    /// 全局标准差.
    pub std: f32,
}

impl Stats {
    /// 流式估计给定文件集合的统计量.
    ///
    /// 逐文件读取, 任意时刻内存中至多保留一幅图像. 结果取各图像均值的简单平均
    /// 与各图像 (总体, ddof = 0) 标准差的简单平均.
    ///
    /// # 注意
    ///
    /// 这 **不是** 合并样本后的全局统计量, 而是逐图统计的平均值.
    /// 已有模型的归一化依赖该口径, 因此必须原样保留, 不要 "修正" 成合并公式.
    pub fn estimate<P: AsRef<Path>>(files: &[P]) -> Result<Self, EstimateError> {
        if files.is_empty() {
            return Err(EstimateError::NoInputFiles);
        }

        let mut means = 0.0f64;
        let mut stds = 0.0f64;
        for path in files {
            let arr = read_volume(path)
                .map_err(|e| EstimateError::Read(path.as_ref().to_owned(), e))?;
            let (mean, std) = mean_std(&arr);
            means += mean;
            stds += std;
        }

        let count = files.len() as f64;
        let ans = Self {
            mean: (means / count) as f32,
            std: (stds / count) as f32,
        };
        info!("已为 {} 个图像计算统计量: mean = {}, std = {}", files.len(), ans.mean, ans.std);
        Ok(ans)
    }

    /// 归一化: `(patch - mean) / std`.
    ///
    /// 与原始流水线一致, 不对 `std == 0` 做特殊处理.
    #[inline]
    pub fn normalize(&self, patch: ArrayD<f32>) -> ArrayD<f32> {
        let (mean, std) = (self.mean, self.std);
        patch.mapv_into(|v| (v - mean) / std)
    }

    /// 反归一化: `patch * std + mean`. 用于把模型输出还原回原始强度标尺.
    #[inline]
    pub fn denormalize(&self, patch: ArrayD<f32>) -> ArrayD<f32> {
        let (mean, std) = (self.mean, self.std);
        patch.mapv_into(|v| v * std + mean)
    }
}

/// 单幅图像的均值与总体标准差, 以 `f64` 累加.
fn mean_std(arr: &ArrayD<f32>) -> (f64, f64) {
    let n = arr.len() as f64;
    debug_assert!(n > 0.0);

    let mean = arr.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = arr
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::{EstimateError, Stats};
    use ndarray::{ArrayD, IxDyn};
    use std::fs::File;
    use std::path::{Path, PathBuf};
    use tiff::encoder::{colortype, TiffEncoder};

    fn scratch_dir(tag: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("tiff-berry-test-{}-{tag}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_tiff(path: &Path, data: &[f32], (h, w): (usize, usize)) {
        let file = File::create(path).unwrap();
        let mut enc = TiffEncoder::new(file).unwrap();
        enc.write_image::<colortype::Gray32Float>(w as u32, h as u32, data)
            .unwrap();
    }

    fn float_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    /// 空文件列表直接失败.
    #[test]
    fn test_estimate_empty() {
        let files: [&Path; 0] = [];
        assert!(matches!(
            Stats::estimate(&files),
            Err(EstimateError::NoInputFiles)
        ));
    }

    /// 两个常数图像: 均值取平均, 标准差为 0.
    #[test]
    fn test_estimate_mean_of_means() {
        let dir = scratch_dir("stats-mean");
        let a = dir.join("a.tif");
        let b = dir.join("b.tif");
        write_tiff(&a, &[2.0; 16], (4, 4));
        write_tiff(&b, &[6.0; 16], (4, 4));

        let stats = Stats::estimate(&[&a, &b]).unwrap();
        assert!(float_eq(stats.mean, 4.0));
        assert!(float_eq(stats.std, 0.0));

        std::fs::remove_dir_all(dir).unwrap();
    }

    /// 逐图统计的平均, 而不是合并统计: 两图各自 std 为 1, 合并 std 更大.
    #[test]
    fn test_estimate_is_per_image_average() {
        let dir = scratch_dir("stats-avg");
        let a = dir.join("a.tif");
        let b = dir.join("b.tif");
        // 每图取值 {0, 2}: mean 1, std 1.
        write_tiff(&a, &[0.0, 2.0, 0.0, 2.0], (2, 2));
        // 每图取值 {10, 12}: mean 11, std 1.
        write_tiff(&b, &[10.0, 12.0, 10.0, 12.0], (2, 2));

        let stats = Stats::estimate(&[&a, &b]).unwrap();
        assert!(float_eq(stats.mean, 6.0));
        // 合并统计约为 5.1, 逐图平均必须是 1.
        assert!(float_eq(stats.std, 1.0));

        std::fs::remove_dir_all(dir).unwrap();
    }

    /// 归一化与反归一化互逆.
    #[test]
    fn test_normalize_roundtrip() {
        let stats = Stats { mean: 3.0, std: 2.0 };
        let arr = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![1.0f32, 3.0, 5.0, 7.0]).unwrap();

        let norm = stats.normalize(arr.clone());
        assert!(float_eq(norm[[0, 0]], -1.0));
        assert!(float_eq(norm[[1, 1]], 2.0));

        let back = stats.denormalize(norm);
        assert!(Iterator::eq(back.iter(), arr.iter()));
    }
}
