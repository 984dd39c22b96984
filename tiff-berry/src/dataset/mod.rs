//! 数据集操作.

use crate::consts::TIFF_PATTERN;
use crate::data::ReadVolumeError;
use crate::patch::InvalidPatchSpec;
use std::path::{Path, PathBuf};

mod stream;

pub use stream::{PatchStream, StreamError, StreamPatch, TiffDataset, Transform, WorkerContext};

/// 数据集构建错误.
#[derive(Debug)]
pub enum DatasetError {
    /// 目录下没有任何 TIFF 文件.
    NoInputFiles(PathBuf),

    /// 路径不是合法 UTF-8, 无法构造匹配模式.
    BadPath(PathBuf),

    /// 统计量估计阶段读取文件失败.
    Read(PathBuf, ReadVolumeError),

    /// 补丁/重叠规格不合法.
    Patch(InvalidPatchSpec),
}

/// 递归列出 `dir` 下所有 TIFF 文件 (`*.tif*`), 按路径升序排列.
///
/// 排序保证所有工作进程看到同一份文件列表, 这是按序号划分工作的前提.
/// 没有任何匹配文件时返回 [`DatasetError::NoInputFiles`].
pub fn list_tiff_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, DatasetError> {
    let dir = dir.as_ref();
    let pattern = dir.join("**").join(TIFF_PATTERN);
    let pattern = pattern
        .to_str()
        .ok_or_else(|| DatasetError::BadPath(dir.to_owned()))?;

    // 模式由常量拼接而来, 不会是非法 glob, 可直接 unwrap.
    let mut files: Vec<PathBuf> = glob::glob(pattern)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(DatasetError::NoInputFiles(dir.to_owned()));
    }
    Ok(files)
}

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定后继项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}
