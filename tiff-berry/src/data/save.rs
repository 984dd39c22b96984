//! 图像的持久化存储.

use super::{DisplayRange, Plane};
use image::ImageResult;
use std::path::Path;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// `ImgWriteVis` trait 的意图是, 图像将以 "可视化友好" 的方式保存,
/// 而不是 "as is" 的方式. 对于以 `f32` 强度存储的显微平面,
/// 在保存时会先按显示窗口规范化到 8-bit 灰度.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 按数据自身的 min/max 自动加窗. 平坦图像整幅映射为黑色.
impl ImgWriteVis for Plane<'_> {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        match DisplayRange::from_data(self.array_view()) {
            Some(range) => self.save_with(range, path),
            None => {
                let (height, width) = self.shape();
                image::GrayImage::new(width as u32, height as u32).save(path)
            }
        }
    }
}

impl Plane<'_> {
    /// 按给定显示窗口将平面保存为 8-bit 灰度图.
    ///
    /// 非有限强度值 (inf, NaN) 映射为黑色.
    pub fn save_with<P: AsRef<Path>>(&self, range: DisplayRange, path: P) -> ImageResult<()> {
        let (height, width) = self.shape();
        let mut buf = image::GrayImage::new(width as u32, height as u32);
        for ((h, w), &v) in self.array_view().indexed_iter() {
            let gray = range.eval(v).unwrap_or(u8::MIN);
            buf.put_pixel(w as u32, h as u32, image::Luma([gray]));
        }
        buf.save(path)
    }
}

#[cfg(test)]
mod tests {
    use crate::{AxisLayout, CanonicalVolume, DisplayRange, ImgWriteVis};
    use ndarray::{ArrayD, IxDyn};

    /// 保存后能以 8-bit 灰度读回, 且窗口映射正确.
    #[test]
    fn test_save_plane_roundtrip() {
        let layout = AxisLayout::parse("YX").unwrap();
        let data: Vec<f32> = vec![0.0, 50.0, 100.0, 200.0];
        let arr = ArrayD::from_shape_vec(IxDyn(&[2, 2]), data).unwrap();
        let vol = CanonicalVolume::from_array(arr, &layout).unwrap();

        let mut path = std::env::temp_dir();
        path.push(format!("tiff-berry-test-save-{}.png", std::process::id()));

        let range = DisplayRange::new(0.0, 200.0).unwrap();
        vol.plane(0, 0, None).save_with(range, &path).unwrap();
        // 自动加窗版本也应成功.
        vol.plane(0, 0, None).save(&path).unwrap();

        let img = image::open(&path).unwrap().into_luma8();
        assert_eq!(img.dimensions(), (2, 2));

        std::fs::remove_file(path).unwrap();
    }
}
