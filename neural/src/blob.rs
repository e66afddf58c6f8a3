use std::borrow::Cow;

use common::{PointF, RotatedRect};
use image::{
    RgbImage,
    imageops::{self, FilterType},
};
use ndarray::{Array4, Axis};

use crate::config::{DetectorConfig, ResizeMode};

/// 图像坐标到模型输入坐标的仿射变换
///
/// `blob = image * scale + offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlobTransform {
    pub scale_x: f32,
    pub scale_y: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for BlobTransform {
    fn default() -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

impl BlobTransform {
    /// 计算缩放变换以及缩放后 (填充或裁剪前) 的图像尺寸
    ///
    /// # 参数
    ///
    /// * `mode` - 缩放方式
    /// * `src` - 图像尺寸 (宽, 高)
    /// * `dst` - 模型输入尺寸 (宽, 高)
    pub fn compute(mode: ResizeMode, src: (u32, u32), dst: (u32, u32)) -> (Self, (u32, u32)) {
        let (src_w, src_h) = (src.0.max(1) as f32, src.1.max(1) as f32);
        let (dst_w, dst_h) = dst;
        match mode {
            ResizeMode::Raw => (
                Self {
                    scale_x: dst_w as f32 / src_w,
                    scale_y: dst_h as f32 / src_h,
                    offset_x: 0.0,
                    offset_y: 0.0,
                },
                (dst_w, dst_h),
            ),
            ResizeMode::Letterbox => {
                let s = (dst_w as f32 / src_w).min(dst_h as f32 / src_h);
                let new_w = ((src_w * s).round() as u32).clamp(1, dst_w.max(1));
                let new_h = ((src_h * s).round() as u32).clamp(1, dst_h.max(1));
                (
                    Self {
                        scale_x: new_w as f32 / src_w,
                        scale_y: new_h as f32 / src_h,
                        offset_x: ((dst_w - new_w) / 2) as f32,
                        offset_y: ((dst_h - new_h) / 2) as f32,
                    },
                    (new_w, new_h),
                )
            }
            ResizeMode::Crop => {
                let s = (dst_w as f32 / src_w).max(dst_h as f32 / src_h);
                let new_w = ((src_w * s).round() as u32).max(dst_w);
                let new_h = ((src_h * s).round() as u32).max(dst_h);
                (
                    Self {
                        scale_x: new_w as f32 / src_w,
                        scale_y: new_h as f32 / src_h,
                        offset_x: -(((new_w - dst_w) / 2) as f32),
                        offset_y: -(((new_h - dst_h) / 2) as f32),
                    },
                    (new_w, new_h),
                )
            }
        }
    }

    pub fn to_image_point(&self, point: PointF) -> PointF {
        PointF::new(
            (point.x - self.offset_x) / self.scale_x,
            (point.y - self.offset_y) / self.scale_y,
        )
    }

    pub fn to_blob_point(&self, point: PointF) -> PointF {
        PointF::new(
            point.x * self.scale_x + self.offset_x,
            point.y * self.scale_y + self.offset_y,
        )
    }

    /// 将模型输入坐标系下的旋转矩形映射回图像坐标系
    pub fn to_image_rect(&self, rect: &RotatedRect) -> RotatedRect {
        RotatedRect::new(
            self.to_image_point(rect.center),
            rect.width / self.scale_x,
            rect.height / self.scale_y,
            rect.angle,
        )
    }
}

/// 将图像缩放, 归一化后写入模型输入张量
///
/// 张量形状不符时重新分配, 否则原地覆盖
///
/// # 参数
///
/// * `image` - 输入图像
/// * `config` - 检测器配置
/// * `blob` - 模型输入张量
pub fn fill_blob(image: &RgbImage, config: &DetectorConfig, blob: &mut Array4<f32>) -> BlobTransform {
    let (dst_w, dst_h) = config.input_size();
    let (transform, (new_w, new_h)) =
        BlobTransform::compute(config.resize_mode(), image.dimensions(), (dst_w, dst_h));

    let shape = (1, 3, dst_h as usize, dst_w as usize);
    if blob.dim() != shape {
        *blob = Array4::zeros(shape);
    }

    let mean = config.mean();
    let scale = config.scale();
    let pad_value = config.pad_value();
    for c in 0..3 {
        blob.index_axis_mut(Axis(1), c)
            .fill((pad_value[c] - mean[c]) * scale[c]);
    }

    let resized = if (new_w, new_h) == image.dimensions() {
        Cow::Borrowed(image)
    } else {
        Cow::Owned(imageops::resize(image, new_w, new_h, FilterType::Triangle))
    };

    let offset_x = transform.offset_x as i64;
    let offset_y = transform.offset_y as i64;
    for (x, y, pixel) in resized.enumerate_pixels() {
        let bx = x as i64 + offset_x;
        let by = y as i64 + offset_y;
        if bx < 0 || by < 0 || bx >= dst_w as i64 || by >= dst_h as i64 {
            continue;
        }
        for c in 0..3 {
            let channel = if config.swap_rb { 2 - c } else { c };
            blob[[0, c, by as usize, bx as usize]] = (pixel.0[channel] as f32 - mean[c]) * scale[c];
        }
    }
    transform
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelFamily;
    use image::Rgb;

    #[test]
    fn test_letterbox_round_trip() {
        let (transform, resized) =
            BlobTransform::compute(ResizeMode::Letterbox, (200, 100), (100, 100));
        assert_eq!(resized, (100, 50));
        assert_eq!(transform.offset_y, 25.0);

        let rect = RotatedRect::new(PointF::new(50.0, 50.0), 20.0, 10.0, 15.0);
        let mapped = transform.to_image_rect(&rect);
        assert!((mapped.center.x - 100.0).abs() < 1e-4);
        assert!((mapped.center.y - 50.0).abs() < 1e-4);
        assert!((mapped.width - 40.0).abs() < 1e-4);
        assert!((mapped.height - 20.0).abs() < 1e-4);
        assert_eq!(mapped.angle, 15.0);

        let point = PointF::new(33.0, 71.0);
        let back = transform.to_image_point(transform.to_blob_point(point));
        assert!((back.x - point.x).abs() < 1e-3);
        assert!((back.y - point.y).abs() < 1e-3);
    }

    #[test]
    fn test_raw_and_crop() {
        let (transform, resized) = BlobTransform::compute(ResizeMode::Raw, (200, 100), (100, 100));
        assert_eq!(resized, (100, 100));
        let point = transform.to_image_point(PointF::new(50.0, 50.0));
        assert_eq!(point, PointF::new(100.0, 50.0));

        let (transform, resized) = BlobTransform::compute(ResizeMode::Crop, (200, 100), (100, 100));
        assert_eq!(resized, (200, 100));
        assert_eq!(transform.offset_x, -50.0);
        let point = transform.to_image_point(PointF::new(50.0, 50.0));
        assert_eq!(point, PointF::new(100.0, 50.0));
    }

    #[test]
    fn test_fill_blob() {
        let image = RgbImage::from_pixel(4, 2, Rgb([10, 20, 30]));
        let mut config = DetectorConfig::for_family(ModelFamily::East);
        config.size = Some([4, 4]);
        config.mean = Some([0.0; 3]);
        config.scale = Some([1.0; 3]);
        config.pad_value = Some([1.0; 3]);

        let mut blob = Array4::zeros((0, 0, 0, 0));
        let transform = fill_blob(&image, &config, &mut blob);
        assert_eq!(blob.dim(), (1, 3, 4, 4));
        assert_eq!(transform.offset_y, 1.0);
        assert_eq!(blob[[0, 0, 0, 0]], 1.0);
        assert_eq!(blob[[0, 0, 1, 0]], 10.0);
        assert_eq!(blob[[0, 2, 2, 3]], 30.0);
        assert_eq!(blob[[0, 1, 3, 3]], 1.0);

        config.swap_rb = true;
        fill_blob(&image, &config, &mut blob);
        assert_eq!(blob[[0, 0, 1, 0]], 30.0);
        assert_eq!(blob[[0, 2, 1, 0]], 10.0);
    }
}
