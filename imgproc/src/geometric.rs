use common::{Rectangle, Size};
use image::{DynamicImage, ImageBuffer, Luma, Pixel, Rgb, imageops, imageops::FilterType};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use serde::Deserialize;
use tracing::debug;

use crate::error::OpError;
use crate::op::{NamedOp, ProcessingOp, ensure_not_empty, map_image};

/// 缩小时使用线性插值, 放大时使用三次插值
fn filter_for(from: (u32, u32), to: (u32, u32)) -> FilterType {
    if to.0 < from.0 || to.1 < from.1 {
        FilterType::Triangle
    } else {
        FilterType::CatmullRom
    }
}

/// 将图像置于指定尺寸且填充为 `value` 的画布上
fn place_on_canvas<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    size: (u32, u32),
    offset: (i64, i64),
    value: P,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let mut canvas = ImageBuffer::from_pixel(size.0, size.1, value);
    imageops::replace(&mut canvas, image, offset.0, offset.1);
    canvas
}

/// 裁剪
///
/// 超出图像的部分被截去, 未设置宽高时裁剪到图像边缘
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Crop {
    pub left: i32,
    pub top: i32,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

impl ProcessingOp for Crop {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        let size = Size::new(input.width() as i32, input.height() as i32);
        let width = self.width.unwrap_or_else(|| size.width.saturating_sub(self.left));
        let height = self.height.unwrap_or_else(|| size.height.saturating_sub(self.top));
        let requested = Rectangle::from_xywh(self.left, self.top, width, height);
        let rect = requested.snap_to(size);
        if rect.is_empty() {
            return Err(OpError::not_applicable(
                Self::NAME,
                format!("裁剪区域 {:?} 与图像 {:?} 无交集", requested, size),
            ));
        }
        debug!("图像裁剪: {:?} -> {:?}", requested, rect);
        Ok(input.crop_imm(
            rect.left as u32,
            rect.top as u32,
            rect.width() as u32,
            rect.height() as u32,
        ))
    }
}

impl NamedOp for Crop {
    const NAME: &'static str = "crop";

    fn validate(&self) -> Result<(), OpError> {
        if self.width.is_some_and(|w| w <= 0) || self.height.is_some_and(|h| h <= 0) {
            return Err(OpError::bad_params(Self::NAME, "裁剪宽高须大于 0"));
        }
        Ok(())
    }
}

/// 缩放到指定尺寸
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Resize {
    pub width: u32,
    pub height: u32,
}

impl Default for Resize {
    fn default() -> Self {
        Self {
            width: 640,
            height: 640,
        }
    }
}

impl ProcessingOp for Resize {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        ensure_not_empty(Self::NAME, input)?;
        let to = (self.width, self.height);
        Ok(input.resize_exact(to.0, to.1, filter_for(input_size(input), to)))
    }
}

impl NamedOp for Resize {
    const NAME: &'static str = "resize";

    fn validate(&self) -> Result<(), OpError> {
        if self.width == 0 || self.height == 0 {
            return Err(OpError::bad_params(Self::NAME, "缩放宽高须大于 0"));
        }
        Ok(())
    }
}

fn input_size(input: &DynamicImage) -> (u32, u32) {
    (input.width(), input.height())
}

/// 等比缩放到指定高度
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeToHeight {
    pub height: u32,
}

impl Default for ResizeToHeight {
    fn default() -> Self {
        Self { height: 32 }
    }
}

impl ProcessingOp for ResizeToHeight {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        ensure_not_empty(Self::NAME, input)?;
        let ratio = self.height as f64 / input.height() as f64;
        let width = ((input.width() as f64 * ratio).round() as u32).max(1);
        let to = (width, self.height);
        Ok(input.resize_exact(to.0, to.1, filter_for(input_size(input), to)))
    }
}

impl NamedOp for ResizeToHeight {
    const NAME: &'static str = "resize_to_height";

    fn validate(&self) -> Result<(), OpError> {
        if self.height == 0 {
            return Err(OpError::bad_params(Self::NAME, "高度须大于 0"));
        }
        Ok(())
    }
}

/// 按比例缩放
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Rescale {
    pub scale: f32,
}

impl Default for Rescale {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl ProcessingOp for Rescale {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        ensure_not_empty(Self::NAME, input)?;
        let width = ((input.width() as f32 * self.scale).round() as u32).max(1);
        let height = ((input.height() as f32 * self.scale).round() as u32).max(1);
        let to = (width, height);
        Ok(input.resize_exact(to.0, to.1, filter_for(input_size(input), to)))
    }
}

impl NamedOp for Rescale {
    const NAME: &'static str = "rescale";

    fn validate(&self) -> Result<(), OpError> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(OpError::bad_params(
                Self::NAME,
                format!("缩放比例须为正数: {}", self.scale),
            ));
        }
        Ok(())
    }
}

/// 四周填充固定宽度的边框
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AddPadding {
    pub padding: u32,
    pub pad_value: u8,
}

impl Default for AddPadding {
    fn default() -> Self {
        Self {
            padding: 10,
            pad_value: 255,
        }
    }
}

impl ProcessingOp for AddPadding {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        let p = self.padding;
        let padded = |side: u32| p.checked_mul(2).and_then(|v| v.checked_add(side));
        let (Some(width), Some(height)) = (padded(input.width()), padded(input.height())) else {
            return Err(OpError::not_applicable(Self::NAME, format!("填充宽度 {} 过大", p)));
        };
        let size = (width, height);
        let offset = (p as i64, p as i64);
        let v = self.pad_value;
        Ok(map_image(
            input,
            |image| place_on_canvas(image, size, offset, Luma([v])),
            |image| place_on_canvas(image, size, offset, Rgb([v, v, v])),
        ))
    }
}

impl NamedOp for AddPadding {
    const NAME: &'static str = "add_padding";
}

/// 竖向图像顺时针旋转 90 度转为横向
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Landscape {}

impl ProcessingOp for Landscape {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        if input.width() > input.height() {
            return Ok(input.clone());
        }
        Ok(input.rotate90())
    }
}

impl NamedOp for Landscape {
    const NAME: &'static str = "landscape";
}

/// 逆时针旋转指定角度, 画布扩展为旋转后的外接矩形, 空白处填充白色
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Rotate {
    pub angle: f32,
}

impl ProcessingOp for Rotate {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        if self.angle % 360.0 == 0.0 {
            return Ok(input.clone());
        }
        ensure_not_empty(Self::NAME, input)?;

        let (w, h) = (input.width() as f32, input.height() as f32);
        let (sin, cos) = self.angle.to_radians().sin_cos();
        let bound_w = (w * cos.abs() + h * sin.abs()).round().max(1.0) as u32;
        let bound_h = (w * sin.abs() + h * cos.abs()).round().max(1.0) as u32;
        let size = (bound_w.max(input.width()), bound_h.max(input.height()));
        let offset = (
            (size.0 - input.width()) as i64 / 2,
            (size.1 - input.height()) as i64 / 2,
        );
        // rotate_about_center 以顺时针为正
        let theta = -self.angle.to_radians();

        let rotated = map_image(
            input,
            |image| {
                let canvas = place_on_canvas(image, size, offset, Luma([255]));
                rotate_about_center(&canvas, theta, Interpolation::Nearest, Luma([255]))
            },
            |image| {
                let canvas = place_on_canvas(image, size, offset, Rgb([255, 255, 255]));
                rotate_about_center(&canvas, theta, Interpolation::Nearest, Rgb([255, 255, 255]))
            },
        );

        // 外接矩形小于原图的一边需裁去多余画布
        let crop_x = (size.0 - bound_w) / 2;
        let crop_y = (size.1 - bound_h) / 2;
        Ok(rotated.crop_imm(crop_x, crop_y, bound_w, bound_h))
    }
}

impl NamedOp for Rotate {
    const NAME: &'static str = "rotate";

    fn validate(&self) -> Result<(), OpError> {
        if !self.angle.is_finite() {
            return Err(OpError::bad_params(Self::NAME, "旋转角度无效"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, GrayImage, RgbImage};

    fn rgb(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([0, 0, 0])))
    }

    #[test]
    fn test_crop_snaps_to_image() {
        let op = Crop {
            left: -10,
            top: -10,
            width: Some(50),
            height: Some(50),
        };
        let out = op.apply(&rgb(100, 100)).unwrap();
        assert_eq!(out.dimensions(), (40, 40));
    }

    #[test]
    fn test_crop_outside_fails() {
        let op = Crop {
            left: 200,
            top: 200,
            width: Some(10),
            height: Some(10),
        };
        assert!(matches!(
            op.apply(&rgb(100, 100)),
            Err(OpError::NotApplicable { .. })
        ));
    }

    #[test]
    fn test_crop_extreme_offsets() {
        let op = Crop {
            left: i32::MIN,
            top: 0,
            width: Some(10),
            height: Some(10),
        };
        assert!(matches!(
            op.apply(&rgb(100, 100)),
            Err(OpError::NotApplicable { .. })
        ));
        let op = Crop {
            left: i32::MIN,
            top: i32::MIN,
            ..Default::default()
        };
        assert!(op.apply(&rgb(100, 100)).is_err());
    }

    #[test]
    fn test_crop_to_edge() {
        let op = Crop {
            left: 30,
            top: 10,
            ..Default::default()
        };
        let out = op.apply(&rgb(100, 50)).unwrap();
        assert_eq!(out.dimensions(), (70, 40));
        assert!(Crop::default().apply(&rgb(5, 5)).is_ok());
    }

    #[test]
    fn test_crop_validate() {
        let op = Crop {
            width: Some(0),
            ..Default::default()
        };
        assert!(matches!(op.validate(), Err(OpError::BadParams { .. })));
    }

    #[test]
    fn test_resize_ops() {
        let image = rgb(200, 100);
        let out = Resize {
            width: 50,
            height: 60,
        }
        .apply(&image)
        .unwrap();
        assert_eq!(out.dimensions(), (50, 60));

        let out = ResizeToHeight { height: 50 }.apply(&image).unwrap();
        assert_eq!(out.dimensions(), (100, 50));

        let out = Rescale { scale: 1.5 }.apply(&image).unwrap();
        assert_eq!(out.dimensions(), (300, 150));

        assert!(Rescale { scale: 0.0 }.validate().is_err());
        assert!(Resize { width: 0, height: 1 }.validate().is_err());
    }

    #[test]
    fn test_add_padding() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 2, Luma([0])));
        let out = AddPadding {
            padding: 3,
            pad_value: 200,
        }
        .apply(&image)
        .unwrap();
        let out = out.as_luma8().unwrap();
        assert_eq!(out.dimensions(), (10, 8));
        assert_eq!(out.get_pixel(0, 0), &Luma([200]));
        assert_eq!(out.get_pixel(3, 3), &Luma([0]));
        assert_eq!(out.get_pixel(7, 4), &Luma([200]));

        let op = AddPadding {
            padding: u32::MAX / 2,
            pad_value: 0,
        };
        assert!(matches!(
            op.apply(&image),
            Err(OpError::NotApplicable { .. })
        ));
    }

    #[test]
    fn test_landscape() {
        let out = Landscape {}.apply(&rgb(10, 20)).unwrap();
        assert_eq!(out.dimensions(), (20, 10));
        let out = Landscape {}.apply(&rgb(20, 10)).unwrap();
        assert_eq!(out.dimensions(), (20, 10));
    }

    #[test]
    fn test_rotate_expands_canvas() {
        let out = Rotate { angle: 90.0 }.apply(&rgb(40, 20)).unwrap();
        assert_eq!(out.dimensions(), (20, 40));

        let out = Rotate { angle: 45.0 }.apply(&rgb(10, 10)).unwrap();
        assert_eq!(out.dimensions(), (14, 14));
        // 角落为白色背景
        assert_eq!(out.as_rgb8().unwrap().get_pixel(0, 0), &Rgb([255, 255, 255]));

        let image = rgb(7, 3);
        assert_eq!(Rotate { angle: 0.0 }.apply(&image).unwrap(), image);
    }
}
