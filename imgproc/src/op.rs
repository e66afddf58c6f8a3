use std::fmt::Debug;

use common::OcrResult;
use image::{DynamicImage, GrayImage, RgbImage};
use serde::de::DeserializeOwned;

use crate::error::OpError;

/// 图像处理操作接口
///
/// 操作本身不保存调用间状态, 失败时不产生输出图像
pub trait ProcessingOp: Send + Sync + Debug {
    /// 注册名称
    fn name(&self) -> &'static str;

    /// 处理图像
    ///
    /// # 参数
    ///
    /// * `input` - 输入图像
    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError>;

    /// 结合检测结果处理图像, 不需要检测结果的操作忽略该参数
    ///
    /// # 参数
    ///
    /// * `input` - 输入图像
    /// * `results` - 检测结果
    fn apply_with_results(
        &self,
        input: &DynamicImage,
        results: &[OcrResult],
    ) -> Result<DynamicImage, OpError> {
        let _ = results;
        self.apply(input)
    }
}

/// 可在注册表中按名称构建的操作
pub trait NamedOp: ProcessingOp + Default + DeserializeOwned + 'static {
    const NAME: &'static str;

    /// 校验参数
    fn validate(&self) -> Result<(), OpError> {
        Ok(())
    }
}

/// 灰度图与 RGB 图分别处理, 其余像素格式转换为 RGB 后处理
pub(crate) fn map_image<G, C>(input: &DynamicImage, gray: G, color: C) -> DynamicImage
where
    G: FnOnce(&GrayImage) -> GrayImage,
    C: FnOnce(&RgbImage) -> RgbImage,
{
    match input {
        DynamicImage::ImageLuma8(image) => DynamicImage::ImageLuma8(gray(image)),
        DynamicImage::ImageRgb8(image) => DynamicImage::ImageRgb8(color(image)),
        other => DynamicImage::ImageRgb8(color(&other.to_rgb8())),
    }
}

/// 通过查找表逐通道映射像素值
pub(crate) fn apply_lut(input: &DynamicImage, lut: &[u8; 256]) -> DynamicImage {
    map_image(
        input,
        |image| {
            let mut out = image.clone();
            out.iter_mut().for_each(|v| *v = lut[*v as usize]);
            out
        },
        |image| {
            let mut out = image.clone();
            out.iter_mut().for_each(|v| *v = lut[*v as usize]);
            out
        },
    )
}

/// 空图像无法处理
pub(crate) fn ensure_not_empty(name: &'static str, input: &DynamicImage) -> Result<(), OpError> {
    if input.width() == 0 || input.height() == 0 {
        return Err(OpError::not_applicable(name, "图像为空"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, Rgba, RgbaImage};

    #[test]
    fn test_apply_lut_gray() {
        let mut lut = [0u8; 256];
        for (i, v) in lut.iter_mut().enumerate() {
            *v = 255 - i as u8;
        }
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([10])));
        let out = apply_lut(&image, &lut);
        assert_eq!(out.as_luma8().unwrap().get_pixel(1, 1), &Luma([245]));
    }

    #[test]
    fn test_map_image_converts_rgba() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 4])));
        let out = map_image(&image, |g| g.clone(), |c| c.clone());
        assert_eq!(out.as_rgb8().unwrap().get_pixel(0, 0), &Rgb([1, 2, 3]));
    }
}
