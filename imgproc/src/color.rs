use image::{DynamicImage, GrayImage};
use imageproc::contrast::equalize_histogram;
use imageproc::stats::cumulative_histogram;
use serde::Deserialize;
use tracing::debug;

use crate::error::OpError;
use crate::op::{NamedOp, ProcessingOp, apply_lut, ensure_not_empty};

/// 转为灰度图
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Grayscale {}

impl ProcessingOp for Grayscale {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        Ok(DynamicImage::ImageLuma8(input.to_luma8()))
    }
}

impl NamedOp for Grayscale {
    const NAME: &'static str = "grayscale";
}

/// 反色
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Invert {}

impl ProcessingOp for Invert {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        let mut out = input.clone();
        out.invert();
        Ok(out)
    }
}

impl NamedOp for Invert {
    const NAME: &'static str = "invert";
}

/// 伽马校正
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CorrectGamma {
    pub gamma: f64,
}

impl Default for CorrectGamma {
    fn default() -> Self {
        Self { gamma: 1.0 }
    }
}

impl ProcessingOp for CorrectGamma {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        let mut lut = [0u8; 256];
        for (i, v) in lut.iter_mut().enumerate() {
            *v = ((i as f64 / 255.0).powf(self.gamma) * 255.0)
                .round()
                .clamp(0.0, 255.0) as u8;
        }
        Ok(apply_lut(input, &lut))
    }
}

impl NamedOp for CorrectGamma {
    const NAME: &'static str = "correct_gamma";

    fn validate(&self) -> Result<(), OpError> {
        if !self.gamma.is_finite() || self.gamma <= 0.0 {
            return Err(OpError::bad_params(
                Self::NAME,
                format!("伽马值须为正数: {}", self.gamma),
            ));
        }
        Ok(())
    }
}

/// 直方图均衡化, 输出灰度图
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct EqualizeHistogram {}

impl ProcessingOp for EqualizeHistogram {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        ensure_not_empty(Self::NAME, input)?;
        Ok(DynamicImage::ImageLuma8(equalize_histogram(&input.to_luma8())))
    }
}

impl NamedOp for EqualizeHistogram {
    const NAME: &'static str = "equalize_histogram";
}

/// 自动调整亮度与对比度
///
/// 按灰度累计直方图截去两端 `clip_low_pct` 与 `clip_high_pct` 百分比的像素,
/// 将剩余灰度范围线性拉伸到 `[0, 255]`
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeBrightnessContrast {
    pub clip_low_pct: f32,
    pub clip_high_pct: f32,
}

impl Default for NormalizeBrightnessContrast {
    fn default() -> Self {
        Self {
            clip_low_pct: 1.0,
            clip_high_pct: 1.0,
        }
    }
}

impl NormalizeBrightnessContrast {
    /// 截断后的灰度范围, 范围为空时返回 `None`
    fn gray_range(&self, image: &GrayImage) -> Option<(usize, usize)> {
        let acc = cumulative_histogram(image).channels[0].map(|v| v as f32);
        let total = acc[255];
        let low = self.clip_low_pct * total / 100.0;
        let high = self.clip_high_pct * total / 100.0;
        let min_gray = acc.iter().position(|&v| v > low)?;
        let max_gray = acc.iter().rposition(|&v| v < total - high)?;
        if max_gray <= min_gray {
            return None;
        }
        Some((min_gray, max_gray))
    }
}

impl ProcessingOp for NormalizeBrightnessContrast {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        ensure_not_empty(Self::NAME, input)?;
        let Some((min_gray, max_gray)) = self.gray_range(&input.to_luma8()) else {
            debug!("灰度范围为空, 跳过亮度对比度调整");
            return Ok(input.clone());
        };

        let alpha = 255.0 / (max_gray - min_gray) as f32;
        let beta = -(min_gray as f32) * alpha;
        let mut lut = [0u8; 256];
        for (i, v) in lut.iter_mut().enumerate() {
            *v = (i as f32 * alpha + beta).abs().round().min(255.0) as u8;
        }
        Ok(apply_lut(input, &lut))
    }
}

impl NamedOp for NormalizeBrightnessContrast {
    const NAME: &'static str = "normalize_brightness_contrast";

    fn validate(&self) -> Result<(), OpError> {
        let valid = |v: f32| (0.0..50.0).contains(&v);
        if !valid(self.clip_low_pct) || !valid(self.clip_high_pct) {
            return Err(OpError::bad_params(Self::NAME, "截断百分比须在 [0, 50) 范围内"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    fn gradient() -> DynamicImage {
        let mut image = GrayImage::new(100, 1);
        for (x, _, pixel) in image.enumerate_pixels_mut() {
            *pixel = Luma([100 + (x as u8 / 2)]);
        }
        DynamicImage::ImageLuma8(image)
    }

    #[test]
    fn test_gray_range_clips_tails() {
        let op = NormalizeBrightnessContrast::default();
        // 灰度 100..=149, 每级 2 个像素
        assert_eq!(op.gray_range(gradient().as_luma8().unwrap()), Some((100, 148)));
        let op = NormalizeBrightnessContrast {
            clip_low_pct: 10.0,
            clip_high_pct: 10.0,
        };
        assert_eq!(op.gray_range(gradient().as_luma8().unwrap()), Some((105, 143)));
        let flat = GrayImage::from_pixel(4, 4, Luma([9]));
        assert_eq!(op.gray_range(&flat), None);
    }

    #[test]
    fn test_grayscale_and_invert() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([10, 20, 30])));
        let gray = Grayscale {}.apply(&image).unwrap();
        assert!(gray.as_luma8().is_some());

        let inverted = Invert {}.apply(&image).unwrap();
        assert_eq!(
            inverted.as_rgb8().unwrap().get_pixel(0, 0),
            &Rgb([245, 235, 225])
        );
    }

    #[test]
    fn test_correct_gamma() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(1, 1, Luma([64])));
        let out = CorrectGamma { gamma: 0.5 }.apply(&image).unwrap();
        let expected = ((64.0f64 / 255.0).sqrt() * 255.0).round() as u8;
        assert_eq!(out.as_luma8().unwrap().get_pixel(0, 0), &Luma([expected]));

        let out = CorrectGamma::default().apply(&image).unwrap();
        assert_eq!(out, image);
        assert!(CorrectGamma { gamma: 0.0 }.validate().is_err());
    }

    #[test]
    fn test_normalize_stretches_range() {
        let op = NormalizeBrightnessContrast {
            clip_low_pct: 0.0,
            clip_high_pct: 0.0,
        };
        let out = op.apply(&gradient()).unwrap();
        let out = out.as_luma8().unwrap();
        assert_eq!(out.get_pixel(0, 0), &Luma([0]));
        assert!(out.get_pixel(99, 0)[0] >= 250);
    }

    #[test]
    fn test_normalize_uniform_image_unchanged() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([90])));
        let out = NormalizeBrightnessContrast::default().apply(&image).unwrap();
        assert_eq!(out, image);
    }

    #[test]
    fn test_equalize_histogram() {
        let out = EqualizeHistogram {}.apply(&gradient()).unwrap();
        let out = out.as_luma8().unwrap();
        assert!(out.get_pixel(99, 0)[0] > out.get_pixel(0, 0)[0]);
    }
}
