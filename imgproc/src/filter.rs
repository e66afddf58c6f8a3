use image::{DynamicImage, ImageBuffer, Pixel};
use imageproc::filter::{gaussian_blur_f32, median_filter};
use serde::Deserialize;

use crate::error::OpError;
use crate::op::{NamedOp, ProcessingOp, ensure_not_empty, map_image};

/// 逐子像素合并两张同尺寸图像
fn combine<P, F>(a: &ImageBuffer<P, Vec<u8>>, b: &ImageBuffer<P, Vec<u8>>, f: F) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
    F: Fn(u8, u8) -> u8,
{
    let mut out = a.clone();
    for (o, &v) in out.iter_mut().zip(b.iter()) {
        *o = f(*o, v);
    }
    out
}

fn validate_sigma(name: &str, sigma: f32) -> Result<(), OpError> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(OpError::bad_params(name, format!("sigma 须为正数: {}", sigma)));
    }
    Ok(())
}

/// 高斯模糊
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GaussianBlur {
    pub sigma: f32,
}

impl Default for GaussianBlur {
    fn default() -> Self {
        Self { sigma: 1.0 }
    }
}

impl ProcessingOp for GaussianBlur {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        ensure_not_empty(Self::NAME, input)?;
        Ok(map_image(
            input,
            |image| gaussian_blur_f32(image, self.sigma),
            |image| gaussian_blur_f32(image, self.sigma),
        ))
    }
}

impl NamedOp for GaussianBlur {
    const NAME: &'static str = "gaussian_blur";

    fn validate(&self) -> Result<(), OpError> {
        validate_sigma(Self::NAME, self.sigma)
    }
}

/// 中值滤波, 窗口为 `2 * radius + 1` 的正方形
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MedianBlur {
    pub radius: u32,
}

impl Default for MedianBlur {
    fn default() -> Self {
        Self { radius: 1 }
    }
}

impl ProcessingOp for MedianBlur {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        ensure_not_empty(Self::NAME, input)?;
        let r = self.radius;
        Ok(map_image(
            input,
            |image| median_filter(image, r, r),
            |image| median_filter(image, r, r),
        ))
    }
}

impl NamedOp for MedianBlur {
    const NAME: &'static str = "median_blur";
}

/// 非锐化掩模
///
/// 与模糊图差异小于 `threshold` 的像素保持不变
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct UnsharpMask {
    pub sigma: f32,
    pub threshold: f32,
    pub amount: f32,
}

impl Default for UnsharpMask {
    fn default() -> Self {
        Self {
            sigma: 1.0,
            threshold: 5.0,
            amount: 1.0,
        }
    }
}

impl UnsharpMask {
    fn sharpen(&self, value: u8, blurred: u8) -> u8 {
        let (v, b) = (value as f32, blurred as f32);
        if (v - b).abs() < self.threshold {
            return value;
        }
        (v * (1.0 + self.amount) - b * self.amount)
            .round()
            .clamp(0.0, 255.0) as u8
    }
}

impl ProcessingOp for UnsharpMask {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        ensure_not_empty(Self::NAME, input)?;
        let sharpen = |v, b| self.sharpen(v, b);
        Ok(map_image(
            input,
            |image| combine(image, &gaussian_blur_f32(image, self.sigma), sharpen),
            |image| combine(image, &gaussian_blur_f32(image, self.sigma), sharpen),
        ))
    }
}

impl NamedOp for UnsharpMask {
    const NAME: &'static str = "unsharp_mask";

    fn validate(&self) -> Result<(), OpError> {
        validate_sigma(Self::NAME, self.sigma)
    }
}

/// 除以自身的高斯模糊图以消除不均匀光照
///
/// `out = in * scale_factor / blur(in)`, 模糊图为 0 处输出 0
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DivGaussianBlur {
    pub sigma: f32,
    pub scale_factor: f32,
}

impl Default for DivGaussianBlur {
    fn default() -> Self {
        Self {
            sigma: 33.0,
            scale_factor: 255.0,
        }
    }
}

impl DivGaussianBlur {
    fn divide(&self, value: u8, blurred: u8) -> u8 {
        if blurred == 0 {
            return 0;
        }
        (value as f32 * self.scale_factor / blurred as f32)
            .round()
            .clamp(0.0, 255.0) as u8
    }
}

impl ProcessingOp for DivGaussianBlur {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        ensure_not_empty(Self::NAME, input)?;
        let divide = |v, b| self.divide(v, b);
        Ok(map_image(
            input,
            |image| combine(image, &gaussian_blur_f32(image, self.sigma), divide),
            |image| combine(image, &gaussian_blur_f32(image, self.sigma), divide),
        ))
    }
}

impl NamedOp for DivGaussianBlur {
    const NAME: &'static str = "div_gaussian_blur";

    fn validate(&self) -> Result<(), OpError> {
        validate_sigma(Self::NAME, self.sigma)?;
        if !self.scale_factor.is_finite() {
            return Err(OpError::bad_params(Self::NAME, "缩放系数无效"));
        }
        Ok(())
    }
}
