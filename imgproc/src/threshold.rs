use image::DynamicImage;
use imageproc::contrast::{ThresholdType, adaptive_threshold, otsu_level, threshold_mut};
use serde::Deserialize;
use tracing::debug;

use crate::error::OpError;
use crate::op::{NamedOp, ProcessingOp, ensure_not_empty};

/// 阈值化方式
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdKind {
    Binary,
    BinaryInv,
    Truncate,
    ToZero,
    ToZeroInv,
    /// 以 Otsu 方法求得的阈值做二值化
    #[default]
    Otsu,
}

/// 全局阈值化, 输出灰度图
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Threshold {
    pub threshold: u8,
    pub max_value: u8,
    pub kind: ThresholdKind,
}

impl Default for Threshold {
    fn default() -> Self {
        Self {
            threshold: 0,
            max_value: 255,
            kind: ThresholdKind::Otsu,
        }
    }
}

impl Threshold {
    fn threshold_type(&self) -> ThresholdType {
        match self.kind {
            ThresholdKind::Binary | ThresholdKind::Otsu => ThresholdType::Binary,
            ThresholdKind::BinaryInv => ThresholdType::BinaryInverted,
            ThresholdKind::Truncate => ThresholdType::Truncate,
            ThresholdKind::ToZero => ThresholdType::ToZero,
            ThresholdKind::ToZeroInv => ThresholdType::ToZeroInverted,
        }
    }

    /// 输出是否只含 0 与前景值
    fn binarizes(&self) -> bool {
        matches!(
            self.kind,
            ThresholdKind::Binary | ThresholdKind::BinaryInv | ThresholdKind::Otsu
        )
    }
}

impl ProcessingOp for Threshold {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        ensure_not_empty(Self::NAME, input)?;
        let mut gray = input.to_luma8();
        let t = match self.kind {
            ThresholdKind::Otsu => {
                let level = otsu_level(&gray);
                debug!("Otsu 阈值: {}", level);
                level
            }
            _ => self.threshold,
        };
        threshold_mut(&mut gray, t, self.threshold_type());
        if self.binarizes() && self.max_value != 255 {
            gray.iter_mut()
                .filter(|v| **v == 255)
                .for_each(|v| *v = self.max_value);
        }
        Ok(DynamicImage::ImageLuma8(gray))
    }
}

impl NamedOp for Threshold {
    const NAME: &'static str = "threshold";
}

/// 自适应阈值化
///
/// 像素不小于以其为中心、边长 `2 * block_radius + 1` 的邻域整数均值时置为 255,
/// 否则置为 0, 邻域在图像边界处截断
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AdaptiveThreshold {
    pub block_radius: u32,
}

impl Default for AdaptiveThreshold {
    fn default() -> Self {
        Self { block_radius: 5 }
    }
}

impl ProcessingOp for AdaptiveThreshold {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        ensure_not_empty(Self::NAME, input)?;
        self.validate()?;
        Ok(DynamicImage::ImageLuma8(adaptive_threshold(
            &input.to_luma8(),
            self.block_radius,
        )))
    }
}

impl NamedOp for AdaptiveThreshold {
    const NAME: &'static str = "adaptive_threshold";

    fn validate(&self) -> Result<(), OpError> {
        if self.block_radius == 0 {
            return Err(OpError::bad_params(Self::NAME, "邻域半径须大于 0"));
        }
        Ok(())
    }
}
