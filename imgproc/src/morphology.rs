use image::{DynamicImage, GrayImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};
use serde::Deserialize;

use crate::error::OpError;
use crate::op::{NamedOp, ProcessingOp, ensure_not_empty};

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MorphologyKind {
    Erode,
    Dilate,
    #[default]
    Open,
    Close,
    /// 膨胀减腐蚀
    Gradient,
    /// 原图减开运算
    TopHat,
    /// 闭运算减原图
    BlackHat,
}

/// 结构元素的距离度量
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MorphologyNorm {
    /// 菱形
    L1,
    /// 正方形
    #[default]
    Linf,
}

impl From<MorphologyNorm> for Norm {
    fn from(value: MorphologyNorm) -> Self {
        match value {
            MorphologyNorm::L1 => Norm::L1,
            MorphologyNorm::Linf => Norm::LInf,
        }
    }
}

/// 形态学运算
///
/// 非零像素视为前景, 输出二值灰度图
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Morphology {
    pub kind: MorphologyKind,
    pub radius: u8,
    pub norm: MorphologyNorm,
    pub iterations: u32,
}

impl Default for Morphology {
    fn default() -> Self {
        Self {
            kind: MorphologyKind::Open,
            radius: 1,
            norm: MorphologyNorm::Linf,
            iterations: 1,
        }
    }
}

/// 逐像素做饱和减法
fn subtract(a: &GrayImage, b: &GrayImage) -> GrayImage {
    let mut out = a.clone();
    for (o, &v) in out.iter_mut().zip(b.iter()) {
        *o = o.saturating_sub(v);
    }
    out
}

impl Morphology {
    fn erode(&self, image: &GrayImage) -> GrayImage {
        (0..self.iterations).fold(image.clone(), |acc, _| {
            erode(&acc, self.norm.into(), self.radius)
        })
    }

    fn dilate(&self, image: &GrayImage) -> GrayImage {
        (0..self.iterations).fold(image.clone(), |acc, _| {
            dilate(&acc, self.norm.into(), self.radius)
        })
    }

    fn run(&self, image: &GrayImage) -> GrayImage {
        match self.kind {
            MorphologyKind::Erode => self.erode(image),
            MorphologyKind::Dilate => self.dilate(image),
            MorphologyKind::Open => self.dilate(&self.erode(image)),
            MorphologyKind::Close => self.erode(&self.dilate(image)),
            MorphologyKind::Gradient => subtract(&self.dilate(image), &self.erode(image)),
            MorphologyKind::TopHat => subtract(image, &self.dilate(&self.erode(image))),
            MorphologyKind::BlackHat => subtract(&self.erode(&self.dilate(image)), image),
        }
    }
}

impl ProcessingOp for Morphology {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        ensure_not_empty(Self::NAME, input)?;
        Ok(DynamicImage::ImageLuma8(self.run(&input.to_luma8())))
    }
}

impl NamedOp for Morphology {
    const NAME: &'static str = "morphology";

    fn validate(&self) -> Result<(), OpError> {
        if self.iterations == 0 {
            return Err(OpError::bad_params(Self::NAME, "迭代次数须大于 0"));
        }
        Ok(())
    }
}
