use std::fs;

use ab_glyph::FontVec;
use common::OcrResult;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut};
use serde::Deserialize;
use tracing::debug;

use crate::error::OpError;
use crate::op::{NamedOp, ProcessingOp};

/// 绘制检测框, 旋转框按角度绘制四条边
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DrawBoundingBoxes {
    pub color: [u8; 3],
    pub thickness: u32,
}

impl Default for DrawBoundingBoxes {
    fn default() -> Self {
        Self {
            color: [0, 255, 0],
            thickness: 2,
        }
    }
}

impl DrawBoundingBoxes {
    fn draw(&self, canvas: &mut RgbImage, result: &OcrResult) {
        let color = Rgb(self.color);
        let points = result.rotated_rect().points();
        let half = (self.thickness.max(1) - 1) as f32 / 2.0;
        for i in 0..points.len() {
            let (p1, p2) = (points[i], points[(i + 1) % points.len()]);
            for t in 0..self.thickness.max(1) {
                let o = t as f32 - half;
                draw_line_segment_mut(canvas, (p1.x + o, p1.y), (p2.x + o, p2.y), color);
                draw_line_segment_mut(canvas, (p1.x, p1.y + o), (p2.x, p2.y + o), color);
            }
        }
    }
}

impl ProcessingOp for DrawBoundingBoxes {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        Ok(input.clone())
    }

    fn apply_with_results(
        &self,
        input: &DynamicImage,
        results: &[OcrResult],
    ) -> Result<DynamicImage, OpError> {
        let mut canvas = input.to_rgb8();
        for result in results {
            self.draw(&mut canvas, result);
        }
        Ok(DynamicImage::ImageRgb8(canvas))
    }
}

impl NamedOp for DrawBoundingBoxes {
    const NAME: &'static str = "draw_bounding_boxes";
}

/// 在检测框上方绘制 `文本: 置信度` 标签
///
/// 未配置字体时不绘制
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DrawLabels {
    pub color: [u8; 3],
    /// 字号, 单位为像素
    pub scale: f32,
    pub font_path: Option<String>,
}

impl Default for DrawLabels {
    fn default() -> Self {
        Self {
            color: [255, 0, 0],
            scale: 16.0,
            font_path: None,
        }
    }
}

impl DrawLabels {
    fn load_font(&self, path: &str) -> Result<FontVec, OpError> {
        let data = fs::read(path).map_err(|e| {
            OpError::not_applicable(Self::NAME, format!("读取字体 {} 失败: {}", path, e))
        })?;
        FontVec::try_from_vec(data).map_err(|e| {
            OpError::not_applicable(Self::NAME, format!("解析字体 {} 失败: {}", path, e))
        })
    }
}

/// 标签文本
fn label(result: &OcrResult) -> String {
    format!("{}: {:.2}", result.text, result.confidence)
}

impl ProcessingOp for DrawLabels {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, input: &DynamicImage) -> Result<DynamicImage, OpError> {
        Ok(input.clone())
    }

    fn apply_with_results(
        &self,
        input: &DynamicImage,
        results: &[OcrResult],
    ) -> Result<DynamicImage, OpError> {
        let Some(path) = &self.font_path else {
            debug!("未配置字体, 跳过标签绘制");
            return Ok(input.clone());
        };
        let font = self.load_font(path)?;

        let mut canvas = input.to_rgb8();
        let offset = self.scale.ceil() as i32;
        for result in results {
            let x = result.bbox.left.max(0);
            let y = (result.bbox.top - offset).max(0);
            draw_text_mut(
                &mut canvas,
                Rgb(self.color),
                x,
                y,
                self.scale,
                &font,
                &label(result),
            );
        }
        Ok(DynamicImage::ImageRgb8(canvas))
    }
}

impl NamedOp for DrawLabels {
    const NAME: &'static str = "draw_labels";

    fn validate(&self) -> Result<(), OpError> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(OpError::bad_params(Self::NAME, "字号须为正数"));
        }
        Ok(())
    }
}
