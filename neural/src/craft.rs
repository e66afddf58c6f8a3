use common::{OcrResult, PointF, RotatedRect};
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::geometry::min_area_rect;
use imageproc::morphology::dilate;
use imageproc::point::Point;
use imageproc::region_labelling::{Connectivity, connected_components};
use ndarray::Ix4;

use crate::buffers::Buffers;
use crate::config::ModelFamily;
use crate::error::DetectorError;
use crate::extractor::{Extractor, FrameContext, expect_dims};

/// 连通域最小面积
const MIN_COMPONENT_AREA: u32 = 10;
/// 得分图相对模型输入的缩放倍数
const MAP_SCALE: f32 = 2.0;

/// CRAFT 字符区域文本检测
///
/// 模型输出 `[1, H / 2, W / 2, 2]`, 最后一维依次为文本得分与连接得分
pub struct Craft;

/// 连通域统计
#[derive(Debug, Clone, Copy)]
struct Component {
    area: u32,
    peak: f32,
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl Default for Component {
    fn default() -> Self {
        Self {
            area: 0,
            peak: f32::NEG_INFINITY,
            left: u32::MAX,
            top: u32::MAX,
            right: 0,
            bottom: 0,
        }
    }
}

/// 由最小外接矩形的四个顶点构造旋转矩形, 长边为宽
fn rect_from_corners(corners: &[Point<i32>; 4]) -> RotatedRect {
    let p = corners.map(|c| PointF::new(c.x as f32, c.y as f32));
    let center = PointF::new(
        p.iter().map(|c| c.x).sum::<f32>() / 4.0,
        p.iter().map(|c| c.y).sum::<f32>() / 4.0,
    );
    let mut width = p[0].distance(&p[1]);
    let mut height = p[1].distance(&p[2]);
    let mut angle = (p[1].y - p[0].y).atan2(p[1].x - p[0].x).to_degrees();
    if width < height {
        std::mem::swap(&mut width, &mut height);
        angle -= 90.0;
    }
    while angle > 90.0 {
        angle -= 180.0;
    }
    while angle <= -90.0 {
        angle += 180.0;
    }
    RotatedRect::new(center, width, height, angle)
}

impl Extractor for Craft {
    fn family(&self) -> ModelFamily {
        ModelFamily::Craft
    }

    fn extract(
        &self,
        frame: &FrameContext<'_>,
        buffers: &mut Buffers,
        _results: &mut Vec<OcrResult>,
    ) -> Result<(), DetectorError> {
        let out = buffers
            .outs
            .iter()
            .find(|o| o.ndim() == 4 && o.shape()[3] == 2)
            .ok_or_else(|| {
                DetectorError::OutputShape(
                    buffers.outs.first().map(|o| o.shape().to_vec()).unwrap_or_default(),
                )
            })?;
        expect_dims(out.shape(), 4)?;
        let maps = out
            .view()
            .into_dimensionality::<Ix4>()
            .map_err(|_| DetectorError::OutputShape(out.shape().to_vec()))?;
        let (_, height, width, _) = maps.dim();
        let config = frame.config;
        let text_score = |x: u32, y: u32| maps[[0, y as usize, x as usize, 0]];
        let link_score = |x: u32, y: u32| maps[[0, y as usize, x as usize, 1]];

        let mut mask = GrayImage::new(width as u32, height as u32);
        for (x, y, pixel) in mask.enumerate_pixels_mut() {
            if text_score(x, y) > config.low_text || link_score(x, y) > config.link_threshold {
                *pixel = Luma([255]);
            }
        }

        let labels = connected_components(&mask, Connectivity::Four, Luma([0u8]));
        let count = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
        let mut components = vec![Component::default(); count + 1];
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label[0] as usize;
            if label == 0 {
                continue;
            }
            let c = &mut components[label];
            c.area += 1;
            c.peak = c.peak.max(text_score(x, y));
            c.left = c.left.min(x);
            c.top = c.top.min(y);
            c.right = c.right.max(x);
            c.bottom = c.bottom.max(y);
        }

        for (label, c) in components.iter().enumerate().skip(1) {
            if c.area < MIN_COMPONENT_AREA || c.peak < config.text_threshold {
                continue;
            }

            let w = c.right - c.left + 1;
            let h = c.bottom - c.top + 1;
            let n_iter = dilation_iterations(c.area, w, h);
            let sx = c.left.saturating_sub(n_iter);
            let sy = c.top.saturating_sub(n_iter);
            let ex = (c.right + n_iter + 2).min(width as u32);
            let ey = (c.bottom + n_iter + 2).min(height as u32);

            // 仅由连接得分构成的像素不属于文本
            let mut segment = GrayImage::new(ex - sx, ey - sy);
            for y in c.top..=c.bottom {
                for x in c.left..=c.right {
                    let link_only =
                        link_score(x, y) > config.link_threshold && text_score(x, y) <= config.low_text;
                    if labels.get_pixel(x, y)[0] as usize == label && !link_only {
                        segment.put_pixel(x - sx, y - sy, Luma([255]));
                    }
                }
            }
            let radius = (n_iter / 2).min(u8::MAX as u32) as u8;
            if radius > 0 {
                segment = dilate(&segment, Norm::LInf, radius);
            }

            let points = segment
                .enumerate_pixels()
                .filter(|(_, _, p)| p[0] > 0)
                .map(|(x, y, _)| Point::new((x + sx) as i32, (y + sy) as i32))
                .collect::<Vec<_>>();
            if points.is_empty() {
                continue;
            }

            let mut rect = rect_from_corners(&min_area_rect(&points));
            rect.center = PointF::new(rect.center.x * MAP_SCALE, rect.center.y * MAP_SCALE);
            rect.width *= MAP_SCALE;
            rect.height *= MAP_SCALE;

            buffers.boxes.push(rect);
            buffers.class_ids.push(0);
            buffers.confidences.push(c.peak);
        }
        Ok(())
    }

    fn store(&self, frame: &FrameContext<'_>, buffers: &mut Buffers, results: &mut Vec<OcrResult>) {
        buffers.map_boxes_to_image(&frame.transform);

        results.reserve(buffers.boxes.len());
        for (rect, &confidence) in buffers.boxes.iter().zip(buffers.confidences.iter()) {
            results.push(OcrResult::new(
                "",
                rect.to_rectangle(),
                rect.angle as f64,
                confidence as f64,
            ));
        }
    }
}

/// 文本片段的膨胀半径, 随组件面积与其外接矩形短边增大
fn dilation_iterations(area: u32, width: u32, height: u32) -> u32 {
    let ratio = area as f64 * width.min(height) as f64 / (width as f64 * height as f64);
    (2.0 * ratio.sqrt()) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::BlobTransform;
    use crate::config::DetectorConfig;
    use common::Size;
    use ndarray::Array4;

    fn frame(config: &DetectorConfig) -> FrameContext<'_> {
        FrameContext {
            config,
            image_size: Size::new(32, 32),
            transform: BlobTransform::default(),
        }
    }

    #[test]
    fn test_single_component() {
        let config = DetectorConfig::for_family(ModelFamily::Craft);
        let mut maps = Array4::<f32>::zeros((1, 16, 16, 2));
        for y in 4..8 {
            for x in 4..10 {
                maps[[0, y, x, 0]] = 0.9;
            }
        }
        let mut buffers = Buffers::default();
        buffers.outs = vec![maps.into_dyn()];
        let mut results = Vec::new();

        Craft.extract(&frame(&config), &mut buffers, &mut results).unwrap();
        Craft.store(&frame(&config), &mut buffers, &mut results);

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert!((result.confidence - 0.9).abs() < 1e-6);
        assert!(result.box_rot_angle.abs() < 1e-3);
        let center = result.bbox.center();
        assert!((center.x - 13.0).abs() <= 1.0);
        assert!((center.y - 11.0).abs() <= 1.0);
        assert!(result.bbox.width() > result.bbox.height());
    }

    #[test]
    fn test_filters_small_and_weak_components() {
        let config = DetectorConfig::for_family(ModelFamily::Craft);
        let mut maps = Array4::<f32>::zeros((1, 16, 16, 2));
        // 面积不足
        for x in 1..4 {
            maps[[0, 1, x, 0]] = 0.9;
        }
        // 峰值不足
        for y in 8..12 {
            for x in 8..12 {
                maps[[0, y, x, 0]] = 0.5;
            }
        }
        let mut buffers = Buffers::default();
        buffers.outs = vec![maps.into_dyn()];
        let mut results = Vec::new();

        Craft.extract(&frame(&config), &mut buffers, &mut results).unwrap();
        assert!(buffers.boxes.is_empty());
    }

    #[test]
    fn test_dilation_iterations() {
        assert_eq!(dilation_iterations(12, 4, 3), 3);
        // 大尺寸组件的中间乘积超出 u32
        assert_eq!(dilation_iterations(2000 * 2000, 2000, 2000), 89);
        assert_eq!(dilation_iterations(1, 1, 1), 2);
    }

    #[test]
    fn test_missing_output() {
        let config = DetectorConfig::for_family(ModelFamily::Craft);
        let mut buffers = Buffers::default();
        buffers.outs = vec![Array4::<f32>::zeros((1, 8, 8, 3)).into_dyn()];
        let mut results = Vec::new();
        assert!(matches!(
            Craft.extract(&frame(&config), &mut buffers, &mut results),
            Err(DetectorError::OutputShape(_))
        ));
    }
}
