use common::{OcrResult, PointF, RotatedRect};
use ndarray::{ArrayD, ArrayView4, Ix4};

use crate::buffers::Buffers;
use crate::config::ModelFamily;
use crate::error::DetectorError;
use crate::extractor::{Extractor, FrameContext, expect_dims};
use crate::nms::nms;

/// 每个输出网格对应的输入像素数
const GRID_STRIDE: f32 = 4.0;

/// EAST 旋转文本框检测
///
/// 模型输出置信度图 `[1, 1, H, W]` 与几何图 `[1, 5, H, W]`,
/// 几何图依次为到上, 右, 下, 左边界的距离以及旋转弧度
pub struct East;

impl East {
    /// 按通道数区分置信度图与几何图
    fn maps(outs: &[ArrayD<f32>]) -> Result<(ArrayView4<'_, f32>, ArrayView4<'_, f32>), DetectorError> {
        let shape_error = || {
            DetectorError::OutputShape(outs.first().map(|o| o.shape().to_vec()).unwrap_or_default())
        };

        let mut scores = None;
        let mut geometry = None;
        for out in outs {
            expect_dims(out.shape(), 4)?;
            match out.shape()[1] {
                1 => scores = Some(out),
                5 => geometry = Some(out),
                _ => return Err(DetectorError::OutputShape(out.shape().to_vec())),
            }
        }
        let (scores, geometry) = scores.zip(geometry).ok_or_else(shape_error)?;
        if scores.shape()[2..] != geometry.shape()[2..] {
            return Err(DetectorError::OutputShape(geometry.shape().to_vec()));
        }

        let scores = scores
            .view()
            .into_dimensionality::<Ix4>()
            .map_err(|_| shape_error())?;
        let geometry = geometry
            .view()
            .into_dimensionality::<Ix4>()
            .map_err(|_| shape_error())?;
        Ok((scores, geometry))
    }
}

impl Extractor for East {
    fn family(&self) -> ModelFamily {
        ModelFamily::East
    }

    fn extract(
        &self,
        frame: &FrameContext<'_>,
        buffers: &mut Buffers,
        _results: &mut Vec<OcrResult>,
    ) -> Result<(), DetectorError> {
        let (scores, geometry) = East::maps(&buffers.outs)?;
        let threshold = frame.config.confidence_threshold;
        let (_, _, height, width) = scores.dim();

        for y in 0..height {
            for x in 0..width {
                let score = scores[[0, 0, y, x]];
                if score < threshold {
                    continue;
                }

                let top = geometry[[0, 0, y, x]];
                let right = geometry[[0, 1, y, x]];
                let bottom = geometry[[0, 2, y, x]];
                let left = geometry[[0, 3, y, x]];
                let angle = geometry[[0, 4, y, x]];

                let (sin, cos) = angle.sin_cos();
                let h = top + bottom;
                let w = right + left;
                let offset_x = x as f32 * GRID_STRIDE + cos * right + sin * bottom;
                let offset_y = y as f32 * GRID_STRIDE - sin * right + cos * bottom;
                let p1 = PointF::new(-sin * h + offset_x, -cos * h + offset_y);
                let p3 = PointF::new(-cos * w + offset_x, sin * w + offset_y);
                let center = PointF::new((p1.x + p3.x) / 2.0, (p1.y + p3.y) / 2.0);

                buffers
                    .boxes
                    .push(RotatedRect::new(center, w, h, -angle.to_degrees()));
                buffers.class_ids.push(0);
                buffers.confidences.push(score);
            }
        }
        Ok(())
    }

    fn store(&self, frame: &FrameContext<'_>, buffers: &mut Buffers, results: &mut Vec<OcrResult>) {
        buffers.map_boxes_to_image(&frame.transform);

        let boxes = &buffers.boxes;
        nms(
            &buffers.confidences,
            frame.config.nms_threshold,
            |a, b| boxes[a].iou(&boxes[b]),
            &mut buffers.order,
            &mut buffers.nms_ids,
        );

        results.reserve(buffers.nms_ids.len());
        for &id in buffers.nms_ids.iter() {
            let rect = boxes[id];
            results.push(OcrResult::new(
                "",
                rect.to_rectangle(),
                rect.angle as f64,
                buffers.confidences[id] as f64,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::BlobTransform;
    use crate::config::{DetectorConfig, ResizeMode};
    use common::{Rectangle, Size};
    use ndarray::{Array4, IxDyn};

    fn outputs(cells: &[(usize, usize, f32, [f32; 5])]) -> Vec<ArrayD<f32>> {
        let mut scores = Array4::<f32>::zeros((1, 1, 2, 2));
        let mut geometry = Array4::<f32>::zeros((1, 5, 2, 2));
        for &(y, x, score, geo) in cells {
            scores[[0, 0, y, x]] = score;
            for (c, v) in geo.iter().enumerate() {
                geometry[[0, c, y, x]] = *v;
            }
        }
        vec![geometry.into_dyn(), scores.into_dyn()]
    }

    #[test]
    fn test_decode_axis_aligned() {
        let config = DetectorConfig::for_family(ModelFamily::East);
        let frame = FrameContext {
            config: &config,
            image_size: Size::new(8, 8),
            transform: BlobTransform::default(),
        };
        let mut buffers = Buffers::default();
        buffers.outs = outputs(&[(1, 1, 0.9, [1.0, 3.0, 1.0, 1.0, 0.0]), (0, 0, 0.1, [1.0; 5])]);

        let mut results = Vec::new();
        East.extract(&frame, &mut buffers, &mut results).unwrap();
        assert_eq!(buffers.boxes.len(), 1);
        East.store(&frame, &mut buffers, &mut results);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].bbox, Rectangle::new(3, 3, 7, 5));
        assert_eq!(results[0].box_rot_angle, 0.0);
        assert!((results[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_decode_angle() {
        let config = DetectorConfig::for_family(ModelFamily::East);
        let frame = FrameContext {
            config: &config,
            image_size: Size::new(8, 8),
            transform: BlobTransform::default(),
        };
        let mut buffers = Buffers::default();
        let angle = std::f32::consts::FRAC_PI_6;
        buffers.outs = outputs(&[(0, 0, 0.8, [2.0, 2.0, 2.0, 2.0, angle])]);

        let mut results = Vec::new();
        East.extract(&frame, &mut buffers, &mut results).unwrap();
        assert!((buffers.boxes[0].angle + 30.0).abs() < 1e-4);
        assert_eq!(buffers.boxes[0].width, 4.0);
    }

    #[test]
    fn test_bad_shape() {
        let config = DetectorConfig::for_family(ModelFamily::East);
        let frame = FrameContext {
            config: &config,
            image_size: Size::new(8, 8),
            transform: BlobTransform::default(),
        };
        let mut buffers = Buffers::default();
        buffers.outs = vec![ArrayD::zeros(IxDyn(&[1, 3, 2, 2]))];
        let mut results = Vec::new();
        assert!(matches!(
            East.extract(&frame, &mut buffers, &mut results),
            Err(DetectorError::OutputShape(_))
        ));

        buffers.outs = vec![ArrayD::zeros(IxDyn(&[1, 1, 2, 2]))];
        assert!(East.extract(&frame, &mut buffers, &mut results).is_err());
    }

    fn decode_cell(transform: BlobTransform, image_size: Size) -> Vec<OcrResult> {
        let config = DetectorConfig::for_family(ModelFamily::East);
        let frame = FrameContext {
            config: &config,
            image_size,
            transform,
        };
        let mut buffers = Buffers::default();
        buffers.outs = outputs(&[(1, 1, 0.9, [1.0, 3.0, 1.0, 1.0, 0.0])]);
        let mut results = Vec::new();
        East.extract(&frame, &mut buffers, &mut results).unwrap();
        East.store(&frame, &mut buffers, &mut results);
        results
    }

    #[test]
    fn test_letterbox_maps_to_image() {
        // 16x8 等比缩放到 8x8, 上下各填充 2
        let (transform, _) = BlobTransform::compute(ResizeMode::Letterbox, (16, 8), (8, 8));
        let results = decode_cell(transform, Size::new(16, 8));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].bbox, Rectangle::new(6, 2, 14, 6));

        let (transform, _) = BlobTransform::compute(ResizeMode::Letterbox, (16, 16), (8, 8));
        let results = decode_cell(transform, Size::new(16, 16));
        assert_eq!(results[0].bbox, Rectangle::new(6, 6, 14, 10));
    }

    fn store(candidates: &[(RotatedRect, f32)]) -> Vec<OcrResult> {
        let config = DetectorConfig::for_family(ModelFamily::East);
        let frame = FrameContext {
            config: &config,
            image_size: Size::new(64, 64),
            transform: BlobTransform::default(),
        };
        let mut buffers = Buffers::default();
        for &(rect, score) in candidates {
            buffers.boxes.push(rect);
            buffers.class_ids.push(0);
            buffers.confidences.push(score);
        }
        let mut results = Vec::new();
        East.store(&frame, &mut buffers, &mut results);
        results
    }

    #[test]
    fn test_rotated_nms_keeps_higher_score() {
        let low = RotatedRect::new(PointF::new(20.5, 20.0), 10.0, 4.0, 30.0);
        let high = RotatedRect::new(PointF::new(20.0, 20.0), 10.0, 4.0, 30.0);
        let results = store(&[(low, 0.8), (high, 0.9)]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].bbox, high.to_rectangle());
        assert_eq!(results[0].box_rot_angle, 30.0);
        assert!((results[0].confidence - 0.9).abs() < 1e-6);

        let far = RotatedRect::new(PointF::new(20.0, 40.0), 10.0, 4.0, 30.0);
        let results = store(&[(far, 0.8), (high, 0.9)]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].bbox, high.to_rectangle());
        assert_eq!(results[1].bbox, far.to_rectangle());
    }

    #[test]
    fn test_rotated_nms_uses_rotated_overlap() {
        // 两个交叉的细长框外接矩形相同, 旋转交并比约为 4 / 76
        let a = RotatedRect::new(PointF::new(30.0, 30.0), 20.0, 2.0, 45.0);
        let b = RotatedRect::new(PointF::new(30.0, 30.0), 20.0, 2.0, -45.0);
        assert_eq!(a.bounding_rect(), b.bounding_rect());
        let results = store(&[(a, 0.9), (b, 0.8)]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].box_rot_angle, -45.0);
    }
}
