use common::{OcrResult, PointF, RotatedRect};
use ndarray::Ix3;

use crate::buffers::Buffers;
use crate::config::ModelFamily;
use crate::error::DetectorError;
use crate::extractor::{Extractor, FrameContext, expect_dims};
use crate::nms::nms;

/// YOLOv8 目标检测
///
/// 模型输出 `[1, 4 + 类别数, 候选框数]`, 前 4 行依次为中心 X, 中心 Y, 宽, 高
pub struct YoloV8;

impl Extractor for YoloV8 {
    fn family(&self) -> ModelFamily {
        ModelFamily::YoloV8
    }

    fn extract(
        &self,
        frame: &FrameContext<'_>,
        buffers: &mut Buffers,
        _results: &mut Vec<OcrResult>,
    ) -> Result<(), DetectorError> {
        let out = buffers
            .outs
            .first()
            .ok_or(DetectorError::OutputShape(Vec::new()))?;
        expect_dims(out.shape(), 3)?;
        let shape_error = || DetectorError::OutputShape(out.shape().to_vec());

        let out = out.view().into_dimensionality::<Ix3>().map_err(|_| shape_error())?;
        let (_, attrs, anchors) = out.dim();
        if attrs < 5 {
            return Err(shape_error());
        }
        let value = |attr: usize, anchor: usize| out[[0, attr, anchor]];

        let threshold = frame.config.confidence_threshold;
        for anchor in 0..anchors {
            let mut class_id = 0;
            let mut score = f32::NEG_INFINITY;
            for class in 0..attrs - 4 {
                let s = value(4 + class, anchor);
                if s > score {
                    score = s;
                    class_id = class;
                }
            }
            if score < threshold {
                continue;
            }

            let center = PointF::new(value(0, anchor), value(1, anchor));
            buffers.boxes.push(RotatedRect::new(
                center,
                value(2, anchor),
                value(3, anchor),
                0.0,
            ));
            buffers.class_ids.push(class_id);
            buffers.confidences.push(score);
        }
        Ok(())
    }

    fn store(&self, frame: &FrameContext<'_>, buffers: &mut Buffers, results: &mut Vec<OcrResult>) {
        buffers.map_boxes_to_image(&frame.transform);

        let config = frame.config;
        let boxes = &buffers.boxes;
        let class_ids = &buffers.class_ids;
        nms(
            &buffers.confidences,
            config.nms_threshold,
            |a, b| {
                if !config.class_agnostic_nms && class_ids[a] != class_ids[b] {
                    0.0
                } else {
                    boxes[a].iou(&boxes[b])
                }
            },
            &mut buffers.order,
            &mut buffers.nms_ids,
        );

        results.reserve(buffers.nms_ids.len());
        for &id in buffers.nms_ids.iter() {
            let class_id = class_ids[id];
            let text = config
                .classes
                .get(class_id)
                .cloned()
                .unwrap_or_else(|| class_id.to_string());
            results.push(OcrResult::new(
                text,
                boxes[id].to_rectangle(),
                0.0,
                buffers.confidences[id] as f64,
            ));
        }
    }
}
