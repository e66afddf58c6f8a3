use serde::{Deserialize, Serialize};

use crate::export::CResult;
use crate::geometry::{Rectangle, RotatedRect};

/// 检测结果
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct OcrResult {
    /// 识别文本, 检测类模型为类别名或为空
    pub text: String,
    /// 图像坐标系下的轴对齐边框
    pub bbox: Rectangle,
    /// 边框旋转角度 (角度制)
    pub box_rot_angle: f64,
    pub confidence: f64,
}

impl OcrResult {
    pub fn new(text: impl Into<String>, bbox: Rectangle, box_rot_angle: f64, confidence: f64) -> Self {
        Self {
            text: text.into(),
            bbox,
            box_rot_angle,
            confidence,
        }
    }

    /// 以边框中心和尺寸还原旋转矩形
    pub fn rotated_rect(&self) -> RotatedRect {
        let mut rect = RotatedRect::from(self.bbox);
        rect.angle = self.box_rot_angle as f32;
        rect
    }

    /// 转换为 C 结构体, 调用方负责释放
    pub fn to_c(&self) -> CResult {
        CResult::from_result(self)
    }
}
