use common::RotatedRect;
use ndarray::{Array4, ArrayD};

use crate::blob::BlobTransform;

/// 单帧检测过程中复用的缓冲区
///
/// 每帧开始时清空内容但保留容量, 避免重复分配
#[derive(Debug)]
pub struct Buffers {
    /// 模型输入张量 `[1, 3, H, W]`
    pub blob: Array4<f32>,
    /// 模型输出张量
    pub outs: Vec<ArrayD<f32>>,
    /// 候选框, 提取后位于模型输入坐标系, 存储前映射回图像坐标系
    pub boxes: Vec<RotatedRect>,
    pub class_ids: Vec<usize>,
    pub confidences: Vec<f32>,
    /// 非极大值抑制后保留的候选框下标
    pub nms_ids: Vec<usize>,
    /// 非极大值抑制排序用的临时下标
    pub order: Vec<usize>,
}

impl Default for Buffers {
    fn default() -> Self {
        Self {
            blob: Array4::zeros((0, 0, 0, 0)),
            outs: Vec::new(),
            boxes: Vec::new(),
            class_ids: Vec::new(),
            confidences: Vec::new(),
            nms_ids: Vec::new(),
            order: Vec::new(),
        }
    }
}

impl Buffers {
    /// 清空候选结果, 输入与输出张量由下一次推理覆盖
    pub fn clear(&mut self) {
        self.boxes.clear();
        self.class_ids.clear();
        self.confidences.clear();
        self.nms_ids.clear();
        self.order.clear();
    }

    /// 将候选框从模型输入坐标系映射回图像坐标系
    pub fn map_boxes_to_image(&mut self, transform: &BlobTransform) {
        for rect in self.boxes.iter_mut() {
            *rect = transform.to_image_rect(rect);
        }
    }
}
