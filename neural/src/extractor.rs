use common::{OcrResult, Size};

use crate::blob::BlobTransform;
use crate::buffers::Buffers;
use crate::config::{DetectorConfig, ModelFamily};
use crate::craft::Craft;
use crate::east::East;
use crate::error::DetectorError;
use crate::parseq::Parseq;
use crate::yolov8::YoloV8;

/// 当前帧的上下文
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub config: &'a DetectorConfig,
    /// 原图尺寸
    pub image_size: Size,
    pub transform: BlobTransform,
}

/// 模型输出解析接口
pub trait Extractor: Send {
    fn family(&self) -> ModelFamily;

    /// 解析模型输出, 将候选框写入缓冲区
    ///
    /// 输出形状不符时返回 [`DetectorError::OutputShape`]
    fn extract(
        &self,
        frame: &FrameContext<'_>,
        buffers: &mut Buffers,
        results: &mut Vec<OcrResult>,
    ) -> Result<(), DetectorError>;

    /// 映射候选框到图像坐标系, 抑制重叠框并输出结果
    fn store(&self, frame: &FrameContext<'_>, buffers: &mut Buffers, results: &mut Vec<OcrResult>);
}

/// 根据模型类型创建解析器
pub fn for_config(config: &DetectorConfig) -> Box<dyn Extractor> {
    match config.family {
        ModelFamily::East => Box::new(East),
        ModelFamily::YoloV8 => Box::new(YoloV8),
        ModelFamily::Parseq => Box::new(Parseq::new(config.charset())),
        ModelFamily::Craft => Box::new(Craft),
    }
}

/// 校验输出张量为 `ndim` 维且批大小为 1
pub(crate) fn expect_dims(shape: &[usize], ndim: usize) -> Result<(), DetectorError> {
    if shape.len() != ndim || shape.first() != Some(&1) {
        return Err(DetectorError::OutputShape(shape.to_vec()));
    }
    Ok(())
}
