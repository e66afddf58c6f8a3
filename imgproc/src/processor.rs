use common::OcrResult;
use image::DynamicImage;
use tracing::debug;

use crate::error::{OpError, PipelineError, Stage};
use crate::op::ProcessingOp;
use crate::registry::{OpSpec, build_op};

/// 图像处理链
///
/// 持有当前图像以及预处理、后处理两组操作, 按顺序执行,
/// 某个操作失败时立即停止, 图像保留为此前操作的输出
#[derive(Debug)]
pub struct Processor {
    image: DynamicImage,
    preprocessing: Vec<Box<dyn ProcessingOp>>,
    postprocessing: Vec<Box<dyn ProcessingOp>>,
}

impl Processor {
    /// 创建处理链
    ///
    /// # 参数
    ///
    /// * `preprocessing` - 预处理操作
    /// * `postprocessing` - 后处理操作
    pub fn new(
        preprocessing: Vec<Box<dyn ProcessingOp>>,
        postprocessing: Vec<Box<dyn ProcessingOp>>,
    ) -> Self {
        Self {
            image: DynamicImage::new_rgb8(0, 0),
            preprocessing,
            postprocessing,
        }
    }

    /// 按操作描述创建处理链
    ///
    /// # 参数
    ///
    /// * `preprocessing` - 预处理操作描述
    /// * `postprocessing` - 后处理操作描述
    pub fn from_specs(preprocessing: &[OpSpec], postprocessing: &[OpSpec]) -> Result<Self, OpError> {
        let build_all = |specs: &[OpSpec]| specs.iter().map(build_op).collect::<Result<Vec<_>, _>>();
        Ok(Self::new(build_all(preprocessing)?, build_all(postprocessing)?))
    }

    pub fn set_image(&mut self, image: DynamicImage) {
        self.image = image;
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn take_image(&mut self) -> DynamicImage {
        std::mem::replace(&mut self.image, DynamicImage::new_rgb8(0, 0))
    }

    pub fn preprocessing(&self) -> &[Box<dyn ProcessingOp>] {
        &self.preprocessing
    }

    pub fn postprocessing(&self) -> &[Box<dyn ProcessingOp>] {
        &self.postprocessing
    }

    /// 依次执行预处理操作
    pub fn preprocess(&mut self) -> Result<(), PipelineError> {
        for (index, op) in self.preprocessing.iter().enumerate() {
            let image = op.apply(&self.image).map_err(|source| PipelineError {
                stage: Stage::Preprocess,
                index,
                name: op.name(),
                source,
            })?;
            debug!("预处理 {} 完成: {}x{}", op.name(), image.width(), image.height());
            self.image = image;
        }
        Ok(())
    }

    /// 结合检测结果依次执行后处理操作
    ///
    /// # 参数
    ///
    /// * `results` - 检测结果
    pub fn postprocess(&mut self, results: &[OcrResult]) -> Result<(), PipelineError> {
        for (index, op) in self.postprocessing.iter().enumerate() {
            let image = op
                .apply_with_results(&self.image, results)
                .map_err(|source| PipelineError {
                    stage: Stage::Postprocess,
                    index,
                    name: op.name(),
                    source,
                })?;
            debug!("后处理 {} 完成", op.name());
            self.image = image;
        }
        Ok(())
    }
}
