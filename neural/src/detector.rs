use std::borrow::Cow;

use common::{OcrResult, Size};
use image::{DynamicImage, RgbImage};
use tracing::{debug, info};

use crate::backend::{InferenceBackend, OrtBackend};
use crate::blob::fill_blob;
use crate::buffers::Buffers;
use crate::config::DetectorConfig;
use crate::error::DetectorError;
use crate::extractor::{self, Extractor, FrameContext};

/// 目标检测器
///
/// 创建后处于未初始化状态, 加载模型后方可检测. 每次检测依次执行:
/// 清空缓冲区, 生成输入张量, 前向推理, 解析输出, 映射坐标并存储结果
pub struct Detector {
    config: DetectorConfig,
    extractor: Box<dyn Extractor>,
    backend: Option<Box<dyn InferenceBackend>>,
    buffers: Buffers,
    results: Vec<OcrResult>,
    staging: Vec<OcrResult>,
}

impl Detector {
    /// 创建检测器实例
    ///
    /// # 参数
    ///
    /// * `config` - 检测器配置
    pub fn new(config: DetectorConfig) -> Result<Self, DetectorError> {
        config.validate()?;
        let extractor = extractor::for_config(&config);
        Ok(Self {
            config,
            extractor,
            backend: None,
            buffers: Buffers::default(),
            results: Vec::new(),
            staging: Vec::new(),
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// 是否已加载模型
    pub fn is_ready(&self) -> bool {
        self.backend.is_some()
    }

    /// 从配置的模型文件加载 ONNX 模型
    ///
    /// 失败时检测器保持未初始化状态
    pub fn init(&mut self) -> Result<(), DetectorError> {
        self.backend = None;
        let model_file = self.config.model_file();
        let backend = OrtBackend::load(
            &model_file,
            self.config.intra_threads,
            &self.config.execution_providers,
        )?;
        info!("{:?} 模型 {:?} 加载成功", self.extractor.family(), model_file);
        self.init_with_backend(Box::new(backend));
        Ok(())
    }

    /// 使用指定的推理后端完成初始化
    pub fn init_with_backend(&mut self, backend: Box<dyn InferenceBackend>) {
        self.backend = Some(backend);
    }

    /// 卸载模型, 回到未初始化状态
    pub fn reset(&mut self) {
        self.backend = None;
        self.buffers = Buffers::default();
        self.results.clear();
    }

    /// 清空缓冲区与结果, 保留已分配的容量与已加载的模型
    pub fn clear(&mut self) {
        self.buffers.clear();
        self.results.clear();
        self.staging.clear();
    }

    /// 最近一次成功检测的结果
    pub fn results(&self) -> &[OcrResult] {
        &self.results
    }

    /// 检测图像
    ///
    /// 成功时替换并返回结果; 失败时保留上一次的结果
    ///
    /// # 参数
    ///
    /// * `image` - 输入图像
    pub fn detect(&mut self, image: &DynamicImage) -> Result<&[OcrResult], DetectorError> {
        let backend = self.backend.as_mut().ok_or(DetectorError::NotInitialized)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(DetectorError::EmptyImage);
        }

        let image: Cow<'_, RgbImage> = match image {
            DynamicImage::ImageRgb8(rgb) => Cow::Borrowed(rgb),
            other => Cow::Owned(other.to_rgb8()),
        };

        self.buffers.clear();
        self.staging.clear();

        let transform = fill_blob(&image, &self.config, &mut self.buffers.blob);
        backend.forward(self.buffers.blob.view(), &mut self.buffers.outs)?;

        let frame = FrameContext {
            config: &self.config,
            image_size: Size::new(image.width() as i32, image.height() as i32),
            transform,
        };
        self.extractor
            .extract(&frame, &mut self.buffers, &mut self.staging)?;
        self.extractor
            .store(&frame, &mut self.buffers, &mut self.staging);

        debug!(
            "检测到 {} 个候选框, 保留 {} 个结果",
            self.buffers.boxes.len(),
            self.staging.len()
        );

        std::mem::swap(&mut self.results, &mut self.staging);
        Ok(&self.results)
    }
}
