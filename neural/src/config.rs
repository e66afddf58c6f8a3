use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::DetectorError;

/// PARSeq 默认字符集
pub const PARSEQ_CHARSET: &str =
    "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// 模型类型
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    /// 旋转文本框检测
    #[default]
    #[schemars(title = "EAST 文本检测")]
    East,
    #[schemars(title = "YOLOv8 目标检测")]
    YoloV8,
    /// 整图文本识别
    #[schemars(title = "PARSeq 文本识别")]
    Parseq,
    #[schemars(title = "CRAFT 文本检测")]
    Craft,
}

/// 图像缩放到模型输入尺寸的方式
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    /// 等比缩放并居中填充
    #[default]
    #[schemars(title = "等比缩放并填充")]
    Letterbox,
    #[schemars(title = "直接拉伸")]
    Raw,
    /// 等比缩放并居中裁剪
    #[schemars(title = "等比缩放并裁剪")]
    Crop,
}

/// 推理设备
///
/// 除 CPU 外的设备须在编译时启用同名特性
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    #[default]
    #[schemars(title = "CPU")]
    Cpu,
    #[schemars(title = "NVIDIA CUDA")]
    Cuda,
    #[schemars(title = "NVIDIA TensorRT")]
    TensorRt,
    #[schemars(title = "DirectML")]
    DirectMl,
    #[schemars(title = "Apple CoreML")]
    CoreMl,
    #[schemars(title = "Intel OpenVINO")]
    OpenVino,
}

impl ExecutionProvider {
    /// 当前构建是否支持该设备
    pub fn is_available(&self) -> bool {
        match self {
            ExecutionProvider::Cpu => true,
            ExecutionProvider::Cuda => cfg!(feature = "cuda"),
            ExecutionProvider::TensorRt => cfg!(feature = "tensorrt"),
            ExecutionProvider::DirectMl => cfg!(feature = "directml"),
            ExecutionProvider::CoreMl => cfg!(feature = "coreml"),
            ExecutionProvider::OpenVino => cfg!(feature = "openvino"),
        }
    }
}

/// 检测器配置
///
/// 可选字段未配置时使用模型类型对应的默认值
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    #[schemars(title = "模型类型")]
    pub family: ModelFamily,
    #[schemars(title = "模型目录")]
    pub model_path: String,
    #[schemars(title = "模型文件名")]
    pub model: String,
    #[schemars(title = "模型输入尺寸 [宽, 高]")]
    pub size: Option<[u32; 2]>,
    #[schemars(title = "各通道缩放系数")]
    pub scale: Option<[f32; 3]>,
    #[schemars(title = "各通道均值")]
    pub mean: Option<[f32; 3]>,
    #[schemars(title = "交换红蓝通道")]
    pub swap_rb: bool,
    #[schemars(title = "填充像素值")]
    pub pad_value: Option<[f32; 3]>,
    #[schemars(title = "置信度阈值")]
    pub confidence_threshold: f32,
    #[schemars(title = "非极大值抑制阈值")]
    pub nms_threshold: f32,
    #[schemars(title = "缩放方式")]
    pub resize_mode: Option<ResizeMode>,
    #[schemars(title = "类别名称")]
    pub classes: Vec<String>,
    #[schemars(title = "非极大值抑制忽略类别")]
    pub class_agnostic_nms: bool,
    #[schemars(title = "PARSeq 字符集")]
    pub charset: Option<String>,
    #[schemars(title = "PARSeq 最大字符数")]
    pub n_pos: usize,
    #[schemars(title = "CRAFT 文本阈值")]
    pub text_threshold: f32,
    #[schemars(title = "CRAFT 连接阈值")]
    pub link_threshold: f32,
    #[schemars(title = "CRAFT 低文本阈值")]
    pub low_text: f32,
    #[schemars(title = "推理线程数")]
    pub intra_threads: usize,
    /// 按顺序尝试, 均不可用时回退到 CPU
    #[schemars(title = "推理设备")]
    pub execution_providers: Vec<ExecutionProvider>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            family: ModelFamily::default(),
            model_path: String::new(),
            model: String::new(),
            size: None,
            scale: None,
            mean: None,
            swap_rb: false,
            pad_value: None,
            confidence_threshold: 0.5,
            nms_threshold: 0.4,
            resize_mode: None,
            classes: Vec::new(),
            class_agnostic_nms: true,
            charset: None,
            n_pos: 26,
            text_threshold: 0.7,
            link_threshold: 0.4,
            low_text: 0.4,
            intra_threads: 4,
            execution_providers: vec![ExecutionProvider::Cpu],
        }
    }
}

impl DetectorConfig {
    /// 创建指定模型类型的默认配置
    ///
    /// # 参数
    ///
    /// * `family` - 模型类型
    pub fn for_family(family: ModelFamily) -> Self {
        Self {
            family,
            ..Default::default()
        }
    }

    /// 模型文件完整路径
    pub fn model_file(&self) -> PathBuf {
        Path::new(&self.model_path).join(&self.model)
    }

    /// 模型输入尺寸 (宽, 高)
    pub fn input_size(&self) -> (u32, u32) {
        let [width, height] = self.size.unwrap_or(match self.family {
            ModelFamily::Parseq => [128, 32],
            _ => [640, 640],
        });
        (width, height)
    }

    pub fn scale(&self) -> [f32; 3] {
        self.scale.unwrap_or(match self.family {
            ModelFamily::East => [1.0; 3],
            ModelFamily::YoloV8 => [1.0 / 255.0; 3],
            ModelFamily::Parseq => [1.0 / 127.5; 3],
            ModelFamily::Craft => [1.0 / 58.395, 1.0 / 57.12, 1.0 / 57.375],
        })
    }

    pub fn mean(&self) -> [f32; 3] {
        self.mean.unwrap_or(match self.family {
            ModelFamily::East => [123.68, 116.78, 103.94],
            ModelFamily::YoloV8 => [0.0; 3],
            ModelFamily::Parseq => [127.5; 3],
            ModelFamily::Craft => [123.675, 116.28, 103.53],
        })
    }

    pub fn pad_value(&self) -> [f32; 3] {
        self.pad_value.unwrap_or(match self.family {
            ModelFamily::YoloV8 => [114.0; 3],
            _ => [0.0; 3],
        })
    }

    pub fn resize_mode(&self) -> ResizeMode {
        self.resize_mode.unwrap_or(match self.family {
            ModelFamily::Parseq => ResizeMode::Raw,
            _ => ResizeMode::Letterbox,
        })
    }

    pub fn charset(&self) -> &str {
        self.charset.as_deref().unwrap_or(PARSEQ_CHARSET)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), DetectorError> {
        let (width, height) = self.input_size();
        if width == 0 || height == 0 {
            return Err(DetectorError::Config(format!(
                "模型输入尺寸无效: {}x{}",
                width, height
            )));
        }

        let thresholds = [
            ("confidence_threshold", self.confidence_threshold),
            ("nms_threshold", self.nms_threshold),
            ("text_threshold", self.text_threshold),
            ("link_threshold", self.link_threshold),
            ("low_text", self.low_text),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(DetectorError::Config(format!(
                    "{} 须在 [0, 1] 范围内: {}",
                    name, value
                )));
            }
        }

        if self.scale().iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(DetectorError::Config(format!(
                "缩放系数无效: {:?}",
                self.scale()
            )));
        }
        if self.mean().iter().any(|m| !m.is_finite()) {
            return Err(DetectorError::Config(format!(
                "均值无效: {:?}",
                self.mean()
            )));
        }
        if self.intra_threads == 0 {
            return Err(DetectorError::Config("推理线程数须大于 0".to_string()));
        }
        if self.execution_providers.is_empty() {
            return Err(DetectorError::Config("未配置推理设备".to_string()));
        }
        if let Some(provider) = self.execution_providers.iter().find(|p| !p.is_available()) {
            return Err(DetectorError::Config(format!(
                "当前构建不支持推理设备 {:?}",
                provider
            )));
        }

        if self.family == ModelFamily::Parseq {
            if self.charset().is_empty() {
                return Err(DetectorError::Config("PARSeq 字符集为空".to_string()));
            }
            if self.n_pos == 0 {
                return Err(DetectorError::Config("PARSeq 最大字符数须大于 0".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_defaults() {
        let config = DetectorConfig::for_family(ModelFamily::Parseq);
        assert_eq!(config.input_size(), (128, 32));
        assert_eq!(config.resize_mode(), ResizeMode::Raw);
        assert_eq!(config.mean(), [127.5; 3]);
        assert_eq!(config.charset(), PARSEQ_CHARSET);
        assert!(config.validate().is_ok());

        let config = DetectorConfig::for_family(ModelFamily::East);
        assert_eq!(config.input_size(), (640, 640));
        assert_eq!(config.resize_mode(), ResizeMode::Letterbox);
        assert_eq!(config.mean(), [123.68, 116.78, 103.94]);
    }

    #[test]
    fn test_deserialize_overrides() {
        let yaml = r#"
family: yolov8
model_path: models
model: yolov8n.onnx
size: [320, 320]
confidence_threshold: 0.25
classes: [person, bicycle]
"#;
        let config: DetectorConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.family, ModelFamily::YoloV8);
        assert_eq!(config.input_size(), (320, 320));
        assert_eq!(config.confidence_threshold, 0.25);
        assert_eq!(config.nms_threshold, 0.4);
        assert_eq!(config.scale(), [1.0 / 255.0; 3]);
        assert_eq!(config.model_file(), Path::new("models").join("yolov8n.onnx"));
        assert!(config.class_agnostic_nms);
        assert_eq!(config.execution_providers, vec![ExecutionProvider::Cpu]);
    }

    #[test]
    fn test_execution_providers() {
        let config: DetectorConfig =
            serde_yaml::from_str("execution_providers: [cpu, tensorrt, openvino]").unwrap();
        assert_eq!(
            config.execution_providers,
            vec![
                ExecutionProvider::Cpu,
                ExecutionProvider::TensorRt,
                ExecutionProvider::OpenVino
            ]
        );

        assert!(serde_yaml::from_str::<DetectorConfig>("execution_providers: [tpu]").is_err());

        let mut config = DetectorConfig::default();
        config.execution_providers.clear();
        assert!(matches!(config.validate(), Err(DetectorError::Config(_))));

        let mut config = DetectorConfig::default();
        config.execution_providers = vec![ExecutionProvider::Cuda];
        assert_eq!(config.validate().is_ok(), cfg!(feature = "cuda"));
    }

    #[test]
    fn test_validate() {
        let mut config = DetectorConfig::default();
        config.size = Some([0, 10]);
        assert!(matches!(config.validate(), Err(DetectorError::Config(_))));

        let mut config = DetectorConfig::default();
        config.nms_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = DetectorConfig::default();
        config.scale = Some([0.0, 1.0, 1.0]);
        assert!(config.validate().is_err());

        let mut config = DetectorConfig::for_family(ModelFamily::Parseq);
        config.charset = Some(String::new());
        assert!(config.validate().is_err());

        let mut config = DetectorConfig::for_family(ModelFamily::Parseq);
        config.n_pos = 0;
        assert!(config.validate().is_err());
    }
}
