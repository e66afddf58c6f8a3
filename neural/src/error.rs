use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("检测器配置无效: {0}")]
    Config(String),
    #[error("模型加载失败 {path:?}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },
    #[error("检测器尚未初始化")]
    NotInitialized,
    #[error("输入图像为空")]
    EmptyImage,
    #[error("推理失败: {0}")]
    Inference(String),
    #[error("意想不到的输出形状: {0:?}")]
    OutputShape(Vec<usize>),
}

impl DetectorError {
    /// 是否为调用方的使用错误而非运行时故障
    pub fn is_programmer_error(&self) -> bool {
        matches!(self, DetectorError::NotInitialized)
    }
}
