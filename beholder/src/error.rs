use imgproc::PipelineError;
use neural::DetectorError;
use thiserror::Error;

/// 单张图像处理失败
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("读取图像失败: {0:#}")]
    Read(anyhow::Error),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Detect(#[from] DetectorError),
    #[error("保存标注图像失败: {0}")]
    Annotate(#[from] image::ImageError),
    #[error(transparent)]
    Output(#[from] anyhow::Error),
}

impl FrameError {
    /// 是否须中止整个批次
    ///
    /// 检测器未初始化与结果写出失败不会随下一张图像恢复
    pub fn is_fatal(&self) -> bool {
        match self {
            FrameError::Detect(e) => e.is_programmer_error(),
            FrameError::Output(_) => true,
            _ => false,
        }
    }
}
