use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpError {
    #[error("未知的图像处理操作: {0}")]
    UnknownOp(String),
    #[error("操作 {name} 参数无效: {reason}")]
    BadParams { name: String, reason: String },
    #[error("操作 {name} 无法处理当前图像: {reason}")]
    NotApplicable { name: &'static str, reason: String },
}

impl OpError {
    pub fn bad_params(name: impl Into<String>, reason: impl Into<String>) -> Self {
        OpError::BadParams {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn not_applicable(name: &'static str, reason: impl Into<String>) -> Self {
        OpError::NotApplicable {
            name,
            reason: reason.into(),
        }
    }
}

/// 处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preprocess,
    Postprocess,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Preprocess => write!(f, "预处理"),
            Stage::Postprocess => write!(f, "后处理"),
        }
    }
}

/// 处理链中某个操作失败
#[derive(Error, Debug)]
#[error("{stage}第 {index} 个操作 {name} 失败: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    pub index: usize,
    pub name: &'static str,
    #[source]
    pub source: OpError,
}
