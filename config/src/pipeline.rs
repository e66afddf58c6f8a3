use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use imgproc::{OpSpec, build_op};
use neural::DetectorConfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// 结果输出格式
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[schemars(title = "不输出")]
    None,
    /// 每张图像一行 JSON
    #[default]
    #[schemars(title = "JSON 行")]
    Json,
    /// 每个检测结果一行
    #[schemars(title = "CSV")]
    Csv,
}

/// 结果输出目标
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputTarget {
    #[schemars(title = "不输出")]
    None,
    #[default]
    #[schemars(title = "标准输出")]
    Stdout,
    #[schemars(title = "文件")]
    File,
}

/// 输出配置
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    #[schemars(title = "输出格式")]
    pub format: OutputFormat,
    #[schemars(title = "输出目标")]
    pub target: OutputTarget,
    #[schemars(title = "输出文件路径(输出目标为文件时必填)")]
    pub path: Option<String>,
    #[schemars(title = "标注图像保存目录")]
    pub annotated_dir: Option<String>,
}

/// 处理流水线配置
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct PipelineConfig {
    #[schemars(title = "检测器")]
    pub detector: DetectorConfig,
    #[schemars(title = "预处理操作")]
    pub preprocessing: Vec<OpSpec>,
    #[schemars(title = "后处理操作")]
    pub postprocessing: Vec<OpSpec>,
    #[schemars(title = "输出")]
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// 加载并校验配置文件
    ///
    /// # 参数
    ///
    /// * `config_file` - 配置文件路径
    pub fn load<P: AsRef<Path>>(config_file: P) -> Result<Self> {
        let config_file = config_file.as_ref();
        let config_data = fs::read(config_file)
            .with_context(|| format!("读取配置文件失败: {}", config_file.display()))?;
        let config = Self::from_slice(&config_data)?;
        info!("配置文件加载完成: {}", config_file.display());
        Ok(config)
    }

    /// 从 YAML 数据解析并校验配置
    ///
    /// # 参数
    ///
    /// * `data` - YAML 数据
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let config = serde_yaml::from_slice::<PipelineConfig>(data)
            .context("解析配置文件失败, 请检查格式是否正确")?;
        config.validate()?;
        Ok(config)
    }

    /// 校验检测器参数与操作描述
    pub fn validate(&self) -> Result<()> {
        self.detector.validate().context("检测器配置无效")?;

        let stages = [
            ("preprocessing", &self.preprocessing),
            ("postprocessing", &self.postprocessing),
        ];
        for (stage, specs) in stages {
            for (index, spec) in specs.iter().enumerate() {
                build_op(spec).with_context(|| format!("{}[{}] 配置无效", stage, index))?;
            }
            debug!("{} 共 {} 个操作", stage, specs.len());
        }

        if self.output.target == OutputTarget::File && self.output.path.is_none() {
            bail!("输出目标为文件时须配置输出文件路径");
        }
        Ok(())
    }
}
