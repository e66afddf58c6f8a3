use clap::{Parser, ValueEnum};
use config::{OutputConfig, OutputFormat, OutputTarget};
use tracing::Level;

/// 结果输出格式
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    None,
    Json,
    Csv,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::None => OutputFormat::None,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Csv => OutputFormat::Csv,
        }
    }
}

/// Beholder 图像检测流水线: 预处理, 模型推理, 后处理并输出检测结果
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// 流水线配置文件路径
    pub config: String,

    /// 输入图像文件或目录
    pub input: String,

    /// 日志等级 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: Level,

    /// 日志文件路径, 未设置时只输出到控制台
    #[arg(long)]
    pub log_file: Option<String>,

    /// 追加日志到文件
    #[arg(long, default_value_t = false)]
    pub append_log: bool,

    /// 结果输出格式, 覆盖配置文件
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// 结果输出文件, `-` 表示标准输出, 覆盖配置文件
    #[arg(short, long)]
    pub output: Option<String>,

    /// 标注图像保存目录, 覆盖配置文件
    #[arg(long)]
    pub annotated_dir: Option<String>,
}

impl Args {
    /// 创建命令行参数解析器
    pub fn new() -> Self {
        Self::parse()
    }

    /// 以命令行参数覆盖输出配置
    ///
    /// # 参数
    ///
    /// * `output` - 配置文件中的输出配置
    pub fn apply_to(&self, output: &mut OutputConfig) {
        if let Some(format) = self.format {
            output.format = format.into();
        }
        match self.output.as_deref() {
            Some("-") => output.target = OutputTarget::Stdout,
            Some(path) => {
                output.target = OutputTarget::File;
                output.path = Some(path.to_string());
            }
            None => {}
        }
        if let Some(dir) = &self.annotated_dir {
            output.annotated_dir = Some(dir.clone());
        }
    }
}
