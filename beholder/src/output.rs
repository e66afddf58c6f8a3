use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use common::OcrResult;
use config::{OutputConfig, OutputFormat, OutputTarget};
use serde::Serialize;

/// 各阶段耗时, 单位为毫秒
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Timings {
    pub read: f64,
    pub preprocess: f64,
    pub detect: f64,
    pub postprocess: f64,
}

impl Timings {
    pub fn millis(duration: Duration) -> f64 {
        duration.as_secs_f64() * 1000.0
    }

    pub fn total(&self) -> f64 {
        self.read + self.preprocess + self.detect + self.postprocess
    }
}

/// 单张图像的输出记录
#[derive(Serialize, Debug, Clone)]
pub struct Record<'a> {
    pub image: &'a str,
    pub results: &'a [OcrResult],
    pub timings: Timings,
}

/// 结果输出器
pub trait Outputer {
    /// 写出一条记录
    fn write(&mut self, record: &Record) -> Result<()>;
    /// 刷新缓冲
    fn finish(&mut self) -> Result<()>;
}

/// 丢弃所有结果
pub struct NoneOutputer;

impl Outputer for NoneOutputer {
    fn write(&mut self, _record: &Record) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// 每条记录输出为一行 JSON
pub struct JsonOutputer<W: Write> {
    writer: W,
}

impl<W: Write> JsonOutputer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> Outputer for JsonOutputer<W> {
    fn write(&mut self, record: &Record) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record).context("序列化检测结果失败")?;
        writeln!(self.writer)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

const CSV_HEADER: &str = "image,text,left,top,right,bottom,angle,confidence";

/// 按需为 CSV 字段加引号
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// 每个检测结果输出为一行 CSV, 首条记录前写出表头
pub struct CsvOutputer<W: Write> {
    writer: W,
    header_written: bool,
}

impl<W: Write> CsvOutputer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            header_written: false,
        }
    }
}

impl<W: Write> Outputer for CsvOutputer<W> {
    fn write(&mut self, record: &Record) -> Result<()> {
        if !self.header_written {
            writeln!(self.writer, "{}", CSV_HEADER)?;
            self.header_written = true;
        }
        let image = csv_field(record.image);
        for result in record.results {
            writeln!(
                self.writer,
                "{},{},{},{},{},{},{},{}",
                image,
                csv_field(&result.text),
                result.bbox.left,
                result.bbox.top,
                result.bbox.right,
                result.bbox.bottom,
                result.box_rot_angle,
                result.confidence
            )?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn with_format<W: Write + 'static>(format: OutputFormat, writer: W) -> Box<dyn Outputer> {
    match format {
        OutputFormat::None => Box::new(NoneOutputer),
        OutputFormat::Json => Box::new(JsonOutputer::new(writer)),
        OutputFormat::Csv => Box::new(CsvOutputer::new(writer)),
    }
}

/// 按输出配置创建输出器
///
/// # 参数
///
/// * `config` - 输出配置
pub fn create_outputer(config: &OutputConfig) -> Result<Box<dyn Outputer>> {
    match config.target {
        OutputTarget::None => Ok(Box::new(NoneOutputer)),
        OutputTarget::Stdout => Ok(with_format(config.format, BufWriter::new(io::stdout()))),
        OutputTarget::File => {
            let path = config.path.as_deref().context("未配置输出文件路径")?;
            let file = File::create(path).with_context(|| format!("创建输出文件失败: {}", path))?;
            Ok(with_format(config.format, BufWriter::new(file)))
        }
    }
}
