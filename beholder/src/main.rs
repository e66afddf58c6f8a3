use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use config::PipelineConfig;
use imgproc::Processor;
use neural::Detector;
use source::FileSource;
use tracing::{error, info};

use crate::args::Args;
use crate::log::init_log;
use crate::output::create_outputer;
use crate::runner::Runner;

mod args;
mod error;
mod log;
mod output;
mod runner;

/// 程序入口
fn application() -> Result<()> {
    let args = Args::new();

    init_log(&args)?;

    info!("欢迎使用 Beholder 图像检测流水线");

    let mut config = PipelineConfig::load(&args.config)?;
    args.apply_to(&mut config.output);
    config.validate()?;

    // 检测器
    let mut detector = Detector::new(config.detector.clone()).context("创建检测器失败")?;
    detector.init().context("初始化检测器失败")?;
    info!(
        "检测器初始化完成: {:?} {}",
        config.detector.family,
        config.detector.model_file().display()
    );

    // 图像处理链
    let processor = Processor::from_specs(&config.preprocessing, &config.postprocessing)?;

    // 图像源
    let mut source = FileSource::open(&args.input)?;

    let outputer = create_outputer(&config.output)?;
    let annotated_dir = config.output.annotated_dir.as_ref().map(PathBuf::from);
    let mut runner = Runner::new(detector, processor, outputer, annotated_dir)?;
    let summary = runner.run(&mut source)?;
    if summary.processed == 0 {
        bail!("没有成功处理的图像");
    }
    Ok(())
}

fn main() {
    match application() {
        Ok(_) => {
            info!("程序已执行完毕");
        }
        Err(e) => {
            error!("程序存在异常: {:#}", e);
            std::process::exit(1);
        }
    }
}
