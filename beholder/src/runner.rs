use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use imgproc::Processor;
use neural::Detector;
use source::{Frame, ImageSource};
use tracing::{debug, info, warn};

use crate::error::FrameError;
use crate::output::{Outputer, Record, Timings};

/// 批次统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub processed: usize,
    pub failed: usize,
    pub results: usize,
    /// 已处理图像的各阶段累计耗时
    pub timings: Timings,
}

impl Summary {
    fn add(&mut self, results: usize, timings: &Timings) {
        self.processed += 1;
        self.results += results;
        self.timings.read += timings.read;
        self.timings.preprocess += timings.preprocess;
        self.timings.detect += timings.detect;
        self.timings.postprocess += timings.postprocess;
    }

    /// 输出统计日志
    pub fn log(&self) {
        info!(
            "处理完成: 成功 {} 张, 失败 {} 张, 共 {} 个检测结果",
            self.processed, self.failed, self.results
        );
        if self.processed == 0 {
            return;
        }
        let n = self.processed as f64;
        info!(
            "平均耗时: 读取 {:.1} ms, 预处理 {:.1} ms, 检测 {:.1} ms, 后处理 {:.1} ms, 合计 {:.1} ms",
            self.timings.read / n,
            self.timings.preprocess / n,
            self.timings.detect / n,
            self.timings.postprocess / n,
            self.timings.total() / n
        );
    }
}

/// 流水线执行器
///
/// 对图像源中的每张图像依次执行预处理, 检测, 后处理并输出结果
pub struct Runner {
    detector: Detector,
    processor: Processor,
    outputer: Box<dyn Outputer>,
    annotated_dir: Option<PathBuf>,
    summary: Summary,
}

impl Runner {
    /// 创建执行器
    ///
    /// # 参数
    ///
    /// * `detector` - 已初始化的检测器
    /// * `processor` - 图像处理链
    /// * `outputer` - 结果输出器
    /// * `annotated_dir` - 标注图像保存目录
    pub fn new(
        detector: Detector,
        processor: Processor,
        outputer: Box<dyn Outputer>,
        annotated_dir: Option<PathBuf>,
    ) -> Result<Self> {
        if let Some(dir) = &annotated_dir {
            fs::create_dir_all(dir)
                .with_context(|| format!("创建标注图像目录失败: {}", dir.display()))?;
        }
        Ok(Self {
            detector,
            processor,
            outputer,
            annotated_dir,
            summary: Summary::default(),
        })
    }

    /// 处理图像源中的全部图像
    ///
    /// 单张图像失败时记录日志并继续, 不可恢复的错误中止批次
    ///
    /// # 参数
    ///
    /// * `source` - 图像源
    pub fn run(&mut self, source: &mut dyn ImageSource) -> Result<Summary> {
        info!(
            "开始处理 {}, 共 {} 张图像",
            source.describe(),
            source.remaining()
        );

        loop {
            let start = Instant::now();
            let Some(frame) = source.next_frame() else {
                break;
            };
            let read = Timings::millis(start.elapsed());

            match frame
                .map_err(FrameError::Read)
                .and_then(|frame| self.process(frame, read))
            {
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!("{}", e);
                    self.summary.failed += 1;
                }
            }
        }

        self.outputer.finish()?;
        self.summary.log();
        Ok(self.summary.clone())
    }

    /// 处理单张图像, 返回检测结果数量
    ///
    /// # 参数
    ///
    /// * `frame` - 图像
    /// * `read` - 读取耗时
    fn process(&mut self, frame: Frame, read: f64) -> Result<usize, FrameError> {
        let mut timings = Timings {
            read,
            ..Default::default()
        };
        self.processor.set_image(frame.image);

        let start = Instant::now();
        self.processor.preprocess()?;
        timings.preprocess = Timings::millis(start.elapsed());

        let start = Instant::now();
        let results = self.detector.detect(self.processor.image())?.to_vec();
        timings.detect = Timings::millis(start.elapsed());

        let start = Instant::now();
        self.processor.postprocess(&results)?;
        timings.postprocess = Timings::millis(start.elapsed());

        if let Some(dir) = &self.annotated_dir {
            let path = dir.join(&frame.name);
            self.processor.image().save(&path)?;
            debug!("标注图像已保存: {}", path.display());
        }

        debug!(
            "{} 检测到 {} 个结果, 耗时 {:.1} ms",
            frame.name,
            results.len(),
            timings.total()
        );
        self.outputer.write(&Record {
            image: &frame.name,
            results: &results,
            timings,
        })?;
        self.summary.add(results.len(), &timings);
        Ok(results.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::create_outputer;
    use anyhow::anyhow;
    use config::{OutputConfig, OutputFormat, OutputTarget};
    use image::DynamicImage;
    use imgproc::OpSpec;
    use ndarray::{Array3, ArrayD, ArrayView4};
    use neural::{DetectorConfig, DetectorError, InferenceBackend, ModelFamily};
    use std::collections::VecDeque;

    /// 每次返回同一组输出的推理后端
    struct FixedBackend(Vec<ArrayD<f32>>);

    impl InferenceBackend for FixedBackend {
        fn forward(
            &mut self,
            _blob: ArrayView4<'_, f32>,
            outs: &mut Vec<ArrayD<f32>>,
        ) -> Result<(), DetectorError> {
            outs.clear();
            outs.extend(self.0.iter().cloned());
            Ok(())
        }
    }

    struct VecSource(VecDeque<Result<Frame>>);

    impl ImageSource for VecSource {
        fn describe(&self) -> String {
            "memory".to_string()
        }

        fn remaining(&self) -> usize {
            self.0.len()
        }

        fn next_frame(&mut self) -> Option<Result<Frame>> {
            self.0.pop_front()
        }
    }

    fn frame(name: &str, width: u32, height: u32) -> Result<Frame> {
        Ok(Frame {
            name: name.to_string(),
            image: DynamicImage::new_rgb8(width, height),
        })
    }

    fn detector(ready: bool) -> Detector {
        let mut config = DetectorConfig::for_family(ModelFamily::YoloV8);
        config.size = Some([100, 100]);
        config.classes = vec!["sign".to_string()];
        let mut detector = Detector::new(config).unwrap();
        if ready {
            // 一个中心在 (50, 50), 20x10 的候选框
            let mut out = Array3::<f32>::zeros((1, 5, 1));
            for (i, v) in [50.0, 50.0, 20.0, 10.0, 0.9].into_iter().enumerate() {
                out[[0, i, 0]] = v;
            }
            detector.init_with_backend(Box::new(FixedBackend(vec![out.into_dyn()])));
        }
        detector
    }

    fn json_outputer(path: &std::path::Path) -> Box<dyn Outputer> {
        create_outputer(&OutputConfig {
            format: OutputFormat::Json,
            target: OutputTarget::File,
            path: Some(path.display().to_string()),
            annotated_dir: None,
        })
        .unwrap()
    }

    #[test]
    fn test_run_continues_after_failures() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let out_file = dir.path().join("out.jsonl");
        let annotated = dir.path().join("annotated");

        let processor = Processor::from_specs(
            &[OpSpec::new("grayscale"), OpSpec::new("crop").with("left", 60)],
            &[OpSpec::new("draw_bounding_boxes")],
        )?;
        let mut runner = Runner::new(
            detector(true),
            processor,
            json_outputer(&out_file),
            Some(annotated.clone()),
        )?;

        let mut source = VecSource(VecDeque::from([
            frame("a.png", 160, 100),
            Err(anyhow!("broken")),
            // 裁剪起点超出图像宽度
            frame("small.png", 40, 40),
            frame("b.png", 160, 100),
        ]));
        let summary = runner.run(&mut source)?;

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.results, 2);

        let text = fs::read_to_string(&out_file)?;
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let record: serde_json::Value = serde_json::from_str(lines[0])?;
        assert_eq!(record["image"], "a.png");
        assert_eq!(record["results"][0]["text"], "sign");
        assert_eq!(record["results"][0]["bbox"]["left"], 40);
        assert!(annotated.join("a.png").exists());
        assert!(annotated.join("b.png").exists());
        Ok(())
    }

    #[test]
    fn test_uninitialized_detector_aborts() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut runner = Runner::new(
            detector(false),
            Processor::new(Vec::new(), Vec::new()),
            json_outputer(&dir.path().join("out.jsonl")),
            None,
        )?;
        let mut source = VecSource(VecDeque::from([frame("a.png", 10, 10)]));
        let err = runner.run(&mut source).unwrap_err();
        assert!(err.to_string().contains("尚未初始化"));
        Ok(())
    }
}
