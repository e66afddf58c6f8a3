use common::{OcrResult, Rectangle};
use ndarray::{ArrayView2, Axis, Ix3};
use tracing::debug;

use crate::buffers::Buffers;
use crate::config::ModelFamily;
use crate::error::DetectorError;
use crate::extractor::{Extractor, FrameContext, expect_dims};

/// 结束符下标
const EOS_INDEX: usize = 0;

/// 基于 PARSeq 的整图文本识别
///
/// 模型输出 `[1, 最大字符数, 字符集大小 + 1]`, 第 0 类为结束符
pub struct Parseq {
    charset: Vec<char>,
}

impl Parseq {
    /// 创建 PARSeq 解析器
    ///
    /// # 参数
    ///
    /// * `charset` - 字符集, 第 `i` 个字符对应第 `i + 1` 类
    pub fn new(charset: &str) -> Self {
        Self {
            charset: charset.chars().collect(),
        }
    }

    /// 贪心解码
    ///
    /// 每个位置取 softmax 后概率最大的类别, 遇到结束符停止;
    /// 置信度为所取概率之积 (包含结束符)
    ///
    /// # 参数
    ///
    /// * `logits` - `[最大字符数, 字符集大小 + 1]`
    pub fn decode(&self, logits: ArrayView2<'_, f32>) -> (String, f64) {
        let mut text = String::new();
        let mut confidence = 1.0f64;

        for row in logits.outer_iter() {
            let Some((idx, &max)) = row
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.total_cmp(b))
            else {
                break;
            };
            let denom = row
                .iter()
                .map(|&v| ((v - max) as f64).exp())
                .sum::<f64>();
            confidence *= 1.0 / denom;

            if idx == EOS_INDEX {
                break;
            }
            if let Some(&c) = self.charset.get(idx - 1) {
                text.push(c);
            }
        }
        (text, confidence)
    }
}

impl Extractor for Parseq {
    fn family(&self) -> ModelFamily {
        ModelFamily::Parseq
    }

    fn extract(
        &self,
        frame: &FrameContext<'_>,
        buffers: &mut Buffers,
        results: &mut Vec<OcrResult>,
    ) -> Result<(), DetectorError> {
        let out = buffers
            .outs
            .first()
            .ok_or(DetectorError::OutputShape(Vec::new()))?;
        expect_dims(out.shape(), 3)?;
        let shape = out.shape();
        if shape[1] != frame.config.n_pos || shape[2] != self.charset.len() + 1 {
            return Err(DetectorError::OutputShape(shape.to_vec()));
        }

        let logits = out
            .view()
            .into_dimensionality::<Ix3>()
            .map_err(|_| DetectorError::OutputShape(shape.to_vec()))?;
        let (text, confidence) = self.decode(logits.index_axis(Axis(0), 0));
        if text.is_empty() {
            return Ok(());
        }

        debug!("识别结果: {}, 置信度: {}", text, confidence);

        let size = frame.image_size;
        results.push(OcrResult::new(
            text,
            Rectangle::new(0, 0, size.width, size.height),
            0.0,
            confidence,
        ));
        Ok(())
    }

    /// 解析阶段已生成最终结果
    fn store(&self, _frame: &FrameContext<'_>, _buffers: &mut Buffers, _results: &mut Vec<OcrResult>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::BlobTransform;
    use crate::config::DetectorConfig;
    use common::Size;
    use ndarray::{Array2, array};

    #[test]
    fn test_decode() {
        let parseq = Parseq::new("AB");
        let logits = array![[0.0f32, 10.0, 0.0], [0.0, 0.0, 10.0]];
        let (text, confidence) = parseq.decode(logits.view());
        assert_eq!(text, "AB");
        let p = 1.0 / (1.0 + 2.0 * (-10.0f64).exp());
        assert!((confidence - p * p).abs() < 1e-9);
    }

    #[test]
    fn test_decode_stops_at_eos() {
        let parseq = Parseq::new("AB");
        let logits = array![[0.0f32, 5.0, 0.0], [5.0, 0.0, 0.0], [0.0, 0.0, 5.0]];
        let (text, confidence) = parseq.decode(logits.view());
        assert_eq!(text, "A");
        let p = 1.0 / (1.0 + 2.0 * (-5.0f64).exp());
        assert!((confidence - p * p).abs() < 1e-9);
    }

    #[test]
    fn test_extract() {
        let mut config = DetectorConfig::for_family(ModelFamily::Parseq);
        config.charset = Some("AB".to_string());
        config.n_pos = 2;
        let frame = FrameContext {
            config: &config,
            image_size: Size::new(64, 16),
            transform: BlobTransform::default(),
        };
        let parseq = Parseq::new(config.charset());
        let mut buffers = Buffers::default();
        let mut results = Vec::new();

        let logits = array![[[0.0f32, 10.0, 0.0], [0.0, 0.0, 10.0]]];
        buffers.outs = vec![logits.into_dyn()];
        parseq.extract(&frame, &mut buffers, &mut results).unwrap();
        parseq.store(&frame, &mut buffers, &mut results);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "AB");
        assert_eq!(results[0].bbox, Rectangle::new(0, 0, 64, 16));

        // 首位即为结束符时不产生结果
        results.clear();
        let logits = array![[[10.0f32, 0.0, 0.0], [10.0, 0.0, 0.0]]];
        buffers.outs = vec![logits.into_dyn()];
        parseq.extract(&frame, &mut buffers, &mut results).unwrap();
        assert!(results.is_empty());

        buffers.outs = vec![Array2::<f32>::zeros((2, 3)).into_dyn()];
        assert!(matches!(
            parseq.extract(&frame, &mut buffers, &mut results),
            Err(DetectorError::OutputShape(_))
        ));
    }
}
