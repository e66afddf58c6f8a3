use std::fmt::Display;
use std::path::Path;

use ndarray::{ArrayD, ArrayView4, IxDyn};
use ort::{
    execution_providers::{CPUExecutionProvider, ExecutionProviderDispatch},
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use tracing::debug;

use crate::config::ExecutionProvider;
use crate::error::DetectorError;

/// 推理后端接口
pub trait InferenceBackend: Send {
    /// 执行一次前向推理
    ///
    /// # 参数
    ///
    /// * `blob` - 模型输入张量
    /// * `outs` - 模型输出张量, 形状不变时原地覆盖
    fn forward(
        &mut self,
        blob: ArrayView4<'_, f32>,
        outs: &mut Vec<ArrayD<f32>>,
    ) -> Result<(), DetectorError>;
}

/// 基于 ONNX Runtime 的推理后端
pub struct OrtBackend {
    session: Session,
}

impl OrtBackend {
    /// 加载 ONNX 模型
    ///
    /// # 参数
    ///
    /// * `model_file` - 模型文件路径
    /// * `intra_threads` - 推理线程数
    /// * `providers` - 推理设备, 按顺序尝试
    pub fn load(
        model_file: &Path,
        intra_threads: usize,
        providers: &[ExecutionProvider],
    ) -> Result<Self, DetectorError> {
        let load_error = |reason: String| DetectorError::ModelLoad {
            path: model_file.to_path_buf(),
            reason,
        };
        if !model_file.is_file() {
            return Err(load_error("文件不存在".to_string()));
        }

        let session = build_session(model_file, intra_threads, providers)
            .map_err(|e| load_error(format!("{:#}", e)))?;

        debug!("模型 {:?} 加载成功, 推理设备: {:?}", model_file, providers);

        Ok(Self { session })
    }
}

impl InferenceBackend for OrtBackend {
    fn forward(
        &mut self,
        blob: ArrayView4<'_, f32>,
        outs: &mut Vec<ArrayD<f32>>,
    ) -> Result<(), DetectorError> {
        let tensor = TensorRef::from_array_view(blob).map_err(inference_error)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(inference_error)?;

        outs.truncate(outputs.len());
        for i in 0..outputs.len() {
            let (shape, data) = outputs[i]
                .try_extract_tensor::<f32>()
                .map_err(inference_error)?;
            let dims = shape.iter().map(|&d| d.max(0) as usize).collect::<Vec<_>>();

            match outs.get_mut(i) {
                Some(out) if out.shape() == dims.as_slice() && out.len() == data.len() => {
                    if let Some(dst) = out.as_slice_mut() {
                        dst.copy_from_slice(data);
                        continue;
                    }
                    *out = to_array(&dims, data)?;
                }
                Some(out) => *out = to_array(&dims, data)?,
                None => outs.push(to_array(&dims, data)?),
            }
        }
        Ok(())
    }
}

fn dispatch(provider: ExecutionProvider) -> anyhow::Result<ExecutionProviderDispatch> {
    let dispatch = match provider {
        ExecutionProvider::Cpu => CPUExecutionProvider::default().build(),
        #[cfg(feature = "cuda")]
        ExecutionProvider::Cuda => ort::execution_providers::CUDAExecutionProvider::default().build(),
        #[cfg(feature = "tensorrt")]
        ExecutionProvider::TensorRt => {
            ort::execution_providers::TensorRTExecutionProvider::default().build()
        }
        #[cfg(feature = "directml")]
        ExecutionProvider::DirectMl => {
            ort::execution_providers::DirectMLExecutionProvider::default().build()
        }
        #[cfg(feature = "coreml")]
        ExecutionProvider::CoreMl => {
            ort::execution_providers::CoreMLExecutionProvider::default().build()
        }
        #[cfg(feature = "openvino")]
        ExecutionProvider::OpenVino => {
            ort::execution_providers::OpenVINOExecutionProvider::default().build()
        }
        #[allow(unreachable_patterns)]
        other => anyhow::bail!("当前构建不支持推理设备 {:?}", other),
    };
    Ok(dispatch)
}

fn build_session(
    model_file: &Path,
    intra_threads: usize,
    providers: &[ExecutionProvider],
) -> anyhow::Result<Session> {
    let providers = providers
        .iter()
        .map(|&p| dispatch(p))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .with_execution_providers(providers)?
        .commit_from_file(model_file)?;
    Ok(session)
}

fn inference_error(e: impl Display) -> DetectorError {
    DetectorError::Inference(e.to_string())
}

fn to_array(dims: &[usize], data: &[f32]) -> Result<ArrayD<f32>, DetectorError> {
    ArrayD::from_shape_vec(IxDyn(dims), data.to_vec())
        .map_err(|_| DetectorError::OutputShape(dims.to_vec()))
}
