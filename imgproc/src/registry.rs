use std::collections::BTreeMap;

use lazy_static::lazy_static;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::color::{CorrectGamma, EqualizeHistogram, Grayscale, Invert, NormalizeBrightnessContrast};
use crate::draw::{DrawBoundingBoxes, DrawLabels};
use crate::error::OpError;
use crate::filter::{DivGaussianBlur, GaussianBlur, MedianBlur, UnsharpMask};
use crate::geometric::{AddPadding, Crop, Landscape, Rescale, Resize, ResizeToHeight, Rotate};
use crate::morphology::Morphology;
use crate::op::{NamedOp, ProcessingOp};
use crate::threshold::{AdaptiveThreshold, Threshold};

/// 配置文件中的操作描述, 除 `name` 外的字段均为操作参数
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct OpSpec {
    /// 操作名称
    #[schemars(title = "操作名称")]
    pub name: String,
    /// 操作参数
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl OpSpec {
    /// 不带参数的操作描述
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Map::new(),
        }
    }

    /// 追加一个参数
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

struct OpEntry {
    create: fn() -> Box<dyn ProcessingOp>,
    build: fn(Value) -> Result<Box<dyn ProcessingOp>, OpError>,
}

fn create<T: NamedOp>() -> Box<dyn ProcessingOp> {
    Box::new(T::default())
}

fn build<T: NamedOp>(params: Value) -> Result<Box<dyn ProcessingOp>, OpError> {
    let op: T = serde_json::from_value(params).map_err(|e| OpError::bad_params(T::NAME, e.to_string()))?;
    op.validate()?;
    Ok(Box::new(op))
}

fn entry<T: NamedOp>() -> (&'static str, OpEntry) {
    (
        T::NAME,
        OpEntry {
            create: create::<T>,
            build: build::<T>,
        },
    )
}

lazy_static! {
    static ref OP_TABLE: BTreeMap<&'static str, OpEntry> = BTreeMap::from([
        entry::<Crop>(),
        entry::<Resize>(),
        entry::<ResizeToHeight>(),
        entry::<Rescale>(),
        entry::<AddPadding>(),
        entry::<Landscape>(),
        entry::<Rotate>(),
        entry::<Grayscale>(),
        entry::<Invert>(),
        entry::<CorrectGamma>(),
        entry::<EqualizeHistogram>(),
        entry::<NormalizeBrightnessContrast>(),
        entry::<GaussianBlur>(),
        entry::<MedianBlur>(),
        entry::<UnsharpMask>(),
        entry::<DivGaussianBlur>(),
        entry::<Threshold>(),
        entry::<AdaptiveThreshold>(),
        entry::<Morphology>(),
        entry::<DrawBoundingBoxes>(),
        entry::<DrawLabels>(),
    ]);
}

/// 所有已注册的操作名称, 按字母序排列
pub fn names() -> impl Iterator<Item = &'static str> {
    OP_TABLE.keys().copied()
}

/// 以默认参数构建操作
///
/// # 参数
///
/// * `name` - 操作名称
pub fn create_op(name: &str) -> Result<Box<dyn ProcessingOp>, OpError> {
    OP_TABLE
        .get(name)
        .map(|entry| (entry.create)())
        .ok_or_else(|| OpError::UnknownOp(name.to_string()))
}

/// 按操作描述构建操作, 未给出的参数取默认值
///
/// # 参数
///
/// * `spec` - 操作描述
pub fn build_op(spec: &OpSpec) -> Result<Box<dyn ProcessingOp>, OpError> {
    let entry = OP_TABLE
        .get(spec.name.as_str())
        .ok_or_else(|| OpError::UnknownOp(spec.name.clone()))?;
    (entry.build)(Value::Object(spec.params.clone()))
}
