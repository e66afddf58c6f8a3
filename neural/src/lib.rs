mod backend;
mod blob;
mod buffers;
mod config;
mod craft;
mod detector;
mod east;
mod error;
mod extractor;
mod nms;
mod parseq;
mod yolov8;

pub use backend::{InferenceBackend, OrtBackend};
pub use blob::{BlobTransform, fill_blob};
pub use buffers::Buffers;
pub use config::{DetectorConfig, ExecutionProvider, ModelFamily, PARSEQ_CHARSET, ResizeMode};
pub use craft::Craft;
pub use detector::Detector;
pub use east::East;
pub use error::DetectorError;
pub use extractor::{Extractor, FrameContext, for_config};
pub use nms::nms;
pub use parseq::Parseq;
pub use yolov8::YoloV8;
