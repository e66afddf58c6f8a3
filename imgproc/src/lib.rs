mod color;
mod draw;
mod error;
mod filter;
mod geometric;
mod morphology;
mod op;
mod processor;
mod registry;
mod threshold;

pub use color::{
    CorrectGamma, EqualizeHistogram, Grayscale, Invert, NormalizeBrightnessContrast,
};
pub use draw::{DrawBoundingBoxes, DrawLabels};
pub use error::{OpError, PipelineError, Stage};
pub use filter::{DivGaussianBlur, GaussianBlur, MedianBlur, UnsharpMask};
pub use geometric::{AddPadding, Crop, Landscape, Rescale, Resize, ResizeToHeight, Rotate};
pub use morphology::{Morphology, MorphologyKind, MorphologyNorm};
pub use op::{NamedOp, ProcessingOp};
pub use processor::Processor;
pub use registry::{OpSpec, build_op, create_op, names};
pub use threshold::{AdaptiveThreshold, Threshold, ThresholdKind};
