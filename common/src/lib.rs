mod export;
mod geometry;
mod result;

pub use export::{CRectangle, CResult, beholder_result_release};
pub use geometry::{Point, PointF, Rectangle, RotatedRect, Size};
pub use result::OcrResult;
