mod file_source;
mod source;

pub use file_source::FileSource;
pub use source::{Frame, ImageSource};
