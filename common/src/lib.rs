//! Small support types shared by the workspace crates.

pub mod buffer3;
pub mod float_ext;
pub mod output_stream;

pub use buffer3::Buffer3;
pub use float_ext::FloatExt;
pub use output_stream::OutputStream;

pub const EPSILON: f64 = 1e-6;
