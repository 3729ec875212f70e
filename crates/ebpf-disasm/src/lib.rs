pub mod analyze;

pub use analyze::{analyze, sweep, Block, Edge, EdgeKind, Line, Report};
