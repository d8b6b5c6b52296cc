pub mod line;
pub mod sink;

pub use line::*;
pub use sink::*;
