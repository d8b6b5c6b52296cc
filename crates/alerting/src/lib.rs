pub mod alert;
pub mod engine;
pub mod notifier;
pub mod state;

pub use alert::*;
pub use engine::*;
pub use notifier::*;
pub use state::*;
