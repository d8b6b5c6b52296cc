pub mod carbon;
pub mod config;
pub mod notifier;

pub use carbon::*;
pub use config::*;
pub use notifier::*;
