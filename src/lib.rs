pub mod server;
pub mod watcher;

pub use server::*;
pub use watcher::*;
