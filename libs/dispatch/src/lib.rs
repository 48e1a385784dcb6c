pub mod config;
mod dispatch_loop;

pub use config::DispatchConfig;
pub use dispatch_loop::{DispatchLoop, DispatchStats, LoopState, spawn_dispatch};
