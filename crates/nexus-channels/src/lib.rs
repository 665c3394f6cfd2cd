pub mod bridge;
pub mod console;

pub use bridge::{BridgeClient, BridgeError, BridgeEventOut};
pub use console::ConsoleChannel;
