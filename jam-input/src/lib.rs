//! Modal keyboard input handling for jam

mod commands;
mod modal;

pub use commands::Command;
pub use modal::{InputHandler, Mode};
