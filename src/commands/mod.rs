pub mod check;
pub mod prompt;
pub mod status;
pub mod sync;

pub use prompt::TerminalPrompt;
