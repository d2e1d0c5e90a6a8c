//! Concrete speech engines

pub mod command_tts;
pub mod console;
pub mod disabled;
pub mod scripted;

pub use command_tts::{CommandSynthesizer, SilentSynthesizer};
pub use console::ConsoleRecognizer;
pub use disabled::DisabledRecognizer;
pub use scripted::{RecordingSynthesizer, ScriptedRecognizer};
