pub mod gemini;
pub mod video;

pub use gemini::{GeminiClient, InlineImage};
pub use video::{cancel_pair, CancelHandle, CancelToken, PollPolicy};
