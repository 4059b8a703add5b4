//! Generation capabilities used by the history commands.
//!
//! The gateway talks to [`TextGenerator`] and [`ImageGenerator`] only; the
//! HTTP clients in this crate are the production implementations.

pub mod error;
pub mod gemini;
pub mod image;
pub mod openai;
pub mod text;

pub use error::AiError;
pub use gemini::GeminiImageClient;
pub use image::{GeneratedImage, ImageGenerator, ImageRequest, RetryingImageGenerator};
pub use openai::OpenAiCompatibleClient;
pub use text::{FallbackOutcome, TextGenerator, generate_with_fallback};
