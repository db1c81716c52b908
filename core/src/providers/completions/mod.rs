pub(crate) mod gemini;

pub use gemini::GeminiCompletionModel as Gemini;
