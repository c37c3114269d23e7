pub mod client;

pub use client::{strip_fences, GeminiClient};
