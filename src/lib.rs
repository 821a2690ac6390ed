//! Lumen library exports for testing

use clap::ValueEnum;

pub mod core;
pub mod inference;
pub mod tui;

#[cfg(test)]
pub mod test_support;

/// Hosted model API the relay talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Gemini,
    #[value(name = "openrouter")]
    OpenRouter,
}

impl Provider {
    /// The name used in config files and `LUMEN_PROVIDER`.
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenRouter => "openrouter",
        }
    }
}
