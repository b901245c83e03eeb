//! # Error Handling
//!
//! Provides the unified `AppError` enum used across the workspace.

use derive_more::{Display, From};

/// The Global Error Enum.
///
/// We use `derive_more` for boilerplate.
/// Note: String errors default to `General`.
#[derive(Debug, Display, From)]
pub enum AppError {
    /// Wrapper for standard IO errors.
    #[display("IO Error: {_0}")]
    Io(std::io::Error),

    /// Malformed interface-definition file (section count, field line, unit comment).
    #[from(ignore)]
    #[display("Format Error: {_0}")]
    Format(String),

    /// The host document does not declare a factory or node-parameters instance.
    #[from(ignore)]
    #[display("Missing Declaration: {_0}")]
    MissingDeclaration(String),

    /// A marked region (or the node-model element) required for editing is absent.
    #[from(ignore)]
    #[display("Missing Region: {_0}")]
    MissingRegion(String),

    /// A source file that cannot be read back as a plugin.
    #[from(ignore)]
    #[display("Invalid Plugin: {_0}")]
    InvalidPlugin(String),

    /// XML reading or writing failure.
    #[from(ignore)]
    #[display("XML Error: {_0}")]
    Xml(String),

    /// Configuration loading or pattern compilation failure.
    #[from(ignore)]
    #[display("Config Error: {_0}")]
    Config(String),

    /// Generic errors.
    #[display("General Error: {_0}")]
    General(String),
}

/// Manual implementation of the standard Error trait.
impl std::error::Error for AppError {}

/// Helper type alias for Result using AppError.
pub type AppResult<T> = Result<T, AppError>;
