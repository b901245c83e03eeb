//! # Case Formatting
//!
//! Identifier case conversion for generated names (file names, class names,
//! include guards). Word boundaries follow `heck`.

use crate::error::{AppError, AppResult};
use heck::{ToKebabCase, ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};

/// Supported output styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseStyle {
    /// `lower_snake_case`
    LowerSnake,
    /// `UPPER_SNAKE_CASE`
    UpperSnake,
    /// `UpperCamelCase`
    UpperCamel,
    /// `lowerCamelCase`
    LowerCamel,
    /// `kebab-case`
    Kebab,
}

/// Converts `input` to the requested style.
///
/// Input may only contain ASCII alphanumerics, `_` and `-`.
///
/// # Examples
/// ```
/// use bt_gen_core::case::{format_case, CaseStyle};
///
/// assert_eq!(format_case("nav_pkg_MoveBase", CaseStyle::UpperCamel).unwrap(), "NavPkgMoveBase");
/// assert!(format_case("not valid", CaseStyle::Kebab).is_err());
/// ```
pub fn format_case(input: &str, style: CaseStyle) -> AppResult<String> {
    if let Some(bad) = input
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(AppError::General(format!(
            "Invalid identifier '{}': unexpected character '{}' (only [A-Za-z0-9_-] allowed)",
            input, bad
        )));
    }

    let out = match style {
        CaseStyle::LowerSnake => input.to_snake_case(),
        CaseStyle::UpperSnake => input.to_shouty_snake_case(),
        CaseStyle::UpperCamel => input.to_upper_camel_case(),
        CaseStyle::LowerCamel => input.to_lower_camel_case(),
        CaseStyle::Kebab => input.to_kebab_case(),
    };
    Ok(out)
}
