//! # Naming
//!
//! Derives plugin file and class names from the ROS 2 package and action names.

use crate::case::{format_case, CaseStyle};
use crate::error::AppResult;
use std::path::Path;

fn strip_words(pkg: &str, action: &str, exclude_words: &[String]) -> String {
    let mut joined = format!("{}_{}", pkg, action);
    for word in exclude_words.iter().filter(|w| !w.is_empty()) {
        joined = joined.replace(word.as_str(), "");
    }
    joined
}

/// `<pkg>_<Action>` with excluded words removed, lower-snake-cased, plus `.h`.
///
/// # Examples
/// ```
/// use bt_gen_core::naming::plugin_file_name;
///
/// let excluded = ["_interfaces".to_string()];
/// let name = plugin_file_name("nav_interfaces", "MoveBase", &excluded).unwrap();
/// assert_eq!(name, "nav_move_base.h");
/// ```
pub fn plugin_file_name(pkg: &str, action: &str, exclude_words: &[String]) -> AppResult<String> {
    let stem = format_case(&strip_words(pkg, action, exclude_words), CaseStyle::LowerSnake)?;
    Ok(format!("{}.h", stem))
}

/// `<pkg>_<Action>` with excluded words removed, upper-camel-cased.
pub fn plugin_class_name(pkg: &str, action: &str, exclude_words: &[String]) -> AppResult<String> {
    format_case(&strip_words(pkg, action, exclude_words), CaseStyle::UpperCamel)
}

/// Include guard symbol for a plugin file name: `nav_move.h` -> `NAV_MOVE_H`.
pub fn include_guard_symbol(file_name: &str) -> AppResult<String> {
    format_case(&file_name.replace('.', "_"), CaseStyle::UpperSnake)
}

/// Last non-empty path component, tolerant of a trailing slash.
pub fn package_name(package_path: &Path) -> Option<String> {
    package_path
        .components()
        .rev()
        .find_map(|c| {
            let s = c.as_os_str().to_string_lossy();
            (!s.is_empty() && s != "/").then(|| s.to_string())
        })
}
