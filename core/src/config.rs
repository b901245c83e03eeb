//! # Configuration
//!
//! JSON configuration shared by both generator commands.

use crate::error::{AppError, AppResult};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Generator settings, keyed the way `config.json` spells them.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// ROS 2 package containing the `.action` files.
    pub ros2_package_abs_path: String,
    /// Directory receiving generated plugin headers.
    pub bt_plugin_save_path: String,
    /// Template for new plugin headers. The embedded template is used when unset.
    pub bt_plugin_cpp_template: Option<String>,
    /// Replaces `PATHTOFILE` in include guards.
    pub bt_plugin_cpp_include_guard_prefix: String,
    /// Words stripped from `<pkg>_<Action>` before building the file name.
    pub bt_plugin_file_name_exclude_words: Vec<String>,
    /// Words stripped from `<pkg>_<Action>` before building the class name.
    pub bt_action_name_exclude_words: Vec<String>,
    /// Goal field name patterns that become constructor default arguments.
    pub bt_action_default_arguments: Vec<String>,
    /// Goal/result field names that never become ports.
    pub bt_action_ignore_arguments: Vec<String>,
    /// Host source registering every plugin with the factory.
    pub ros2_bt_source_abs_path: String,
    /// Design-tool project file holding `<TreeNodesModel>`.
    pub btproj_abs_path: String,
}

impl GeneratorConfig {
    /// Loads the configuration from a JSON file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config {:?}: {}", path, e))
        })?;
        Self::from_json(&text)
    }

    /// Parses the configuration from JSON text.
    pub fn from_json(text: &str) -> AppResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| AppError::Config(format!("Invalid config JSON: {}", e)))
    }

    /// Compiles `bt_action_default_arguments`.
    pub fn default_arg_matcher(&self) -> AppResult<DefaultArgMatcher> {
        DefaultArgMatcher::new(&self.bt_action_default_arguments)
    }

    /// Plugin directory with `~` expanded.
    pub fn plugin_dir(&self) -> PathBuf {
        expand_home(&self.bt_plugin_save_path)
    }

    /// Package directory with `~` expanded.
    pub fn package_dir(&self) -> PathBuf {
        expand_home(&self.ros2_package_abs_path)
    }

    /// Host source path with `~` expanded.
    pub fn host_source_path(&self) -> PathBuf {
        expand_home(&self.ros2_bt_source_abs_path)
    }

    /// Project file path with `~` expanded.
    pub fn btproj_path(&self) -> PathBuf {
        expand_home(&self.btproj_abs_path)
    }

    /// Template path with `~` expanded, if configured.
    pub fn template_path(&self) -> Option<PathBuf> {
        self.bt_plugin_cpp_template
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(expand_home)
    }
}

/// Decides which goal fields are constructor default arguments.
///
/// Every pattern is anchored at the start of the field name.
#[derive(Debug, Clone, Default)]
pub struct DefaultArgMatcher {
    patterns: Vec<Regex>,
}

impl DefaultArgMatcher {
    /// Compiles the pattern list.
    pub fn new(patterns: &[String]) -> AppResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(&format!("^(?:{})", p)).map_err(|e| {
                    AppError::Config(format!("Invalid default argument pattern '{}': {}", p, e))
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Returns true when any pattern matches `field_name`.
    pub fn is_default(&self, field_name: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(field_name))
    }
}

/// Expands a leading `~` against `$HOME`.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = std::env::var_os("HOME") {
            let rest = rest.trim_start_matches('/');
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_with_missing_keys() {
        let cfg = GeneratorConfig::from_json(
            r#"{
                "bt_plugin_save_path": "/tmp/plugins",
                "bt_action_default_arguments": ["timeout", "speed.*"]
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.bt_plugin_save_path, "/tmp/plugins");
        assert!(cfg.bt_plugin_cpp_template.is_none());
        assert!(cfg.bt_action_ignore_arguments.is_empty());
    }

    #[test]
    fn test_default_arg_matcher_is_anchored() {
        let matcher = DefaultArgMatcher::new(&["speed.*".into(), "timeout".into()]).unwrap();
        assert!(matcher.is_default("speed_limit"));
        assert!(matcher.is_default("timeout_ms"));
        assert!(!matcher.is_default("max_speed"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = DefaultArgMatcher::new(&["(unclosed".into()]).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"bt_plugin_cpp_template": "", "bt_action_ignore_arguments": ["header"]}"#,
        )
        .unwrap();
        let cfg = GeneratorConfig::load(&path).unwrap();
        assert_eq!(cfg.bt_action_ignore_arguments, vec!["header".to_string()]);
        assert!(cfg.template_path().is_none());

        let err = GeneratorConfig::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_invalid_json() {
        assert!(GeneratorConfig::from_json("{not json").is_err());
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(expand_home("~/ws"), PathBuf::from(home).join("ws"));
        }
    }
}
