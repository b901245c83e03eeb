//! # Action Definition Parser
//!
//! Reads ROS 2 `.action` interface files into typed field lists.
//!
//! The file is split into goal, result and feedback sections by two `---`
//! lines. Each remaining line declares one field as `<type> <name> [# comment]`.
//! Constants and non-scalar fields (nested messages, arrays) are skipped.

use crate::error::{AppError, AppResult};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Section separator inside an `.action` file.
pub const SECTION_SEPARATOR: &str = "---";

/// One typed field of an action section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortField {
    /// Field name as declared in the interface file.
    pub name: String,
    /// Target (C++) scalar type.
    pub c_type: String,
    /// Unit recovered from the trailing comment, made of `[A-Za-z0-9_]` only.
    pub unit: Option<String>,
}

impl PortField {
    /// Externally visible argument name: `name` or `name__unit`.
    pub fn arg_name(&self) -> String {
        match &self.unit {
            Some(unit) => format!("{}__{}", self.name, unit),
            None => self.name.clone(),
        }
    }
}

/// A parsed action interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDefinition {
    /// Action name (the interface file stem, e.g. `MoveBase`).
    pub action_name: String,
    /// Request fields.
    pub goal: Vec<PortField>,
    /// Response fields.
    pub result: Vec<PortField>,
    /// Streaming update fields.
    pub feedback: Vec<PortField>,
}

/// Maps a ROS 2 scalar type to its C++ counterpart.
///
/// Returns `None` for anything that is not a plain scalar.
pub fn map_ros_type(ros_type: &str) -> Option<&'static str> {
    let c_type = match ros_type {
        "bool" => "bool",
        "byte" | "char" | "uint8" => "uint8_t",
        "int8" => "int8_t",
        "int16" => "int16_t",
        "uint16" => "uint16_t",
        "int32" => "int32_t",
        "uint32" => "uint32_t",
        "int64" => "int64_t",
        "uint64" => "uint64_t",
        "float32" => "float",
        "float64" => "double",
        "string" => "std::string",
        "wstring" => "std::u16string",
        _ => return None,
    };
    Some(c_type)
}

/// Parses the text of an `.action` file.
///
/// # Arguments
///
/// * `action_name` - Name of the action (usually the file stem).
/// * `text` - Raw file content.
///
/// # Errors
///
/// `AppError::Format` when the section count is not three, when a field line
/// does not have exactly a type and a name, or when the unit comment is malformed.
///
/// # Examples
/// ```
/// use bt_gen_core::definition::parse_action_definition;
///
/// let text = "float64 speed # [m / s]\n---\nbool ok\n---\n";
/// let def = parse_action_definition("Move", text).unwrap();
/// assert_eq!(def.goal[0].arg_name(), "speed__m_per_s");
/// assert_eq!(def.result[0].c_type, "bool");
/// assert!(def.feedback.is_empty());
/// ```
pub fn parse_action_definition(action_name: &str, text: &str) -> AppResult<ActionDefinition> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();

    let sections = split_sections(&lines);
    if sections.len() != 3 {
        return Err(AppError::Format(format!(
            "Action '{}' must have exactly 3 sections separated by '{}', found {}",
            action_name,
            SECTION_SEPARATOR,
            sections.len()
        )));
    }

    let mut parsed = Vec::with_capacity(3);
    for section in &sections {
        let mut fields = Vec::new();
        for line in section {
            if let Some(field) = parse_field_line(line)? {
                fields.push(field);
            }
        }
        parsed.push(fields);
    }

    let feedback = parsed.pop().unwrap_or_default();
    let result = parsed.pop().unwrap_or_default();
    let goal = parsed.pop().unwrap_or_default();

    Ok(ActionDefinition {
        action_name: action_name.to_string(),
        goal,
        result,
        feedback,
    })
}

fn split_sections<'a>(lines: &[&'a str]) -> Vec<Vec<&'a str>> {
    let mut sections = vec![Vec::new()];
    for line in lines {
        if *line == SECTION_SEPARATOR {
            sections.push(Vec::new());
        } else if let Some(current) = sections.last_mut() {
            current.push(*line);
        }
    }
    sections
}

/// Parses one declaration line. `Ok(None)` means the line is skipped.
fn parse_field_line(line: &str) -> AppResult<Option<PortField>> {
    static CONSTANT_RE: OnceLock<Regex> = OnceLock::new();
    let constant_re =
        CONSTANT_RE.get_or_init(|| Regex::new(r"^[A-Z0-9_]+$").expect("Invalid regex"));

    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    let name_re = NAME_RE
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid regex"));

    let (decl, comment) = match line.split_once('#') {
        Some((decl, comment)) => (decl, Some(comment)),
        None => (line, None),
    };
    let tokens: Vec<&str> = decl.split_whitespace().collect();

    if let Some(name) = tokens.get(1) {
        // `NAME=value` constants carry the value in the same token
        let bare = name.split('=').next().unwrap_or(name);
        if constant_re.is_match(bare) {
            debug!(line, "skipping constant");
            return Ok(None);
        }
    }

    let Some(c_type) = tokens.first().and_then(|t| map_ros_type(t)) else {
        debug!(line, "skipping non-scalar field");
        return Ok(None);
    };

    if tokens.len() != 2 {
        return Err(AppError::Format(format!(
            "Field line '{}' must be '<type> <name>', found {} tokens",
            line,
            tokens.len()
        )));
    }

    let name = tokens[1];
    if !name_re.is_match(name) {
        return Err(AppError::Format(format!(
            "Field line '{}' has an invalid name '{}'",
            line, name
        )));
    }

    let unit = match comment {
        Some(comment) => parse_unit(line, comment)?,
        None => None,
    };

    Ok(Some(PortField {
        name: name.to_string(),
        c_type: c_type.to_string(),
        unit,
    }))
}

/// Extracts the unit from a trailing comment.
///
/// A bracketed group wins and must normalize to an identifier fragment. Without
/// brackets the whole comment is the unit when it normalizes to one, otherwise
/// it is a plain description and the field has no unit.
fn parse_unit(line: &str, comment: &str) -> AppResult<Option<String>> {
    let opens = comment.matches('[').count();
    let closes = comment.matches(']').count();

    if opens > 1 || closes > 1 {
        return Err(AppError::Format(format!(
            "Field line '{}' has more than one unit annotation",
            line
        )));
    }

    let raw = match (opens, closes) {
        (0, 0) => {
            let unit = normalize_unit(comment);
            if unit.is_empty() || is_unit_fragment(&unit) {
                return Ok((!unit.is_empty()).then_some(unit));
            }
            debug!(line, "comment is not a unit");
            return Ok(None);
        }
        (1, 1) => {
            let start = comment.find('[').unwrap_or(0);
            let end = comment.find(']').unwrap_or(0);
            if end < start {
                return Err(AppError::Format(format!(
                    "Field line '{}' has a malformed unit annotation",
                    line
                )));
            }
            &comment[start + 1..end]
        }
        _ => {
            return Err(AppError::Format(format!(
                "Field line '{}' has an unbalanced unit annotation",
                line
            )))
        }
    };

    let unit = normalize_unit(raw);
    if !unit.is_empty() && !is_unit_fragment(&unit) {
        return Err(AppError::Format(format!(
            "Field line '{}' has a unit '{}' that cannot be part of an identifier",
            line, raw
        )));
    }
    Ok((!unit.is_empty()).then_some(unit))
}

fn is_unit_fragment(unit: &str) -> bool {
    static UNIT_RE: OnceLock<Regex> = OnceLock::new();
    let unit_re = UNIT_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("Invalid regex"));
    unit_re.is_match(unit)
}

/// `"cm / s"` -> `"cm_per_s"`, `"deg C"` -> `"deg_C"`.
fn normalize_unit(raw: &str) -> String {
    raw.split('/')
        .map(|part| part.split_whitespace().collect::<Vec<_>>().join("_"))
        .collect::<Vec<_>>()
        .join("_per_")
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOVE_ACTION: &str = r#"
# Move the base
uint8 MODE_FAST=1
uint8 MODE_SLOW = 2
float64 speed # [cm / s]
int32 timeout_ms
geometry_msgs/Pose target
---
bool success
string message # human readable
---
float32 progress # [deg C]
"#;

    #[test]
    fn test_parse_three_sections() {
        let def = parse_action_definition("Move", MOVE_ACTION).unwrap();
        assert_eq!(def.action_name, "Move");
        assert_eq!(
            def.goal,
            vec![
                PortField {
                    name: "speed".into(),
                    c_type: "double".into(),
                    unit: Some("cm_per_s".into()),
                },
                PortField {
                    name: "timeout_ms".into(),
                    c_type: "int32_t".into(),
                    unit: None,
                },
            ]
        );
        assert_eq!(def.result.len(), 2);
        assert_eq!(def.result[1].unit.as_deref(), Some("human_readable"));
        assert_eq!(def.feedback[0].unit.as_deref(), Some("deg_C"));
    }

    #[test]
    fn test_wrong_section_count() {
        let one_sep = "int32 a\n---\nint32 b\n";
        let three_sep = "int32 a\n---\nint32 b\n---\n---\nint32 c\n";
        for text in [one_sep, three_sep] {
            let err = parse_action_definition("X", text).unwrap_err();
            assert!(matches!(err, AppError::Format(_)));
        }
    }

    #[test]
    fn test_constant_is_dropped() {
        let def = parse_action_definition("X", "uint8 CONST_NAME\n---\n---\n").unwrap();
        assert!(def.goal.is_empty());
    }

    #[test]
    fn test_unit_without_brackets() {
        let def = parse_action_definition("X", "float64 speed # cm / s\n---\n---\n").unwrap();
        assert_eq!(def.goal[0].c_type, "double");
        assert_eq!(def.goal[0].unit.as_deref(), Some("cm_per_s"));
        assert_eq!(def.goal[0].arg_name(), "speed__cm_per_s");
    }

    #[test]
    fn test_bracketed_symbol_unit_is_fatal() {
        let err = parse_action_definition("X", "float64 ratio # [%]\n---\n---\n").unwrap_err();
        assert!(matches!(err, AppError::Format(_)));
    }

    #[test]
    fn test_prose_comment_is_not_a_unit() {
        let text = "int32 timeout # Maximum wait, in seconds.\n---\n---\n";
        let def = parse_action_definition("X", text).unwrap();
        assert_eq!(def.goal[0].unit, None);
        assert_eq!(def.goal[0].arg_name(), "timeout");
    }

    #[test]
    fn test_extra_tokens_are_fatal() {
        let err = parse_action_definition("X", "int32 count 5\n---\n---\n").unwrap_err();
        assert!(format!("{}", err).contains("must be '<type> <name>'"));
    }

    #[test]
    fn test_multiple_unit_groups_are_fatal() {
        for line in [
            "float64 d # [m] [s]",
            "float64 d # [[m]]",
            "float64 d # [m",
            "float64 d # m]",
        ] {
            let text = format!("{}\n---\n---\n", line);
            let err = parse_action_definition("X", &text).unwrap_err();
            assert!(matches!(err, AppError::Format(_)), "{}", line);
        }
    }

    #[test]
    fn test_unknown_and_array_types_are_skipped() {
        let def =
            parse_action_definition("X", "float64[] path\nPose goal\nbool ok\n---\n---\n").unwrap();
        assert_eq!(def.goal.len(), 1);
        assert_eq!(def.goal[0].name, "ok");
    }

    #[test]
    fn test_type_table() {
        assert_eq!(map_ros_type("byte"), Some("uint8_t"));
        assert_eq!(map_ros_type("wstring"), Some("std::u16string"));
        assert_eq!(map_ros_type("float32"), Some("float"));
        assert_eq!(map_ros_type("Pose"), None);
    }
}
