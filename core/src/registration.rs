//! # Registration Synchronizer
//!
//! Keeps the factory registrations of the host source in sync with the plugins.
//!
//! The host source must declare one `BT::BehaviorTreeFactory` and one
//! `BT::RosNodeParams` instance and contain two marked areas:
//!
//! ```text
//! // auto generate action area start
//! // auto generate action area end
//! // auto generate named action area start
//! // auto generate named action area end
//! ```
//!
//! Each area is an append log: missing registrations are appended before the end
//! marker, existing statements are never touched. Named actions are read from a
//! `/* named action list ... */` block holding `[ClassA, ClassB]` headed CSV tables.

use crate::error::{AppError, AppResult};
use crate::reflector::ReflectedPluginInfo;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Start marker of the plain action area.
pub const ACTION_AREA_START: &str = "// auto generate action area start";
/// End marker of the plain action area.
pub const ACTION_AREA_END: &str = "// auto generate action area end";
/// Start marker of the named action area.
pub const NAMED_ACTION_AREA_START: &str = "// auto generate named action area start";
/// End marker of the named action area.
pub const NAMED_ACTION_AREA_END: &str = "// auto generate named action area end";
/// Opening of the named action table block.
pub const NAMED_ACTION_LIST_START: &str = "/* named action list";

/// Column every named action table must carry.
pub const INSTANCE_NAME_COLUMN: &str = "instance_name";

/// Instance names found in the host source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDeclarations {
    /// Variable holding the `BT::BehaviorTreeFactory`.
    pub factory: String,
    /// Variable holding the `BT::RosNodeParams`.
    pub node_params: String,
}

/// One extra constructor argument of a named action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedArg {
    /// Column header.
    pub name: String,
    /// Literal forwarded to the constructor.
    pub value: String,
}

/// One row of a named action table, bound to every class of its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedActionBinding {
    /// Classes listed in the table's `[...]` header.
    pub class_names: Vec<String>,
    /// Prefix of the registered node IDs.
    pub instance_name: String,
    /// Remaining columns, in header order.
    pub args: Vec<NamedArg>,
}

/// A concrete named registration: `instance_name + class_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedActionRegistration {
    /// The plugin class being instantiated.
    pub class_name: String,
    /// The instance prefix.
    pub instance_name: String,
}

impl NamedActionRegistration {
    /// The node ID under which the class is registered.
    pub fn node_id(&self) -> String {
        format!("{}{}", self.instance_name, self.class_name)
    }
}

/// Finds the factory and node-params instances.
///
/// # Errors
///
/// `AppError::MissingDeclaration` when either declaration is absent.
pub fn find_declarations(doc: &str) -> AppResult<HostDeclarations> {
    static FACTORY_RE: OnceLock<Regex> = OnceLock::new();
    let factory_re = FACTORY_RE
        .get_or_init(|| Regex::new(r"BT::BehaviorTreeFactory\s+(\w+)\s*;").expect("Invalid regex"));
    static PARAMS_RE: OnceLock<Regex> = OnceLock::new();
    let params_re = PARAMS_RE
        .get_or_init(|| Regex::new(r"BT::RosNodeParams\s+(\w+)\s*;").expect("Invalid regex"));

    let factory = factory_re
        .captures(doc)
        .map(|c| c[1].to_string())
        .ok_or_else(|| {
            AppError::MissingDeclaration("no 'BT::BehaviorTreeFactory <name>;' declaration".into())
        })?;
    let node_params = params_re
        .captures(doc)
        .map(|c| c[1].to_string())
        .ok_or_else(|| {
            AppError::MissingDeclaration("no 'BT::RosNodeParams <name>;' declaration".into())
        })?;

    Ok(HostDeclarations {
        factory,
        node_params,
    })
}

/// Interior of a marked area, as a byte range.
fn find_area(doc: &str, start_marker: &str, end_marker: &str) -> AppResult<(usize, usize)> {
    let start = doc
        .find(start_marker)
        .map(|i| i + start_marker.len())
        .ok_or_else(|| AppError::MissingRegion(format!("marker '{}' not found", start_marker)))?;
    let end = doc[start..]
        .find(end_marker)
        .map(|i| start + i)
        .ok_or_else(|| AppError::MissingRegion(format!("marker '{}' not found", end_marker)))?;
    Ok((start, end))
}

/// Node IDs (and template classes) already registered in `text`.
fn registered_ids(text: &str) -> HashSet<String> {
    static REGISTER_RE: OnceLock<Regex> = OnceLock::new();
    let register_re = REGISTER_RE.get_or_init(|| {
        Regex::new(r#"registerNodeType\s*<\s*([\w:]+)\s*>\s*\(\s*"(\w+)""#).expect("Invalid regex")
    });
    register_re
        .captures_iter(text)
        .map(|c| c[2].to_string())
        .collect()
}

/// Appends `statements` to the area interior `(start, end)` of `doc`.
///
/// Statements go after the last line break of the interior, indented like the end marker.
fn append_to_area(doc: &str, (start, end): (usize, usize), statements: &[String]) -> String {
    if statements.is_empty() {
        return doc.to_string();
    }
    let interior = &doc[start..end];
    let (insert_at, indent, lead) = match interior.rfind('\n') {
        Some(nl) => {
            let indent = &interior[nl + 1..];
            let indent = if indent.trim().is_empty() && !indent.is_empty() {
                indent
            } else {
                "  "
            };
            (start + nl + 1, indent, "")
        }
        None => (end, "  ", "\n"),
    };

    let mut block = String::from(lead);
    for stmt in statements {
        block.push_str(indent);
        block.push_str(stmt);
        block.push('\n');
    }

    let mut out = String::with_capacity(doc.len() + block.len());
    out.push_str(&doc[..insert_at]);
    out.push_str(&block);
    out.push_str(&doc[insert_at..]);
    out
}

/// Registers every plugin class not yet present in the action area.
pub fn sync_action_area(doc: &str, plugins: &[ReflectedPluginInfo]) -> AppResult<String> {
    let decl = find_declarations(doc)?;
    let area = find_area(doc, ACTION_AREA_START, ACTION_AREA_END)?;
    let mut registered = registered_ids(&doc[area.0..area.1]);

    let mut statements = Vec::new();
    for plugin in plugins {
        if !registered.insert(plugin.class_name.clone()) {
            debug!(class = %plugin.class_name, "already registered");
            continue;
        }
        info!(class = %plugin.class_name, "registering action");
        statements.push(format!(
            "{0}.registerNodeType<{1}>(\"{1}\", {2});",
            decl.factory, plugin.class_name, decl.node_params
        ));
    }

    Ok(append_to_area(doc, area, &statements))
}

/// Reads every binding of the `/* named action list ... */` block.
///
/// # Errors
///
/// `AppError::MissingRegion` when the block is absent, `AppError::Format` when a
/// table lacks the `instance_name` column or a row is malformed.
pub fn parse_named_actions(doc: &str) -> AppResult<Vec<NamedActionBinding>> {
    let start = doc
        .find(NAMED_ACTION_LIST_START)
        .map(|i| i + NAMED_ACTION_LIST_START.len())
        .ok_or_else(|| {
            AppError::MissingRegion(format!("'{}' block not found", NAMED_ACTION_LIST_START))
        })?;
    let end = doc[start..]
        .find("*/")
        .map(|i| start + i)
        .ok_or_else(|| AppError::MissingRegion("named action list is not closed".into()))?;

    let mut bindings = Vec::new();
    for (class_names, table) in split_tables(&doc[start..end]) {
        bindings.extend(parse_table(&class_names, table)?);
    }
    Ok(bindings)
}

/// Splits the list into `([classes], csv text)` pairs.
fn split_tables(list: &str) -> Vec<(Vec<String>, &str)> {
    static HEADER_RE: OnceLock<Regex> = OnceLock::new();
    let header_re =
        HEADER_RE.get_or_init(|| Regex::new(r"\[([\w,\s]+?)\]").expect("Invalid regex"));

    let headers: Vec<_> = header_re.captures_iter(list).collect();
    headers
        .iter()
        .enumerate()
        .map(|(i, caps)| {
            let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
            let table_end = headers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map(|m| m.start())
                .unwrap_or(list.len());
            let class_names = caps[1]
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            (class_names, &list[whole.1..table_end])
        })
        .collect()
}

fn parse_table(class_names: &[String], table: &str) -> AppResult<Vec<NamedActionBinding>> {
    let label = class_names.join(", ");
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(table.trim().as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::Format(format!("named action table [{}]: {}", label, e)))?
        .clone();
    let instance_col = headers
        .iter()
        .position(|h| h == INSTANCE_NAME_COLUMN)
        .ok_or_else(|| {
            AppError::Format(format!(
                "named action table [{}] has no '{}' column",
                label, INSTANCE_NAME_COLUMN
            ))
        })?;

    let mut bindings = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row.map_err(|e| {
            AppError::Format(format!("named action table [{}] row {}: {}", label, idx + 1, e))
        })?;
        let instance_name = row.get(instance_col).unwrap_or_default().to_string();
        let args = headers
            .iter()
            .zip(row.iter())
            .enumerate()
            .filter(|(col, _)| *col != instance_col)
            .map(|(_, (name, value))| NamedArg {
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect();
        bindings.push(NamedActionBinding {
            class_names: class_names.to_vec(),
            instance_name,
            args,
        });
    }
    Ok(bindings)
}

/// Registers every `(instance, class)` pair not yet present in the named area.
///
/// Returns the updated document and every pair of `bindings` (registered now or
/// earlier) so that the node model can carry all of them.
pub fn sync_named_action_area(
    doc: &str,
    bindings: &[NamedActionBinding],
) -> AppResult<(String, Vec<NamedActionRegistration>)> {
    let decl = find_declarations(doc)?;
    let area = find_area(doc, NAMED_ACTION_AREA_START, NAMED_ACTION_AREA_END)?;
    let mut registered = registered_ids(&doc[area.0..area.1]);

    let mut statements = Vec::new();
    let mut pairs = Vec::new();
    for binding in bindings {
        for class_name in &binding.class_names {
            let pair = NamedActionRegistration {
                class_name: class_name.clone(),
                instance_name: binding.instance_name.clone(),
            };
            let node_id = pair.node_id();
            if registered.insert(node_id.clone()) {
                info!(node_id = %node_id, "registering named action");
                let mut stmt = format!(
                    "{}.registerNodeType<{}>(\"{}\", {}",
                    decl.factory, class_name, node_id, decl.node_params
                );
                for arg in &binding.args {
                    stmt.push_str(", ");
                    stmt.push_str(&arg.value);
                }
                stmt.push_str(");");
                statements.push(stmt);
            }
            pairs.push(pair);
        }
    }

    Ok((append_to_area(doc, area, &statements), pairs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HOST: &str = r#"int main() {
  BT::BehaviorTreeFactory factory;
  BT::RosNodeParams params;

  // auto generate action area start
  factory.registerNodeType<Manual>("Manual", params);
  // auto generate action area end

  // auto generate named action area start
  // auto generate named action area end
}

/* named action list
[A, B]
instance_name, speed
Foo, 5
*/
"#;

    fn plugin(name: &str) -> ReflectedPluginInfo {
        ReflectedPluginInfo {
            class_name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_declarations() {
        let decl = find_declarations(HOST).unwrap();
        assert_eq!(decl.factory, "factory");
        assert_eq!(decl.node_params, "params");
    }

    #[test]
    fn test_missing_declaration_is_fatal() {
        let err = find_declarations("BT::RosNodeParams p;").unwrap_err();
        assert!(matches!(err, AppError::MissingDeclaration(_)));
        let err = sync_action_area("BT::BehaviorTreeFactory f;", &[]).unwrap_err();
        assert!(matches!(err, AppError::MissingDeclaration(_)));
    }

    #[test]
    fn test_action_area_appends_missing_only() {
        let plugins = [plugin("Manual"), plugin("Dock"), plugin("Dock")];
        let out = sync_action_area(HOST, &plugins).unwrap();
        assert!(out.contains(
            "  factory.registerNodeType<Manual>(\"Manual\", params);\n  factory.registerNodeType<Dock>(\"Dock\", params);\n  // auto generate action area end"
        ));
        assert_eq!(out.matches("registerNodeType<Dock>").count(), 1);
        assert_eq!(sync_action_area(&out, &[plugin("Dock")]).unwrap(), out);
    }

    #[test]
    fn test_named_action_expansion() {
        let bindings = parse_named_actions(HOST).unwrap();
        assert_eq!(
            bindings,
            vec![NamedActionBinding {
                class_names: vec!["A".into(), "B".into()],
                instance_name: "Foo".into(),
                args: vec![NamedArg {
                    name: "speed".into(),
                    value: "5".into(),
                }],
            }]
        );

        let (out, pairs) = sync_named_action_area(HOST, &bindings).unwrap();
        assert!(out.contains("  factory.registerNodeType<A>(\"FooA\", params, 5);\n"));
        assert!(out.contains("  factory.registerNodeType<B>(\"FooB\", params, 5);\n"));
        let ids: Vec<_> = pairs.iter().map(|p| p.node_id()).collect();
        assert_eq!(ids, vec!["FooA", "FooB"]);

        let (again, pairs_again) = sync_named_action_area(&out, &bindings).unwrap();
        assert_eq!(again, out);
        assert_eq!(pairs_again, pairs);
    }

    #[test]
    fn test_multiple_tables() {
        let doc = "/* named action list\n[Dock]\ninstance_name,side,speed\nLeft,1,0.5\nRight,2,0.5\n\n[Lift, Drop]\nheight,instance_name\n3,High\n*/";
        let bindings = parse_named_actions(doc).unwrap();
        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings[1].instance_name, "Right");
        assert_eq!(bindings[1].args.len(), 2);
        assert_eq!(bindings[2].class_names, vec!["Lift", "Drop"]);
        assert_eq!(bindings[2].args[0].value, "3");
    }

    #[test]
    fn test_table_without_instance_name() {
        let doc = "/* named action list\n[A]\nname,speed\nX,1\n*/";
        let err = parse_named_actions(doc).unwrap_err();
        assert!(matches!(err, AppError::Format(_)));
    }

    #[test]
    fn test_missing_area_marker() {
        let doc = "BT::BehaviorTreeFactory f;\nBT::RosNodeParams p;\n";
        let err = sync_action_area(doc, &[plugin("X")]).unwrap_err();
        assert!(matches!(err, AppError::MissingRegion(_)));
    }
}
