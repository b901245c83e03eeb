//! # Plugin Rendering
//!
//! Turns an [`ActionDefinition`] into a BehaviorTree.CPP action plugin header by
//! filling the placeholders of a template and regenerating the anchored regions
//! with the [`crate::editor`] primitives. Rendering an already rendered file
//! with the same inputs yields the same text.

use crate::case::{format_case, CaseStyle};
use crate::config::{DefaultArgMatcher, GeneratorConfig};
use crate::definition::{ActionDefinition, PortField};
use crate::editor::{
    replace_block_after_keyword, rewrite_initializer_list, rewrite_parameter_list,
    rewrite_private_section,
};
use crate::error::AppResult;
use crate::naming::{include_guard_symbol, plugin_class_name, plugin_file_name};
use regex::Regex;
use std::sync::OnceLock;

/// The template used when no template path is configured.
pub const DEFAULT_TEMPLATE: &str = include_str!("../assets/bt_action_template.h");

/// Everything needed to render one plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedActionSpec {
    /// ROS 2 action name (`MoveBase`).
    pub action_name: String,
    /// Output file name (`nav_move_base.h`).
    pub plugin_file_name: String,
    /// Generated C++ class name (`NavMoveBase`).
    pub class_name: String,
    /// Goal fields exposed as input ports, in declaration order.
    pub input_ports: Vec<PortField>,
    /// Result fields exposed as output ports, in declaration order.
    pub output_ports: Vec<PortField>,
    /// Input ports resolved from a constructor default first.
    pub default_args: Vec<PortField>,
    /// Input ports always resolved from the blackboard.
    pub non_default_args: Vec<PortField>,
}

impl GeneratedActionSpec {
    /// Builds the spec from a parsed definition and the naming/exclusion settings.
    pub fn from_definition(
        def: &ActionDefinition,
        package_name: &str,
        config: &GeneratorConfig,
        matcher: &DefaultArgMatcher,
    ) -> AppResult<Self> {
        let ignored = |f: &&PortField| config.bt_action_ignore_arguments.contains(&f.name);

        let input_ports: Vec<PortField> =
            def.goal.iter().filter(|f| !ignored(f)).cloned().collect();
        let output_ports: Vec<PortField> =
            def.result.iter().filter(|f| !ignored(f)).cloned().collect();

        let (default_args, non_default_args): (Vec<_>, Vec<_>) = input_ports
            .iter()
            .cloned()
            .partition(|f| matcher.is_default(&f.name));

        Ok(Self {
            action_name: def.action_name.clone(),
            plugin_file_name: plugin_file_name(
                package_name,
                &def.action_name,
                &config.bt_plugin_file_name_exclude_words,
            )?,
            class_name: plugin_class_name(
                package_name,
                &def.action_name,
                &config.bt_action_name_exclude_words,
            )?,
            input_ports,
            output_ports,
            default_args,
            non_default_args,
        })
    }
}

/// Values substituted into the template placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    /// ROS 2 package providing the action.
    pub package_name: String,
    /// Prefix replacing `PATHTOFILE` in the include guard.
    pub include_guard_prefix: String,
}

/// Renders (or refreshes) a plugin header.
///
/// `source` is either the template text or the current content of the file.
pub fn render_plugin(
    source: &str,
    spec: &GeneratedActionSpec,
    ctx: &RenderContext,
) -> AppResult<String> {
    let mut doc = fill_placeholders(source, spec, ctx)?;

    doc = replace_block_after_keyword(&doc, "providedBasicPorts", &provided_ports_body(spec));

    let initializers: Vec<String> = spec
        .default_args
        .iter()
        .map(|p| format!("{0}_({0})", p.arg_name()))
        .collect();
    doc = rewrite_initializer_list(&doc, &spec.class_name, &initializers);

    let ctor_params: Vec<String> = spec
        .default_args
        .iter()
        .map(|p| format!("std::optional<{}> {} = std::nullopt", p.c_type, p.arg_name()))
        .collect();
    doc = rewrite_parameter_list(&doc, &spec.class_name, &ctor_params);

    doc = replace_block_after_keyword(&doc, "setGoal", &set_goal_body(spec));
    doc = replace_block_after_keyword(&doc, "onResultReceived", &on_result_body(spec));

    let members: Vec<String> = spec
        .default_args
        .iter()
        .map(|p| format!("std::optional<{}> {}_;", p.c_type, p.arg_name()))
        .collect();
    doc = rewrite_private_section(&doc, &spec.class_name, stale_member_patterns(), &members);

    Ok(doc)
}

fn stale_member_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![Regex::new(r"^std::optional<.*>\s+\w+_;$").expect("Invalid regex")]
    })
}

fn fill_placeholders(
    source: &str,
    spec: &GeneratedActionSpec,
    ctx: &RenderContext,
) -> AppResult<String> {
    let guard = include_guard_symbol(&spec.plugin_file_name)?;
    let action_snake = format_case(&spec.action_name, CaseStyle::LowerSnake)?;

    // Order matters: longer placeholders first so none is a prefix of a later one.
    Ok(source
        .replace("PATHTOFILE", &ctx.include_guard_prefix)
        .replace("ACTIONCLASSNAME_H", &guard)
        .replace("ActionClassName", &spec.class_name)
        .replace("action_package_name", &ctx.package_name)
        .replace("ActionName", &spec.action_name)
        .replace("action_name", &action_snake))
}

fn provided_ports_body(spec: &GeneratedActionSpec) -> String {
    let inputs = spec
        .input_ports
        .iter()
        .map(|p| format!("BT::InputPort<{}>(\"{}\")", p.c_type, p.arg_name()));
    let outputs = spec
        .output_ports
        .iter()
        .map(|p| format!("BT::OutputPort<{}>(\"{}\")", p.c_type, p.arg_name()));
    inputs.chain(outputs).collect::<Vec<_>>().join(", ")
}

fn set_goal_body(spec: &GeneratedActionSpec) -> String {
    let mut body = String::from("\n");

    for p in spec.default_args.iter().chain(&spec.non_default_args) {
        body.push_str(&format!("    {} {};\n", p.c_type, p.arg_name()));
    }
    body.push('\n');

    for p in &spec.default_args {
        let arg = p.arg_name();
        body.push_str(&format!("    if ({}_.has_value()) {{\n", arg));
        body.push_str(&format!("      {0} = {0}_.value();\n", arg));
        body.push_str("    } else {\n");
        body.push_str(&format!("      getInput<{}>(\"{}\", {});\n", p.c_type, arg, arg));
        body.push_str("    }\n");
    }
    for p in &spec.non_default_args {
        let arg = p.arg_name();
        body.push_str(&format!("    getInput<{}>(\"{}\", {});\n", p.c_type, arg, arg));
    }
    body.push('\n');

    for p in spec.default_args.iter().chain(&spec.non_default_args) {
        body.push_str(&format!("    goal.{} = {};\n", p.name, p.arg_name()));
    }
    body.push_str("    return true;\n  ");
    body
}

fn on_result_body(spec: &GeneratedActionSpec) -> String {
    let mut body = String::from("\n");
    for p in &spec.output_ports {
        body.push_str(&format!(
            "    setOutput<{}>(\"{}\", result.result->{});\n",
            p.c_type,
            p.arg_name(),
            p.name
        ));
    }
    body.push_str(
        "\n    if (result.code == rclcpp_action::ResultCode::SUCCEEDED) {\n      return BT::NodeStatus::SUCCESS;\n    } else {\n      return BT::NodeStatus::FAILURE;\n    }\n  ",
    );
    body
}
