#![deny(missing_docs)]

//! # BT Command
//!
//! Reflects every plugin header and projects the result onto the host source
//! (factory registrations) and the design-tool project file (node model).
//!
//! 1. **Reflect**: every `*.h` / `*.hpp` in the plugin directory, in file name order.
//! 2. **Register**: plain actions, then the named actions of the host's list.
//! 3. **Model**: plain and named metadata merged into `<TreeNodesModel>`.

use crate::files;
use bt_gen_core::registration::{sync_action_area, sync_named_action_area};
use bt_gen_core::{
    collect_entries, parse_named_actions, reflect_plugin, sync_node_model, AppError, AppResult,
    GeneratorConfig, ReflectedPluginInfo,
};
use std::path::Path;
use tracing::{error, info};

/// Arguments for the bt command.
#[derive(clap::Args, Debug, Clone)]
pub struct BtArgs {
    /// Report which files would change without writing them.
    #[clap(long)]
    pub dry_run: bool,

    /// Only update the host registrations.
    #[clap(long)]
    pub skip_node_model: bool,
}

/// Executes the registration and node-model sync.
pub fn execute(args: &BtArgs, config: &GeneratorConfig) -> AppResult<()> {
    let plugin_dir = config.plugin_dir();
    let plugins = reflect_all(&plugin_dir)?;
    let portless = plugins.iter().filter(|p| p.has_no_ports()).count();
    info!(
        count = plugins.len(),
        portless,
        dir = %plugin_dir.display(),
        "reflected plugins"
    );

    let host_path = config.host_source_path();
    let host = files::read(&host_path)?;
    let host = sync_action_area(&host, &plugins)?;
    let bindings = parse_named_actions(&host)?;
    let (host, named) = sync_named_action_area(&host, &bindings)?;
    let host_changed = files::write_if_changed(&host_path, &host, args.dry_run)?;

    if args.skip_node_model {
        println!(
            "Registrations: {} plugins, {} named actions, host {}.",
            plugins.len(),
            named.len(),
            if host_changed { "updated" } else { "unchanged" }
        );
        return Ok(());
    }

    let project_path = config.btproj_path();
    let project = files::read(&project_path)?;
    let entries = collect_entries(&plugins, &named);
    let project = sync_node_model(&project, &entries)?;
    let project_changed = files::write_if_changed(&project_path, &project, args.dry_run)?;

    println!(
        "Registrations: {} plugins, {} named actions, host {}, node model {}.",
        plugins.len(),
        named.len(),
        if host_changed { "updated" } else { "unchanged" },
        if project_changed { "updated" } else { "unchanged" }
    );
    Ok(())
}

/// Reflects every header of `plugin_dir`. A header without a plugin class aborts the run.
fn reflect_all(plugin_dir: &Path) -> AppResult<Vec<ReflectedPluginInfo>> {
    if !plugin_dir.is_dir() {
        return Err(AppError::Config(format!(
            "Plugin directory not found: {:?}",
            plugin_dir
        )));
    }

    files::collect(plugin_dir, &["h", "hpp"], 1)
        .iter()
        .map(|path| {
            let source = files::read(path)?;
            reflect_plugin(&source).map_err(|e| {
                error!(file = %path.display(), "{}", e);
                e
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const HOST: &str = r#"int main() {
  BT::BehaviorTreeFactory factory;
  BT::RosNodeParams params;
  // auto generate action area start
  // auto generate action area end
  // auto generate named action area start
  // auto generate named action area end
}
/* named action list
[Beta]
instance_name, gain
Hot, 2
*/
"#;

    const PROJECT: &str = "<root>\n  <TreeNodesModel/>\n</root>\n";

    fn header(class: &str, port: &str) -> String {
        format!(
            "class {0} : public BT::RosActionNode<x::action::Y> {{\npublic:\n  {0}(const std::string& n, const BT::NodeConfig& c, const BT::RosNodeParams& p) : BT::RosActionNode<x::action::Y>(n, c, p) {{}}\n  static BT::PortsList providedPorts() {{ return providedBasicPorts({{BT::InputPort<int32_t>(\"{1}\")}}); }}\n}};\n",
            class, port
        )
    }

    fn setup() -> (tempfile::TempDir, GeneratorConfig) {
        let dir = tempfile::tempdir().unwrap();
        let plugins = dir.path().join("plugins");
        fs::create_dir_all(&plugins).unwrap();
        fs::write(plugins.join("beta.h"), header("Beta", "level")).unwrap();
        fs::write(plugins.join("alpha.hpp"), header("Alpha", "count")).unwrap();
        fs::write(plugins.join("notes.txt"), "class Ignored : x {};").unwrap();
        fs::write(dir.path().join("main.cpp"), HOST).unwrap();
        fs::write(dir.path().join("tree.btproj"), PROJECT).unwrap();

        let path = |name: &str| dir.path().join(name).to_string_lossy().into_owned();
        let config = GeneratorConfig {
            bt_plugin_save_path: path("plugins"),
            ros2_bt_source_abs_path: path("main.cpp"),
            btproj_abs_path: path("tree.btproj"),
            ..Default::default()
        };
        (dir, config)
    }

    #[test]
    fn test_registers_and_models_all_plugins() {
        let (dir, config) = setup();
        let args = BtArgs {
            dry_run: false,
            skip_node_model: false,
        };
        execute(&args, &config).unwrap();

        let host = fs::read_to_string(dir.path().join("main.cpp")).unwrap();
        assert!(host.contains(
            "  factory.registerNodeType<Alpha>(\"Alpha\", params);\n  factory.registerNodeType<Beta>(\"Beta\", params);\n  // auto generate action area end"
        ));
        assert!(host.contains("  factory.registerNodeType<Beta>(\"HotBeta\", params, 2);\n"));
        assert!(!host.contains("Ignored"));

        let project = fs::read_to_string(dir.path().join("tree.btproj")).unwrap();
        assert!(project.contains("<Action ID=\"Alpha\" editable=\"true\">"));
        assert!(project.contains("<Action ID=\"HotBeta\" editable=\"true\">"));
        assert!(project.contains("<input_port name=\"count\" default=\"0\"/>"));

        execute(&args, &config).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("main.cpp")).unwrap(), host);
        assert_eq!(fs::read_to_string(dir.path().join("tree.btproj")).unwrap(), project);
    }

    #[test]
    fn test_portless_plugin_is_still_modeled() {
        let (dir, config) = setup();
        fs::write(
            dir.path().join("plugins/idle.h"),
            "class Idle : public BT::RosActionNode<x::action::Z> {\n};\n",
        )
        .unwrap();
        let plugins = reflect_all(&config.plugin_dir()).unwrap();
        let portless: Vec<_> = plugins.iter().filter(|p| p.has_no_ports()).collect();
        assert_eq!(portless.len(), 1);
        assert_eq!(portless[0].class_name, "Idle");

        let args = BtArgs {
            dry_run: false,
            skip_node_model: false,
        };
        execute(&args, &config).unwrap();
        let project = fs::read_to_string(dir.path().join("tree.btproj")).unwrap();
        assert!(project.contains("<Action ID=\"Idle\" editable=\"true\">"));
    }

    #[test]
    fn test_invalid_plugin_aborts() {
        let (dir, config) = setup();
        fs::write(dir.path().join("plugins/util.h"), "inline int helper() { return 1; }").unwrap();
        let args = BtArgs {
            dry_run: false,
            skip_node_model: false,
        };
        let err = execute(&args, &config).unwrap_err();
        assert!(matches!(err, AppError::InvalidPlugin(_)));
        assert_eq!(fs::read_to_string(dir.path().join("main.cpp")).unwrap(), HOST);
    }

    #[test]
    fn test_missing_plugin_dir() {
        let (_dir, mut config) = setup();
        config.bt_plugin_save_path = "/nonexistent/bt/plugins".into();
        let args = BtArgs {
            dry_run: true,
            skip_node_model: true,
        };
        assert!(matches!(execute(&args, &config), Err(AppError::Config(_))));
    }
}
