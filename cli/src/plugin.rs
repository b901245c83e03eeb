#![deny(missing_docs)]

//! # Plugin Command
//!
//! Generates one BehaviorTree.CPP plugin header per `.action` file of the
//! configured ROS 2 package. Existing headers are refreshed in place, so code
//! outside the generated regions survives.

use crate::files;
use bt_gen_core::naming::package_name;
use bt_gen_core::{
    parse_action_definition, render_plugin, AppError, AppResult, DefaultArgMatcher,
    GeneratedActionSpec, GeneratorConfig, RenderContext, DEFAULT_TEMPLATE,
};
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

/// Arguments for the plugin command.
#[derive(clap::Args, Debug, Clone)]
pub struct PluginArgs {
    /// Report which headers would change without writing them.
    #[clap(long)]
    pub dry_run: bool,
}

/// Shared state for one run.
struct Generator<'a> {
    config: &'a GeneratorConfig,
    matcher: DefaultArgMatcher,
    template: String,
    ctx: RenderContext,
    dry_run: bool,
}

/// Executes the plugin generation.
///
/// A malformed `.action` file is reported and skipped; the run still fails at the
/// end so that the caller sees a non-zero exit status.
pub fn execute(args: &PluginArgs, config: &GeneratorConfig) -> AppResult<()> {
    let package_dir = config.package_dir();
    let package = package_name(&package_dir).ok_or_else(|| {
        AppError::Config(format!("Cannot derive a package name from {:?}", package_dir))
    })?;

    let plugin_dir = config.plugin_dir();
    if !args.dry_run {
        fs::create_dir_all(&plugin_dir)?;
    }

    let template = match config.template_path() {
        Some(path) => files::read(&path)?,
        None => DEFAULT_TEMPLATE.to_string(),
    };

    let generator = Generator {
        config,
        matcher: config.default_arg_matcher()?,
        template,
        ctx: RenderContext {
            package_name: package.clone(),
            include_guard_prefix: config.bt_plugin_cpp_include_guard_prefix.clone(),
        },
        dry_run: args.dry_run,
    };

    let definitions = files::collect(&package_dir, &["action"], usize::MAX);
    if definitions.is_empty() {
        warn!(dir = %package_dir.display(), "no .action files found");
    }

    let mut written = 0;
    let mut failed = 0;
    for path in &definitions {
        match generator.generate(path, &plugin_dir) {
            Ok(true) => written += 1,
            Ok(false) => {}
            Err(AppError::Format(msg)) => {
                error!(file = %path.display(), "{}", msg);
                failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        package = %package,
        total = definitions.len(),
        written,
        failed,
        "plugin generation finished"
    );

    println!(
        "Plugins: {} definitions, {} updated, {} failed.",
        definitions.len(),
        written,
        failed
    );

    if failed > 0 {
        return Err(AppError::General(format!(
            "{} of {} action files could not be parsed",
            failed,
            definitions.len()
        )));
    }
    Ok(())
}

impl Generator<'_> {
    /// Renders one plugin. Returns whether the header changed.
    fn generate(&self, definition_path: &Path, plugin_dir: &Path) -> AppResult<bool> {
        let action_name = definition_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::General(format!("No file stem in {:?}", definition_path)))?;

        let text = files::read(definition_path)?;
        let definition = parse_action_definition(&action_name, &text)?;
        let spec = GeneratedActionSpec::from_definition(
            &definition,
            &self.ctx.package_name,
            self.config,
            &self.matcher,
        )?;

        let target = plugin_dir.join(&spec.plugin_file_name);
        let source = if target.exists() {
            files::read(&target)?
        } else {
            info!(file = %target.display(), "creating from template");
            self.template.clone()
        };

        let rendered = render_plugin(&source, &spec, &self.ctx)?;
        files::write_if_changed(&target, &rendered, self.dry_run)
    }
}
