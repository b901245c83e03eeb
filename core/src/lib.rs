#![deny(missing_docs)]

//! # BT Gen Core
//!
//! Core library for generating and synchronizing BehaviorTree.CPP action plugins
//! from ROS 2 `.action` definitions.

/// Shared error types.
pub mod error;

/// Identifier case conversion.
pub mod case;

/// Generator configuration.
pub mod config;

/// `.action` definition parsing.
pub mod definition;

/// Delimiter-aware text scanning.
pub mod scanner;

/// Anchored source rewriting.
pub mod editor;

/// Plugin file and class naming.
pub mod naming;

/// Plugin header rendering.
pub mod plugin;

/// Port metadata reflection.
pub mod reflector;

/// Host registration areas.
pub mod registration;

/// Design-tool node model synchronization.
pub mod node_model;

pub use case::{format_case, CaseStyle};
pub use config::{DefaultArgMatcher, GeneratorConfig};
pub use definition::{parse_action_definition, ActionDefinition, PortField};
pub use error::{AppError, AppResult};
pub use node_model::{collect_entries, sync_node_model, NodeModelEntry};
pub use plugin::{render_plugin, GeneratedActionSpec, RenderContext, DEFAULT_TEMPLATE};
pub use reflector::{reflect_plugin, ReflectedPluginInfo};
pub use registration::{
    parse_named_actions, sync_action_area, sync_named_action_area, NamedActionBinding,
    NamedActionRegistration,
};
