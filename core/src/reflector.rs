//! # Port Reflector
//!
//! Recovers class and port metadata from an existing plugin header, whether it
//! was generated or written by hand. The result is the ground truth used for
//! registration and for the node model.

use crate::error::{AppError, AppResult};
use crate::scanner::{find_matching, split_top_level, Delim};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// An input port with its declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedPort {
    /// Port name as exposed to the tree.
    pub name: String,
    /// Declared C++ type.
    pub c_type: String,
}

/// An input port that can be bound through a constructor default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultPort {
    /// Port name as exposed to the tree.
    pub name: String,
    /// Payload type of the `std::optional<T>` parameter.
    pub c_type: String,
    /// Identifier bound by the constructor parameter.
    pub c_name: String,
}

/// An output port (name only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPort {
    /// Port name as exposed to the tree.
    pub name: String,
}

/// Metadata read back from a plugin header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReflectedPluginInfo {
    /// The plugin's C++ class name.
    pub class_name: String,
    /// Input ports always resolved from the blackboard.
    pub non_default_input_ports: Vec<TypedPort>,
    /// Input ports with a constructor default.
    pub default_input_ports: Vec<DefaultPort>,
    /// Output ports.
    pub output_ports: Vec<OutputPort>,
}

impl ReflectedPluginInfo {
    /// True when the plugin declares no ports at all.
    pub fn has_no_ports(&self) -> bool {
        self.non_default_input_ports.is_empty()
            && self.default_input_ports.is_empty()
            && self.output_ports.is_empty()
    }
}

/// Reads port metadata from a plugin header.
///
/// A header without a `providedBasicPorts` region yields an info with no ports.
///
/// # Errors
///
/// `AppError::InvalidPlugin` when no `class <Name> :` declaration exists.
pub fn reflect_plugin(source: &str) -> AppResult<ReflectedPluginInfo> {
    static CLASS_RE: OnceLock<Regex> = OnceLock::new();
    let class_re =
        CLASS_RE.get_or_init(|| Regex::new(r"\bclass\s+(\w+)\s*:").expect("Invalid regex"));

    let class_name = class_re
        .captures(source)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| AppError::InvalidPlugin("no 'class <Name> :' declaration found".into()))?;

    let Some(ports_region) = provided_ports_region(source) else {
        debug!(class = %class_name, "no providedBasicPorts region");
        return Ok(ReflectedPluginInfo {
            class_name,
            ..Default::default()
        });
    };

    let mut default_input_ports = constructor_defaults(source, &class_name);
    let mut non_default_input_ports = Vec::new();
    let mut output_ports = Vec::new();

    for port in declared_ports(ports_region) {
        match port.kind {
            PortKind::Input => {
                if let Some(slot) = match_default(&default_input_ports, &port.name) {
                    default_input_ports[slot].name = port.name;
                } else {
                    non_default_input_ports.push(TypedPort {
                        name: port.name,
                        c_type: port.c_type,
                    });
                }
            }
            PortKind::Output => output_ports.push(OutputPort { name: port.name }),
        }
    }

    Ok(ReflectedPluginInfo {
        class_name,
        non_default_input_ports,
        default_input_ports,
        output_ports,
    })
}

/// Picks the default port an input port belongs to.
///
/// An exact identifier match wins; otherwise the first bound identifier that
/// contains the port name is used. The containment fallback can pair ports whose
/// names are prefixes of one another.
fn match_default(defaults: &[DefaultPort], port_name: &str) -> Option<usize> {
    defaults
        .iter()
        .position(|d| d.c_name == port_name)
        .or_else(|| defaults.iter().position(|d| d.c_name.contains(port_name)))
}

/// Body of the block following `providedBasicPorts`.
fn provided_ports_region(source: &str) -> Option<&str> {
    let at = source.find("providedBasicPorts")?;
    let open = at + source[at..].find('{')?;
    let close = find_matching(source, open, Delim::Brace)?;
    Some(&source[open + 1..close])
}

/// Default parameters (`std::optional<T> id = ...`) of the class constructor.
fn constructor_defaults(source: &str, class_name: &str) -> Vec<DefaultPort> {
    static DEFAULT_RE: OnceLock<Regex> = OnceLock::new();
    let default_re = DEFAULT_RE
        .get_or_init(|| Regex::new(r"^[\w\s:]*<([^<>]*)>\s*(\w+)\s*=").expect("Invalid regex"));

    let Ok(ctor_re) = Regex::new(&format!(r"\b{}\s*\(", regex::escape(class_name))) else {
        return Vec::new();
    };
    let Some(open) = ctor_re.find(source).map(|m| m.end() - 1) else {
        return Vec::new();
    };
    let Some(close) = find_matching(source, open, Delim::Paren) else {
        return Vec::new();
    };

    split_top_level(&source[open + 1..close], ',')
        .into_iter()
        .filter(|param| param.contains('='))
        .filter_map(|param| {
            let caps = default_re.captures(param)?;
            let c_name = caps[2].to_string();
            Some(DefaultPort {
                name: c_name.clone(),
                c_type: caps[1].trim().to_string(),
                c_name,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortKind {
    Input,
    Output,
}

#[derive(Debug)]
struct DeclaredPort {
    kind: PortKind,
    c_type: String,
    name: String,
}

/// Every `InputPort<T>(name)` / `OutputPort<T>(name)` in declaration order.
fn declared_ports(region: &str) -> Vec<DeclaredPort> {
    static PORT_RE: OnceLock<Regex> = OnceLock::new();
    let port_re =
        PORT_RE.get_or_init(|| Regex::new(r"\b(Input|Output)Port\s*<").expect("Invalid regex"));
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    let name_re =
        NAME_RE.get_or_init(|| Regex::new(r#"^\s*\(\s*"?(\w+)"?"#).expect("Invalid regex"));

    let mut ports = Vec::new();
    for caps in port_re.captures_iter(region) {
        let whole = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let open = whole - 1;
        let Some(close) = find_matching(region, open, Delim::Angle) else {
            continue;
        };
        let Some(name) = name_re.captures(&region[close + 1..]) else {
            continue;
        };
        let kind = if &caps[1] == "Input" {
            PortKind::Input
        } else {
            PortKind::Output
        };
        ports.push(DeclaredPort {
            kind,
            c_type: region[open + 1..close].trim().to_string(),
            name: name[1].to_string(),
        });
    }
    ports
}
