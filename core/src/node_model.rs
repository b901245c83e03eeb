//! # Node Model Synchronizer
//!
//! Projects plugin port metadata onto the `<TreeNodesModel>` section of a
//! design-tool project file.
//!
//! Only the `<TreeNodesModel>` subtree is parsed and re-serialized (4-space
//! indentation, no blank lines, no XML declaration); all text outside it is kept
//! byte for byte. `Action` elements whose `ID` is not part of the metadata, and
//! any child other than `input_port`/`output_port`, are left as they are.
//! Attribute values and text are written back in their original escaped form.

use crate::error::{AppError, AppResult};
use crate::reflector::{OutputPort, ReflectedPluginInfo, TypedPort};
use crate::registration::NamedActionRegistration;
use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};
use std::borrow::Cow;
use std::io::Cursor;
use tracing::{info, warn};

const MODEL_TAG: &str = "TreeNodesModel";
const ACTION_TAG: &str = "Action";
const INPUT_TAG: &str = "input_port";
const OUTPUT_TAG: &str = "output_port";

/// Input port every ROS action node exposes.
pub const ACTION_NAME_PORT: &str = "action_name";
/// Default literal of output ports.
pub const OUTPUT_DEFAULT: &str = "{}";

/// Port metadata of one node type, keyed by its registered ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeModelEntry {
    /// `ID` attribute of the `Action` element.
    pub id: String,
    /// Ports that may come from a constructor default.
    pub default_inputs: Vec<TypedPort>,
    /// Ports always read from the blackboard.
    pub non_default_inputs: Vec<TypedPort>,
    /// Output ports.
    pub outputs: Vec<OutputPort>,
}

impl NodeModelEntry {
    /// Entry for a plain plugin registration.
    pub fn from_plugin(plugin: &ReflectedPluginInfo) -> Self {
        Self {
            id: plugin.class_name.clone(),
            default_inputs: plugin
                .default_input_ports
                .iter()
                .map(|p| TypedPort {
                    name: p.name.clone(),
                    c_type: p.c_type.clone(),
                })
                .collect(),
            non_default_inputs: plugin.non_default_input_ports.clone(),
            outputs: plugin.output_ports.clone(),
        }
    }

    /// Entry for a named registration. Default ports are baked into the
    /// registration, so only the blackboard inputs and the outputs are inherited.
    pub fn from_named(
        named: &NamedActionRegistration,
        plugins: &[ReflectedPluginInfo],
    ) -> Option<Self> {
        let base = plugins.iter().find(|p| p.class_name == named.class_name)?;
        Some(Self {
            id: named.node_id(),
            default_inputs: Vec::new(),
            non_default_inputs: base.non_default_input_ports.clone(),
            outputs: base.output_ports.clone(),
        })
    }

    /// `action_name` first, then default and non-default inputs, without duplicates.
    fn input_names(&self) -> Vec<&str> {
        let mut names = vec![ACTION_NAME_PORT];
        for port in self.default_inputs.iter().chain(&self.non_default_inputs) {
            if !names.contains(&port.name.as_str()) {
                names.push(port.name.as_str());
            }
        }
        names
    }

    fn input_default(&self, name: &str) -> &'static str {
        self.default_inputs
            .iter()
            .chain(&self.non_default_inputs)
            .find(|p| p.name == name)
            .map(|p| default_literal(&p.c_type))
            .unwrap_or("")
    }
}

/// Plain plugins first, then every named registration whose class is known.
pub fn collect_entries(
    plugins: &[ReflectedPluginInfo],
    named: &[NamedActionRegistration],
) -> Vec<NodeModelEntry> {
    let mut entries: Vec<NodeModelEntry> =
        plugins.iter().map(NodeModelEntry::from_plugin).collect();
    for reg in named {
        match NodeModelEntry::from_named(reg, plugins) {
            Some(entry) => entries.push(entry),
            None => warn!(
                node_id = %reg.node_id(),
                class = %reg.class_name,
                "named action refers to an unknown plugin class"
            ),
        }
    }
    entries
}

/// Default literal for a port of the given C++ type.
pub fn default_literal(c_type: &str) -> &'static str {
    match c_type.trim() {
        "bool" => "false",
        "int8_t" | "uint8_t" | "int16_t" | "uint16_t" | "int32_t" | "uint32_t" | "int64_t"
        | "uint64_t" | "float" | "double" | "char" | "unsigned" | "int" | "long" | "short"
        | "size_t" => "0",
        _ => "",
    }
}

/// Text, comment and CDATA content, exactly as read.
#[derive(Debug, Clone, PartialEq, Eq)]
enum XmlNode {
    Element(XmlElement),
    Text(String),
    Comment(String),
    CData(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct XmlAttr {
    key: String,
    /// Escaped form, written back unchanged.
    raw: String,
    /// Unescaped form, used for lookups.
    value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct XmlElement {
    name: String,
    attrs: Vec<XmlAttr>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    fn new(name: &str, attrs: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| XmlAttr {
                    key: k.to_string(),
                    raw: escape(*v).into_owned(),
                    value: v.to_string(),
                })
                .collect(),
            children: Vec::new(),
        }
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }

    fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    fn has_port(&self, tag: &str, name: &str) -> bool {
        self.child_elements()
            .any(|e| e.name == tag && e.attr("name") == Some(name))
    }
}

/// Merges `entries` into the `<TreeNodesModel>` section of `doc`.
///
/// # Errors
///
/// `AppError::MissingRegion` when the document has no `<TreeNodesModel>`
/// element, `AppError::Xml` when that element is not well-formed.
pub fn sync_node_model(doc: &str, entries: &[NodeModelEntry]) -> AppResult<String> {
    let (start, end) = find_model_span(doc)?;
    let mut model = parse_subtree(&doc[start..end])?;

    for entry in entries {
        merge_entry(&mut model, entry);
    }

    let base_indent = line_indent(doc, start);
    let rendered = write_subtree(&model, base_indent)?;

    let mut out = String::with_capacity(doc.len() + rendered.len());
    out.push_str(&doc[..start]);
    out.push_str(&rendered);
    out.push_str(&doc[end..]);
    Ok(out)
}

fn find_model_span(doc: &str) -> AppResult<(usize, usize)> {
    let open_tag = format!("<{}", MODEL_TAG);
    let missing = || AppError::MissingRegion(format!("<{}> element not found", MODEL_TAG));

    let start = doc
        .match_indices(&open_tag)
        .map(|(i, _)| i)
        .find(|&i| {
            doc[i + open_tag.len()..]
                .chars()
                .next()
                .is_some_and(|c| c == '>' || c == '/' || c.is_whitespace())
        })
        .ok_or_else(missing)?;

    let tag_end = start + doc[start..].find('>').ok_or_else(missing)?;
    if doc[..tag_end].ends_with('/') {
        return Ok((start, tag_end + 1));
    }

    let close_tag = format!("</{}>", MODEL_TAG);
    let close = doc[tag_end..]
        .find(&close_tag)
        .map(|i| tag_end + i + close_tag.len())
        .ok_or_else(missing)?;
    Ok((start, close))
}

/// Whitespace preceding `at` on its line, when nothing else precedes it.
fn line_indent(doc: &str, at: usize) -> &str {
    let line_start = doc[..at].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let prefix = &doc[line_start..at];
    if prefix.chars().all(char::is_whitespace) {
        prefix
    } else {
        ""
    }
}

fn xml_err(context: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Xml(format!("{}: {}", context, e))
}

fn element_from(e: &BytesStart<'_>) -> AppResult<XmlElement> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| xml_err("invalid attribute", err))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| xml_err("invalid attribute value", err))?
            .into_owned();
        // Values are written double-quoted.
        let raw = match String::from_utf8_lossy(&attr.value) {
            raw if raw.contains('"') => escape(value.as_str()).into_owned(),
            raw => raw.into_owned(),
        };
        attrs.push(XmlAttr { key, raw, value });
    }
    Ok(XmlElement {
        name,
        attrs,
        children: Vec::new(),
    })
}

fn parse_subtree(text: &str) -> AppResult<XmlElement> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    let attach = |stack: &mut Vec<XmlElement>, root: &mut Option<XmlElement>, node: XmlNode| {
        match (stack.last_mut(), node) {
            (Some(parent), node) => parent.children.push(node),
            (None, XmlNode::Element(e)) => *root = Some(e),
            (None, _) => {}
        }
    };

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(element_from(&e)?),
            Ok(Event::Empty(e)) => {
                let el = element_from(&e)?;
                attach(&mut stack, &mut root, XmlNode::Element(el));
            }
            Ok(Event::End(_)) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| AppError::Xml("unbalanced closing tag".into()))?;
                attach(&mut stack, &mut root, XmlNode::Element(el));
            }
            Ok(Event::Text(t)) => {
                t.unescape().map_err(|err| xml_err("invalid text", err))?;
                let text = String::from_utf8_lossy(&t).into_owned();
                attach(&mut stack, &mut root, XmlNode::Text(text));
            }
            Ok(Event::Comment(c)) => {
                let text = String::from_utf8_lossy(&c).into_owned();
                attach(&mut stack, &mut root, XmlNode::Comment(text));
            }
            Ok(Event::CData(c)) => {
                let text = String::from_utf8_lossy(&c).into_owned();
                attach(&mut stack, &mut root, XmlNode::CData(text));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(AppError::Xml(format!(
                    "parse error at position {}: {}",
                    reader.error_position(),
                    e
                )))
            }
        }
    }

    if !stack.is_empty() {
        return Err(AppError::Xml(format!("<{}> is not closed", MODEL_TAG)));
    }
    root.ok_or_else(|| AppError::Xml(format!("<{}> is empty", MODEL_TAG)))
}

fn port(tag: &str, name: &str, default: &str) -> XmlNode {
    XmlNode::Element(XmlElement::new(tag, &[("name", name), ("default", default)]))
}

fn merge_entry(model: &mut XmlElement, entry: &NodeModelEntry) {
    let existing = model.children.iter_mut().find_map(|c| match c {
        XmlNode::Element(e) if e.name == ACTION_TAG && e.attr("ID") == Some(entry.id.as_str()) => {
            Some(e)
        }
        _ => None,
    });

    match existing {
        Some(action) => update_action(action, entry),
        None => {
            info!(id = %entry.id, "adding node model");
            let mut action =
                XmlElement::new(ACTION_TAG, &[("ID", entry.id.as_str()), ("editable", "true")]);
            for name in entry.input_names() {
                action
                    .children
                    .push(port(INPUT_TAG, name, entry.input_default(name)));
            }
            for out in &entry.outputs {
                action.children.push(port(OUTPUT_TAG, &out.name, OUTPUT_DEFAULT));
            }
            model.children.push(XmlNode::Element(action));
        }
    }
}

fn update_action(action: &mut XmlElement, entry: &NodeModelEntry) {
    let inputs = entry.input_names();
    let outputs: Vec<&str> = entry.outputs.iter().map(|o| o.name.as_str()).collect();

    // Drift cleanup: the metadata is authoritative.
    action.children.retain(|c| match c {
        XmlNode::Element(e) if e.name == INPUT_TAG => {
            let keep = e.attr("name").is_some_and(|n| inputs.contains(&n));
            if !keep {
                info!(id = %entry.id, port = ?e.attr("name"), "removing input port");
            }
            keep
        }
        XmlNode::Element(e) if e.name == OUTPUT_TAG => {
            let keep = e.attr("name").is_some_and(|n| outputs.contains(&n));
            if !keep {
                info!(id = %entry.id, port = ?e.attr("name"), "removing output port");
            }
            keep
        }
        _ => true,
    });

    for name in &inputs {
        if action.has_port(INPUT_TAG, name) {
            continue;
        }
        info!(id = %entry.id, port = name, "adding input port");
        let at = action
            .children
            .iter()
            .rposition(|c| matches!(c, XmlNode::Element(e) if e.name == INPUT_TAG))
            .map(|i| i + 1)
            .unwrap_or(0);
        action
            .children
            .insert(at, port(INPUT_TAG, name, entry.input_default(name)));
    }

    for name in &outputs {
        if action.has_port(OUTPUT_TAG, name) {
            continue;
        }
        info!(id = %entry.id, port = name, "adding output port");
        action.children.push(port(OUTPUT_TAG, name, OUTPUT_DEFAULT));
    }
}

fn write_node<W: std::io::Write>(writer: &mut Writer<W>, node: &XmlNode) -> AppResult<()> {
    let event = match node {
        XmlNode::Element(el) => return write_element(writer, el),
        XmlNode::Text(t) => Event::Text(BytesText::from_escaped(t.as_str())),
        XmlNode::Comment(c) => Event::Comment(BytesText::from_escaped(c.as_str())),
        XmlNode::CData(c) => Event::CData(BytesCData::new(c.as_str())),
    };
    writer
        .write_event(event)
        .map_err(|e| xml_err("write error", e))
}

fn write_element<W: std::io::Write>(writer: &mut Writer<W>, el: &XmlElement) -> AppResult<()> {
    let mut start = BytesStart::new(el.name.as_str());
    for attr in &el.attrs {
        start.push_attribute(Attribute {
            key: QName(attr.key.as_bytes()),
            value: Cow::Borrowed(attr.raw.as_bytes()),
        });
    }

    if el.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| xml_err("write error", e));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| xml_err("write error", e))?;
    for child in &el.children {
        write_node(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(el.name.as_str())))
        .map_err(|e| xml_err("write error", e))
}

fn write_subtree(model: &XmlElement, base_indent: &str) -> AppResult<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 4);
    write_element(&mut writer, model)?;
    let raw = String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| xml_err("non UTF-8 output", e))?;

    let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
    let mut out = String::with_capacity(raw.len() + lines.len() * base_indent.len());
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push('\n');
            out.push_str(base_indent);
        }
        out.push_str(line);
    }
    Ok(out)
}
