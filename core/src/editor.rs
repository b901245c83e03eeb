//! # Structural Editor
//!
//! Anchor-driven rewriting of C++ plugin sources. Every function takes the
//! document by reference and returns a new document; the input is never mutated.
//!
//! Optional anchors that are absent (keyword, constructor, function) leave the
//! document unchanged silently. The private-section rewrite requires its anchors
//! and reports a warning when they are missing, still returning the input untouched.
//!
//! Balance tracking is done with [`crate::scanner`]; braces inside comments and
//! string literals are counted like any other brace.

use crate::scanner::{find_matching, split_top_level, Delim};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Parameters kept by [`rewrite_parameter_list`] before the regenerated ones.
///
/// A plugin constructor always starts with `name`, `config` and `params`.
pub const FIXED_PARAMETER_COUNT: usize = 3;

/// Replaces the body of the first `{ ... }` block following `keyword`.
///
/// Everything strictly between the opening brace and its matching closing brace
/// is replaced by `new_body`.
///
/// # Examples
/// ```
/// use bt_gen_core::editor::replace_block_after_keyword;
///
/// let doc = "foo() { a; { b; } c; } bar() { d; }";
/// assert_eq!(replace_block_after_keyword(doc, "foo", " z; "), "foo() { z; } bar() { d; }");
/// ```
pub fn replace_block_after_keyword(doc: &str, keyword: &str, new_body: &str) -> String {
    let Some(keyword_at) = doc.find(keyword) else {
        debug!(keyword, "keyword not found, block left unchanged");
        return doc.to_string();
    };
    let Some(open) = doc[keyword_at..].find('{').map(|i| keyword_at + i) else {
        debug!(keyword, "no block after keyword");
        return doc.to_string();
    };
    let Some(close) = find_matching(doc, open, Delim::Brace) else {
        debug!(keyword, "unbalanced block after keyword");
        return doc.to_string();
    };

    let mut out = String::with_capacity(doc.len() + new_body.len());
    out.push_str(&doc[..=open]);
    out.push_str(new_body);
    out.push_str(&doc[close..]);
    out
}

/// Finds `name(` at a word boundary and returns the offsets of the parentheses.
fn find_call_parens(doc: &str, name: &str) -> Option<(usize, usize)> {
    let re = Regex::new(&format!(r"\b{}\s*\(", regex::escape(name))).ok()?;
    let m = re.find(doc)?;
    let open = m.end() - 1;
    let close = find_matching(doc, open, Delim::Paren)?;
    Some((open, close))
}

/// Locates the initializer list following the constructor's parameter list.
///
/// Returns the byte range of the list (trimmed) when the constructor is followed by `:`.
fn find_initializer_list(doc: &str, ctor_name: &str) -> Option<(usize, usize)> {
    let (_, close) = find_call_parens(doc, ctor_name)?;
    let after = &doc[close + 1..];
    let colon = after.len() - after.trim_start().len();
    if !after[colon..].starts_with(':') || after[colon..].starts_with("::") {
        return None;
    }

    let list_from = close + 1 + colon + 1;
    let rest = &doc[list_from..];
    let start = list_from + (rest.len() - rest.trim_start().len());

    // The body is the first top-level `{` that follows a completed initializer
    // (`)` or `}`); `member_{...}` braces follow an identifier instead.
    let mut depth = 0usize;
    let mut prev = ' ';
    for (offset, c) in doc[start..].char_indices() {
        match c {
            '{' if depth == 0 && (prev == ')' || prev == '}') => {
                let end = start + doc[start..start + offset].trim_end().len();
                return Some((start, end));
            }
            '(' | '[' | '<' | '{' => depth += 1,
            ')' | ']' | '>' | '}' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => return None,
            _ => {}
        }
        if !c.is_whitespace() {
            prev = c;
        }
    }
    None
}

/// Rewrites a constructor's initializer list.
///
/// The first initializer (the base-class call) is kept and `new_initializers`
/// are appended after it. Nothing changes if the constructor or its list cannot
/// be found, or if the list has fewer than two initializers.
///
/// # Examples
/// ```
/// use bt_gen_core::editor::rewrite_initializer_list;
///
/// let doc = "Ctor(x) : Base(x), old1(), old2() {}";
/// let out = rewrite_initializer_list(doc, "Ctor", &["new1()".to_string()]);
/// assert_eq!(out, "Ctor(x) : Base(x), new1() {}");
/// ```
pub fn rewrite_initializer_list(
    doc: &str,
    ctor_name: &str,
    new_initializers: &[String],
) -> String {
    let Some((start, end)) = find_initializer_list(doc, ctor_name) else {
        debug!(ctor_name, "initializer list not found");
        return doc.to_string();
    };

    let existing = split_top_level(&doc[start..end], ',');
    if existing.len() < 2 {
        debug!(ctor_name, "initializer list has nothing to replace");
        return doc.to_string();
    }

    let mut items: Vec<&str> = vec![existing[0]];
    items.extend(new_initializers.iter().map(String::as_str));

    let mut out = String::with_capacity(doc.len());
    out.push_str(&doc[..start]);
    out.push_str(&items.join(", "));
    out.push_str(&doc[end..]);
    out
}

/// Rewrites the parameter list of the first `function_name(...)`.
///
/// At most [`FIXED_PARAMETER_COUNT`] leading parameters are kept; `new_params`
/// follow them.
pub fn rewrite_parameter_list(doc: &str, function_name: &str, new_params: &[String]) -> String {
    let Some((open, close)) = find_call_parens(doc, function_name) else {
        debug!(function_name, "function signature not found");
        return doc.to_string();
    };

    let mut params: Vec<&str> = split_top_level(&doc[open + 1..close], ',');
    params.truncate(FIXED_PARAMETER_COUNT);
    params.extend(new_params.iter().map(String::as_str));

    let mut out = String::with_capacity(doc.len());
    out.push_str(&doc[..=open]);
    out.push_str(&params.join(", "));
    out.push_str(&doc[close..]);
    out
}

/// Rewrites the `private:` section of `class_name`.
///
/// The section runs from `private:` to the next `public:`/`protected:` label or
/// to the end of the class body. It is split into `;`-terminated statements;
/// statements matching any of `removal_patterns` are dropped, then each entry of
/// `new_members` that is not already contained in the remaining text is
/// prepended. Surviving statements keep their text.
///
/// A missing class or private section is reported with `warn!` and the
/// document is returned unchanged.
pub fn rewrite_private_section(
    doc: &str,
    class_name: &str,
    removal_patterns: &[Regex],
    new_members: &[String],
) -> String {
    let Some((body_start, body_end)) = find_class_body(doc, class_name) else {
        warn!(class_name, "class not found, private members left unchanged");
        return doc.to_string();
    };

    let body = &doc[body_start..body_end];
    static PRIVATE_RE: OnceLock<Regex> = OnceLock::new();
    let private_re =
        PRIVATE_RE.get_or_init(|| Regex::new(r"\bprivate\s*:").expect("Invalid regex"));
    let Some(label) = private_re.find(body) else {
        warn!(class_name, "no private section found, private members left unchanged");
        return doc.to_string();
    };

    static NEXT_LABEL_RE: OnceLock<Regex> = OnceLock::new();
    let next_label_re = NEXT_LABEL_RE
        .get_or_init(|| Regex::new(r"\b(public|protected)\s*:").expect("Invalid regex"));
    let section_start = body_start + label.end();
    let section_end = next_label_re
        .find(&body[label.end()..])
        .map(|m| section_start + m.start())
        .unwrap_or(body_end);
    let section = &doc[section_start..section_end];

    // Statements end at the last `;`; whatever follows is layout before the terminator.
    let statements_end = section.rfind(';').map(|i| i + 1).unwrap_or(0);
    let statements: Vec<&str> = section[..statements_end]
        .split_inclusive(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let indent = detect_member_indent(section).unwrap_or_else(|| "  ".to_string());

    let kept: Vec<&str> = statements
        .iter()
        .copied()
        .filter(|stmt| !removal_patterns.iter().any(|re| re.is_match(stmt)))
        .collect();
    let kept_text = kept.join("\n");

    let mut members: Vec<&str> = new_members
        .iter()
        .map(|m| m.trim())
        .filter(|m| !kept_text.contains(m))
        .collect();
    members.extend(kept);

    if members.is_empty() && statements.is_empty() {
        return doc.to_string();
    }

    let mut rendered = String::new();
    for member in &members {
        rendered.push('\n');
        rendered.push_str(&indent);
        rendered.push_str(member);
    }

    let tail = &section[statements_end..];
    let tail = if statements.is_empty() {
        // Empty section: keep its layout after the inserted members.
        section
    } else {
        tail
    };

    let mut out = String::with_capacity(doc.len() + rendered.len());
    out.push_str(&doc[..section_start]);
    out.push_str(&rendered);
    out.push_str(tail);
    out.push_str(&doc[section_end..]);
    out
}

/// Returns the byte range strictly inside `class <name> ... { ... }`.
fn find_class_body(doc: &str, class_name: &str) -> Option<(usize, usize)> {
    let re = Regex::new(&format!(r"\bclass\s+{}\b", regex::escape(class_name))).ok()?;
    let m = re.find(doc)?;
    let open = m.end() + doc[m.end()..].find('{')?;
    let close = find_matching(doc, open, Delim::Brace)?;
    Some((open + 1, close))
}

/// Indentation of the first statement line in a section.
fn detect_member_indent(section: &str) -> Option<String> {
    section
        .lines()
        .find(|l| !l.trim().is_empty())
        .map(|l| l[..l.len() - l.trim_start().len()].to_string())
        .filter(|i| !i.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_replace_block_nested() {
        let doc = "foo() { a; { b; } c; }";
        assert_eq!(replace_block_after_keyword(doc, "foo", "NEW"), "foo() {NEW}");
    }

    #[test]
    fn test_replace_block_missing_anchor_is_noop() {
        let doc = "bar() { a; }";
        assert_eq!(replace_block_after_keyword(doc, "foo", "NEW"), doc);
        assert_eq!(replace_block_after_keyword("foo()", "foo", "NEW"), "foo()");
        assert_eq!(replace_block_after_keyword("foo() { {", "foo", "NEW"), "foo() { {");
    }

    #[test]
    fn test_replace_block_idempotent() {
        let doc = "x; providedBasicPorts({ A }); y;";
        let once = replace_block_after_keyword(doc, "providedBasicPorts", "B");
        let twice = replace_block_after_keyword(&once, "providedBasicPorts", "B");
        assert_eq!(once, "x; providedBasicPorts({B}); y;");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_initializer_rewrite() {
        let doc = "Ctor(x) : Base(x), old1(), old2() {}";
        let out = rewrite_initializer_list(doc, "Ctor", &["new1()".into()]);
        assert_eq!(out, "Ctor(x) : Base(x), new1() {}");
        assert_eq!(rewrite_initializer_list(&out, "Ctor", &["new1()".into()]), out);
    }

    #[test]
    fn test_initializer_single_entry_is_noop() {
        let doc = "Ctor(x) : Base(x) {}";
        assert_eq!(rewrite_initializer_list(doc, "Ctor", &["a_(a)".into()]), doc);
    }

    #[test]
    fn test_initializer_templated_base_multiline() {
        let doc = "  Plug(const std::string& name, int a = 1)\n      : BT::Node<\n            pkg::A>(\n            name),\n        a_(a),\n        b_{1, 2} {}\n";
        let out = rewrite_initializer_list(doc, "Plug", &["c_(c)".into()]);
        assert_eq!(
            out,
            "  Plug(const std::string& name, int a = 1)\n      : BT::Node<\n            pkg::A>(\n            name), c_(c) {}\n"
        );
    }

    #[test]
    fn test_initializer_no_list() {
        let doc = "class Ctor : public Base { Ctor(int x); };";
        assert_eq!(rewrite_initializer_list(doc, "Ctor", &[]), doc);
    }

    #[test]
    fn test_parameter_rewrite_keeps_three() {
        let doc = "Plug(const std::string& n, const Cfg& c, const P& p, std::optional<int> a = std::nullopt, int b) {}";
        let new_params = ["std::optional<double> s = std::nullopt".to_string()];
        let out = rewrite_parameter_list(doc, "Plug", &new_params);
        assert_eq!(
            out,
            "Plug(const std::string& n, const Cfg& c, const P& p, std::optional<double> s = std::nullopt) {}"
        );
        let again = rewrite_parameter_list(&out, "Plug", &new_params);
        assert_eq!(out, again);
    }

    #[test]
    fn test_parameter_rewrite_missing_function() {
        assert_eq!(rewrite_parameter_list("int x;", "Plug", &["a".into()]), "int x;");
    }

    #[test]
    fn test_parameter_rewrite_commas_in_templates() {
        let doc = "f(std::map<int, int> m, a, b, c)";
        assert_eq!(rewrite_parameter_list(doc, "f", &[]), "f(std::map<int, int> m, a, b)");
    }

    const CLASS: &str = "class Plug : public Base {\npublic:\n  Plug();\n\nprivate:\n  std::optional<unsigned> default_arg1_;\n  int keep_;\n};\n";

    #[test]
    fn test_private_section_rewrite() {
        let removal = [Regex::new(r"default_arg.*").unwrap()];
        let out = rewrite_private_section(
            CLASS,
            "Plug",
            &removal,
            &["std::optional<double> speed_;".into(), "int keep_;".into()],
        );
        assert_eq!(
            out,
            "class Plug : public Base {\npublic:\n  Plug();\n\nprivate:\n  std::optional<double> speed_;\n  int keep_;\n};\n"
        );
        let again = rewrite_private_section(
            &out,
            "Plug",
            &removal,
            &["std::optional<double> speed_;".into(), "int keep_;".into()],
        );
        assert_eq!(out, again);
    }

    #[test]
    fn test_private_section_stops_at_next_label() {
        let doc = "class P {\nprivate:\n  int a_;\npublic:\n  int b;\n};";
        let out = rewrite_private_section(doc, "P", &[], &["int z_;".into()]);
        assert_eq!(out, "class P {\nprivate:\n  int z_;\n  int a_;\npublic:\n  int b;\n};");
    }

    #[test]
    fn test_private_section_brace_initialized_member() {
        let doc = "class P {\nprivate:\n  int a_{};\n  int b_;\n};\nint after;";
        let out = rewrite_private_section(doc, "P", &[Regex::new("b_").unwrap()], &[]);
        assert_eq!(out, "class P {\nprivate:\n  int a_{};\n};\nint after;");
    }

    #[test]
    fn test_private_section_missing_is_noop() {
        assert_eq!(rewrite_private_section(CLASS, "Other", &[], &["int x;".into()]), CLASS);
        let no_private = "class Plug { public: int a; };";
        assert_eq!(
            rewrite_private_section(no_private, "Plug", &[], &["int x;".into()]),
            no_private
        );
    }

    #[test]
    fn test_private_section_empty_gets_members() {
        let doc = "class P {\nprivate:\n};";
        let out = rewrite_private_section(doc, "P", &[], &["int x_;".into()]);
        assert_eq!(out, "class P {\nprivate:\n  int x_;\n};");
        assert_eq!(rewrite_private_section(&out, "P", &[], &["int x_;".into()]), out);
    }
}
