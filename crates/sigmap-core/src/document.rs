//! Document Tree - Restricted YAML Reader
//!
//! The mapping format is a small indentation-based subset of YAML: a mapping
//! of scalar `key: value` pairs, nested mappings introduced by `key:` plus an
//! indented block, and sequences of `- ` items whose bodies are mappings.
//! This module reads that subset into a tree of scalar/sequence/mapping nodes
//! where every node and key carries its source line, so validation errors can
//! point at the offending input. It is deliberately not a general YAML
//! engine: anchors, flow style, quoting and multi-line scalars are rejected
//! territory.

use thiserror::Error;

/// Malformed document input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

impl SyntaxError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        SyntaxError {
            line,
            message: message.into(),
        }
    }
}

/// Source position of a node, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
}

/// One entry of a mapping node. Entries keep declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub key: String,
    pub key_pos: Position,
    pub value: Node,
}

/// Node payload.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Scalar(String),
    Sequence(Vec<Node>),
    Mapping(Vec<MapEntry>),
}

/// A parsed document node with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub pos: Position,
}

impl Node {
    pub fn as_scalar(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&[MapEntry]> {
        match &self.kind {
            NodeKind::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look an entry up by key; mappings only.
    pub fn get(&self, key: &str) -> Option<&MapEntry> {
        self.as_mapping()?.iter().find(|e| e.key == key)
    }
}

/// A parsed document: the root node plus an optional source label (usually
/// the filename) used when rendering errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Node,
    pub label: Option<String>,
}

impl Document {
    /// Parse a document from a string.
    pub fn parse(text: &str) -> Result<Document, SyntaxError> {
        let lines = scan_lines(text)?;
        if lines.is_empty() {
            return Err(SyntaxError::new(1, "document is empty"));
        }
        if let Some(first) = lines.first() {
            if first.indent != 0 {
                return Err(SyntaxError::new(first.number, "unexpected indentation"));
            }
        }
        let mut pos = 0;
        let root = parse_block(&lines, &mut pos, 0)?;
        if pos < lines.len() {
            return Err(SyntaxError::new(lines[pos].number, "invalid indentation"));
        }
        if !matches!(root.kind, NodeKind::Mapping(_)) {
            return Err(SyntaxError::new(root.pos.line, "document root must be a mapping"));
        }
        Ok(Document { root, label: None })
    }

    /// Parse a document from a file, labelling errors with the filename.
    pub fn parse_file(path: &std::path::Path) -> Result<Document, SyntaxError> {
        let text = std::fs::read_to_string(path).map_err(|err| SyntaxError {
            line: 0,
            message: format!("cannot read {}: {err}", path.display()),
        })?;
        let mut doc = Document::parse(&text)?;
        doc.label = Some(path.display().to_string());
        Ok(doc)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Document {
        self.label = Some(label.into());
        self
    }
}

/// A significant input line: indentation stripped, comments and blanks gone.
struct Line<'a> {
    number: usize,
    indent: usize,
    content: &'a str,
}

fn scan_lines(text: &str) -> Result<Vec<Line<'_>>, SyntaxError> {
    let mut lines = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let number = idx + 1;
        if raw.contains('\t') {
            return Err(SyntaxError::new(number, "tabs are not allowed, use spaces"));
        }
        let trimmed = raw.trim_start_matches(' ');
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        lines.push(Line {
            number,
            indent: raw.len() - trimmed.len(),
            content: trimmed.trim_end(),
        });
    }
    Ok(lines)
}

fn parse_block(lines: &[Line<'_>], pos: &mut usize, indent: usize) -> Result<Node, SyntaxError> {
    let first = &lines[*pos];
    if first.content.starts_with("- ") || first.content == "-" {
        parse_sequence(lines, pos, indent)
    } else {
        let entry = parse_entry_line(first.content, first.number)?;
        let start_line = first.number;
        *pos += 1;
        parse_mapping_body(lines, pos, indent, entry, start_line)
    }
}

fn parse_sequence(
    lines: &[Line<'_>],
    pos: &mut usize,
    indent: usize,
) -> Result<Node, SyntaxError> {
    let start_line = lines[*pos].number;
    let mut items = Vec::new();
    while *pos < lines.len() {
        let line = &lines[*pos];
        if line.indent != indent || !line.content.starts_with('-') {
            break;
        }
        let rest = line.content[1..].trim_start();
        if rest.is_empty() {
            return Err(SyntaxError::new(line.number, "empty sequence item"));
        }
        // The item body is a mapping whose first entry sits on the dash line;
        // continuation entries are indented past the dash.
        let entry_indent = indent + (line.content.len() - rest.len());
        let first = parse_entry_line(rest, line.number)?;
        *pos += 1;
        let item = parse_mapping_body(lines, pos, entry_indent, first, line.number)?;
        items.push(item);
    }
    Ok(Node {
        kind: NodeKind::Sequence(items),
        pos: Position { line: start_line },
    })
}

/// An entry line split into key and optional inline scalar value.
struct EntryLine<'a> {
    key: &'a str,
    value: Option<&'a str>,
    number: usize,
}

fn parse_entry_line(content: &str, number: usize) -> Result<EntryLine<'_>, SyntaxError> {
    let Some(colon) = content.find(':') else {
        return Err(SyntaxError::new(number, format!("expected 'key: value', got '{content}'")));
    };
    let key = content[..colon].trim_end();
    if key.is_empty() {
        return Err(SyntaxError::new(number, "empty mapping key"));
    }
    let rest = &content[colon + 1..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return Err(SyntaxError::new(
            number,
            format!("expected a space after ':' in '{content}'"),
        ));
    }
    let value = rest.trim();
    Ok(EntryLine {
        key,
        value: if value.is_empty() { None } else { Some(value) },
        number,
    })
}

fn parse_mapping_body(
    lines: &[Line<'_>],
    pos: &mut usize,
    indent: usize,
    first: EntryLine<'_>,
    start_line: usize,
) -> Result<Node, SyntaxError> {
    let mut entries = Vec::new();
    let mut pending = Some(first);
    loop {
        let entry = match pending.take() {
            Some(entry) => entry,
            None => {
                let Some(line) = lines.get(*pos) else { break };
                if line.indent != indent || line.content.starts_with("- ") || line.content == "-" {
                    break;
                }
                let entry = parse_entry_line(line.content, line.number)?;
                *pos += 1;
                entry
            }
        };

        if entries.iter().any(|e: &MapEntry| e.key == entry.key) {
            return Err(SyntaxError::new(
                entry.number,
                format!("duplicate key '{}'", entry.key),
            ));
        }

        let value = match entry.value {
            Some(scalar) => Node {
                kind: NodeKind::Scalar(scalar.to_string()),
                pos: Position { line: entry.number },
            },
            None => {
                // Block value: either a deeper-indented block, or a sequence
                // whose dashes sit at the same indent as the key (the usual
                // YAML style for sequences under a mapping key).
                let Some(next) = lines.get(*pos) else {
                    return Err(SyntaxError::new(
                        entry.number,
                        format!("expected an indented block after '{}:'", entry.key),
                    ));
                };
                if next.indent > indent {
                    let block_indent = next.indent;
                    let node = parse_block(lines, pos, block_indent)?;
                    if let Some(stray) = lines.get(*pos) {
                        if stray.indent > indent && stray.indent != block_indent {
                            return Err(SyntaxError::new(
                                stray.number,
                                "inconsistent indentation",
                            ));
                        }
                    }
                    node
                } else if next.indent == indent && next.content.starts_with('-') {
                    parse_sequence(lines, pos, indent)?
                } else {
                    return Err(SyntaxError::new(
                        entry.number,
                        format!("expected an indented block after '{}:'", entry.key),
                    ));
                }
            }
        };

        entries.push(MapEntry {
            key: entry.key.to_string(),
            key_pos: Position { line: entry.number },
            value,
        });
    }
    Ok(Node {
        kind: NodeKind::Mapping(entries),
        pos: Position { line: start_line },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
description: Test mapping
schema_version: 4.0.0
machine_description_locator: md://test/1
target_structure: magnetics

# channel mappings
signals:
  flux_loop:
  - name: 55.AD.00-MSA-1001
    flux/data: test1 [Wb]
    voltage/data: test2 [mV]
";

    #[test]
    fn test_parse_sample() {
        let doc = Document::parse(SAMPLE).unwrap();
        let root = doc.root.as_mapping().unwrap();
        assert_eq!(root.len(), 5);
        assert_eq!(root[0].key, "description");
        assert_eq!(root[0].value.as_scalar(), Some("Test mapping"));

        let signals = doc.root.get("signals").unwrap();
        assert_eq!(signals.key_pos.line, 7);
        let slots = signals.value.as_mapping().unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].key, "flux_loop");

        let channels = slots[0].value.as_sequence().unwrap();
        assert_eq!(channels.len(), 1);
        let channel = channels[0].as_mapping().unwrap();
        assert_eq!(channel.len(), 3);
        assert_eq!(channel[0].key, "name");
        assert_eq!(channel[0].value.as_scalar(), Some("55.AD.00-MSA-1001"));
        assert_eq!(channel[2].key, "voltage/data");
        assert_eq!(channel[2].value.as_scalar(), Some("test2 [mV]"));
        assert_eq!(channel[2].key_pos.line, 11);
    }

    #[test]
    fn test_scalar_values_may_contain_colons() {
        let doc = Document::parse("locator: imas:hdf5?path=/tmp/md\n").unwrap();
        let entry = doc.root.get("locator").unwrap();
        assert_eq!(entry.value.as_scalar(), Some("imas:hdf5?path=/tmp/md"));
    }

    #[test]
    fn test_multiple_sequence_items() {
        let text = "\
signals:
  flux_loop:
  - name: a
    flux/data: s1 [Wb]
  - name: b
    flux/data: s2 [Wb]
  rogowski_coil:
  - name: c
    current/data: s3 [A]
";
        let doc = Document::parse(text).unwrap();
        let slots = doc.root.get("signals").unwrap().value.as_mapping().unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].value.as_sequence().unwrap().len(), 2);
        assert_eq!(slots[1].value.as_sequence().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let err = Document::parse("a: 1\na: 2\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("duplicate key"));
    }

    #[test]
    fn test_tab_rejected() {
        let err = Document::parse("a:\n\tb: 1\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_missing_block() {
        let err = Document::parse("signals:\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("indented block"));
    }

    #[test]
    fn test_missing_colon() {
        let err = Document::parse("just some text\n").unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_error_line_numbers_skip_comments() {
        let err = Document::parse("# comment\n\na: 1\na: 2\n").unwrap_err();
        assert_eq!(err.line, 4);
    }

    #[test]
    fn test_parse_file_labels_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.yaml");
        std::fs::write(&path, SAMPLE).unwrap();
        let doc = Document::parse_file(&path).unwrap();
        assert_eq!(doc.label.as_deref(), Some(path.display().to_string().as_str()));
    }
}
