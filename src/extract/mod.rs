//! Declaration extraction: find Python functions that lack a docstring.
//!
//! Walks every `function_definition` in the file, nested functions and
//! methods included. Lambdas are expressions, not definitions, and never
//! appear. For each function the extractor records where a docstring would
//! be inserted (the byte right after the signature line's newline) and the
//! indentation of the first body statement.

pub mod syntax;

use tree_sitter::Node;

use crate::error::Result;
use syntax::{
    first_statement, header_colon, is_docstring_statement, line_indent, node_text, parse_python,
    DefKind, DefNode, DefinitionIndex, NodeId,
};

/// Position of a function in the original file text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpan {
    pub start_byte: usize,
    pub end_byte: usize,
    /// 1-indexed line of the `def` keyword (or first decorator)
    pub start_line: usize,
    /// Number of enclosing functions/classes
    pub depth: usize,
}

/// A function definition found in a source file
#[derive(Debug, Clone)]
pub struct FunctionCandidate {
    pub id: NodeId,
    pub name: String,
    pub qualified_name: String,
    pub span: SourceSpan,
    /// Byte offset right after the signature line's terminating newline
    pub insert_offset: usize,
    /// Whitespace preceding the first body statement
    pub body_indent: String,
    /// Line terminator used by the signature line
    pub line_ending: &'static str,
    pub signature: String,
    pub body: String,
    /// Decorators, signature and body, as written
    pub source: String,
    pub has_existing_doc: bool,
}

/// Extract every function that can host a docstring, documented or not.
///
/// Functions whose body starts on the signature line (`def f(): return 1`)
/// are left out: a docstring cannot be inserted there without reformatting.
pub fn extract_functions(source: &str) -> Result<Vec<FunctionCandidate>> {
    let tree = parse_python(source)?;
    let mut index = DefinitionIndex::new();
    let mut functions = Vec::new();

    walk(&tree.root_node(), None, source, &mut index, &mut functions);

    Ok(functions)
}

/// Extract the functions lacking a docstring, in source order
pub fn extract_candidates(source: &str) -> Result<Vec<FunctionCandidate>> {
    Ok(extract_functions(source)?
        .into_iter()
        .filter(|f| !f.has_existing_doc)
        .collect())
}

fn walk(
    node: &Node,
    parent: Option<NodeId>,
    source: &str,
    index: &mut DefinitionIndex,
    out: &mut Vec<FunctionCandidate>,
) {
    for i in 0..node.named_child_count() {
        let Some(child) = node.named_child(i) else {
            continue;
        };

        let kind = match child.kind() {
            "function_definition" => DefKind::Function,
            "class_definition" => DefKind::Class,
            _ => {
                walk(&child, parent, source, index, out);
                continue;
            }
        };

        let name = child
            .child_by_field_name("name")
            .map(|n| node_text(&n, source).to_string())
            .unwrap_or_default();

        let id = index.push(DefNode { name, parent });

        if kind == DefKind::Function {
            if let Some(candidate) = build_candidate(&child, id, source, index) {
                out.push(candidate);
            }
        }

        walk(&child, Some(id), source, index, out);
    }
}

fn build_candidate(
    func: &Node,
    id: NodeId,
    source: &str,
    index: &DefinitionIndex,
) -> Option<FunctionCandidate> {
    let def = index.get(id)?;
    let qualified_name = index.qualified_name(id);
    let body = func.child_by_field_name("body")?;
    let colon = header_colon(func, &body)?;
    let first = first_statement(&body)?;

    if first.start_position().row == colon.start_position().row {
        log::debug!("Skipping {}: body starts on the signature line", qualified_name);
        return None;
    }

    let newline = colon.end_byte() + source[colon.end_byte()..].find('\n')?;
    let line_ending = if source[..newline].ends_with('\r') { "\r\n" } else { "\n" };

    let Some(body_indent) = line_indent(&first, source) else {
        log::debug!("Skipping {}: first statement is not at line start", qualified_name);
        return None;
    };

    // Decorators belong to the function for prompt context
    let outer = func
        .parent()
        .filter(|p| p.kind() == "decorated_definition")
        .unwrap_or(*func);

    Some(FunctionCandidate {
        id,
        name: def.name.clone(),
        qualified_name,
        span: SourceSpan {
            start_byte: outer.start_byte(),
            end_byte: outer.end_byte(),
            start_line: outer.start_position().row + 1,
            depth: index.depth(id),
        },
        insert_offset: newline + 1,
        body_indent: body_indent.to_string(),
        line_ending,
        signature: source[func.start_byte()..colon.end_byte()].to_string(),
        body: node_text(&body, source).to_string(),
        source: node_text(&outer, source).to_string(),
        has_existing_doc: is_docstring_statement(&first, source),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocstringerError;

    const SQUARE_CUBE: &str = r#"def square(x):
    return x ** 2

def cube(x):
    """
    Compute the cube of a number.
    """
    return x ** 3
"#;

    #[test]
    fn test_square_and_cube() {
        let candidates = extract_candidates(SQUARE_CUBE).unwrap();
        assert_eq!(candidates.len(), 1);

        let square = &candidates[0];
        assert_eq!(square.name, "square");
        assert_eq!(square.insert_offset, "def square(x):\n".len());
        assert_eq!(square.body_indent, "    ");
        assert_eq!(square.signature, "def square(x):");
        assert_eq!(square.span.start_line, 1);
        assert_eq!(square.span.depth, 0);
        assert!(square.source.contains("return x ** 2"));
        assert!(!square.source.contains("cube"));

        let all = extract_functions(SQUARE_CUBE).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[1].has_existing_doc);
    }

    #[test]
    fn test_nested_functions_and_methods() {
        let code = r#"class Shape:
    def area(self):
        def helper(v):
            return v
        return helper(0)

    def named(self):
        """Already documented."""
        return "shape"

def top():
    inc = lambda v: v + 1
    return inc(1)
"#;
        let candidates = extract_candidates(code).unwrap();
        let names: Vec<_> = candidates.iter().map(|c| c.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["Shape.area", "Shape.area.helper", "top"]);

        assert_eq!(candidates[0].body_indent, "        ");
        assert_eq!(candidates[0].span.depth, 1);
        assert_eq!(candidates[1].body_indent, "            ");
        assert_eq!(candidates[1].span.depth, 2);
        assert_eq!(candidates[2].body_indent, "    ");

        // Ordered by position
        assert!(candidates.windows(2).all(|w| w[0].insert_offset < w[1].insert_offset));
    }

    #[test]
    fn test_multiline_signature_and_comment() {
        let code = "def add(\n    a: int,\n    b: int = 2,\n) -> int:  # sums\n    # body comment\n    return a + b\n";
        let candidates = extract_candidates(code).unwrap();
        assert_eq!(candidates.len(), 1);

        let add = &candidates[0];
        let expected = code.find("# sums\n").unwrap() + "# sums\n".len();
        assert_eq!(add.insert_offset, expected);
        assert!(add.signature.ends_with("-> int:"));
        assert_eq!(add.span.start_line, 1);
    }

    #[test]
    fn test_decorated_function_source_includes_decorator() {
        let code = "@cache\ndef fib(n):\n    return n if n < 2 else fib(n - 1) + fib(n - 2)\n";
        let candidates = extract_candidates(code).unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].source.starts_with("@cache\n"));
        assert_eq!(candidates[0].insert_offset, "@cache\ndef fib(n):\n".len());
    }

    #[test]
    fn test_async_function_and_tabs() {
        let code = "async def fetch(url):\n\treturn await get(url)\n";
        let candidates = extract_candidates(code).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "fetch");
        assert_eq!(candidates[0].body_indent, "\t");
    }

    #[test]
    fn test_inline_body_is_skipped() {
        let code = "def one(): return 1\n\ndef two():\n    return 2\n";
        let candidates = extract_candidates(code).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "two");
    }

    #[test]
    fn test_crlf_line_endings() {
        let code = "def f(x):\r\n    return x\r\n";
        let candidates = extract_candidates(code).unwrap();
        assert_eq!(candidates[0].line_ending, "\r\n");
        assert_eq!(candidates[0].insert_offset, "def f(x):\r\n".len());
    }

    #[test]
    fn test_non_docstring_first_string_is_not_overwritten() {
        // A leading plain string counts as documentation even if not in any convention
        let code = "def f():\n    'describe me later'\n    return 1\n";
        assert!(extract_candidates(code).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_source_is_parse_error() {
        let err = extract_candidates("def broken(x:\n    return x\n").unwrap_err();
        assert!(matches!(err, DocstringerError::Parse(_)));
    }

    #[test]
    fn test_no_functions() {
        assert!(extract_candidates("x = 1\nprint(x)\n").unwrap().is_empty());
        assert!(extract_candidates("").unwrap().is_empty());
    }
}
