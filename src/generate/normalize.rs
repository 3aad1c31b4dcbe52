//! Turn raw model output into a docstring block ready for insertion.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{DocstringerError, Result};
use crate::extract::syntax::{first_statement, is_docstring_statement, parse_python};

fn code_fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)\A```[\w-]*[ \t]*\r?\n(.*?)\r?\n?```\z").expect("Invalid regex pattern")
    })
}

/// A decorator line: `@name`, `@pkg.name` or `@name(...)`, and nothing else.
/// `@param x: ...` style tags do not match.
fn decorator_line() -> &'static Regex {
    static DECORATOR: OnceLock<Regex> = OnceLock::new();
    DECORATOR.get_or_init(|| {
        Regex::new(r"\A@[A-Za-z_][\w.]*[ \t]*(\(|\z)").expect("Invalid regex pattern")
    })
}

/// Strip the wrapping the model sometimes adds despite being told not to:
/// code fences and triple quotes.
fn unwrap_response(raw: &str) -> &str {
    let mut text = raw.trim();

    loop {
        let before = text;

        if let Some(caps) = code_fence().captures(text) {
            if let Some(inner) = caps.get(1) {
                text = inner.as_str().trim();
            }
        }

        let unprefixed = text.strip_prefix(['r', 'R']).unwrap_or(text);
        for quotes in ["\"\"\"", "'''"] {
            if unprefixed.len() >= 6
                && unprefixed.starts_with(quotes)
                && unprefixed.ends_with(quotes)
            {
                text = unprefixed[3..unprefixed.len() - 3].trim();
                break;
            }
        }

        if text == before {
            return text;
        }
    }
}

/// Remove the common leading whitespace of every line after the first.
/// The first line follows the opening quotes and is trimmed on its own.
fn dedent(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();

    let common = lines
        .iter()
        .skip(1)
        .filter(|l| !l.is_empty())
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                line.trim_start().to_string()
            } else if line.is_empty() {
                String::new()
            } else {
                line[common..].to_string()
            }
        })
        .collect()
}

/// Normalize a raw generated response into an indented docstring block.
///
/// Every non-blank line of the block starts with `indent`, the opening line
/// being exactly `indent` followed by the quotes. Blank lines carry no
/// trailing whitespace. The result ends with `line_ending`.
pub fn normalize_docstring(raw: &str, indent: &str, line_ending: &str) -> Result<String> {
    let text = unwrap_response(raw);

    if text.is_empty() {
        return Err(DocstringerError::GenerationFormat("empty response".to_string()));
    }

    if !text.chars().any(char::is_alphanumeric) {
        return Err(DocstringerError::GenerationFormat(format!(
            "response contains no prose: {:?}",
            text
        )));
    }

    let first_line = text.lines().next().unwrap_or("").trim();
    if ["def ", "async def ", "class "]
        .iter()
        .any(|p| first_line.starts_with(p))
        || decorator_line().is_match(first_line)
    {
        return Err(DocstringerError::GenerationFormat(
            "response is code, not documentation".to_string(),
        ));
    }

    let raw_string = text.contains('\\');
    let mut lines: Vec<String> = dedent(text)
        .into_iter()
        .map(|line| line.replace("\"\"\"", "\\\"\\\"\\\""))
        .collect();

    while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.pop();
    }

    // A trailing quote would merge with the closing delimiter
    if let Some(last) = lines.last_mut() {
        if last.ends_with('"') && !last.ends_with("\\\"") {
            last.pop();
            last.push_str("\\\"");
        }
    }

    let prefix = if raw_string { "r" } else { "" };
    let single_line = lines.len() == 1 && !lines[0].ends_with('\\');

    let mut block = String::new();
    if single_line {
        block.push_str(&format!("{}{}\"\"\"{}\"\"\"{}", indent, prefix, lines[0], line_ending));
    } else {
        block.push_str(&format!("{}{}\"\"\"{}{}", indent, prefix, lines[0], line_ending));
        for line in &lines[1..] {
            if !line.is_empty() {
                block.push_str(indent);
                block.push_str(line);
            }
            block.push_str(line_ending);
        }
        block.push_str(&format!("{}\"\"\"{}", indent, line_ending));
    }

    verify_block(&block, line_ending)?;
    Ok(block)
}

/// Check the block parses as the docstring of a function body
fn verify_block(block: &str, line_ending: &str) -> Result<()> {
    let probe = format!("def _probe():{}{}", line_ending, block);
    let malformed = || {
        DocstringerError::GenerationFormat("normalized block is not a valid docstring".to_string())
    };

    let tree = parse_python(&probe).map_err(|_| malformed())?;
    let root = tree.root_node();
    let body = root
        .named_child(0)
        .and_then(|f| f.child_by_field_name("body"))
        .ok_or_else(malformed)?;

    if body.named_child_count() != 1 {
        return Err(malformed());
    }

    match first_statement(&body) {
        Some(stmt) if is_docstring_statement(&stmt, &probe) => Ok(()),
        _ => Err(malformed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_indented(block: &str, indent: &str) {
        for line in block.lines().filter(|l| !l.is_empty()) {
            assert!(line.starts_with(indent), "line {:?} not indented with {:?}", line, indent);
        }
        assert!(block.lines().all(|l| l == l.trim_end()));
    }

    #[test]
    fn test_single_line() {
        let block = normalize_docstring("  Compute the square.  \n", "    ", "\n").unwrap();
        assert_eq!(block, "    \"\"\"Compute the square.\"\"\"\n");
    }

    #[test]
    fn test_multi_line_reindented() {
        let raw = "Compute the square of a number.\n\n        Args:\n            x (int): The number.\n\n        Returns:\n            int: The square.";
        let block = normalize_docstring(raw, "        ", "\n").unwrap();

        assert_eq!(
            block,
            "        \"\"\"Compute the square of a number.\n\n        Args:\n            x (int): The number.\n\n        Returns:\n            int: The square.\n        \"\"\"\n"
        );
        assert_indented(&block, "        ");
    }

    #[test]
    fn test_indentation_at_several_depths() {
        let raw = "Summary line.\n\nArgs:\n    a: first";
        for indent in ["    ", "        ", "                ", "\t"] {
            let block = normalize_docstring(raw, indent, "\n").unwrap();
            assert!(block.starts_with(&format!("{}\"\"\"Summary line.", indent)));
            assert!(block.ends_with(&format!("{}\"\"\"\n", indent)));
            assert_indented(&block, indent);
        }
    }

    #[test]
    fn test_strips_fences_and_quotes() {
        let raw = "```python\n\"\"\"\nAdd two numbers.\n\"\"\"\n```";
        let block = normalize_docstring(raw, "    ", "\n").unwrap();
        assert_eq!(block, "    \"\"\"Add two numbers.\"\"\"\n");

        let raw = "'''Add two numbers.'''";
        assert_eq!(
            normalize_docstring(raw, "    ", "\n").unwrap(),
            "    \"\"\"Add two numbers.\"\"\"\n"
        );
    }

    #[test]
    fn test_embedded_quotes_escaped() {
        let raw = "Wrap text in \"\"\" quotes and return \"done\"";
        let block = normalize_docstring(raw, "    ", "\n").unwrap();
        assert_eq!(
            block,
            "    \"\"\"Wrap text in \\\"\\\"\\\" quotes and return \"done\\\"\"\"\"\n"
        );
    }

    #[test]
    fn test_backslash_uses_raw_string() {
        let raw = "Split on the regex \\s+.";
        let block = normalize_docstring(raw, "    ", "\n").unwrap();
        assert_eq!(block, "    r\"\"\"Split on the regex \\s+.\"\"\"\n");
    }

    #[test]
    fn test_crlf() {
        let block = normalize_docstring("Line one.\nLine two.", "  ", "\r\n").unwrap();
        assert_eq!(block, "  \"\"\"Line one.\r\n  Line two.\r\n  \"\"\"\r\n");
    }

    #[test]
    fn test_empty_and_unusable_responses() {
        for raw in ["", "   \n  ", "```\n```", "\"\"\"\"\"\"", "...", "def f(x):\n    return x"] {
            let err = normalize_docstring(raw, "    ", "\n").unwrap_err();
            assert!(matches!(err, DocstringerError::GenerationFormat(_)), "{:?}", raw);
        }
    }

    #[test]
    fn test_decorated_code_rejected() {
        for raw in [
            "@staticmethod\ndef f():\n    pass",
            "@app.route('/')\ndef index():\n    pass",
        ] {
            let err = normalize_docstring(raw, "    ", "\n").unwrap_err();
            assert!(matches!(err, DocstringerError::GenerationFormat(_)), "{:?}", raw);
        }
    }

    #[test]
    fn test_tag_style_docstring_accepted() {
        let block =
            normalize_docstring("@param x: the number\n@return: its square", "    ", "\n").unwrap();
        assert_eq!(
            block,
            "    \"\"\"@param x: the number\n    @return: its square\n    \"\"\"\n"
        );
    }
}
