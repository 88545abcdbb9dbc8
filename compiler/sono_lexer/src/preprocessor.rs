//! Textual preprocessor.
//!
//! Object-like definitions only: a definition table supplied by the host,
//! plus in-source `#define NAME value` / `#undef NAME` lines. Directive
//! lines are blanked (not removed) so line numbers in diagnostics stay
//! aligned with what the user wrote. Substitution happens before
//! tokenization and re-expands replacement text, bounded by an expansion
//! budget so self-referential definitions fail instead of spinning.

use rustc_hash::FxHashMap;
use sono_diagnostic::{Error, Result};
use sono_ir::Span;

/// Total identifier expansions allowed per compilation unit.
const EXPANSION_BUDGET: u32 = 4096;

/// Preprocessor symbol table. Host definitions go in first; in-source
/// `#define`s are applied in order on top, so later definitions win.
#[derive(Clone, Debug, Default)]
pub struct Definitions {
    map: FxHashMap<String, String>,
}

impl Definitions {
    pub fn new() -> Self {
        Definitions::default()
    }

    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.map.insert(name.into(), value.into());
    }

    pub fn undefine(&mut self, name: &str) {
        self.map.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Run the preprocessor over one source text.
///
/// Pure: no state survives the call. The output is the text the lexer
/// and all diagnostic spans operate on.
pub fn preprocess(source: &str, definitions: &Definitions) -> Result<String> {
    let mut defs = definitions.clone();
    let mut stripped = String::with_capacity(source.len());

    // Pass 1: collect directives, blank their lines.
    let mut offset = 0usize;
    for line in source.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if let Some(directive) = trimmed.strip_prefix('#') {
            apply_directive(directive.trim_end(), &mut defs, offset, line)?;
            for ch in line.chars() {
                stripped.push(if ch == '\n' { '\n' } else { ' ' });
            }
        } else {
            stripped.push_str(line);
        }
        offset += line.len();
    }

    // Pass 2: substitute identifiers.
    let mut budget = EXPANSION_BUDGET;
    substitute(&stripped, &defs, &mut budget)
}

fn apply_directive(
    directive: &str,
    defs: &mut Definitions,
    line_offset: usize,
    line: &str,
) -> Result<()> {
    let span = Span::from_range(line_offset..line_offset + line.trim_end().len());
    let mut words = directive.splitn(2, char::is_whitespace);
    match words.next() {
        Some("define") => {
            let rest = words.next().unwrap_or("").trim();
            let Some(name) = rest.split_whitespace().next() else {
                return Err(Error::syntax("#define requires a name", span));
            };
            if !is_identifier(name) {
                return Err(Error::syntax(
                    format!("'{name}' is not a valid preprocessor name"),
                    span,
                ));
            }
            let value = rest[name.len()..].trim().to_owned();
            defs.define(name, value);
            Ok(())
        }
        Some("undef") => {
            let name = words.next().unwrap_or("").trim();
            if !is_identifier(name) {
                return Err(Error::syntax("#undef requires a name", span));
            }
            defs.undefine(name);
            Ok(())
        }
        Some(other) => Err(Error::syntax(
            format!("unknown preprocessor directive '#{other}'"),
            span,
        )),
        None => Err(Error::syntax("empty preprocessor directive", span)),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Replace defined identifiers, skipping comments and string literals.
fn substitute(text: &str, defs: &Definitions, budget: &mut u32) -> Result<String> {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
            let end = text[i..].find('\n').map_or(bytes.len(), |n| i + n);
            out.push_str(&text[i..end]);
            i = end;
        } else if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
            let end = text[i + 2..].find("*/").map_or(bytes.len(), |n| i + 2 + n + 2);
            out.push_str(&text[i..end]);
            i = end;
        } else if b == b'"' {
            let end = text[i + 1..].find('"').map_or(bytes.len(), |n| i + 1 + n + 1);
            out.push_str(&text[i..end]);
            i = end;
        } else if b.is_ascii_alphabetic() || b == b'_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let word = &text[start..i];
            match defs.get(word) {
                Some(replacement) => {
                    if *budget == 0 {
                        return Err(Error::syntax(
                            format!("preprocessor expansion limit reached at '{word}'"),
                            Span::from_range(start..i),
                        ));
                    }
                    *budget -= 1;
                    let expanded = substitute(replacement, defs, budget)?;
                    out.push_str(&expanded);
                }
                None => out.push_str(word),
            }
        } else if b.is_ascii_digit() {
            // Numbers swallow trailing letters so the `f` suffix of a
            // float literal is never treated as a macro name.
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                i += 1;
            }
            out.push_str(&text[start..i]);
        } else {
            // Copy whole UTF-8 characters; anything non-ASCII gets
            // rejected by the lexer with a proper span later.
            let Some(ch) = text[i..].chars().next() else {
                break;
            };
            out.push(ch);
            i += ch.len_utf8();
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn host_definition_is_substituted() {
        let mut defs = Definitions::new();
        defs.define("CUTOFF", "440.0f");
        let Ok(out) = preprocess("float c = CUTOFF;", &defs) else {
            panic!("preprocess failed");
        };
        assert_eq!(out, "float c = 440.0f;");
    }

    #[test]
    fn in_source_define_wins_over_host() {
        let mut defs = Definitions::new();
        defs.define("N", "4");
        let Ok(out) = preprocess("#define N 8\nint x = N;", &defs) else {
            panic!("preprocess failed");
        };
        assert_eq!(out, "           \nint x = 8;");
    }

    #[test]
    fn undef_removes_a_definition() {
        let mut defs = Definitions::new();
        defs.define("N", "4");
        let Ok(out) = preprocess("#undef N\nint x = N;", &defs) else {
            panic!("preprocess failed");
        };
        assert!(out.ends_with("int x = N;"));
    }

    #[test]
    fn directive_lines_preserve_line_numbers() {
        let Ok(out) = preprocess("#define A 1\nA", &Definitions::new()) else {
            panic!("preprocess failed");
        };
        assert_eq!(out.lines().count(), 2);
        assert_eq!(out.lines().nth(1), Some("1"));
    }

    #[test]
    fn nested_expansion() {
        let mut defs = Definitions::new();
        defs.define("A", "B + 1");
        defs.define("B", "2");
        let Ok(out) = preprocess("int x = A;", &defs) else {
            panic!("preprocess failed");
        };
        assert_eq!(out, "int x = 2 + 1;");
    }

    #[test]
    fn self_referential_definition_fails() {
        let mut defs = Definitions::new();
        defs.define("LOOP", "LOOP + 1");
        let Err(e) = preprocess("int x = LOOP;", &defs) else {
            panic!("expected expansion failure");
        };
        assert!(e.to_string().contains("expansion limit"));
    }

    #[test]
    fn identifiers_inside_comments_are_untouched() {
        let mut defs = Definitions::new();
        defs.define("GAIN", "1.0f");
        let Ok(out) = preprocess("// GAIN stays\nfloat g = GAIN;", &defs) else {
            panic!("preprocess failed");
        };
        assert_eq!(out, "// GAIN stays\nfloat g = 1.0f;");
    }

    #[test]
    fn unknown_directive_is_rejected() {
        let Err(e) = preprocess("#include <x>", &Definitions::new()) else {
            panic!("expected error");
        };
        assert!(e.to_string().contains("unknown preprocessor directive"));
    }
}
