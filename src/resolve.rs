//! `${name}` substitution.
//!
//! A token is `${`, any run of characters other than `{` and `}`, then `}`.
//! Names are looked up in the current section first and the root section
//! second. Anything that does not resolve is copied through untouched, and a
//! substituted value is never scanned again.

use tracing::debug;

use crate::config::Section;

/// A `${name}` span found in a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Token<'a> {
    start: usize,
    end: usize,
    name: &'a str,
}

/// Finds the next complete token at or after byte offset `from`.
fn next_token(raw: &str, mut from: usize) -> Option<Token<'_>> {
    while let Some(offset) = raw[from..].find("${") {
        let start = from + offset;
        let body = start + 2;
        match raw[body..].find(['{', '}']) {
            Some(close) if raw.as_bytes()[body + close] == b'}' => {
                return Some(Token {
                    start,
                    end: body + close + 1,
                    name: &raw[body..body + close],
                });
            }
            Some(_) => from = start + 1,
            None => return None,
        }
    }
    None
}

/// Iterates over the names referenced by `raw`, in order of appearance.
pub fn tokens(raw: &str) -> impl Iterator<Item = &str> + '_ {
    let mut from = 0;
    std::iter::from_fn(move || {
        let token = next_token(raw, from)?;
        from = token.end;
        Some(token.name)
    })
}

/// Expands every token of `raw` against `current` and then `root`.
///
/// `current` is `None` when the section being written has not received any
/// key yet.
pub fn resolve(raw: &str, current: Option<&Section>, root: &Section) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut from = 0;

    while let Some(token) = next_token(raw, from) {
        out.push_str(&raw[from..token.start]);

        let value = current
            .and_then(|section| section.lookup(token.name))
            .or_else(|| root.lookup(token.name));
        match value {
            Some(value) => out.push_str(value),
            None => {
                debug!(name = token.name, "unresolved reference left as is");
                out.push_str(&raw[token.start..token.end]);
            }
        }
        from = token.end;
    }

    out.push_str(&raw[from..]);
    out
}
