/// A single classified line of a config file.
///
/// Every variant borrows from the raw line that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// Blank, comment-only or malformed line.
    Skip,
    /// `[name]` header. Only the outermost pair of brackets is removed.
    Section(&'a str),
    /// `key=value` entry, split on the first `=`.
    Pair { key: &'a str, value: &'a str },
}

const TRIM: &[char] = &[' ', '\t', '\r'];

// There is no escape for '#': everything after the first one is a comment,
// even inside a value.
pub fn classify(raw: &str) -> Line<'_> {
    let line = match raw.split_once('#') {
        Some((before, _)) => before,
        None => raw,
    };
    let line = line.trim_matches(TRIM);

    if line.is_empty() {
        return Line::Skip;
    }

    if line.starts_with('[') && line.ends_with(']') {
        return Line::Section(&line[1..line.len() - 1]);
    }

    match line.split_once('=') {
        Some((key, value)) => Line::Pair {
            key,
            value: value.trim_end_matches(' '),
        },
        None => Line::Skip,
    }
}
