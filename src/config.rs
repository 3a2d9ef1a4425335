use std::collections::btree_map;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::line::{classify, Line};
use crate::resolve::resolve;

static EMPTY_SECTION: Section = Section {
    entries: BTreeMap::new(),
};

/// Key/value pairs of one `[section]`, or of the root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    entries: BTreeMap<String, String>,
}

impl Section {
    /// Value of `key`, or `""` when absent.
    pub fn get(&self, key: &str) -> &str {
        self.lookup(key).unwrap_or_default()
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn insert(&mut self, key: String, value: String) {
        self.entries.insert(key, value);
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Section {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Section {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A parsed config file.
///
/// Keys written before the first header live in the root section, which is
/// kept apart from the named sections and cannot be reached through
/// [`Document::section`]. A named section only exists once a key has been
/// written to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    root: Section,
    sections: BTreeMap<String, Section>,
}

/// Which section incoming pairs are written to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    Root,
    Named(String),
}

impl Document {
    /// Root-level value of `key`, or `""` when absent.
    pub fn get(&self, key: &str) -> &str {
        self.root.get(key)
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.root.lookup(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.root.has(key)
    }

    pub fn root(&self) -> &Section {
        &self.root
    }

    /// Section `name`, or an empty section when there is none, so lookups
    /// can be chained.
    pub fn section(&self, name: &str) -> &Section {
        self.sections.get(name).unwrap_or(&EMPTY_SECTION)
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Named sections sorted by name. The root section is not included.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &Section)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty() && self.sections.is_empty()
    }

    /// Reads lines until EOF. A read error also ends the input; whatever was
    /// parsed up to that point is returned.
    pub fn from_reader<R: BufRead>(mut reader: R) -> Self {
        let mut doc = Document::default();
        let mut cursor = Cursor::Root;
        let mut buf = Vec::new();
        let mut line_no = 0usize;

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(line = line_no + 1, error = %e, "read failed, treating as end of input");
                    break;
                }
            }
            line_no += 1;

            let text = String::from_utf8_lossy(&buf);
            let raw = text.strip_suffix('\n').unwrap_or(&text);
            let raw = raw.strip_suffix('\r').unwrap_or(raw);
            doc.apply(&mut cursor, line_no, raw);
        }

        debug!(
            lines = line_no,
            root_keys = doc.root.len(),
            sections = doc.sections.len(),
            "config parsed"
        );
        doc
    }

    pub fn parse(text: &str) -> Self {
        Self::from_reader(text.as_bytes())
    }

    fn apply(&mut self, cursor: &mut Cursor, line_no: usize, raw: &str) {
        match classify(raw) {
            Line::Skip => {
                let content = raw.split_once('#').map_or(raw, |(before, _)| before);
                if !content.trim().is_empty() {
                    debug!(line = line_no, "ignoring line without '='");
                }
            }
            Line::Section(name) => {
                trace!(line = line_no, section = name, "section header");
                *cursor = Cursor::Named(name.to_string());
            }
            Line::Pair { key, value } => {
                trace!(line = line_no, key, "pair");
                match cursor {
                    Cursor::Root => {
                        let resolved = resolve(value, Some(&self.root), &self.root);
                        self.root.insert(key.to_string(), resolved);
                    }
                    Cursor::Named(name) => {
                        let current = self.sections.get(name.as_str());
                        let resolved = resolve(value, current, &self.root);
                        self.sections
                            .entry(name.clone())
                            .or_default()
                            .insert(key.to_string(), resolved);
                    }
                }
            }
        }
    }
}

impl FromStr for Document {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Renders the document in the same format it is read from: root pairs
/// first, then one block per section.
impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.root.iter() {
            writeln!(f, "{}={}", key, value)?;
        }
        for (i, (name, section)) in self.sections().enumerate() {
            if i > 0 || !self.root.is_empty() {
                writeln!(f)?;
            }
            writeln!(f, "[{}]", name)?;
            for (key, value) in section.iter() {
                writeln!(f, "{}={}", key, value)?;
            }
        }
        Ok(())
    }
}

/// Opens `path` and parses it. Failing to open the file is the only error.
pub fn load(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    debug!(path = %path.display(), "loading config");
    let file = File::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Document::from_reader(BufReader::new(file)))
}
