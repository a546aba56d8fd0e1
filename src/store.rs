//! Section-keyed key-value store for persisted DH parameters
//!
//! DH parameter files are plain text: `[section]` headers where the section
//! name is a parameter OID, followed by `KEY=value` lines whose values are
//! base64 payloads (decoding is the DH layer's concern). Sections and keys
//! iterate in deterministic order.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;

/// In-memory view of a parameter file.
#[derive(Debug, Clone, Default)]
pub struct ParamStore {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the textual form. Lines that are neither section headers nor
    /// `KEY=value` pairs are skipped; keys outside any section are dropped.
    pub fn parse(text: &str) -> Self {
        let mut store = Self::new();
        let mut current: Option<String> = None;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                let name = line[1..line.len() - 1].trim().to_string();
                store.sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }
            if let (Some(section), Some(eq)) = (&current, line.find('=')) {
                let key = line[..eq].trim().to_string();
                let value = line[eq + 1..].trim().to_string();
                store
                    .sections
                    .get_mut(section)
                    .map(|s| s.insert(key, value));
            }
        }
        store
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (name, fields) in &self.sections {
            out.push('[');
            out.push_str(name);
            out.push_str("]\n");
            for (key, value) in fields {
                out.push_str(key);
                out.push('=');
                out.push_str(value);
                out.push('\n');
            }
        }
        out
    }

    pub fn has_key(&self, section: &str, key: &str) -> bool {
        self.sections
            .get(section)
            .map_or(false, |s| s.contains_key(key))
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(section).and_then(|s| s.get(key)).map(String::as_str)
    }

    pub fn set(&mut self, section: &str, key: &str, value: String) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sections_and_keys() {
        let text = "[0.0.8.235.0.3.43]\nPRIME=abc=\nGENERATOR=Ag==\n\n[other]\nPUBLIC=zz\n";
        let store = ParamStore::parse(text);
        assert_eq!(store.get("0.0.8.235.0.3.43", "PRIME"), Some("abc="));
        assert_eq!(store.get("0.0.8.235.0.3.43", "GENERATOR"), Some("Ag=="));
        assert_eq!(store.get("other", "PUBLIC"), Some("zz"));
        assert!(!store.has_key("other", "PRIME"));
        assert_eq!(store.sections().count(), 2);
    }

    #[test]
    fn test_comments_and_stray_lines_skipped() {
        let text = "# comment\nstray=dropped\n[s]\n; another\nKEY=v\nnot a pair\n";
        let store = ParamStore::parse(text);
        assert_eq!(store.sections().count(), 1);
        assert_eq!(store.get("s", "KEY"), Some("v"));
        assert!(!store.has_key("s", "stray"));
    }

    #[test]
    fn test_text_round_trip() {
        let mut store = ParamStore::new();
        store.set("sec", "PRIME", "AAEC".into());
        store.set("sec", "GENERATOR", "Ag==".into());
        let reparsed = ParamStore::parse(&store.to_text());
        assert_eq!(reparsed.get("sec", "PRIME"), Some("AAEC"));
        assert_eq!(reparsed.get("sec", "GENERATOR"), Some("Ag=="));
    }
}
