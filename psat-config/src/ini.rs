//! A small reader for the INI-style configuration format described in §6.
//!
//! Mirrors the shape of the original solver's hand-rolled `INIParser`: `;`-prefixed lines and
//! blank lines are skipped, `[section]` opens a new section (the implicit section before the
//! first header is `global`), and `key = value` pairs (whitespace around `=` trimmed) are
//! recorded against the currently open section. Malformed lines — no `=`, an empty key, or an
//! empty value — are dropped rather than rejected, matching the original parser.

use std::io::{self, BufRead};

use thiserror::Error;

/// I/O failure while reading a configuration file. Malformed *content* is never an error here —
/// see the module docs — only reading the underlying stream can fail.
#[derive(Debug, Error)]
pub enum IniError {
    #[error("i/o error reading configuration file: {0}")]
    Io(#[from] io::Error),
}

/// One `key = value` pair, tagged with the section it was read from and its source line.
#[derive(Debug, Clone)]
pub struct IniEntry {
    pub section: String,
    pub key: String,
    pub value: String,
    pub line: usize,
}

/// Read every `key = value` pair out of an INI-style file.
pub fn parse(reader: impl BufRead) -> Result<Vec<IniEntry>, IniError> {
    let mut entries = vec![];
    let mut section = String::from("global");

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end();

        if line.is_empty() || line.starts_with(';') {
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            let name: String = rest
                .chars()
                .take_while(|&c| c != ']')
                .filter(|c| !c.is_whitespace())
                .collect();
            if !name.is_empty() {
                section = name;
            }
            continue;
        }

        let content = match line.find(';') {
            Some(comment_at) => &line[..comment_at],
            None => line,
        };

        let mut key = String::new();
        let mut value = String::new();
        let mut eq_found = false;
        for c in content.chars() {
            if c == '=' {
                eq_found = true;
            } else if !c.is_whitespace() {
                if eq_found {
                    value.push(c);
                } else {
                    key.push(c);
                }
            }
        }

        if !key.is_empty() && !value.is_empty() {
            entries.push(IniEntry {
                section: section.clone(),
                key,
                value,
                line: line_no + 1,
            });
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_and_comments() {
        let text = b"; a comment\n[solver0]\nmaxFreeze = 10\n\n[global]\nncores=max\n";
        let entries = parse(&text[..]).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].section, "solver0");
        assert_eq!(entries[0].key, "maxFreeze");
        assert_eq!(entries[0].value, "10");
        assert_eq!(entries[1].section, "global");
        assert_eq!(entries[1].value, "max");
    }

    #[test]
    fn implicit_global_section() {
        let text = b"deterministic = true\n";
        let entries = parse(&text[..]).unwrap();
        assert_eq!(entries[0].section, "global");
    }

    #[test]
    fn malformed_lines_are_dropped() {
        let text = b"[default]\nno-equals-sign\n= novalue\nnokey =\nusePsm = false\n";
        let entries = parse(&text[..]).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "usePsm");
    }
}
