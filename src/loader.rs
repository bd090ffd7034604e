// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! Utilities for reading rules from files and readers.

use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

/// A wrapper over a reader providing support for reading multi-line
/// rules as well as tracking the line number.
pub struct Loader {
    /// The path of the file being read. May be None if the loader was
    /// created from a reader.
    pub path: Option<String>,
    /// Last line number read. First line is 1.
    pub lineno: usize,
    reader: Box<dyn BufRead + 'static>,
}

impl Loader {
    /// Read the next line, joining lines continued with a trailing `\`.
    ///
    /// A non-UTF-8 byte sequence surfaces as an `InvalidData` error from
    /// the underlying reader.
    pub fn next_line(&mut self) -> Result<Option<String>, std::io::Error> {
        let mut buf = String::new();
        for line in self.reader.by_ref().lines() {
            self.lineno += 1;
            let line = line?;
            if !line.trim().ends_with('\\') {
                if buf.is_empty() {
                    return Ok(Some(line));
                } else {
                    buf.push_str(&line);
                    return Ok(Some(buf));
                }
            } else {
                buf.push_str(&line[0..line.len() - 1]);
            }
        }
        Ok(None)
    }

    /// Read the next rule candidate, skipping blank lines and comments.
    pub fn next_rule(&mut self) -> Result<Option<String>, std::io::Error> {
        while let Some(line) = self.next_line()? {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return Ok(Some(line));
        }
        Ok(None)
    }
}

/// Create a loader from a filename.
pub fn from_filename<P: AsRef<Path>>(path: P) -> Result<Loader, std::io::Error> {
    let path: &Path = path.as_ref();
    let file = File::open(path)?;
    Ok(from_reader(file, Some(path.display().to_string())))
}

/// Create a loader from a reader.
pub fn from_reader<R: Read + 'static>(reader: R, path: Option<String>) -> Loader {
    Loader {
        path,
        reader: Box::new(BufReader::new(reader)),
        lineno: 0,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_multiline() {
        let input = "alert tcp any any -> any any \\\n(sid:1;)\n";
        let mut loader = from_reader(input.as_bytes(), None);
        let line = loader.next_line().unwrap().unwrap();
        assert_eq!(line, "alert tcp any any -> any any (sid:1;)");
        assert_eq!(loader.lineno, 2);
        assert!(loader.next_line().unwrap().is_none());
    }

    #[test]
    fn test_next_rule_skips_comments() {
        let input = "# a comment\n\nalert tcp any any -> any any (sid:1;)\n";
        let mut loader = from_reader(input.as_bytes(), None);
        let rule = loader.next_rule().unwrap().unwrap();
        assert!(rule.starts_with("alert"));
        assert!(loader.next_rule().unwrap().is_none());
    }

    #[test]
    fn test_invalid_utf8() {
        let input: &[u8] = b"alert \xff\xfe tcp\n";
        let mut loader = from_reader(input, None);
        assert!(loader.next_line().is_err());
    }
}
