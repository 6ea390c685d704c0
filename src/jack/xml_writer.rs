//! Optional parse-tree XML dump, grounded in the original compiler's
//! `XmlWriter`: nested `<element>` tags with two-space indentation and
//! escaped `<`, `>`, `&` in symbol payloads.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::N2tError;
use crate::jack::tokenizer::Keyword;

pub struct XmlWriter {
    temp_file: NamedTempFile,
    final_path: PathBuf,
    indent: String,
    open_elements: Vec<String>,
}

impl XmlWriter {
    pub fn create(final_path: impl Into<PathBuf>) -> Result<Self, N2tError> {
        let final_path = final_path.into();
        let dir = final_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp_file = NamedTempFile::new_in(dir).map_err(|source| N2tError::WriteFile {
            path: final_path.clone(),
            source,
        })?;
        let _ = writeln!(temp_file, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        Ok(XmlWriter {
            temp_file,
            final_path,
            indent: String::new(),
            open_elements: Vec::new(),
        })
    }

    pub fn begin_element(&mut self, name: &str) {
        let _ = writeln!(self.temp_file, "{}<{name}>", self.indent);
        self.indent.push_str("  ");
        self.open_elements.push(name.to_string());
    }

    pub fn end_element(&mut self) {
        self.indent.truncate(self.indent.len() - 2);
        let name = self.open_elements.pop().expect("unbalanced XML elements");
        let _ = writeln!(self.temp_file, "{}</{name}>", self.indent);
    }

    pub fn write_keyword(&mut self, keyword: Keyword) {
        self.write_leaf("keyword", keyword.as_str());
    }

    pub fn write_symbol(&mut self, symbol: char) {
        let escaped = match symbol {
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '&' => "&amp;".to_string(),
            c => c.to_string(),
        };
        self.write_leaf("symbol", &escaped);
    }

    pub fn write_identifier(&mut self, identifier: &str) {
        self.write_leaf("identifier", identifier);
    }

    pub fn write_integer_constant(&mut self, value: i16) {
        self.write_leaf("integerConstant", &value.to_string());
    }

    pub fn write_string_constant(&mut self, value: &str) {
        self.write_leaf("stringConstant", value);
    }

    fn write_leaf(&mut self, tag: &str, value: &str) {
        let _ = writeln!(self.temp_file, "{}<{tag}> {value} </{tag}>", self.indent);
    }

    pub fn close(self) -> Result<(), N2tError> {
        self.temp_file
            .persist(&self.final_path)
            .map_err(|e| N2tError::WriteFile {
                path: self.final_path.clone(),
                source: e.error,
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn nests_elements_with_indentation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Foo.xml");
        let mut writer = XmlWriter::create(&path).unwrap();
        writer.begin_element("class");
        writer.write_keyword(Keyword::Class);
        writer.end_element();
        writer.close().unwrap();

        let out = std::fs::read_to_string(&path).unwrap();
        assert!(out.contains("<class>\n  <keyword> class </keyword>\n</class>\n"));
    }

    #[test]
    fn escapes_angle_brackets_and_ampersand() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Foo.xml");
        let mut writer = XmlWriter::create(&path).unwrap();
        writer.write_symbol('<');
        writer.write_symbol('&');
        writer.close().unwrap();

        let out = std::fs::read_to_string(&path).unwrap();
        assert!(out.contains("&lt;"));
        assert!(out.contains("&amp;"));
    }
}
