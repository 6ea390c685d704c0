//! File-reading wrapper over the parser/code-writer pair: translates one
//! `.vm` file or a whole directory of them into a single `.asm` output.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::code_writer::CodeWriter;
use super::parser::Parser;
use crate::error::N2tError;

/// Translates a single `.vm` file. No bootstrap code is emitted; this is
/// the single-file form used when the input is one `.vm` file (§6.2).
pub fn translate_file(input: &Path, output: &Path) -> Result<(), N2tError> {
    translate_files(&[input.to_path_buf()], output, false)
}

/// Translates every `.vm` file under `inputs` into one `.asm` file at
/// `output`. When `with_init` is set, the bootstrap sequence (`SP=256;
/// call Sys.init 0`) is emitted first, as required whenever the input is
/// a directory (multiple source files, §6.2).
pub fn translate_files(inputs: &[PathBuf], output: &Path, with_init: bool) -> Result<(), N2tError> {
    let mut writer = CodeWriter::create(output)?;

    if with_init {
        writer.write_init()?;
    }

    for path in inputs {
        let source = std::fs::read_to_string(path).map_err(|source| N2tError::ReadFile {
            path: path.clone(),
            source,
        })?;
        let file_name = path.to_string_lossy().into_owned();
        debug!(file = %file_name, "translating");

        writer.set_file_name(&file_name)?;
        let mut parser = Parser::new(&source, &file_name);
        while let Some(result) = parser.advance() {
            let (command, line) = result?;
            writer.set_location(&file_name, line);
            writer.write_command(&command)?;
        }
    }

    writer.close()
}

/// Collects the `.vm` files a directory input should translate, sorted
/// for reproducible output ordering.
pub fn collect_vm_files(dir: &Path) -> Result<Vec<PathBuf>, N2tError> {
    let entries = std::fs::read_dir(dir).map_err(|source| N2tError::ReadFile {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "vm"))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn single_file_has_no_bootstrap() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("Main.vm");
        std::fs::write(&input, "push constant 1\n").unwrap();
        let output = dir.path().join("Main.asm");

        translate_file(&input, &output).unwrap();
        let out = std::fs::read_to_string(&output).unwrap();
        assert!(!out.contains("Sys.init"));
    }

    #[test]
    fn directory_translation_emits_bootstrap_and_sorts_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Main.vm"), "function Main.main 0\npush constant 1\nreturn\n").unwrap();
        std::fs::write(dir.path().join("Sys.vm"), "function Sys.init 0\ncall Main.main 0\nreturn\n").unwrap();

        let files = collect_vm_files(dir.path()).unwrap();
        let output = dir.path().join("out.asm");
        translate_files(&files, &output, true).unwrap();

        let out = std::fs::read_to_string(&output).unwrap();
        assert!(out.starts_with("@256\nD=A\n@SP\nM=D\n"));
        assert!(out.contains("@Sys.init"));
    }
}
