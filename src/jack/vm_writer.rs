//! Thin text emitter for Jack-compiled VM commands. Same RAII discipline
//! as the Hack assembler's output: acquired at construction, removed on
//! any path that doesn't reach `close`.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::N2tError;
use crate::vm_translate::command::{ArithmeticOp, Segment};

pub struct VmWriter {
    temp_file: NamedTempFile,
    final_path: PathBuf,
}

impl VmWriter {
    pub fn create(final_path: impl Into<PathBuf>) -> Result<Self, N2tError> {
        let final_path = final_path.into();
        let dir = final_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let temp_file = NamedTempFile::new_in(dir).map_err(|source| N2tError::WriteFile {
            path: final_path.clone(),
            source,
        })?;
        Ok(VmWriter { temp_file, final_path })
    }

    pub fn write_push(&mut self, segment: Segment, index: i16) {
        self.emit(&format!("push {} {index}", segment.name()));
    }

    pub fn write_pop(&mut self, segment: Segment, index: i16) {
        self.emit(&format!("pop {} {index}", segment.name()));
    }

    pub fn write_arithmetic(&mut self, op: ArithmeticOp) {
        self.emit(op.word());
    }

    pub fn write_label(&mut self, label: &str) {
        self.emit(&format!("label {label}"));
    }

    pub fn write_goto(&mut self, label: &str) {
        self.emit(&format!("goto {label}"));
    }

    pub fn write_if(&mut self, label: &str) {
        self.emit(&format!("if-goto {label}"));
    }

    pub fn write_function(&mut self, name: &str, n_locals: i16) {
        self.emit(&format!("function {name} {n_locals}"));
    }

    pub fn write_call(&mut self, name: &str, n_args: i16) {
        self.emit(&format!("call {name} {n_args}"));
    }

    pub fn write_return(&mut self) {
        self.emit("return");
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

    fn emit(&mut self, line: &str) {
        let _ = writeln!(self.temp_file, "{line}");
    }
}
