//! Two-pass assembler driver: symbol collection, then code emission.
//!
//! The output file is acquired on construction and only lands at its final
//! path if assembly completes; any error drops the partially written file,
//! mirroring the "acquire owned resource, guarantee cleanup" discipline used
//! throughout this toolchain's output-producing components.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::code;
use super::parser::{Command, Parser};
use super::symbol_table::{SymbolTable, FIRST_VARIABLE_ADDRESS, RAM_CEILING, ROM_CEILING};
use crate::error::N2tError;

pub struct Assembler {
    final_path: PathBuf,
    temp_file: NamedTempFile,
}

impl Assembler {
    /// Acquires the output file for `final_path`, creating a sibling
    /// temporary file that is promoted only on success.
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
        Ok(Assembler {
            final_path,
            temp_file,
        })
    }

    /// Assembles `source` (whose commands are reported as coming from
    /// `file_name`) and, on success, persists the output at the final path.
    /// On failure the temporary file is dropped (and thus removed) without
    /// touching the final path.
    pub fn assemble(mut self, source: &str, file_name: &str) -> Result<(), N2tError> {
        let symbols = first_pass(source, file_name)?;
        let lines = second_pass(source, file_name, symbols)?;

        for line in &lines {
            writeln!(self.temp_file, "{line}").map_err(|source| N2tError::WriteFile {
                path: self.final_path.clone(),
                source,
            })?;
        }

        self.temp_file
            .persist(&self.final_path)
            .map_err(|e| N2tError::WriteFile {
                path: self.final_path.clone(),
                source: e.error,
            })?;
        Ok(())
    }
}

/// Pass 1: binds every `L`-command's label to the ROM address of the
/// following instruction. `A`/`C` commands merely advance the ROM counter.
fn first_pass(source: &str, file_name: &str) -> Result<SymbolTable, N2tError> {
    let mut symbols = SymbolTable::new();
    let mut parser = Parser::new(source, file_name);
    let mut rom_address: i32 = 0;

    while let Some(result) = parser.advance() {
        let (command, line) = result?;
        match command {
            Command::L(label) => {
                if label.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                    return Err(N2tError::syntax(
                        file_name,
                        line,
                        format!("label \"{label}\" may not start with a digit"),
                    ));
                }
                symbols.add_entry(&label, rom_address).map_err(|_| {
                    N2tError::semantic(file_name, line, format!("duplicate label \"{label}\""))
                })?;
            }
            Command::A(_) | Command::C { .. } => {
                if rom_address >= ROM_CEILING {
                    return Err(N2tError::range("instruction count exceeds ROM ceiling"));
                }
                rom_address += 1;
            }
        }
    }

    Ok(symbols)
}

/// Pass 2: resolves every `A`-command's symbol (allocating a fresh RAM
/// address if unseen) and emits one 16-character binary line per `A`/`C`
/// command.
fn second_pass(source: &str, file_name: &str, mut symbols: SymbolTable) -> Result<Vec<String>, N2tError> {
    let mut parser = Parser::new(source, file_name);
    let mut next_ram_address: i32 = FIRST_VARIABLE_ADDRESS;
    let mut lines = Vec::new();

    while let Some(result) = parser.advance() {
        let (command, line) = result?;
        match command {
            Command::L(_) => {}
            Command::A(payload) => {
                let address = resolve_a_payload(
                    &payload,
                    &mut symbols,
                    &mut next_ram_address,
                    file_name,
                    line,
                )?;
                lines.push(code::to_binary_line(code::a_instruction(address as u16)));
            }
            Command::C { dest, comp, jump } => {
                let dest_code = code::dest(&dest)
                    .map_err(|_| N2tError::syntax(file_name, line, format!("invalid dest \"{dest}\"")))?;
                let comp_code = code::comp(&comp)
                    .map_err(|_| N2tError::syntax(file_name, line, format!("invalid comp \"{comp}\"")))?;
                let jump_code = code::jump(&jump)
                    .map_err(|_| N2tError::syntax(file_name, line, format!("invalid jump \"{jump}\"")))?;
                lines.push(code::to_binary_line(code::c_instruction(
                    comp_code, dest_code, jump_code,
                )));
            }
        }
    }

    Ok(lines)
}

fn resolve_a_payload(
    payload: &str,
    symbols: &mut SymbolTable,
    next_ram_address: &mut i32,
    file_name: &str,
    line: u32,
) -> Result<i32, N2tError> {
    if payload.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        let value: i32 = payload
            .parse()
            .map_err(|_| N2tError::syntax(file_name, line, format!("invalid address \"{payload}\"")))?;
        if !(0..=i32::from(i16::MAX)).contains(&value) {
            return Err(N2tError::range(format!("address {value} out of range")));
        }
        return Ok(value);
    }

    if let Some(address) = symbols.get_address(payload) {
        return Ok(address as i32);
    }

    if *next_ram_address > RAM_CEILING {
        return Err(N2tError::range("variable allocation exceeds RAM ceiling"));
    }
    let address = *next_ram_address;
    symbols
        .add_entry(payload, address)
        .map_err(|_| N2tError::semantic(file_name, line, format!("cannot allocate \"{payload}\"")))?;
    *next_ram_address += 1;
    Ok(address)
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    fn assemble_to_string(source: &str) -> String {
        let dir = tempdir().unwrap();
        let out_path = dir.path().join("out.hack");
        let assembler = Assembler::create(&out_path).unwrap();
        assembler.assemble(source, "test.asm").unwrap();
        std::fs::read_to_string(&out_path).unwrap()
    }

    #[test]
    fn minimal_a_instruction() {
        let out = assemble_to_string("@5\nD=A\n");
        assert_eq!(out, "0000000000000101\n1110110000010000\n");
    }

    #[test]
    fn symbolic_a_with_forward_label() {
        let out = assemble_to_string("@END\n0;JMP\n(END)\n");
        assert_eq!(out, "0000000000000010\n1110101010000111\n");
    }

    #[test]
    fn new_variable_allocation() {
        let out = assemble_to_string("@x\nM=D\n@y\nM=D\n");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "0000000000010000");
        assert_eq!(lines[2], "0000000000010001");
    }

    #[test]
    fn max_literal_address_is_accepted() {
        let out = assemble_to_string("@32767\nD=A\n");
        assert_eq!(out, "0111111111111111\n1110110000010000\n");
    }

    #[test]
    fn literal_address_past_int16_max_is_rejected() {
        let dir = tempdir().unwrap();
        let out_path = dir.path().join("out.hack");
        let assembler = Assembler::create(&out_path).unwrap();
        assert!(assembler.assemble("@32768\n", "test.asm").is_err());
        assert!(!out_path.exists());
    }

    #[test]
    fn duplicate_label_fails() {
        let dir = tempdir().unwrap();
        let out_path = dir.path().join("out.hack");
        let assembler = Assembler::create(&out_path).unwrap();
        let err = assembler.assemble("(LOOP)\n(LOOP)\n", "test.asm");
        assert!(err.is_err());
        assert!(!out_path.exists());
    }

    #[test]
    fn failed_assembly_leaves_no_output_file() {
        let dir = tempdir().unwrap();
        let out_path = dir.path().join("out.hack");
        let assembler = Assembler::create(&out_path).unwrap();
        assert!(assembler.assemble("@\n", "test.asm").is_err());
        assert!(!out_path.exists());
    }
}
