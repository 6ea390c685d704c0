//! Emits Hack assembly for a sequence of VM commands, tracking per-function
//! state (labels, goto destinations, inferred parameter count) and the
//! program-wide function/call bookkeeping validated at `close`.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::command::{ArithmeticOp, Command, Segment};
use crate::error::N2tError;

struct FunctionState {
    name: String,
    defined_labels: HashSet<String>,
    goto_destinations: HashSet<String>,
    inferred_parameters: i16,
}

pub struct CodeWriter {
    temp_file: NamedTempFile,
    final_path: PathBuf,
    current_input_filename: String,
    current_function: Option<FunctionState>,
    defined_functions: HashMap<String, i16>,
    called_functions: Vec<(String, i16, String, u32)>,
    next_label_id: u32,
    closed: bool,
    location: (String, u32),
}

impl CodeWriter {
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
        Ok(CodeWriter {
            temp_file,
            final_path,
            current_input_filename: String::new(),
            current_function: None,
            defined_functions: HashMap::new(),
            called_functions: Vec::new(),
            next_label_id: 0,
            closed: false,
            location: (String::new(), 0),
        })
    }

    /// Records the file and line of the next command to be written, so
    /// that any error it raises is reported with that context.
    pub fn set_location(&mut self, file: &str, line: u32) {
        self.location = (file.to_string(), line);
    }

    /// Sets the filename prefix used to namespace `static` segment symbols.
    /// Must be called between functions (not mid-function), same as the
    /// entry into any new function.
    pub fn set_file_name(&mut self, input_filename: &str) -> Result<(), N2tError> {
        self.validate_function()?;
        let stem = input_filename
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(input_filename);
        self.current_input_filename = stem.to_string();
        Ok(())
    }

    /// Emits the bootstrap sequence: `SP = 256; call Sys.init 0`.
    pub fn write_init(&mut self) -> Result<(), N2tError> {
        self.emit_lines(&["@256", "D=A", "@SP", "M=D"]);
        self.write_call("Sys.init", 0)
    }

    pub fn write_command(&mut self, command: &Command) -> Result<(), N2tError> {
        match command {
            Command::Arithmetic(op) => self.write_arithmetic(op),
            Command::Push(segment, index) => self.write_push(segment, *index),
            Command::Pop(segment, index) => self.write_pop(segment, *index),
            Command::Label(label) => self.write_label(label),
            Command::Goto(label) => self.write_goto(label),
            Command::If(label) => self.write_if(label),
            Command::Function(name, n_locals) => self.write_function(name, *n_locals),
            Command::Return => self.write_return(),
            Command::Call(name, n_args) => self.write_call(name, *n_args),
        }
    }

    fn write_arithmetic(&mut self, op: &ArithmeticOp) -> Result<(), N2tError> {
        match op {
            ArithmeticOp::Neg => self.emit_lines(&["@SP", "A=M-1", "M=-M"]),
            ArithmeticOp::Not => self.emit_lines(&["@SP", "A=M-1", "M=!M"]),
            ArithmeticOp::Add => {
                self.pop_to_d();
                self.emit_lines(&["A=A-1", "M=D+M"]);
            }
            ArithmeticOp::Sub => {
                self.pop_to_d();
                self.emit_lines(&["A=A-1", "M=M-D"]);
            }
            ArithmeticOp::And => {
                self.pop_to_d();
                self.emit_lines(&["A=A-1", "M=D&M"]);
            }
            ArithmeticOp::Or => {
                self.pop_to_d();
                self.emit_lines(&["A=A-1", "M=D|M"]);
            }
            ArithmeticOp::Eq | ArithmeticOp::Gt | ArithmeticOp::Lt => {
                let jump = match op {
                    ArithmeticOp::Eq => "JEQ",
                    ArithmeticOp::Gt => "JGT",
                    ArithmeticOp::Lt => "JLT",
                    _ => unreachable!(),
                };
                self.pop_to_d();
                let label = self.make_numbered_label("LOGIC");
                self.emit_lines(&["A=A-1", "D=M-D", "M=-1"]);
                self.emit(&format!("@{label}"));
                self.emit(&format!("D;{jump}"));
                self.emit_lines(&["@SP", "A=M-1", "M=0"]);
                self.emit(&format!("({label})"));
            }
        }
        Ok(())
    }

    fn write_push(&mut self, segment: &Segment, index: i16) -> Result<(), N2tError> {
        match segment {
            Segment::Constant => {
                self.emit(&format!("@{index}"));
                self.emit("D=A");
            }
            Segment::Static => {
                self.emit(&format!("@{}.{index}", self.current_input_filename));
                self.emit("D=M");
            }
            Segment::Pointer => {
                self.emit(&format!("@R{}", 3 + index));
                self.emit("D=M");
            }
            Segment::Temp => {
                self.emit(&format!("@R{}", 5 + index));
                self.emit("D=M");
            }
            _ => {
                let base = self.indirect_base(segment);
                self.note_argument_reference(segment, index);
                self.load_indirect_address(&base, index);
                self.emit("D=M");
            }
        }
        self.push_from_d();
        Ok(())
    }

    fn write_pop(&mut self, segment: &Segment, index: i16) -> Result<(), N2tError> {
        if *segment == Segment::Constant {
            return Err(self.scoped_error("cannot pop to the constant segment"));
        }

        let mut symbol = match segment {
            Segment::Static => format!("{}.{index}", self.current_input_filename),
            Segment::Pointer => format!("R{}", 3 + index),
            Segment::Temp => format!("R{}", 5 + index),
            _ => self.indirect_base(segment),
        };

        let indirect = matches!(
            segment,
            Segment::Argument | Segment::Local | Segment::This | Segment::That
        );

        if indirect {
            self.note_argument_reference(segment, index);
            if index > 1 {
                self.emit(&format!("@{symbol}"));
                self.emit("D=M");
                self.emit(&format!("@{index}"));
                self.emit("D=D+A");
                self.emit("@R13");
                self.emit("M=D");
                symbol = "R13".to_string();
            }
        }

        self.pop_to_d();

        self.emit(&format!("@{symbol}"));
        if indirect {
            self.emit(if index == 1 { "A=M+1" } else { "A=M" });
        }
        self.emit("M=D");
        Ok(())
    }

    fn indirect_base(&self, segment: &Segment) -> String {
        match segment {
            Segment::Argument => "ARG".to_string(),
            Segment::Local => "LCL".to_string(),
            Segment::This => "THIS".to_string(),
            Segment::That => "THAT".to_string(),
            _ => unreachable!(),
        }
    }

    fn load_indirect_address(&mut self, base: &str, index: i16) {
        if index > 1 {
            self.emit(&format!("@{base}"));
            self.emit("D=M");
            self.emit(&format!("@{index}"));
            self.emit("A=D+A");
        } else {
            self.emit(&format!("@{base}"));
            self.emit(if index == 1 { "A=M+1" } else { "A=M" });
        }
    }

    fn note_argument_reference(&mut self, segment: &Segment, index: i16) {
        if *segment == Segment::Argument {
            if let Some(function) = &mut self.current_function {
                function.inferred_parameters = function.inferred_parameters.max(index + 1);
            }
        }
    }

    fn write_label(&mut self, label: &str) -> Result<(), N2tError> {
        if label.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            return Err(self.scoped_error(&format!("label \"{label}\" begins with a digit")));
        }
        let inserted = match &mut self.current_function {
            Some(function) => function.defined_labels.insert(label.to_string()),
            None => true,
        };
        if !inserted {
            return Err(self.scoped_error(&format!("label \"{label}\" already exists")));
        }
        let qualified = self.make_label(label);
        self.emit(&format!("({qualified})"));
        Ok(())
    }

    fn write_goto(&mut self, label: &str) -> Result<(), N2tError> {
        if let Some(function) = &mut self.current_function {
            function.goto_destinations.insert(label.to_string());
        }
        let qualified = self.make_label(label);
        self.emit(&format!("@{qualified}"));
        self.emit("0;JMP");
        Ok(())
    }

    fn write_if(&mut self, label: &str) -> Result<(), N2tError> {
        if let Some(function) = &mut self.current_function {
            function.goto_destinations.insert(label.to_string());
        }
        self.pop_to_d();
        let qualified = self.make_label(label);
        self.emit(&format!("@{qualified}"));
        self.emit("D;JNE");
        Ok(())
    }

    fn write_function(&mut self, name: &str, n_locals: i16) -> Result<(), N2tError> {
        self.validate_function()?;

        if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            return Err(self.scoped_error(&format!("function name \"{name}\" begins with a digit")));
        }
        if self.defined_functions.contains_key(name) {
            return Err(self.scoped_error(&format!("function \"{name}\" already exists")));
        }

        self.current_function = Some(FunctionState {
            name: name.to_string(),
            defined_labels: HashSet::new(),
            goto_destinations: HashSet::new(),
            inferred_parameters: 0,
        });

        self.emit(&format!("({name})"));
        if n_locals > 0 {
            self.emit("D=0");
        }
        for _ in 0..n_locals {
            self.push_from_d();
        }
        Ok(())
    }

    fn write_return(&mut self) -> Result<(), N2tError> {
        if self.current_function.is_none() {
            return Err(self.scoped_error("return command outside of a function"));
        }

        self.emit_lines(&["@LCL", "D=M", "@5", "D=D-A", "@R13", "AM=D"]);
        self.emit_lines(&["D=M", "@R14", "M=D"]);

        self.pop_to_d();
        self.emit_lines(&["@ARG", "A=M", "M=D"]);
        self.emit_lines(&["@ARG", "D=M+1", "@SP", "M=D"]);

        for seg in ["LCL", "ARG", "THIS", "THAT"] {
            self.emit("@R13");
            self.emit("AM=M+1");
            self.emit("D=M");
            self.emit(&format!("@{seg}"));
            self.emit("M=D");
        }

        self.emit_lines(&["@R14", "A=M", "0;JMP"]);
        Ok(())
    }

    fn write_call(&mut self, name: &str, n_args: i16) -> Result<(), N2tError> {
        self.called_functions
            .push((name.to_string(), n_args, self.location.0.clone(), self.location.1));
        let label = self.make_numbered_label("RETURN");

        self.emit(&format!("@{label}"));
        self.emit("D=A");
        self.push_from_d();

        for seg in ["LCL", "ARG", "THIS", "THAT"] {
            self.emit(&format!("@{seg}"));
            self.emit("D=M");
            self.push_from_d();
        }

        let saved_state_size = 5;
        self.emit_lines(&["@SP", "D=M"]);
        self.emit(&format!("@{}", n_args + saved_state_size));
        self.emit_lines(&["D=D-A", "@ARG", "M=D"]);
        self.emit_lines(&["@SP", "D=M", "@LCL", "M=D"]);

        self.emit(&format!("@{name}"));
        self.emit("0;JMP");
        self.emit(&format!("({label})"));
        Ok(())
    }

    /// Closes out the current function's validation and, if no error
    /// occurred, checks every recorded call against the defined-function
    /// table, then persists the output at its final path.
    pub fn close(mut self) -> Result<(), N2tError> {
        self.validate_function()?;
        self.validate_function_calls()?;
        self.closed = true;
        self.temp_file
            .persist(&self.final_path)
            .map_err(|e| N2tError::WriteFile {
                path: self.final_path.clone(),
                source: e.error,
            })?;
        Ok(())
    }

    fn validate_function(&mut self) -> Result<(), N2tError> {
        if let Some(function) = self.current_function.take() {
            for destination in &function.goto_destinations {
                if !function.defined_labels.contains(destination) {
                    return Err(N2tError::semantic(
                        self.location.0.clone(),
                        self.location.1,
                        format!(
                            "undefined reference to label \"{destination}\" in function \"{}\"",
                            function.name
                        ),
                    ));
                }
            }
            self.defined_functions
                .insert(function.name, function.inferred_parameters);
        }
        self.next_label_id = 0;
        Ok(())
    }

    fn validate_function_calls(&self) -> Result<(), N2tError> {
        for (name, n_args, file, line) in &self.called_functions {
            let declared = self.defined_functions.get(name).ok_or_else(|| {
                N2tError::semantic(file.clone(), *line, format!("undefined reference to function \"{name}\""))
            })?;
            if n_args < declared {
                return Err(N2tError::semantic(
                    file.clone(),
                    *line,
                    format!(
                        "function \"{name}\" requires at least {declared} argument(s) but called with {n_args}"
                    ),
                ));
            }
        }
        Ok(())
    }

    fn push_from_d(&mut self) {
        self.emit_lines(&["@SP", "AM=M+1", "A=A-1", "M=D"]);
    }

    fn pop_to_d(&mut self) {
        self.emit_lines(&["@SP", "AM=M-1", "D=M"]);
    }

    fn make_label(&self, label: &str) -> String {
        match &self.current_function {
            Some(function) => format!("{}${}", function.name, label),
            None => format!("${label}"),
        }
    }

    fn make_numbered_label(&mut self, label: &str) -> String {
        let id = self.next_label_id;
        self.next_label_id += 1;
        match &self.current_function {
            Some(function) => format!("{}${}{}", function.name, label, id),
            None => format!("${label}{id}"),
        }
    }

    fn scoped_error(&self, message: &str) -> N2tError {
        let (file, line) = (self.location.0.clone(), self.location.1);
        match &self.current_function {
            Some(function) => {
                N2tError::semantic(file, line, format!("{message} in function \"{}\"", function.name))
            }
            None => N2tError::semantic(file, line, message),
        }
    }

    fn emit(&mut self, line: &str) {
        let _ = writeln!(self.temp_file, "{line}");
    }

    fn emit_lines(&mut self, lines: &[&str]) {
        for line in lines {
            self.emit(line);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    fn writer_at(dir: &Path) -> CodeWriter {
        CodeWriter::create(dir.join("out.asm")).unwrap()
    }

    fn read_output(dir: &Path) -> String {
        std::fs::read_to_string(dir.join("out.asm")).unwrap()
    }

    #[test]
    fn add_emits_expected_tail() {
        let dir = tempdir().unwrap();
        let mut writer = writer_at(dir.path());
        writer.write_command(&Command::Push(Segment::Constant, 7)).unwrap();
        writer.write_command(&Command::Push(Segment::Constant, 8)).unwrap();
        writer.write_command(&Command::Arithmetic(ArithmeticOp::Add)).unwrap();
        writer.close().unwrap();
        let output = read_output(dir.path());
        assert!(output.ends_with("@SP\nAM=M-1\nD=M\nA=A-1\nM=D+M\n"));
    }

    #[test]
    fn undefined_goto_fails_at_close() {
        let dir = tempdir().unwrap();
        let mut writer = writer_at(dir.path());
        writer.write_function("Foo.bar", 0).unwrap();
        writer.write_goto("end").unwrap();
        assert!(writer.close().is_err());
    }

    #[test]
    fn duplicate_label_in_function_fails() {
        let dir = tempdir().unwrap();
        let mut writer = writer_at(dir.path());
        writer.write_function("Foo.bar", 0).unwrap();
        writer.write_label("loop").unwrap();
        assert!(writer.write_label("loop").is_err());
    }

    #[test]
    fn call_to_undeclared_function_fails_at_close() {
        let dir = tempdir().unwrap();
        let mut writer = writer_at(dir.path());
        writer.write_function("Main.main", 0).unwrap();
        writer.write_call("Foo.missing", 1).unwrap();
        assert!(writer.close().is_err());
    }

    #[test]
    fn call_with_insufficient_arguments_fails() {
        let dir = tempdir().unwrap();
        let mut writer = writer_at(dir.path());
        writer.write_function("Foo.needsTwo", 0).unwrap();
        writer.write_command(&Command::Push(Segment::Argument, 1)).unwrap();
        writer.write_return().unwrap();
        writer.write_function("Main.main", 0).unwrap();
        writer.write_call("Foo.needsTwo", 1).unwrap();
        assert!(writer.close().is_err());
    }

    #[test]
    fn return_outside_function_fails() {
        let dir = tempdir().unwrap();
        let mut writer = writer_at(dir.path());
        assert!(writer.write_return().is_err());
    }

    #[test]
    fn failed_close_leaves_no_output_file() {
        let dir = tempdir().unwrap();
        let mut writer = writer_at(dir.path());
        writer.write_function("Foo.bar", 0).unwrap();
        writer.write_goto("nope").unwrap();
        assert!(writer.close().is_err());
        assert!(!dir.path().join("out.asm").exists());
    }
}
