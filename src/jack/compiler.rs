//! Recursive-descent Jack compiler: drives the tokenizer, symbol table
//! and VM writer (and, optionally, an XML parse-tree dump) together
//! through one mutable `CompilationEngine`, exactly as a single class
//! maps to a single `.vm` output.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::N2tError;
use crate::jack::symbol_table::{SymbolTable, VariableKind};
use crate::jack::tokenizer::{Keyword, Token, Tokenizer};
use crate::jack::vm_writer::VmWriter;
use crate::jack::xml_writer::XmlWriter;
use crate::vm_translate::command::{ArithmeticOp, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubroutineKind {
    Constructor,
    Function,
    Method,
}

#[derive(Clone)]
struct SubroutineInfo {
    kind: SubroutineKind,
    is_void: bool,
    num_parameters: i16,
}

struct SubroutineCall {
    kind: SubroutineKind,
    name: String,
    num_arguments: i16,
    in_expression: bool,
}

pub struct CompilationEngine<'a> {
    tokenizer: Tokenizer<'a>,
    symbol_table: SymbolTable,
    vm_writer: VmWriter,
    xml_writer: Option<XmlWriter>,
    class_name: String,
    current_subroutine_name: String,
    current_subroutine: SubroutineInfo,
    defined_subroutines: HashMap<String, SubroutineInfo>,
    called_subroutines: Vec<SubroutineCall>,
    argument_counts: Vec<i16>,
    in_return_statement: bool,
    next_label_id: u32,
}

impl<'a> CompilationEngine<'a> {
    pub fn new(
        source: &'a str,
        input_filename: &str,
        vm_output_path: impl Into<PathBuf>,
        xml_output_path: Option<PathBuf>,
    ) -> Result<Self, N2tError> {
        let class_name = Path::new(input_filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let vm_writer = VmWriter::create(vm_output_path)?;
        let xml_writer = xml_output_path.map(XmlWriter::create).transpose()?;

        let mut tokenizer = Tokenizer::new(source, input_filename);
        tokenizer.advance()?;

        Ok(CompilationEngine {
            tokenizer,
            symbol_table: SymbolTable::new(),
            vm_writer,
            xml_writer,
            class_name,
            current_subroutine_name: String::new(),
            current_subroutine: SubroutineInfo {
                kind: SubroutineKind::Constructor,
                is_void: false,
                num_parameters: 0,
            },
            defined_subroutines: HashMap::new(),
            called_subroutines: Vec::new(),
            argument_counts: Vec::new(),
            in_return_statement: false,
            next_label_id: 0,
        })
    }

    pub fn compile_class(mut self) -> Result<(), N2tError> {
        self.xml_begin("class");

        self.expect_keyword(Keyword::Class)?;
        let class_name = self.compile_identifier("class")?;
        if class_name != self.class_name {
            return Err(self.err(&format!(
                "class name ({class_name}) does not match filename ({})",
                self.class_name
            )));
        }

        self.expect_symbol('{')?;
        while self.current_keyword_is_one_of(is_class_var_dec) {
            self.compile_class_var_dec()?;
        }
        while self.current_keyword_is_one_of(is_subroutine) {
            self.compile_subroutine()?;
        }
        self.expect_symbol('}')?;

        if self.tokenizer.has_more_tokens() {
            return Err(self.err("expected end of file"));
        }
        self.xml_end();

        self.validate_subroutine_calls()?;
        self.vm_writer.close()?;
        if let Some(xml_writer) = self.xml_writer {
            xml_writer.close()?;
        }
        Ok(())
    }

    fn compile_class_var_dec(&mut self) -> Result<(), N2tError> {
        self.xml_begin("classVarDec");
        let keyword = self.current_keyword()?;
        self.compile_var_dec_impl(keyword)?;
        self.xml_end();
        Ok(())
    }

    fn compile_subroutine(&mut self) -> Result<(), N2tError> {
        self.xml_begin("subroutineDec");
        self.symbol_table.start_subroutine();
        self.next_label_id = 0;

        let keyword = self.current_keyword()?;
        let kind = match keyword {
            Keyword::Constructor => SubroutineKind::Constructor,
            Keyword::Function => SubroutineKind::Function,
            Keyword::Method => SubroutineKind::Method,
            _ => unreachable!("caller only dispatches on subroutine keywords"),
        };
        self.expect_keyword(keyword)?;

        let return_type = self.compile_var_type(true)?;
        let is_void = return_type == "void";
        if kind == SubroutineKind::Constructor && return_type != self.class_name {
            return Err(self.err(&format!(
                "constructor return type ({return_type}) is not of the class type ({})",
                self.class_name
            )));
        }
        if kind == SubroutineKind::Method {
            self.symbol_table.define("this", &self.class_name.clone(), VariableKind::Argument)?;
        }

        let name = self.compile_identifier("subroutine")?;
        if self.defined_subroutines.contains_key(&name) {
            return Err(self.err(&format!("subroutine with name ({name}) already defined")));
        }

        self.current_subroutine_name = name.clone();
        self.current_subroutine = SubroutineInfo {
            kind,
            is_void,
            num_parameters: 0,
        };

        self.expect_symbol('(')?;
        self.compile_parameter_list()?;
        self.expect_symbol(')')?;

        self.compile_subroutine_body()?;

        self.defined_subroutines.insert(name, self.current_subroutine.clone());
        self.xml_end();
        Ok(())
    }

    fn compile_parameter_list(&mut self) -> Result<(), N2tError> {
        self.xml_begin("parameterList");
        if !self.peek_symbol(')') {
            self.compile_parameter()?;
            while self.expect_symbol_optional(',')? {
                self.compile_parameter()?;
            }
        }
        self.xml_end();
        Ok(())
    }

    fn compile_parameter(&mut self) -> Result<(), N2tError> {
        let var_type = self.compile_var_type(false)?;
        let name = self.compile_identifier("variable")?;
        self.symbol_table.define(&name, &var_type, VariableKind::Argument)?;
        self.current_subroutine.num_parameters += 1;
        Ok(())
    }

    fn compile_var_dec(&mut self) -> Result<(), N2tError> {
        self.xml_begin("varDec");
        self.compile_var_dec_impl(Keyword::Var)?;
        self.xml_end();
        Ok(())
    }

    fn compile_var_dec_impl(&mut self, kind_keyword: Keyword) -> Result<(), N2tError> {
        self.expect_keyword(kind_keyword)?;
        let kind = variable_kind_of(kind_keyword);
        let var_type = self.compile_var_type(false)?;
        let name = self.compile_identifier("variable")?;
        self.symbol_table.define(&name, &var_type, kind)?;
        while self.expect_symbol_optional(',')? {
            let name = self.compile_identifier("variable")?;
            self.symbol_table.define(&name, &var_type, kind)?;
        }
        self.expect_symbol(';')?;
        Ok(())
    }

    fn compile_var_type(&mut self, or_void: bool) -> Result<String, N2tError> {
        if matches!(self.tokenizer.token(), Token::Identifier(_)) {
            return self.compile_identifier("");
        }
        match self.tokenizer.token() {
            Token::Keyword(k) if is_var_type(*k, or_void) => {
                let k = *k;
                self.expect_keyword(k)?;
                Ok(k.as_str().to_string())
            }
            _ => Err(self.err(&format!("expected class name or variable type before {}", self.describe_token()))),
        }
    }

    fn compile_subroutine_body(&mut self) -> Result<(), N2tError> {
        self.xml_begin("subroutineBody");
        self.expect_symbol('{')?;
        while matches!(self.tokenizer.token(), Token::Keyword(Keyword::Var)) {
            self.compile_var_dec()?;
        }

        let function_name = format!("{}.{}", self.class_name, self.current_subroutine_name);
        self.vm_writer
            .write_function(&function_name, self.symbol_table.var_count(VariableKind::Local));

        match self.current_subroutine.kind {
            SubroutineKind::Constructor => {
                let num_fields = self.symbol_table.var_count(VariableKind::Field).max(1);
                self.vm_writer.write_push(Segment::Constant, num_fields);
                self.vm_writer.write_call("Memory.alloc", 1);
                self.vm_writer.write_pop(Segment::Pointer, 0);
            }
            SubroutineKind::Method => {
                self.vm_writer.write_push(Segment::Argument, 0);
                self.vm_writer.write_pop(Segment::Pointer, 0);
            }
            SubroutineKind::Function => {}
        }

        self.compile_statements()?;
        self.expect_symbol('}')?;
        self.xml_end();
        Ok(())
    }

    fn compile_statements(&mut self) -> Result<(), N2tError> {
        self.xml_begin("statements");
        while let Token::Keyword(keyword) = *self.tokenizer.token() {
            if !is_statement(keyword) {
                break;
            }
            match keyword {
                Keyword::Let => self.compile_let()?,
                Keyword::Do => self.compile_do()?,
                Keyword::If => self.compile_if()?,
                Keyword::While => self.compile_while()?,
                Keyword::Return => self.compile_return()?,
                _ => unreachable!(),
            }
        }
        self.xml_end();
        Ok(())
    }

    fn compile_let(&mut self) -> Result<(), N2tError> {
        self.xml_begin("letStatement");
        self.expect_keyword(Keyword::Let)?;
        let variable_name = self.compile_identifier("variable")?;
        let array_entry = self.peek_symbol('[');
        if array_entry {
            self.compile_array_entry(&variable_name)?;
        }
        self.expect_symbol('=')?;
        self.compile_expression()?;
        self.expect_symbol(';')?;

        if array_entry {
            self.vm_writer.write_pop(Segment::Temp, 0);
            self.vm_writer.write_pop(Segment::Pointer, 1);
            self.vm_writer.write_push(Segment::Temp, 0);
            self.vm_writer.write_pop(Segment::That, 0);
        } else {
            let kind = self.kind_of(&variable_name)?;
            let index = self.symbol_table.index_of(&variable_name)?;
            self.vm_writer.write_pop(segment_of(kind), index);
        }
        self.xml_end();
        Ok(())
    }

    fn compile_do(&mut self) -> Result<(), N2tError> {
        self.xml_begin("doStatement");
        self.expect_keyword(Keyword::Do)?;
        self.compile_subroutine_call(None)?;
        self.expect_symbol(';')?;
        self.vm_writer.write_pop(Segment::Temp, 0);
        self.xml_end();
        Ok(())
    }

    fn compile_if(&mut self) -> Result<(), N2tError> {
        self.xml_begin("ifStatement");
        self.expect_keyword(Keyword::If)?;
        self.expect_symbol('(')?;
        self.compile_expression()?;
        self.expect_symbol(')')?;

        self.vm_writer.write_arithmetic(ArithmeticOp::Not);
        let mut end_label = format!("IF{}", self.next_label());
        self.vm_writer.write_if(&end_label);
        self.expect_symbol('{')?;
        self.compile_statements()?;
        self.expect_symbol('}')?;

        if self.expect_keyword_optional(Keyword::Else)? {
            let else_label = end_label.clone();
            end_label = format!("IF{}", self.next_label());
            self.vm_writer.write_goto(&end_label);
            self.vm_writer.write_label(&else_label);
            self.expect_symbol('{')?;
            self.compile_statements()?;
            self.expect_symbol('}')?;
        }
        self.vm_writer.write_label(&end_label);
        self.xml_end();
        Ok(())
    }

    fn compile_while(&mut self) -> Result<(), N2tError> {
        self.xml_begin("whileStatement");
        let begin_label = format!("WHILE{}", self.next_label());
        self.vm_writer.write_label(&begin_label);
        self.expect_keyword(Keyword::While)?;
        self.expect_symbol('(')?;
        self.compile_expression()?;
        self.expect_symbol(')')?;

        self.vm_writer.write_arithmetic(ArithmeticOp::Not);
        let end_label = format!("WHILE{}", self.next_label());
        self.vm_writer.write_if(&end_label);
        self.expect_symbol('{')?;
        self.compile_statements()?;
        self.expect_symbol('}')?;
        self.vm_writer.write_goto(&begin_label);
        self.vm_writer.write_label(&end_label);
        self.xml_end();
        Ok(())
    }

    fn compile_return(&mut self) -> Result<(), N2tError> {
        self.xml_begin("returnStatement");
        self.in_return_statement = true;
        self.expect_keyword(Keyword::Return)?;

        if !self.peek_symbol(';') {
            if self.current_subroutine.is_void {
                return Err(self.err("void subroutine returns a value"));
            }
            self.compile_expression()?;
        } else {
            if self.current_subroutine.kind == SubroutineKind::Constructor {
                return Err(self.err("constructor does not return \"this\""));
            }
            if !self.current_subroutine.is_void {
                return Err(self.err("non-void subroutine does not return a value"));
            }
            self.vm_writer.write_push(Segment::Constant, 0);
        }
        self.expect_symbol(';')?;
        self.in_return_statement = false;
        self.vm_writer.write_return();
        self.xml_end();
        Ok(())
    }

    fn compile_expression(&mut self) -> Result<(), N2tError> {
        self.xml_begin("expression");
        self.compile_term()?;
        loop {
            let symbol = match self.tokenizer.token() {
                Token::Symbol(c) if is_binary_operator(*c) => *c,
                _ => break,
            };
            if self.in_return_statement && self.current_subroutine.kind == SubroutineKind::Constructor {
                return Err(self.err("constructor does not return \"this\""));
            }
            self.expect_symbol(symbol)?;
            self.compile_term()?;
            match symbol {
                '*' => self.vm_writer.write_call("Math.multiply", 2),
                '/' => self.vm_writer.write_call("Math.divide", 2),
                _ => self.vm_writer.write_arithmetic(arithmetic_command(symbol, false)?),
            }
        }
        self.xml_end();
        Ok(())
    }

    fn compile_term(&mut self) -> Result<(), N2tError> {
        self.xml_begin("term");
        let mut this_keyword = false;

        match self.tokenizer.token().clone() {
            Token::Keyword(keyword) if is_keyword_constant(keyword) => {
                self.expect_keyword(keyword)?;
                match keyword {
                    Keyword::True => {
                        self.vm_writer.write_push(Segment::Constant, 0);
                        self.vm_writer.write_arithmetic(ArithmeticOp::Not);
                    }
                    Keyword::False | Keyword::Null => {
                        self.vm_writer.write_push(Segment::Constant, 0);
                    }
                    Keyword::This => {
                        if self.current_subroutine.kind == SubroutineKind::Function {
                            return Err(self.err("\"this\" referenced from within a function"));
                        }
                        self.vm_writer.write_push(Segment::Pointer, 0);
                        this_keyword = true;
                    }
                    _ => unreachable!(),
                }
            }
            Token::IntConst(value) => {
                self.compile_integer_constant()?;
                self.vm_writer.write_push(Segment::Constant, value);
            }
            Token::StringConst(value) => {
                self.compile_string_constant()?;
                let length: i16 = value
                    .len()
                    .try_into()
                    .map_err(|_| self.err(&format!("length of string constant ({value}) exceeds the limit (32767)")))?;
                self.vm_writer.write_push(Segment::Constant, length);
                self.vm_writer.write_call("String.new", 1);
                for c in value.chars() {
                    self.vm_writer.write_push(Segment::Constant, c as i16);
                    self.vm_writer.write_call("String.appendChar", 2);
                }
            }
            Token::Symbol('(') => {
                self.expect_symbol('(')?;
                self.compile_expression()?;
                self.expect_symbol(')')?;
                this_keyword = true;
            }
            Token::Symbol(c) if is_unary_operator(c) => {
                self.expect_symbol(c)?;
                self.compile_term()?;
                self.vm_writer.write_arithmetic(arithmetic_command(c, true)?);
            }
            Token::Identifier(_) => {
                let identifier = self.compile_identifier("")?;
                if self.peek_symbol('[') {
                    self.compile_array_entry(&identifier)?;
                    self.vm_writer.write_pop(Segment::Pointer, 1);
                    self.vm_writer.write_push(Segment::That, 0);
                } else if self.peek_symbol('(') || self.peek_symbol('.') {
                    self.compile_subroutine_call(Some(identifier))?;
                } else {
                    let kind = self.kind_of(&identifier)?;
                    let index = self.symbol_table.index_of(&identifier)?;
                    self.vm_writer.write_push(segment_of(kind), index);
                }
            }
            _ => return Err(self.err(&format!("expected expression before {}", self.describe_token()))),
        }

        if self.in_return_statement && self.current_subroutine.kind == SubroutineKind::Constructor && !this_keyword {
            return Err(self.err("constructor does not return \"this\""));
        }
        self.xml_end();
        Ok(())
    }

    fn compile_expression_list(&mut self) -> Result<(), N2tError> {
        self.xml_begin("expressionList");
        if !self.peek_symbol(')') {
            self.compile_expression()?;
            *self.argument_counts.last_mut().expect("argument count frame") += 1;
            while self.expect_symbol_optional(',')? {
                self.compile_expression()?;
                *self.argument_counts.last_mut().expect("argument count frame") += 1;
            }
        }
        self.xml_end();
        Ok(())
    }

    fn compile_array_entry(&mut self, variable_name: &str) -> Result<(), N2tError> {
        self.kind_of(variable_name)?;
        if self.symbol_table.type_of(variable_name)? != "Array" {
            return Err(self.err(&format!(
                "array entry accessed in variable ({variable_name}) that is not of type Array"
            )));
        }

        self.expect_symbol('[')?;
        self.compile_expression()?;
        self.expect_symbol(']')?;

        let kind = self.kind_of(variable_name)?;
        let index = self.symbol_table.index_of(variable_name)?;
        self.vm_writer.write_push(segment_of(kind), index);
        self.vm_writer.write_arithmetic(ArithmeticOp::Add);
        Ok(())
    }

    fn compile_subroutine_call(&mut self, identifier: Option<String>) -> Result<(), N2tError> {
        let in_expression = identifier.is_some();
        let mut subroutine_name = match identifier {
            Some(name) => name,
            None => self.compile_identifier("subroutine, class or object")?,
        };

        let mut class_object_name = String::new();
        if self.expect_symbol_optional('.')? {
            class_object_name = subroutine_name;
            subroutine_name = self.compile_identifier("subroutine")?;
        }

        let mut kind = SubroutineKind::Function;
        if class_object_name.is_empty() {
            kind = SubroutineKind::Method;
            if self.current_subroutine.kind == SubroutineKind::Function {
                return Err(self.err(&format!(
                    "subroutine ({subroutine_name}) called as a method from within a function"
                )));
            }
            self.vm_writer.write_push(Segment::Pointer, 0);
            class_object_name = self.class_name.clone();
        } else if let Some(object_kind) = self.guarded_kind_of(&class_object_name)? {
            kind = SubroutineKind::Method;
            let index = self.symbol_table.index_of(&class_object_name)?;
            self.vm_writer.write_push(segment_of(object_kind), index);
            class_object_name = self.symbol_table.type_of(&class_object_name)?.to_string();
        }

        self.argument_counts.push(0);
        self.expect_symbol('(')?;
        self.compile_expression_list()?;
        self.expect_symbol(')')?;
        let num_expression_arguments = self.argument_counts.pop().expect("argument count frame");
        let implicit_this = i16::from(kind == SubroutineKind::Method);

        self.vm_writer.write_call(
            &format!("{class_object_name}.{subroutine_name}"),
            num_expression_arguments + implicit_this,
        );

        if class_object_name == self.class_name {
            self.called_subroutines.push(SubroutineCall {
                kind,
                name: subroutine_name,
                num_arguments: num_expression_arguments,
                in_expression,
            });
        }
        Ok(())
    }

    fn validate_subroutine_calls(&self) -> Result<(), N2tError> {
        if self.class_name == "Main" {
            match self.defined_subroutines.get("main") {
                Some(main) if main.kind == SubroutineKind::Function => {}
                _ => return Err(self.err("class does not contain a function named \"main\"")),
            }
        }

        for call in &self.called_subroutines {
            let sub = self
                .defined_subroutines
                .get(&call.name)
                .ok_or_else(|| self.err(&format!("undefined reference to subroutine ({})", call.name)))?;

            if sub.kind == SubroutineKind::Constructor && call.kind == SubroutineKind::Method {
                return Err(self.err(&format!("constructor ({}) called as a method", call.name)));
            }
            if sub.kind == SubroutineKind::Function && call.kind == SubroutineKind::Method {
                return Err(self.err(&format!("function ({}) called as a method", call.name)));
            }
            if sub.kind == SubroutineKind::Method && call.kind == SubroutineKind::Function {
                return Err(self.err(&format!("method ({}) called as a constructor/function", call.name)));
            }
            if sub.num_parameters != call.num_arguments {
                return Err(self.err(&format!(
                    "subroutine ({}) declared to accept {} parameter(s) but called with {} argument(s)",
                    call.name, sub.num_parameters, call.num_arguments
                )));
            }
            if sub.is_void && call.in_expression {
                return Err(self.err(&format!("void subroutine ({}) used in an expression", call.name)));
            }
        }
        Ok(())
    }

    fn kind_of(&self, variable_name: &str) -> Result<VariableKind, N2tError> {
        let kind = self
            .guarded_kind_of(variable_name)?
            .ok_or_else(|| self.err(&format!("identifier ({variable_name}) not defined in the current scope")))?;
        Ok(kind)
    }

    /// Like `kind_of`, but returns `Ok(None)` instead of erroring when the
    /// name isn't a variable at all (it may be a class name, as in a
    /// `ClassName.method()` call) — the field-in-function guard still
    /// applies whenever the name does resolve to a field.
    fn guarded_kind_of(&self, variable_name: &str) -> Result<Option<VariableKind>, N2tError> {
        let kind = self.symbol_table.kind_of(variable_name);
        if kind == Some(VariableKind::Field) && self.current_subroutine.kind == SubroutineKind::Function {
            return Err(self.err(&format!("field variable ({variable_name}) referenced from within a function")));
        }
        Ok(kind)
    }

    fn next_label(&mut self) -> u32 {
        let id = self.next_label_id;
        self.next_label_id += 1;
        id
    }

    fn current_keyword(&self) -> Result<Keyword, N2tError> {
        match self.tokenizer.token() {
            Token::Keyword(k) => Ok(*k),
            _ => Err(self.err(&format!("expected keyword before {}", self.describe_token()))),
        }
    }

    fn current_keyword_is_one_of(&self, predicate: fn(Keyword) -> bool) -> bool {
        matches!(self.tokenizer.token(), Token::Keyword(k) if predicate(*k))
    }

    fn peek_symbol(&self, expected: char) -> bool {
        matches!(self.tokenizer.token(), Token::Symbol(c) if *c == expected)
    }

    fn expect_keyword(&mut self, expected: Keyword) -> Result<(), N2tError> {
        match self.tokenizer.token() {
            Token::Keyword(k) if *k == expected => {
                if let Some(xml_writer) = &mut self.xml_writer {
                    xml_writer.write_keyword(expected);
                }
                self.tokenizer.advance()
            }
            _ => Err(self.err(&format!(
                "expected keyword ({}) before {}",
                expected.as_str(),
                self.describe_token()
            ))),
        }
    }

    fn expect_keyword_optional(&mut self, expected: Keyword) -> Result<bool, N2tError> {
        if matches!(self.tokenizer.token(), Token::Keyword(k) if *k == expected) {
            self.expect_keyword(expected)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_symbol(&mut self, expected: char) -> Result<(), N2tError> {
        match self.tokenizer.token() {
            Token::Symbol(c) if *c == expected => {
                if let Some(xml_writer) = &mut self.xml_writer {
                    xml_writer.write_symbol(expected);
                }
                self.tokenizer.advance()
            }
            _ => Err(self.err(&format!("expected symbol ({expected}) before {}", self.describe_token()))),
        }
    }

    fn expect_symbol_optional(&mut self, expected: char) -> Result<bool, N2tError> {
        if self.peek_symbol(expected) {
            self.expect_symbol(expected)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn compile_identifier(&mut self, what: &str) -> Result<String, N2tError> {
        let Token::Identifier(identifier) = self.tokenizer.token().clone() else {
            return Err(self.err(&format!("expected {what} name before {}", self.describe_token())));
        };
        if let Some(xml_writer) = &mut self.xml_writer {
            xml_writer.write_identifier(&identifier);
        }
        self.tokenizer.advance()?;
        Ok(identifier)
    }

    fn compile_integer_constant(&mut self) -> Result<i16, N2tError> {
        let Token::IntConst(value) = *self.tokenizer.token() else {
            return Err(self.err(&format!("expected integer constant before {}", self.describe_token())));
        };
        if let Some(xml_writer) = &mut self.xml_writer {
            xml_writer.write_integer_constant(value);
        }
        self.tokenizer.advance()?;
        Ok(value)
    }

    fn compile_string_constant(&mut self) -> Result<String, N2tError> {
        let Token::StringConst(value) = self.tokenizer.token().clone() else {
            return Err(self.err(&format!("expected string constant before {}", self.describe_token())));
        };
        if let Some(xml_writer) = &mut self.xml_writer {
            xml_writer.write_string_constant(&value);
        }
        self.tokenizer.advance()?;
        Ok(value)
    }

    fn xml_begin(&mut self, name: &str) {
        if let Some(xml_writer) = &mut self.xml_writer {
            xml_writer.begin_element(name);
        }
    }

    fn xml_end(&mut self) {
        if let Some(xml_writer) = &mut self.xml_writer {
            xml_writer.end_element();
        }
    }

    fn describe_token(&self) -> String {
        self.tokenizer.token().describe()
    }

    fn err(&self, message: &str) -> N2tError {
        N2tError::semantic(self.tokenizer.filename(), self.tokenizer.line_number(), message)
    }
}

fn is_class_var_dec(keyword: Keyword) -> bool {
    matches!(keyword, Keyword::Static | Keyword::Field)
}

fn is_var_type(keyword: Keyword, or_void: bool) -> bool {
    matches!(keyword, Keyword::Int | Keyword::Char | Keyword::Boolean) || (or_void && keyword == Keyword::Void)
}

fn is_subroutine(keyword: Keyword) -> bool {
    matches!(keyword, Keyword::Constructor | Keyword::Function | Keyword::Method)
}

fn is_statement(keyword: Keyword) -> bool {
    matches!(
        keyword,
        Keyword::Let | Keyword::Do | Keyword::If | Keyword::While | Keyword::Return
    )
}

fn is_binary_operator(symbol: char) -> bool {
    matches!(symbol, '+' | '-' | '*' | '/' | '&' | '|' | '<' | '>' | '=')
}

fn is_unary_operator(symbol: char) -> bool {
    matches!(symbol, '-' | '~')
}

fn is_keyword_constant(keyword: Keyword) -> bool {
    matches!(keyword, Keyword::True | Keyword::False | Keyword::Null | Keyword::This)
}

fn variable_kind_of(keyword: Keyword) -> VariableKind {
    match keyword {
        Keyword::Static => VariableKind::Static,
        Keyword::Field => VariableKind::Field,
        Keyword::Var => VariableKind::Local,
        _ => unreachable!("caller only passes static/field/var"),
    }
}

fn segment_of(kind: VariableKind) -> Segment {
    match kind {
        VariableKind::Static => Segment::Static,
        VariableKind::Field => Segment::This,
        VariableKind::Argument => Segment::Argument,
        VariableKind::Local => Segment::Local,
    }
}

fn arithmetic_command(symbol: char, unary: bool) -> Result<ArithmeticOp, N2tError> {
    Ok(match symbol {
        '+' => ArithmeticOp::Add,
        '-' if unary => ArithmeticOp::Neg,
        '-' => ArithmeticOp::Sub,
        '&' => ArithmeticOp::And,
        '|' => ArithmeticOp::Or,
        '~' => ArithmeticOp::Not,
        '<' => ArithmeticOp::Lt,
        '=' => ArithmeticOp::Eq,
        '>' => ArithmeticOp::Gt,
        _ => return Err(N2tError::semantic("<jack>", 0, format!("invalid arithmetic operator ({symbol})"))),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    fn compile(source: &str, class_file_stem: &str) -> Result<String, N2tError> {
        let dir = tempdir().unwrap();
        let vm_path = dir.path().join(format!("{class_file_stem}.vm"));
        let engine = CompilationEngine::new(source, &format!("{class_file_stem}.jack"), &vm_path, None)?;
        engine.compile_class()?;
        Ok(std::fs::read_to_string(&vm_path).unwrap())
    }

    #[test]
    fn empty_class_with_void_main() {
        let out = compile("class Foo { function void main() { return; } }", "Foo").unwrap();
        assert_eq!(out, "function Foo.main 0\npush constant 0\nreturn\n");
    }

    #[test]
    fn field_access_constructor_and_getter() {
        let source = r#"
            class Point {
              field int x, y;
              constructor Point new(int ax, int ay) { let x = ax; let y = ay; return this; }
              method int getX() { return x; }
            }
        "#;
        let out = compile(source, "Point").unwrap();
        assert_eq!(
            out,
            concat!(
                "function Point.new 0\n",
                "push constant 2\n",
                "call Memory.alloc 1\n",
                "pop pointer 0\n",
                "push argument 0\n",
                "pop this 0\n",
                "push argument 1\n",
                "pop this 1\n",
                "push pointer 0\n",
                "return\n",
                "function Point.getX 0\n",
                "push argument 0\n",
                "pop pointer 0\n",
                "push this 0\n",
                "return\n",
            )
        );
    }

    #[test]
    fn class_name_must_match_filename() {
        let dir = tempdir().unwrap();
        let vm_path = dir.path().join("Bar.vm");
        let engine = CompilationEngine::new("class Foo { function void main() { return; } }", "Bar.jack", &vm_path, None).unwrap();
        assert!(engine.compile_class().is_err());
        assert!(!vm_path.exists());
    }

    #[test]
    fn main_class_requires_main_function() {
        let dir = tempdir().unwrap();
        let vm_path = dir.path().join("Main.vm");
        let engine = CompilationEngine::new(
            "class Main { function void other() { return; } }",
            "Main.jack",
            &vm_path,
            None,
        )
        .unwrap();
        assert!(engine.compile_class().is_err());
    }

    #[test]
    fn field_referenced_from_function_fails() {
        let dir = tempdir().unwrap();
        let vm_path = dir.path().join("Foo.vm");
        let engine = CompilationEngine::new(
            "class Foo { field int x; function int get() { return x; } }",
            "Foo.jack",
            &vm_path,
            None,
        )
        .unwrap();
        assert!(engine.compile_class().is_err());
    }

    #[test]
    fn method_called_as_function_fails() {
        let dir = tempdir().unwrap();
        let vm_path = dir.path().join("Foo.vm");
        let engine = CompilationEngine::new(
            "class Foo { method void bar() { return; } function void call() { do Foo.bar(); return; } }",
            "Foo.jack",
            &vm_path,
            None,
        )
        .unwrap();
        assert!(engine.compile_class().is_err());
    }

    #[test]
    fn arity_mismatch_fails() {
        let dir = tempdir().unwrap();
        let vm_path = dir.path().join("Foo.vm");
        let engine = CompilationEngine::new(
            "class Foo { function void needsOne(int a) { return; } function void call() { do Foo.needsOne(); return; } }",
            "Foo.jack",
            &vm_path,
            None,
        )
        .unwrap();
        assert!(engine.compile_class().is_err());
    }

    #[test]
    fn while_and_if_else_compile() {
        let source = r#"
            class Foo {
                function void run() {
                    var int i;
                    let i = 0;
                    while (i < 10) {
                        if (i = 5) {
                            let i = i + 1;
                        } else {
                            let i = i + 2;
                        }
                    }
                    return;
                }
            }
        "#;
        let out = compile(source, "Foo").unwrap();
        assert!(out.contains("label WHILE0"));
        assert!(out.contains("label IF0"));
        assert!(out.contains("label IF1"));
    }
}
