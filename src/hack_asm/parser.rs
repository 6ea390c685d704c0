//! Forward-only, line-at-a-time parser over a Hack assembly source file.

use crate::error::N2tError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    A(String),
    C {
        dest: String,
        comp: String,
        jump: String,
    },
    L(String),
}

pub struct Parser<'a> {
    lines: std::str::Lines<'a>,
    file: String,
    line_number: u32,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, file: impl Into<String>) -> Self {
        Parser {
            lines: source.lines(),
            file: file.into(),
            line_number: 0,
        }
    }

    /// Reads the next non-blank command, or `None` at end of input.
    pub fn advance(&mut self) -> Option<Result<(Command, u32), N2tError>> {
        loop {
            let raw = self.lines.next()?;
            self.line_number += 1;

            let without_comment = match raw.find("//") {
                Some(idx) => &raw[..idx],
                None => raw,
            };
            let stripped: String = without_comment.chars().filter(|c| !c.is_whitespace()).collect();

            if stripped.is_empty() {
                continue;
            }

            return Some(self.classify(&stripped).map(|cmd| (cmd, self.line_number)));
        }
    }

    fn classify(&self, text: &str) -> Result<Command, N2tError> {
        if let Some(rest) = text.strip_prefix('@') {
            if rest.is_empty() {
                return Err(self.err("'@' with no symbol or address"));
            }
            return Ok(Command::A(rest.to_string()));
        }

        if let Some(rest) = text.strip_prefix('(') {
            let inner = rest
                .strip_suffix(')')
                .ok_or_else(|| self.err("label declaration missing closing ')'"))?;
            if inner.is_empty() {
                return Err(self.err("'(' with no label"));
            }
            return Ok(Command::L(inner.to_string()));
        }

        let (before_jump, jump) = match text.find(';') {
            Some(idx) => (&text[..idx], &text[idx + 1..]),
            None => (text, ""),
        };
        let (dest, comp) = match before_jump.find('=') {
            Some(idx) => (&before_jump[..idx], &before_jump[idx + 1..]),
            None => ("", before_jump),
        };

        Ok(Command::C {
            dest: dest.to_string(),
            comp: comp.to_string(),
            jump: jump.to_string(),
        })
    }

    fn err(&self, message: &str) -> N2tError {
        N2tError::syntax(&self.file, self.line_number, message)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse_all(source: &str) -> Vec<Command> {
        let mut parser = Parser::new(source, "test.asm");
        let mut out = Vec::new();
        while let Some(result) = parser.advance() {
            out.push(result.unwrap().0);
        }
        out
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        let commands = parse_all("// a comment\n\n@5\n");
        assert_eq!(commands, vec![Command::A("5".to_string())]);
    }

    #[test]
    fn parses_label() {
        let commands = parse_all("(END)\n");
        assert_eq!(commands, vec![Command::L("END".to_string())]);
    }

    #[test]
    fn parses_full_c_instruction() {
        let commands = parse_all("D=D+1;JGT\n");
        assert_eq!(
            commands,
            vec![Command::C {
                dest: "D".to_string(),
                comp: "D+1".to_string(),
                jump: "JGT".to_string(),
            }]
        );
    }

    #[test]
    fn strips_whitespace_around_tokens() {
        let commands = parse_all("  D = D + 1 ; JGT  // inline\n");
        assert_eq!(
            commands,
            vec![Command::C {
                dest: "D".to_string(),
                comp: "D+1".to_string(),
                jump: "JGT".to_string(),
            }]
        );
    }

    #[test]
    fn bare_at_symbol_fails() {
        let mut parser = Parser::new("@\n", "test.asm");
        assert!(parser.advance().unwrap().is_err());
    }

    #[test]
    fn unterminated_label_fails() {
        let mut parser = Parser::new("(END\n", "test.asm");
        assert!(parser.advance().unwrap().is_err());
    }
}
