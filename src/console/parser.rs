use fxhash::FxHashMap;
use lazy_static::lazy_static;

use super::tokens::{Token, TokenType};
use crate::error::CommandError;

lazy_static! {
    /// Command names and their help lines.
    pub static ref COMMANDS: FxHashMap<&'static str, &'static str> = {
        let mut table = FxHashMap::default();
        table.insert("new", "new                    | Create new queue");
        table.insert("free", "free                   | Delete queue");
        table.insert("ih", "ih str [n]             | Insert string str at head of queue n times (default 1)");
        table.insert("it", "it str [n]             | Insert string str at tail of queue n times (default 1)");
        table.insert("rh", "rh [str]               | Remove from head of queue, optionally compare to expected value str");
        table.insert("rhq", "rhq                    | Remove from head of queue without reporting value");
        table.insert("reverse", "reverse                | Reverse queue");
        table.insert("sort", "sort                   | Sort queue in ascending order");
        table.insert("size", "size [n]               | Compute queue size, optionally compare to expected n");
        table.insert("show", "show                   | Display queue contents");
        table.insert("option", "option [name [val]]    | Display or set options");
        table.insert("source", "source file            | Read commands from source file");
        table.insert("help", "help                   | Show documentation");
        table.insert("quit", "quit                   | Exit program");
        table
    };
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    New,
    Free,
    InsertHead { value: String, count: usize },
    InsertTail { value: String, count: usize },
    RemoveHead { expected: Option<String> },
    RemoveHeadQuiet,
    Reverse,
    Sort,
    Size { expected: Option<usize> },
    Show,
    Option { name: Option<String>, value: Option<i64> },
    Source(String),
    Help,
    Quit,
}

impl Command {
    /// Whether the command can change the queue.
    pub fn mutates(&self) -> bool {
        matches!(
            self,
            Command::New
                | Command::Free
                | Command::InsertHead { .. }
                | Command::InsertTail { .. }
                | Command::RemoveHead { .. }
                | Command::RemoveHeadQuiet
                | Command::Reverse
                | Command::Sort
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub command: Command,
    pub line: usize,
    /// Source text of the command, for echoing.
    pub text: String,
}

pub struct Parser {
    tokens: Vec<Token>,
    pc: usize,
    filename: String,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, filename: &str) -> Parser {
        Parser {
            tokens,
            pc: 0,
            filename: filename.to_string(),
        }
    }

    pub fn parse(&mut self) -> Result<Vec<Statement>, CommandError> {
        let mut statements = vec![];
        while let Some(ctoken) = self.tokens.get(self.pc).cloned() {
            self.pc += 1;
            let name = match &ctoken.token_type {
                TokenType::Newline => continue,
                TokenType::Word(word) => word.clone(),
                _ => return Err(self.error(&ctoken, "expected a command name")),
            };
            let start = self.pc - 1;
            let command = match name.as_str() {
                "new" => Command::New,
                "free" => Command::Free,
                "ih" => {
                    let value = self.parse_string(&ctoken)?;
                    let count = self.parse_optional_count()?.unwrap_or(1);
                    Command::InsertHead { value, count }
                }
                "it" => {
                    let value = self.parse_string(&ctoken)?;
                    let count = self.parse_optional_count()?.unwrap_or(1);
                    Command::InsertTail { value, count }
                }
                "rh" => Command::RemoveHead {
                    expected: self.parse_optional_string(),
                },
                "rhq" => Command::RemoveHeadQuiet,
                "reverse" => Command::Reverse,
                "sort" => Command::Sort,
                "size" => Command::Size {
                    expected: self.parse_optional_count()?,
                },
                "show" => Command::Show,
                "option" => {
                    let name = self.parse_optional_string();
                    let value = match name {
                        Some(_) => self.parse_optional_int(),
                        None => None,
                    };
                    Command::Option { name, value }
                }
                "source" => Command::Source(self.parse_string(&ctoken)?),
                "help" => Command::Help,
                "quit" => Command::Quit,
                _ => return Err(CommandError::UnknownCommand(name)),
            };
            if let Some(extra) = self.peek_argument() {
                let extra = extra.clone();
                return Err(self.error(&extra, "unexpected argument"));
            }
            statements.push(Statement {
                command,
                line: ctoken.line,
                text: self.source_text(start),
            });
        }
        Ok(statements)
    }

    fn error(&self, token: &Token, message: &str) -> CommandError {
        CommandError::Parse {
            file: self.filename.clone(),
            line: token.line,
            column: token.column,
            message: message.to_string(),
        }
    }

    fn peek_argument(&self) -> Option<&Token> {
        self.tokens
            .get(self.pc)
            .filter(|t| t.token_type != TokenType::Newline)
    }

    fn parse_optional_string(&mut self) -> Option<String> {
        let value = match &self.peek_argument()?.token_type {
            TokenType::Word(s) | TokenType::String(s) => s.clone(),
            TokenType::Int(i) => i.to_string(),
            TokenType::Newline => return None,
        };
        self.pc += 1;
        Some(value)
    }

    fn parse_string(&mut self, command: &Token) -> Result<String, CommandError> {
        self.parse_optional_string()
            .ok_or_else(|| self.error(command, "missing string argument"))
    }

    fn parse_optional_int(&mut self) -> Option<i64> {
        let value = match self.peek_argument()?.token_type {
            TokenType::Int(i) => i,
            _ => return None,
        };
        self.pc += 1;
        Some(value)
    }

    fn parse_optional_count(&mut self) -> Result<Option<usize>, CommandError> {
        let token = match self.peek_argument() {
            Some(token) => token.clone(),
            None => return Ok(None),
        };
        match token.token_type {
            TokenType::Int(i) if i >= 0 => {
                self.pc += 1;
                Ok(Some(i as usize))
            }
            _ => Err(self.error(&token, "expected a non-negative count")),
        }
    }

    fn source_text(&self, start: usize) -> String {
        self.tokens[start..self.pc]
            .iter()
            .map(|t| match &t.token_type {
                TokenType::Word(s) => s.clone(),
                TokenType::String(s) => format!("{:?}", s),
                TokenType::Int(i) => i.to_string(),
                TokenType::Newline => String::new(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn help_lines() -> Vec<&'static str> {
    let mut lines: Vec<_> = COMMANDS.values().copied().collect();
    lines.sort_unstable();
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::tokens::tokenize;

    fn parse(input: &str) -> Result<Vec<Command>, CommandError> {
        let tokens = tokenize(input, "test")?;
        Ok(Parser::new(tokens, "test")
            .parse()?
            .into_iter()
            .map(|s| s.command)
            .collect())
    }

    #[test]
    fn parses_insertions_with_counts() {
        assert_eq!(
            parse("ih gerbil 3\nit \"bear cub\"\n").unwrap(),
            vec![
                Command::InsertHead {
                    value: "gerbil".into(),
                    count: 3
                },
                Command::InsertTail {
                    value: "bear cub".into(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn numeric_strings_are_accepted() {
        assert_eq!(
            parse("it 42").unwrap(),
            vec![Command::InsertTail {
                value: "42".into(),
                count: 1
            }]
        );
    }

    #[test]
    fn optional_arguments() {
        assert_eq!(
            parse("rh\nrh dolphin\nsize\nsize 2\noption\noption malloc 10").unwrap(),
            vec![
                Command::RemoveHead { expected: None },
                Command::RemoveHead {
                    expected: Some("dolphin".into())
                },
                Command::Size { expected: None },
                Command::Size { expected: Some(2) },
                Command::Option {
                    name: None,
                    value: None
                },
                Command::Option {
                    name: Some("malloc".into()),
                    value: Some(10)
                },
            ]
        );
    }

    #[test]
    fn unknown_command() {
        assert!(matches!(
            parse("push 1"),
            Err(CommandError::UnknownCommand(name)) if name == "push"
        ));
    }

    #[test]
    fn missing_and_extra_arguments() {
        assert_eq!(
            parse("ih").unwrap_err().to_string(),
            "test:1:1: missing string argument"
        );
        assert_eq!(
            parse("reverse now").unwrap_err().to_string(),
            "test:1:9: unexpected argument"
        );
        assert_eq!(
            parse("ih x -1").unwrap_err().to_string(),
            "test:1:6: expected a non-negative count"
        );
    }

    #[test]
    fn statements_keep_line_and_text() {
        let tokens = tokenize("\n\nit \"a b\" 2\n", "test").unwrap();
        let statements = Parser::new(tokens, "test").parse().unwrap();
        assert_eq!(statements[0].line, 3);
        assert_eq!(statements[0].text, "it \"a b\" 2");
    }

    #[test]
    fn every_command_has_help() {
        assert_eq!(help_lines().len(), COMMANDS.len());
        for name in ["new", "free", "ih", "it", "rh", "rhq", "reverse", "sort", "size", "show"] {
            assert!(COMMANDS.contains_key(name));
        }
    }
}
