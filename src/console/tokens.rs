use crate::error::CommandError;

#[derive(Clone, Debug, PartialEq)]
pub enum TokenType {
    Word(String),
    Int(i64),
    String(String),
    Newline,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub length: usize,
    pub line: usize,
    pub column: usize,
}

pub fn tokenize(input: &str, filename: &str) -> Result<Vec<Token>, CommandError> {
    let mut iterator = input.chars().peekable();
    let mut tokens_stream: Vec<Token> = Vec::new();
    let mut line = 1;
    let mut column = 0;
    let error = |line, column, message: &str| CommandError::Parse {
        file: filename.to_string(),
        line,
        column,
        message: message.to_string(),
    };

    while let Some(character) = iterator.next() {
        column += 1;
        match character {
            '\n' => {
                tokens_stream.push(Token {
                    token_type: TokenType::Newline,
                    length: 1,
                    line,
                    column,
                });
                line += 1;
                column = 0;
            }
            '#' => {
                while let Some(&c) = iterator.peek() {
                    if c == '\n' {
                        break;
                    }
                    iterator.next();
                }
            }
            '"' => {
                let start = column;
                let mut string = String::new();
                let mut closed = false;
                while let Some(c) = iterator.next() {
                    column += 1;
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => {
                            column += 1;
                            match iterator.next() {
                                Some('"') => string.push('"'),
                                Some('\\') => string.push('\\'),
                                Some('n') => string.push('\n'),
                                Some('t') => string.push('\t'),
                                Some(other) => {
                                    return Err(error(
                                        line,
                                        column,
                                        &format!("unknown escape sequence '\\{}'", other),
                                    ))
                                }
                                None => break,
                            }
                        }
                        '\n' => break,
                        _ => string.push(c),
                    }
                }
                if !closed {
                    return Err(error(line, start, "unterminated string"));
                }
                tokens_stream.push(Token {
                    token_type: TokenType::String(string),
                    length: column - start + 1,
                    line,
                    column: start,
                });
            }
            c if c.is_whitespace() => continue,
            _ => {
                let start = column;
                let mut word = String::new();
                word.push(character);
                while let Some(&c) = iterator.peek() {
                    if c.is_whitespace() || c == '#' || c == '"' {
                        break;
                    }
                    word.push(c);
                    iterator.next();
                    column += 1;
                }
                let length = word.chars().count();
                let is_number = word
                    .strip_prefix('-')
                    .unwrap_or(&word)
                    .chars()
                    .all(|c| c.is_ascii_digit())
                    && word != "-";
                let token_type = if is_number {
                    match word.parse::<i64>() {
                        Ok(value) => TokenType::Int(value),
                        Err(_) => return Err(error(line, start, "integer out of range")),
                    }
                } else {
                    TokenType::Word(word)
                };
                tokens_stream.push(Token {
                    token_type,
                    length,
                    line,
                    column: start,
                });
            }
        }
    }

    Ok(tokens_stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(input: &str) -> Vec<TokenType> {
        tokenize(input, "test")
            .unwrap()
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn words_numbers_and_newlines() {
        assert_eq!(
            types("ih dolphin 3\nrh\n"),
            vec![
                TokenType::Word("ih".into()),
                TokenType::Word("dolphin".into()),
                TokenType::Int(3),
                TokenType::Newline,
                TokenType::Word("rh".into()),
                TokenType::Newline,
            ]
        );
    }

    #[test]
    fn quoted_strings_and_escapes() {
        assert_eq!(
            types(r#"it "two words" "say \"hi\"""#),
            vec![
                TokenType::Word("it".into()),
                TokenType::String("two words".into()),
                TokenType::String("say \"hi\"".into()),
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            types("# header\nsize # trailing\n"),
            vec![
                TokenType::Newline,
                TokenType::Word("size".into()),
                TokenType::Newline,
            ]
        );
    }

    #[test]
    fn negative_numbers_and_lone_dash() {
        assert_eq!(
            types("-4 - 1a"),
            vec![
                TokenType::Int(-4),
                TokenType::Word("-".into()),
                TokenType::Word("1a".into()),
            ]
        );
    }

    #[test]
    fn positions_are_recorded() {
        let tokens = tokenize("new\n  ih x", "test").unwrap();
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[2].line, tokens[2].column), (2, 3));
        assert_eq!((tokens[3].line, tokens[3].column, tokens[3].length), (2, 6, 1));
    }

    #[test]
    fn unterminated_string_reports_position() {
        let err = tokenize("ih \"open\n", "trace.cmd").unwrap_err();
        assert_eq!(err.to_string(), "trace.cmd:1:4: unterminated string");
    }
}
