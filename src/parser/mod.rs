pub mod default;

use thiserror::Error;

use crate::ast::Command;
use crate::lexer::Lexer;
pub use default::DefaultParser;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("syntax error: expected '{expected}'")]
    MissingKeyword { expected: &'static str },
    #[error("syntax error: expected a filename after '{operator}'")]
    MissingRedirectTarget { operator: String },
    #[error("syntax error near unexpected token '{found}'")]
    UnexpectedToken { found: String },
    #[error("syntax error: unexpected end of input after '{after}'")]
    UnexpectedEof { after: String },
    #[error("syntax error: empty body after '{keyword}'")]
    EmptyBody { keyword: &'static str },
    #[error("syntax error: expected a variable name after 'for'")]
    MissingLoopVariable,
}

impl ParseError {
    /// True when more input could complete the line, e.g. an `if` still waiting for `fi`.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            ParseError::MissingKeyword { .. } | ParseError::UnexpectedEof { .. }
        )
    }
}

pub trait Parser {
    fn parse(&mut self) -> Result<Vec<Command>, ParseError>;
}

/// Tokenizes and parses one input line (or a whole script) into its top-level commands.
pub fn parse(line: &str) -> Result<Vec<Command>, ParseError> {
    let tokens = Lexer::tokenize(line);
    DefaultParser::new(&tokens, line).parse()
}
