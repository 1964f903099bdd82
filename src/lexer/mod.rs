mod lexer;
pub mod token;

pub use lexer::Lexer;
pub use token::{Token, TokenKind};

pub fn tokenize(line: &str) -> Vec<Token> {
    Lexer::tokenize(line)
}
