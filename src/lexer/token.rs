#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    Pipe,              // |
    And,               // &&
    Or,                // ||
    Background,        // &
    RedirectIn,        // <
    RedirectOut,       // >
    RedirectAppend,    // >>
    RedirectErr,       // 2>
    RedirectErrAppend, // 2>>
    Semicolon,         // ;
    DoubleSemicolon,   // ;;
    Newline,
    LParen,            // (
    RParen,            // )
    Eof,
}

impl TokenKind {
    pub fn is_redirect(self) -> bool {
        matches!(
            self,
            TokenKind::RedirectIn
                | TokenKind::RedirectOut
                | TokenKind::RedirectAppend
                | TokenKind::RedirectErr
                | TokenKind::RedirectErrAppend
        )
    }

    /// Tokens after which the next word is in command position.
    pub fn starts_command(self) -> bool {
        matches!(
            self,
            TokenKind::Pipe
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::Background
                | TokenKind::Semicolon
                | TokenKind::DoubleSemicolon
                | TokenKind::Newline
                | TokenKind::LParen
                | TokenKind::RParen
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,       // Text after quote removal
    pub span: (usize, usize), // Byte offsets [start, end) into the source line
    pub quoted: bool,         // Some part of the word was quoted
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: (usize, usize)) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            span,
            quoted: false,
        }
    }

    pub fn with_quoted(mut self, quoted: bool) -> Self {
        self.quoted = quoted;
        self
    }

    /// The word's text if it can act as a reserved word. `"fi"` never does.
    pub fn keyword(&self) -> Option<&str> {
        (self.kind == TokenKind::Word && !self.quoted).then_some(self.lexeme.as_str())
    }

    pub fn is_keyword(&self, text: &str) -> bool {
        self.keyword() == Some(text)
    }
}
