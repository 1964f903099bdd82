use super::token::{Token, TokenKind};

/// Hand-written scanner. Never fails: malformed input degrades into word text.
pub struct Lexer<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            chars: input.char_indices().collect(),
            pos: 0,
        }
    }

    /// Tokenizes a whole line. The result always ends with an `Eof` token.
    pub fn tokenize(input: &str) -> Vec<Token> {
        Lexer::new(input).tokenize_all()
    }

    pub fn tokenize_all(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_blanks_and_comments();
        let start = self.offset();
        let Some(ch) = self.peek() else {
            return Token::new(TokenKind::Eof, "", (start, start));
        };

        match ch {
            '\n' => self.single(TokenKind::Newline),
            '|' => self.greedy('|', TokenKind::Or, TokenKind::Pipe),
            '&' => self.greedy('&', TokenKind::And, TokenKind::Background),
            '>' => self.greedy('>', TokenKind::RedirectAppend, TokenKind::RedirectOut),
            ';' => self.greedy(';', TokenKind::DoubleSemicolon, TokenKind::Semicolon),
            '<' => self.single(TokenKind::RedirectIn),
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            _ => self.read_word(start),
        }
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|&(i, _)| i)
            .unwrap_or(self.input.len())
    }

    fn peek(&self) -> Option<char> {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).map(|&(_, c)| c)
    }

    fn skip_blanks_and_comments(&mut self) {
        while let Some(ch) = self.peek() {
            match ch {
                ' ' | '\t' | '\r' => self.pos += 1,
                '#' => {
                    // Comment runs up to, but not including, the newline
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        let start = self.offset();
        self.pos += 1;
        let end = self.offset();
        Token::new(kind, &self.input[start..end], (start, end))
    }

    // Two-character form first, then the single-character fallback.
    fn greedy(&mut self, second: char, double: TokenKind, single: TokenKind) -> Token {
        let start = self.offset();
        let kind = if self.peek_at(1) == Some(second) {
            self.pos += 2;
            double
        } else {
            self.pos += 1;
            single
        };
        let end = self.offset();
        Token::new(kind, &self.input[start..end], (start, end))
    }

    fn read_word(&mut self, start: usize) -> Token {
        let mut buf = String::new();
        let mut quoted = false;

        while let Some(ch) = self.peek() {
            match ch {
                ' ' | '\t' | '\r' | '\n' | '|' | '&' | ';' | '<' | '(' | ')' => break,
                '>' => {
                    // A bare `2` glued to `>` is a stderr redirect, not an argument.
                    if !quoted && buf == "2" && self.offset() == start + 1 {
                        self.pos += 1;
                        let kind = if self.peek() == Some('>') {
                            self.pos += 1;
                            TokenKind::RedirectErrAppend
                        } else {
                            TokenKind::RedirectErr
                        };
                        let end = self.offset();
                        return Token::new(kind, &self.input[start..end], (start, end));
                    }
                    break;
                }
                '\'' | '"' => {
                    quoted = true;
                    self.read_quoted(ch, &mut buf);
                }
                '$' if self.peek_at(1) == Some('(') && self.peek_at(2) == Some('(') => {
                    self.read_arithmetic(&mut buf);
                }
                _ => {
                    buf.push(ch);
                    self.pos += 1;
                }
            }
        }

        Token::new(TokenKind::Word, buf, (start, self.offset())).with_quoted(quoted)
    }

    fn read_quoted(&mut self, quote: char, buf: &mut String) {
        self.pos += 1; // opening quote
        while let Some(ch) = self.peek() {
            if ch == quote {
                self.pos += 1;
                return;
            }
            if ch == '\\' {
                match self.peek_at(1) {
                    Some(next) if next == quote || next == '\\' => {
                        buf.push(next);
                        self.pos += 2;
                        continue;
                    }
                    _ => {}
                }
            }
            buf.push(ch);
            self.pos += 1;
        }
        // Unterminated: the rest of the input already landed in `buf`.
    }

    fn read_arithmetic(&mut self, buf: &mut String) {
        buf.push_str("$((");
        self.pos += 3;
        let mut depth = 0usize;
        while let Some(ch) = self.peek() {
            match ch {
                '(' => depth += 1,
                ')' if depth == 0 && self.peek_at(1) == Some(')') => {
                    buf.push_str("))");
                    self.pos += 2;
                    return;
                }
                ')' => depth = depth.saturating_sub(1),
                _ => {}
            }
            buf.push(ch);
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::token::TokenKind::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::tokenize(input).into_iter().map(|t| t.kind).collect()
    }

    fn words(input: &str) -> Vec<String> {
        Lexer::tokenize(input)
            .into_iter()
            .filter(|t| t.kind == Word)
            .map(|t| t.lexeme)
            .collect()
    }

    fn token(kind: TokenKind, lexeme: &str, span: (usize, usize)) -> Token {
        Token::new(kind, lexeme, span)
    }

    #[test]
    fn test_simple_pipeline() {
        let tokens = Lexer::tokenize("ls -l | grep foo");
        assert_eq!(
            tokens,
            vec![
                token(Word, "ls", (0, 2)),
                token(Word, "-l", (3, 5)),
                token(Pipe, "|", (6, 7)),
                token(Word, "grep", (8, 12)),
                token(Word, "foo", (13, 16)),
                token(Eof, "", (16, 16)),
            ]
        );
    }

    #[test]
    fn test_greedy_two_char_operators() {
        assert_eq!(
            kinds("a && b || c | d & e >> f > g ;; h ;"),
            vec![
                Word, And, Word, Or, Word, Pipe, Word, Background, Word, RedirectAppend, Word,
                RedirectOut, Word, DoubleSemicolon, Word, Semicolon, Eof
            ]
        );
    }

    #[test]
    fn test_operators_split_words_without_spaces() {
        assert_eq!(kinds("a|b&&c>d<e"), vec![Word, Pipe, Word, And, Word, RedirectOut, Word, RedirectIn, Word, Eof]);
    }

    #[test]
    fn test_newline_is_a_token() {
        assert_eq!(kinds("echo a\necho b\n"), vec![Word, Word, Newline, Word, Word, Newline, Eof]);
    }

    #[test]
    fn test_comment_runs_to_end_of_line() {
        assert_eq!(words("echo hi # ignored | stuff\necho after"), vec!["echo", "hi", "echo", "after"]);
        assert_eq!(words("echo a#b"), vec!["echo", "a#b"]);
    }

    #[test]
    fn test_quoted_regions() {
        assert_eq!(words(r#"echo "hello world" 'a | b'"#), vec!["echo", "hello world", "a | b"]);
        assert_eq!(words(r#"echo --name="x y"z"#), vec!["echo", "--name=x yz"]);
        assert_eq!(words(r#"echo """#), vec!["echo", ""]);
    }

    #[test]
    fn test_quoted_flag() {
        let tokens = Lexer::tokenize(r#"fi "fi" f'i' """#);
        let flags: Vec<bool> = tokens.iter().map(|t| t.quoted).collect();
        assert_eq!(flags, vec![false, true, true, true, false]);
        assert_eq!(tokens[0].keyword(), Some("fi"));
        assert_eq!(tokens[1].keyword(), None);
        assert_eq!(tokens[2].lexeme, "fi");
    }

    #[test]
    fn test_backslash_escapes_only_inside_quotes() {
        assert_eq!(words(r#"echo "say \"hi\"" 'it\'s' "a\\b" "keep\n""#), vec!["echo", "say \"hi\"", "it's", "a\\b", "keep\\n"]);
        assert_eq!(words(r"echo a\b"), vec!["echo", r"a\b"]);
    }

    #[test]
    fn test_unterminated_quote_is_lenient() {
        let tokens = Lexer::tokenize("echo \"never closed | x");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].lexeme, "never closed | x");
        assert_eq!(tokens[2].kind, Eof);
    }

    #[test]
    fn test_stderr_redirects() {
        assert_eq!(kinds("cmd 2> err 2>> more"), vec![Word, RedirectErr, Word, RedirectErrAppend, Word, Eof]);
        // Only a bare `2` counts
        assert_eq!(words("echo a2>x"), vec!["echo", "a2", "x"]);
        assert_eq!(kinds("echo \"2\">x"), vec![Word, Word, RedirectOut, Word, Eof]);
    }

    #[test]
    fn test_arithmetic_stays_in_one_word() {
        assert_eq!(words("echo $((1 + (2))) done"), vec!["echo", "$((1 + (2)))", "done"]);
    }

    #[test]
    fn test_parens_and_spans() {
        let tokens = Lexer::tokenize("f() { ( x ) }");
        assert_eq!(tokens[1], token(LParen, "(", (1, 2)));
        assert_eq!(tokens[2], token(RParen, ")", (2, 3)));
        assert_eq!(tokens[3], token(Word, "{", (4, 5)));
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert_eq!(kinds(""), vec![Eof]);
        assert_eq!(kinds("   \t "), vec![Eof]);
        assert_eq!(kinds("# only a comment"), vec![Eof]);
    }

    #[test]
    fn test_multibyte_spans() {
        let tokens = Lexer::tokenize("echo héllo|x");
        assert_eq!(tokens[1], token(Word, "héllo", (5, 11)));
        assert_eq!(tokens[2].span, (11, 12));
    }
}
