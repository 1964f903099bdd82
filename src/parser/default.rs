use std::rc::Rc;

use super::{ParseError, Parser};
use crate::ast::{
    AssignValue, Assignment, CaseBranch, CaseCommand, Command, ForCommand, FunctionDef, IfCommand,
    List, ListOp, Redirect, RedirectKind, SimpleCommand, WhileCommand,
};
use crate::lexer::{Token, TokenKind};

const RESERVED: &[&str] = &["then", "elif", "else", "fi", "do", "done", "esac", "}"];

pub struct DefaultParser<'a> {
    tokens: &'a [Token],
    source: &'a str,
    // Whether each token sits where a command word may start. Keywords only count there.
    command_position: Rc<[bool]>,
    pos: usize,
    end: usize,
}

impl<'a> DefaultParser<'a> {
    pub fn new(tokens: &'a [Token], source: &'a str) -> Self {
        Self {
            tokens,
            source,
            command_position: command_positions(tokens).into(),
            pos: 0,
            end: tokens.len(),
        }
    }

    // A parser over tokens[start..end] sharing this parser's input.
    fn sub_parser(&self, start: usize, end: usize) -> DefaultParser<'a> {
        DefaultParser {
            tokens: self.tokens,
            source: self.source,
            command_position: Rc::clone(&self.command_position),
            pos: start,
            end,
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        let tokens: &'a [Token] = self.tokens;
        tokens
            .get(self.pos)
            .filter(|t| self.pos < self.end && t.kind != TokenKind::Eof)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn peek_at(&self, offset: usize) -> Option<&'a Token> {
        let tokens: &'a [Token] = self.tokens;
        let i = self.pos + offset;
        tokens.get(i).filter(|t| i < self.end && t.kind != TokenKind::Eof)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn previous_lexeme(&self) -> String {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.lexeme.clone())
            .unwrap_or_default()
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek_kind(), Some(TokenKind::Semicolon | TokenKind::Newline)) {
            self.pos += 1;
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek_kind() == Some(TokenKind::Newline) {
            self.pos += 1;
        }
    }

    fn unexpected(&self) -> ParseError {
        match self.peek() {
            Some(tok) => ParseError::UnexpectedToken {
                found: tok.lexeme.clone(),
            },
            None => ParseError::UnexpectedEof {
                after: self.previous_lexeme(),
            },
        }
    }
}

impl<'a> Parser for DefaultParser<'a> {
    fn parse(&mut self) -> Result<Vec<Command>, ParseError> {
        self.parse_program()
    }
}

// Top-down recursive descent
impl<'a> DefaultParser<'a> {
    fn parse_program(&mut self) -> Result<Vec<Command>, ParseError> {
        let mut commands = Vec::new();
        loop {
            self.skip_separators();
            if self.peek().is_none() {
                break;
            }
            let (command, backgrounded) = self.parse_command()?;
            commands.push(command);
            match self.peek_kind() {
                None => break,
                Some(TokenKind::Semicolon | TokenKind::Newline) => continue,
                Some(_) if backgrounded => continue,
                Some(_) => return Err(self.unexpected()),
            }
        }
        Ok(commands)
    }

    fn parse_command(&mut self) -> Result<(Command, bool), ParseError> {
        let start = self.peek().map(|t| t.span.0).unwrap_or(0);
        let command = self.parse_and_or()?;
        if self.peek_kind() != Some(TokenKind::Background) {
            return Ok((command, false));
        }
        let end = self.tokens[self.pos - 1].span.1;
        self.pos += 1;
        let source = self.source.get(start..end).unwrap_or_default().trim().to_string();
        Ok((
            Command::Background {
                command: Box::new(command),
                source,
            },
            true,
        ))
    }

    fn parse_and_or(&mut self) -> Result<Command, ParseError> {
        let mut commands = vec![self.parse_pipeline()?];
        let mut operators = Vec::new();
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::And) => ListOp::And,
                Some(TokenKind::Or) => ListOp::Or,
                _ => break,
            };
            self.pos += 1;
            self.skip_newlines();
            operators.push(op);
            commands.push(self.parse_pipeline()?);
        }
        if operators.is_empty() {
            return Ok(commands.remove(0));
        }
        Ok(Command::List(List { commands, operators }))
    }

    fn parse_pipeline(&mut self) -> Result<Command, ParseError> {
        let mut node = self.parse_primary()?;
        while self.peek_kind() == Some(TokenKind::Pipe) {
            self.pos += 1;
            self.skip_newlines();
            let rhs = self.parse_primary()?;
            node = Command::Pipeline {
                left: Box::new(node),
                right: Box::new(rhs),
            };
        }
        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<Command, ParseError> {
        let Some(tok) = self.peek() else {
            return Err(self.unexpected());
        };
        match tok.kind {
            TokenKind::Word => match tok.keyword().unwrap_or_default() {
                "if" => self.parse_if(),
                "while" => self.parse_while(),
                "for" => self.parse_for(),
                "case" => self.parse_case(),
                "{" => self.parse_group(),
                "function" => self.parse_function_keyword(),
                word if RESERVED.contains(&word) => Err(self.unexpected()),
                _ if self.at_function_header() => self.parse_function(),
                _ => self.parse_simple(),
            },
            TokenKind::LParen => self.parse_subshell(),
            kind if kind.is_redirect() => self.parse_simple(),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_simple(&mut self) -> Result<Command, ParseError> {
        let mut cmd = SimpleCommand::default();
        let mut seen_name = false;

        while let Some(tok) = self.peek() {
            match tok.kind {
                TokenKind::Word => {
                    if !seen_name {
                        if let Some(assignment) = self.parse_assignment()? {
                            cmd.assignments.push(assignment);
                            continue;
                        }
                    }
                    self.pos += 1;
                    if seen_name {
                        cmd.args.push(tok.lexeme.clone());
                    } else {
                        cmd.name = tok.lexeme.clone();
                        seen_name = true;
                    }
                }
                kind if kind.is_redirect() => {
                    self.pos += 1;
                    cmd.redirects.push(self.parse_redirect(tok)?);
                }
                _ => break,
            }
        }

        if !seen_name && cmd.assignments.is_empty() && cmd.redirects.is_empty() {
            return Err(self.unexpected());
        }
        Ok(Command::Simple(cmd))
    }

    // `NAME=value` or `NAME=(a b c)`; None when the current word is not an assignment.
    fn parse_assignment(&mut self) -> Result<Option<Assignment>, ParseError> {
        let Some(tok) = self.peek() else { return Ok(None) };
        let Some((name, value)) = tok.lexeme.split_once('=') else {
            return Ok(None);
        };
        if !is_name(name) {
            return Ok(None);
        }
        let name = name.to_string();
        self.pos += 1;

        let is_array = value.is_empty()
            && self.peek_kind() == Some(TokenKind::LParen)
            && self.tokens[self.pos].span.0 == tok.span.1;
        if !is_array {
            return Ok(Some(Assignment {
                name,
                value: AssignValue::Scalar(value.to_string()),
            }));
        }

        self.pos += 1; // (
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            match self.next() {
                Some(t) if t.kind == TokenKind::Word => items.push(t.lexeme.clone()),
                Some(t) if t.kind == TokenKind::RParen => break,
                _ => return Err(ParseError::MissingKeyword { expected: ")" }),
            }
        }
        Ok(Some(Assignment {
            name,
            value: AssignValue::Array(items),
        }))
    }

    fn parse_redirect(&mut self, operator: &Token) -> Result<Redirect, ParseError> {
        let kind = match operator.kind {
            TokenKind::RedirectIn => RedirectKind::In,
            TokenKind::RedirectOut => RedirectKind::Out,
            TokenKind::RedirectAppend => RedirectKind::Append,
            TokenKind::RedirectErr => RedirectKind::Err,
            _ => RedirectKind::ErrAppend,
        };
        match self.peek() {
            Some(t) if t.kind == TokenKind::Word => {
                self.pos += 1;
                Ok(Redirect {
                    kind,
                    target: t.lexeme.clone(),
                })
            }
            _ => Err(ParseError::MissingRedirectTarget {
                operator: operator.lexeme.clone(),
            }),
        }
    }

    fn parse_if(&mut self) -> Result<Command, ParseError> {
        self.pos += 1; // `if` or `elif`
        let then_at = self.expect_delimiter(self.pos, "then")?;
        let condition = self.parse_span(self.pos, then_at, "if")?;

        let (at, keyword) = self
            .find_delimiter(then_at + 1, &["elif", "else", "fi"])?
            .ok_or(ParseError::MissingKeyword { expected: "fi" })?;
        let then_branch = self.parse_span(then_at + 1, at, "then")?;
        self.pos = at;

        let else_branch = match keyword {
            // The nested if consumes the shared `fi`.
            "elif" => Some(Box::new(self.parse_if()?)),
            "else" => {
                let fi_at = self.expect_delimiter(at + 1, "fi")?;
                let branch = self.parse_span(at + 1, fi_at, "else")?;
                self.pos = fi_at + 1;
                Some(Box::new(branch))
            }
            _ => {
                self.pos = at + 1;
                None
            }
        };

        Ok(Command::If(IfCommand {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch,
        }))
    }

    fn parse_while(&mut self) -> Result<Command, ParseError> {
        self.pos += 1;
        let do_at = self.expect_delimiter(self.pos, "do")?;
        let condition = self.parse_span(self.pos, do_at, "while")?;
        let done_at = self.expect_delimiter(do_at + 1, "done")?;
        let body = self.parse_span(do_at + 1, done_at, "do")?;
        self.pos = done_at + 1;
        Ok(Command::While(WhileCommand {
            condition: Box::new(condition),
            body: Box::new(body),
        }))
    }

    fn parse_for(&mut self) -> Result<Command, ParseError> {
        self.pos += 1;
        let variable = match self.peek() {
            Some(t) if t.kind == TokenKind::Word && is_name(&t.lexeme) => t.lexeme.clone(),
            _ => return Err(ParseError::MissingLoopVariable),
        };
        self.pos += 1;

        if !self.peek().is_some_and(|t| t.is_keyword("in")) {
            return Err(ParseError::MissingKeyword { expected: "in" });
        }
        self.pos += 1;

        let mut values = Vec::new();
        while let Some(t) = self.peek().filter(|t| t.kind == TokenKind::Word) {
            values.push(t.lexeme.clone());
            self.pos += 1;
        }
        self.skip_separators();

        if !self.peek().is_some_and(|t| t.is_keyword("do")) {
            return Err(ParseError::MissingKeyword { expected: "do" });
        }
        let do_at = self.pos;
        let done_at = self.expect_delimiter(do_at + 1, "done")?;
        let body = self.parse_span(do_at + 1, done_at, "do")?;
        self.pos = done_at + 1;

        Ok(Command::For(ForCommand {
            variable,
            values,
            body: Box::new(body),
        }))
    }

    fn parse_case(&mut self) -> Result<Command, ParseError> {
        self.pos += 1;
        let subject = match self.peek() {
            Some(t) if t.kind == TokenKind::Word => t.lexeme.clone(),
            _ => return Err(self.unexpected()),
        };
        self.pos += 1;
        self.skip_newlines();
        if !self.peek().is_some_and(|t| t.is_keyword("in")) {
            return Err(ParseError::MissingKeyword { expected: "in" });
        }
        self.pos += 1;

        let mut branches = Vec::new();
        loop {
            self.skip_separators();
            let Some(tok) = self.peek() else {
                return Err(ParseError::MissingKeyword { expected: "esac" });
            };
            if tok.is_keyword("esac") {
                self.pos += 1;
                break;
            }
            if tok.kind == TokenKind::LParen {
                self.pos += 1;
            }

            let mut patterns = Vec::new();
            loop {
                match self.peek() {
                    Some(t) if t.kind == TokenKind::Word => {
                        patterns.push(t.lexeme.clone());
                        self.pos += 1;
                    }
                    _ => return Err(self.unexpected()),
                }
                match self.peek_kind() {
                    Some(TokenKind::Pipe) => self.pos += 1,
                    Some(TokenKind::RParen) => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(ParseError::MissingKeyword { expected: ")" }),
                }
            }

            let (body_end, _) = self
                .find_delimiter(self.pos, &[";;", "esac"])?
                .ok_or(ParseError::MissingKeyword { expected: "esac" })?;
            let mut commands = self.sub_parser(self.pos, body_end).parse_program()?;
            let body = if commands.len() == 1 {
                commands.remove(0)
            } else {
                Command::Group(commands)
            };
            branches.push(CaseBranch { patterns, body });

            self.pos = body_end;
            if self.tokens[body_end].kind == TokenKind::DoubleSemicolon {
                self.pos += 1;
            }
        }

        Ok(Command::Case(CaseCommand { subject, branches }))
    }

    fn parse_group(&mut self) -> Result<Command, ParseError> {
        self.pos += 1;
        let close = self.expect_delimiter(self.pos, "}")?;
        let commands = self.sub_parser(self.pos, close).parse_program()?;
        self.pos = close + 1;
        Ok(Command::Group(commands))
    }

    fn parse_subshell(&mut self) -> Result<Command, ParseError> {
        self.pos += 1;
        let close = self.expect_delimiter(self.pos, ")")?;
        let body = self.parse_span(self.pos, close, "(")?;
        self.pos = close + 1;
        Ok(Command::Subshell(Box::new(body)))
    }

    fn at_function_header(&self) -> bool {
        self.peek().is_some_and(|t| is_name(&t.lexeme))
            && self.peek_at(1).is_some_and(|t| t.kind == TokenKind::LParen)
            && self.peek_at(2).is_some_and(|t| t.kind == TokenKind::RParen)
    }

    // name() body
    fn parse_function(&mut self) -> Result<Command, ParseError> {
        let name = self.tokens[self.pos].lexeme.clone();
        self.pos += 3;
        self.skip_newlines();
        let body = self.parse_primary()?;
        Ok(Command::Function(FunctionDef {
            name,
            body: Box::new(body),
        }))
    }

    // function name [()] body
    fn parse_function_keyword(&mut self) -> Result<Command, ParseError> {
        self.pos += 1;
        let name = match self.peek() {
            Some(t) if t.kind == TokenKind::Word && is_name(&t.lexeme) => t.lexeme.clone(),
            _ => return Err(self.unexpected()),
        };
        self.pos += 1;
        if self.peek_kind() == Some(TokenKind::LParen)
            && self.peek_at(1).is_some_and(|t| t.kind == TokenKind::RParen)
        {
            self.pos += 2;
        }
        self.skip_newlines();
        let body = self.parse_primary()?;
        Ok(Command::Function(FunctionDef {
            name,
            body: Box::new(body),
        }))
    }
}

// Keyword-delimited span handling
impl<'a> DefaultParser<'a> {
    /// Parses tokens[start..end] as an independent sub-program.
    fn parse_span(&self, start: usize, end: usize, keyword: &'static str) -> Result<Command, ParseError> {
        let mut commands = self.sub_parser(start, end).parse_program()?;
        match commands.len() {
            0 => Err(ParseError::EmptyBody { keyword }),
            1 => Ok(commands.remove(0)),
            _ => Ok(Command::Group(commands)),
        }
    }

    fn expect_delimiter(&self, from: usize, keyword: &'static str) -> Result<usize, ParseError> {
        self.find_delimiter(from, &[keyword])?
            .map(|(at, _)| at)
            .ok_or(ParseError::MissingKeyword { expected: keyword })
    }

    /// Finds the first of `targets` at command position, skipping nested constructs whole
    /// so an inner `done` never closes an outer loop.
    fn find_delimiter(
        &self,
        from: usize,
        targets: &[&'static str],
    ) -> Result<Option<(usize, &'static str)>, ParseError> {
        let mut i = from;
        while i < self.end {
            if let Some(hit) = self.delimiter_at(i, targets) {
                return Ok(Some((i, hit)));
            }
            let tok = &self.tokens[i];
            if tok.kind == TokenKind::Eof {
                break;
            }
            i = match self.closer_for(i) {
                Some(closer) => match self.find_delimiter(i + 1, &[closer])? {
                    Some((at, _)) => at + 1,
                    None => return Err(ParseError::MissingKeyword { expected: closer }),
                },
                // Function header or array literal: parentheses that are not a subshell
                None if tok.kind == TokenKind::LParen => self.tokens[i..self.end]
                    .iter()
                    .position(|t| t.kind == TokenKind::RParen)
                    .map_or(self.end, |offset| i + offset + 1),
                None => i + 1,
            };
        }
        Ok(None)
    }

    fn delimiter_at(&self, i: usize, targets: &[&'static str]) -> Option<&'static str> {
        let tok = &self.tokens[i];
        targets.iter().copied().find(|&target| match tok.kind {
            TokenKind::Word => self.command_position[i] && tok.is_keyword(target),
            TokenKind::DoubleSemicolon => target == ";;",
            TokenKind::RParen => target == ")",
            _ => false,
        })
    }

    fn closer_for(&self, i: usize) -> Option<&'static str> {
        if !self.command_position[i] {
            return None;
        }
        let tok = &self.tokens[i];
        match tok.kind {
            TokenKind::LParen => Some(")"),
            TokenKind::Word => match tok.keyword().unwrap_or_default() {
                "if" => Some("fi"),
                "while" | "for" => Some("done"),
                "case" => Some("esac"),
                "{" => Some("}"),
                _ => None,
            },
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Expect {
    Command,
    Argument,
    FunctionName,
}

fn command_positions(tokens: &[Token]) -> Vec<bool> {
    let mut flags = vec![false; tokens.len()];
    let mut expect = Expect::Command;
    let mut redirect_target = false;

    for (i, tok) in tokens.iter().enumerate() {
        if redirect_target {
            redirect_target = false;
            continue;
        }
        flags[i] = expect == Expect::Command;
        match tok.kind {
            TokenKind::Word => {
                expect = match (expect, tok.keyword().unwrap_or_default()) {
                    (Expect::Command, "if" | "then" | "elif" | "else" | "do" | "while" | "{") => {
                        Expect::Command
                    }
                    (Expect::Command, "function") => Expect::FunctionName,
                    (Expect::FunctionName, _) => Expect::Command,
                    _ => Expect::Argument,
                };
            }
            kind if kind.is_redirect() => redirect_target = true,
            kind if kind.starts_command() => expect = Expect::Command,
            _ => {}
        }
    }
    flags
}

pub(crate) fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
