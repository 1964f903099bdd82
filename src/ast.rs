use std::fmt;

/// A parsed command tree. Each variant owns exactly its own payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Simple(SimpleCommand),
    Pipeline {
        left: Box<Command>,
        right: Box<Command>,
    },
    Background {
        command: Box<Command>,
        source: String,
    },
    List(List),
    If(IfCommand),
    For(ForCommand),
    While(WhileCommand),
    Case(CaseCommand),
    Function(FunctionDef),
    Subshell(Box<Command>),
    Group(Vec<Command>),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SimpleCommand {
    pub assignments: Vec<Assignment>,
    pub name: String,
    pub args: Vec<String>,
    pub redirects: Vec<Redirect>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub value: AssignValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignValue {
    Scalar(String),
    Array(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    In,        // <
    Out,       // >
    Append,    // >>
    Err,       // 2>
    ErrAppend, // 2>>
    HereDoc,
    HereString,
}

/// Which standard stream a redirect rebinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTarget {
    Stdin,
    Stdout,
    Stderr,
}

impl RedirectKind {
    pub fn operator(self) -> &'static str {
        match self {
            RedirectKind::In => "<",
            RedirectKind::Out => ">",
            RedirectKind::Append => ">>",
            RedirectKind::Err => "2>",
            RedirectKind::ErrAppend => "2>>",
            RedirectKind::HereDoc => "<<",
            RedirectKind::HereString => "<<<",
        }
    }

    pub fn stream(self) -> StreamTarget {
        match self {
            RedirectKind::In | RedirectKind::HereDoc | RedirectKind::HereString => StreamTarget::Stdin,
            RedirectKind::Out | RedirectKind::Append => StreamTarget::Stdout,
            RedirectKind::Err | RedirectKind::ErrAppend => StreamTarget::Stderr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub kind: RedirectKind,
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct List {
    pub commands: Vec<Command>,
    pub operators: Vec<ListOp>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfCommand {
    pub condition: Box<Command>,
    pub then_branch: Box<Command>,
    pub else_branch: Option<Box<Command>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhileCommand {
    pub condition: Box<Command>,
    pub body: Box<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForCommand {
    pub variable: String,
    pub values: Vec<String>,
    pub body: Box<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseCommand {
    pub subject: String,
    pub branches: Vec<CaseBranch>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseBranch {
    pub patterns: Vec<String>,
    pub body: Command,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: String,
    pub body: Box<Command>,
}

impl Command {
    pub fn simple(name: &str, args: &[&str]) -> Command {
        Command::Simple(SimpleCommand {
            name: name.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            ..SimpleCommand::default()
        })
    }
}

// Rendering back to shell syntax. Re-parsing the output gives an equal tree.

const RESERVED_WORDS: &[&str] = &[
    "if", "then", "elif", "else", "fi", "while", "for", "do", "done", "case", "in", "esac",
    "function", "{", "}",
];

fn quote(word: &str) -> String {
    let plain = !word.is_empty()
        && !RESERVED_WORDS.contains(&word)
        && word.chars().all(|c| {
            !c.is_whitespace() && !matches!(c, '|' | '&' | ';' | '<' | '>' | '(' | ')' | '\'' | '"' | '#' | '\\')
        });
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}

impl fmt::Display for SimpleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        for assignment in &self.assignments {
            match &assignment.value {
                AssignValue::Scalar(v) => parts.push(format!("{}={}", assignment.name, quote_value(v))),
                AssignValue::Array(items) => {
                    let items: Vec<String> = items.iter().map(|s| quote(s)).collect();
                    parts.push(format!("{}=({})", assignment.name, items.join(" ")));
                }
            }
        }
        if !self.name.is_empty() {
            parts.push(quote(&self.name));
        }
        parts.extend(self.args.iter().map(|a| quote(a)));
        for r in &self.redirects {
            parts.push(format!("{} {}", r.kind.operator(), quote(&r.target)));
        }
        write!(f, "{}", parts.join(" "))
    }
}

fn quote_value(value: &str) -> String {
    if value.is_empty() { "''".to_string() } else { quote(value) }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Simple(cmd) => write!(f, "{}", cmd),
            Command::Pipeline { left, right } => write!(f, "{} | {}", left, right),
            Command::Background { command, .. } => write!(f, "{} &", command),
            Command::List(list) => {
                for (i, cmd) in list.commands.iter().enumerate() {
                    if i > 0 {
                        let op = match list.operators[i - 1] {
                            ListOp::And => "&&",
                            ListOp::Or => "||",
                        };
                        write!(f, " {} ", op)?;
                    }
                    write!(f, "{}", cmd)?;
                }
                Ok(())
            }
            Command::If(cmd) => {
                write!(f, "if {}; then {}; ", cmd.condition, cmd.then_branch)?;
                if let Some(else_branch) = &cmd.else_branch {
                    write!(f, "else {}; ", else_branch)?;
                }
                write!(f, "fi")
            }
            Command::While(cmd) => write!(f, "while {}; do {}; done", cmd.condition, cmd.body),
            Command::For(cmd) => {
                let values: Vec<String> = cmd.values.iter().map(|v| quote(v)).collect();
                write!(f, "for {} in {}; do {}; done", cmd.variable, values.join(" "), cmd.body)
            }
            Command::Case(cmd) => {
                write!(f, "case {} in", quote(&cmd.subject))?;
                for branch in &cmd.branches {
                    let patterns: Vec<String> = branch.patterns.iter().map(|p| quote(p)).collect();
                    write!(f, " {}) {};;", patterns.join(" | "), branch.body)?;
                }
                write!(f, " esac")
            }
            Command::Function(def) => write!(f, "{}() {}", def.name, def.body),
            Command::Subshell(inner) => write!(f, "( {} )", inner),
            Command::Group(commands) => {
                write!(f, "{{ ")?;
                for cmd in commands {
                    write!(f, "{}; ", cmd)?;
                }
                write!(f, "}}")
            }
        }
    }
}
