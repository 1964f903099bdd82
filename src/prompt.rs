use std::io::{self, BufRead, Write};

pub const CONTINUATION_PROMPT: &str = "> ";

pub struct ShellPrompt {
    prompt: String,
}

impl ShellPrompt {
    pub fn new(prompt: impl Into<String>) -> Self {
        ShellPrompt {
            prompt: prompt.into(),
        }
    }

    pub fn show_prompt(&self) -> io::Result<()> {
        Self::show(&self.prompt)
    }

    /// Shown while a line is still incomplete, e.g. inside an open `if`.
    pub fn show_continuation(&self) -> io::Result<()> {
        Self::show(CONTINUATION_PROMPT)
    }

    fn show(text: &str) -> io::Result<()> {
        let mut out = io::stdout();
        write!(out, "{}", text)?;
        out.flush()
    }

    pub fn read_line(&self) -> io::Result<Option<String>> {
        read_line_from(&mut io::stdin().lock())
    }
}

/// One line without its terminator, or `None` at EOF.
pub fn read_line_from<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut buf = String::new();
    let bytes_read = reader.read_line(&mut buf)?;
    if bytes_read == 0 {
        // EOF (e.g., Ctrl-D)
        return Ok(None);
    }
    let trimmed = buf.trim_end_matches(['\n', '\r']).len();
    buf.truncate(trimmed);
    Ok(Some(buf))
}
