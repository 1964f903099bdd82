//! Stream bindings for one command and the redirects that rebind them.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::process::Stdio;

use crate::ast::{Redirect, RedirectKind, StreamTarget};

use super::executor::ExecError;

/// Where one standard stream of a command goes.
#[derive(Debug)]
pub enum Stream {
    /// The interpreter's own stream.
    Inherit,
    File(File),
    /// `/dev/null` for children, a sink or empty reader for builtins.
    Null,
}

impl Stream {
    pub fn try_clone(&self) -> io::Result<Stream> {
        Ok(match self {
            Stream::Inherit => Stream::Inherit,
            Stream::File(f) => Stream::File(f.try_clone()?),
            Stream::Null => Stream::Null,
        })
    }

    /// A `Stdio` for a child process. Files are duplicated, so `self` keeps its handle.
    pub fn stdio(&self) -> io::Result<Stdio> {
        Ok(match self {
            Stream::Inherit => Stdio::inherit(),
            Stream::File(f) => Stdio::from(f.try_clone()?),
            Stream::Null => Stdio::null(),
        })
    }
}

/// The three stream bindings a command runs with.
#[derive(Debug)]
pub struct IoContext {
    pub stdin: Stream,
    pub stdout: Stream,
    pub stderr: Stream,
}

impl IoContext {
    pub fn inherit() -> Self {
        IoContext {
            stdin: Stream::Inherit,
            stdout: Stream::Inherit,
            stderr: Stream::Inherit,
        }
    }

    pub fn try_clone(&self) -> io::Result<Self> {
        Ok(IoContext {
            stdin: self.stdin.try_clone()?,
            stdout: self.stdout.try_clone()?,
            stderr: self.stderr.try_clone()?,
        })
    }

    pub fn input(&self) -> Input<'_> {
        match &self.stdin {
            Stream::Inherit => Input::Stdin(io::stdin()),
            Stream::File(f) => Input::File(f),
            Stream::Null => Input::Empty,
        }
    }

    pub fn out(&self) -> Output<'_> {
        match &self.stdout {
            Stream::Inherit => Output::Stdout(io::stdout()),
            Stream::File(f) => Output::File(f),
            Stream::Null => Output::Sink,
        }
    }

    pub fn err(&self) -> Output<'_> {
        match &self.stderr {
            Stream::Inherit => Output::Stderr(io::stderr()),
            Stream::File(f) => Output::File(f),
            Stream::Null => Output::Sink,
        }
    }

    /// A copy of this context with `redirects` applied.
    ///
    /// Only the last redirect for each stream is opened, so an earlier `> f`
    /// never truncates a file that a later `>> f` appends to.
    pub fn with_redirects(&self, redirects: &[Redirect]) -> Result<IoContext, ExecError> {
        let mut effective: [Option<&Redirect>; 3] = [None; 3];
        for redirect in redirects {
            if matches!(redirect.kind, RedirectKind::HereDoc | RedirectKind::HereString) {
                return Err(ExecError::Unsupported(redirect.kind.operator().to_string()));
            }
            let slot = match redirect.kind.stream() {
                StreamTarget::Stdin => 0,
                StreamTarget::Stdout => 1,
                StreamTarget::Stderr => 2,
            };
            effective[slot] = Some(redirect);
        }

        let mut io = self.try_clone()?;
        if let Some(r) = effective[0] {
            io.stdin = Stream::File(open_redirect(r)?);
        }
        if let Some(r) = effective[1] {
            io.stdout = Stream::File(open_redirect(r)?);
        }
        if let Some(r) = effective[2] {
            io.stderr = Stream::File(open_redirect(r)?);
        }
        Ok(io)
    }
}

fn open_redirect(redirect: &Redirect) -> Result<File, ExecError> {
    let path = &redirect.target;
    let opened = match redirect.kind {
        RedirectKind::In => File::open(path),
        RedirectKind::Out | RedirectKind::Err => File::create(path),
        RedirectKind::Append | RedirectKind::ErrAppend => {
            OpenOptions::new().append(true).create(true).open(path)
        }
        RedirectKind::HereDoc | RedirectKind::HereString => {
            return Err(ExecError::Unsupported(redirect.kind.operator().to_string()));
        }
    };
    opened.map_err(|source| ExecError::Redirect {
        path: path.clone(),
        source,
    })
}

/// Readable end of a command's stdin.
pub enum Input<'a> {
    Stdin(io::Stdin),
    File(&'a File),
    Empty,
}

impl Read for Input<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Input::Stdin(s) => s.read(buf),
            Input::File(f) => f.read(buf),
            Input::Empty => Ok(0),
        }
    }
}

/// Writable end of a command's stdout or stderr.
pub enum Output<'a> {
    Stdout(io::Stdout),
    Stderr(io::Stderr),
    File(&'a File),
    Sink,
}

impl Write for Output<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout(s) => s.write(buf),
            Output::Stderr(s) => s.write(buf),
            Output::File(f) => f.write(buf),
            Output::Sink => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout(s) => s.flush(),
            Output::Stderr(s) => s.flush(),
            Output::File(f) => f.flush(),
            Output::Sink => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn redirect(kind: RedirectKind, target: &std::path::Path) -> Redirect {
        Redirect {
            kind,
            target: target.to_string_lossy().into_owned(),
        }
    }

    #[test]
    fn test_output_and_error_redirects() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let err = dir.path().join("err");
        let io = IoContext::inherit()
            .with_redirects(&[redirect(RedirectKind::Out, &out), redirect(RedirectKind::Err, &err)])
            .unwrap();
        write!(io.out(), "to out").unwrap();
        write!(io.err(), "to err").unwrap();
        drop(io);
        assert_eq!(fs::read_to_string(&out).unwrap(), "to out");
        assert_eq!(fs::read_to_string(&err).unwrap(), "to err");
    }

    #[test]
    fn test_last_redirect_wins_and_append_never_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.out");
        fs::write(&file, "keep\n").unwrap();
        let io = IoContext::inherit()
            .with_redirects(&[redirect(RedirectKind::Out, &file), redirect(RedirectKind::Append, &file)])
            .unwrap();
        writeln!(io.out(), "more").unwrap();
        drop(io);
        assert_eq!(fs::read_to_string(&file).unwrap(), "keep\nmore\n");
    }

    #[test]
    fn test_shadowed_redirect_is_not_opened() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        IoContext::inherit()
            .with_redirects(&[redirect(RedirectKind::Out, &first), redirect(RedirectKind::Out, &second)])
            .unwrap();
        assert!(!first.exists());
        assert!(second.exists());
    }

    #[test]
    fn test_input_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("in");
        fs::write(&file, "line\n").unwrap();
        let io = IoContext::inherit()
            .with_redirects(&[redirect(RedirectKind::In, &file)])
            .unwrap();
        let mut text = String::new();
        io.input().read_to_string(&mut text).unwrap();
        assert_eq!(text, "line\n");
    }

    #[test]
    fn test_missing_input_is_a_redirect_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let err = IoContext::inherit()
            .with_redirects(&[redirect(RedirectKind::In, &missing)])
            .unwrap_err();
        assert!(matches!(err, ExecError::Redirect { .. }));
        assert_eq!(err.status(), 1);
    }

    #[test]
    fn test_here_doc_is_unsupported() {
        let err = IoContext::inherit()
            .with_redirects(&[Redirect { kind: RedirectKind::HereDoc, target: "EOF".into() }])
            .unwrap_err();
        assert!(matches!(err, ExecError::Unsupported(op) if op == "<<"));
    }

    #[test]
    fn test_null_streams() {
        let io = IoContext {
            stdin: Stream::Null,
            stdout: Stream::Null,
            stderr: Stream::Null,
        };
        let mut text = String::new();
        assert_eq!(io.input().read_to_string(&mut text).unwrap(), 0);
        assert_eq!(io.out().write(b"dropped").unwrap(), 7);
    }
}
