//! Command scripts for `tdbsh`.
//!
//! One command per line; blank lines and lines starting with `#` are
//! skipped. Arguments are separated by whitespace. A double-quoted argument
//! may contain spaces and the escapes `\"` and `\\`; `""` is the empty
//! string.
//!
//! - `open <path> [hash_size tdb_flags open_flags mode]`
//! - `new <path>` - open with the configured defaults
//! - `store <path> <key> <value> [insert|modify|replace]`
//! - `fetch <path> <key>`
//! - `close <path>`
//! - `debug <path>` - toggle the debug flag
//! - `paths` - list registered paths

use std::collections::HashMap;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::os::raw::c_int;
use tdbshare::consts::mode_t;
use tdbshare::{Handle, OpenOptions, Registry, StoreMode, TdbRuntime};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open {
        path: String,
        options: Option<OpenOptions>,
    },
    New {
        path: String,
    },
    Store {
        path: String,
        key: String,
        value: String,
        mode: StoreMode,
    },
    Fetch {
        path: String,
        key: String,
    },
    Close {
        path: String,
    },
    Debug {
        path: String,
    },
    Paths,
}

#[derive(Debug)]
pub enum ShellError {
    Parse(String),
    UnknownPath(String),
    Db(tdbshare::Error),
    Io(io::Error),
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "syntax error: {msg}"),
            Self::UnknownPath(path) => write!(f, "{path:?} was never opened"),
            Self::Db(e) => write!(f, "{e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for ShellError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Db(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<tdbshare::Error> for ShellError {
    fn from(e: tdbshare::Error) -> Self {
        Self::Db(e)
    }
}

impl From<io::Error> for ShellError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

fn parse_error(msg: impl Into<String>) -> ShellError {
    ShellError::Parse(msg.into())
}

/// Split a line into arguments, honouring double quotes.
fn tokenize(line: &str) -> Result<Vec<String>, ShellError> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else {
            return Ok(tokens);
        };
        let mut token = String::new();
        if first == '"' {
            chars.next();
            loop {
                match chars.next() {
                    None => return Err(parse_error("unterminated quote")),
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some(c @ ('"' | '\\')) => token.push(c),
                        Some(c) => return Err(parse_error(format!("unknown escape \\{c}"))),
                        None => return Err(parse_error("unterminated quote")),
                    },
                    Some(c) => token.push(c),
                }
            }
            if chars.peek().is_some_and(|c| !c.is_whitespace()) {
                return Err(parse_error("text after closing quote"));
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                token.push(c);
            }
        }
        tokens.push(token);
    }
}

/// Digits and radix of a decimal, `0x` hex or `0o` octal literal
fn split_radix(s: &str) -> (&str, u32) {
    if let Some(hex) = s.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(oct) = s.strip_prefix("0o") {
        (oct, 8)
    } else {
        (s, 10)
    }
}

fn parse_int(s: &str) -> Result<c_int, ShellError> {
    let (digits, radix) = split_radix(s);
    c_int::from_str_radix(digits, radix).map_err(|e| parse_error(format!("bad number {s:?}: {e}")))
}

/// Permission bits; negative values are rejected
fn parse_perm(s: &str) -> Result<mode_t, ShellError> {
    let (digits, radix) = split_radix(s);
    mode_t::from_str_radix(digits, radix).map_err(|e| parse_error(format!("bad mode {s:?}: {e}")))
}

fn parse_mode(s: &str) -> Result<StoreMode, ShellError> {
    match s {
        "insert" => Ok(StoreMode::Insert),
        "modify" => Ok(StoreMode::Modify),
        "replace" => Ok(StoreMode::Replace),
        other => Err(parse_error(format!("unknown store mode {other:?}"))),
    }
}

fn arity(name: &str, args: &[String], allowed: &[usize]) -> Result<(), ShellError> {
    if allowed.contains(&args.len()) {
        Ok(())
    } else {
        Err(parse_error(format!(
            "{name} takes {allowed:?} arguments, got {}",
            args.len()
        )))
    }
}

impl Command {
    /// `Ok(None)` for blank lines and comments
    ///
    /// # Errors
    /// Unknown commands, wrong argument counts, malformed numbers.
    pub fn parse(line: &str) -> Result<Option<Self>, ShellError> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }
        let mut tokens = tokenize(trimmed)?;
        let name = tokens.remove(0);
        let mut args = tokens.into_iter();
        let cmd = match name.as_str() {
            "open" => {
                let rest: Vec<String> = args.collect();
                arity("open", &rest, &[1, 5])?;
                let options = if rest.len() == 5 {
                    let mode = parse_perm(&rest[4])?;
                    Some(
                        OpenOptions::new()
                            .hash_size(parse_int(&rest[1])?)
                            .tdb_flags(parse_int(&rest[2])?)
                            .open_flags(parse_int(&rest[3])?)
                            .mode(mode),
                    )
                } else {
                    None
                };
                Command::Open {
                    path: rest[0].clone(),
                    options,
                }
            }
            "store" => {
                let rest: Vec<String> = args.collect();
                arity("store", &rest, &[3, 4])?;
                let mode = match rest.get(3) {
                    Some(m) => parse_mode(m)?,
                    None => StoreMode::Replace,
                };
                let mut rest = rest.into_iter();
                Command::Store {
                    path: rest.next().unwrap_or_default(),
                    key: rest.next().unwrap_or_default(),
                    value: rest.next().unwrap_or_default(),
                    mode,
                }
            }
            "fetch" => {
                let rest: Vec<String> = args.collect();
                arity("fetch", &rest, &[2])?;
                let mut rest = rest.into_iter();
                Command::Fetch {
                    path: rest.next().unwrap_or_default(),
                    key: rest.next().unwrap_or_default(),
                }
            }
            "new" | "close" | "debug" => {
                let path = args.next();
                match (path, args.next()) {
                    (Some(path), None) => match name.as_str() {
                        "new" => Command::New { path },
                        "close" => Command::Close { path },
                        _ => Command::Debug { path },
                    },
                    _ => return Err(parse_error(format!("{name} takes one path"))),
                }
            }
            "paths" => {
                if args.next().is_some() {
                    return Err(parse_error("paths takes no arguments"));
                }
                Command::Paths
            }
            other => return Err(parse_error(format!("unknown command {other:?}"))),
        };
        Ok(Some(cmd))
    }
}

/// Runs commands against one registry, remembering a handle per path.
pub struct Shell<R: TdbRuntime> {
    registry: Registry<R>,
    handles: HashMap<String, Handle<R>>,
}

impl<R: TdbRuntime> Shell<R> {
    #[must_use]
    pub fn new(registry: Registry<R>) -> Self {
        Self {
            registry,
            handles: HashMap::new(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Registry<R> {
        &self.registry
    }

    fn handle(&self, path: &str) -> Result<&Handle<R>, ShellError> {
        self.handles
            .get(path)
            .ok_or_else(|| ShellError::UnknownPath(path.to_string()))
    }

    /// # Errors
    /// The command's failure; the shell stays usable.
    pub fn execute<W: Write>(&mut self, cmd: &Command, out: &mut W) -> Result<(), ShellError> {
        debug!(?cmd, "execute");
        match cmd {
            Command::Open { path, options } => {
                let opened = match options {
                    Some(options) => self.registry.open(path, options),
                    None => self.registry.open_default(path),
                };
                self.handles.insert(path.clone(), opened.handle.clone());
                if let Some(e) = opened.error {
                    return Err(e.into());
                }
                writeln!(out, "{}", opened.handle)?;
            }
            Command::New { path } => {
                let opened = self.registry.open_default(path);
                self.handles.insert(path.clone(), opened.handle.clone());
                if let Some(e) = opened.error {
                    return Err(e.into());
                }
                writeln!(out, "{}", opened.handle)?;
            }
            Command::Store {
                path,
                key,
                value,
                mode,
            } => {
                self.handle(path)?.store(key, value, *mode)?;
                writeln!(out, "ok")?;
            }
            Command::Fetch { path, key } => {
                let value = self.handle(path)?.fetch(key)?;
                writeln!(out, "{value}")?;
            }
            Command::Close { path } => {
                self.registry.close(self.handle(path)?)?;
                writeln!(out, "ok")?;
            }
            Command::Debug { path } => {
                let on = self.registry.toggle_debug(self.handle(path)?);
                writeln!(out, "debug {}", if on { "on" } else { "off" })?;
            }
            Command::Paths => {
                for path in self.registry.paths() {
                    writeln!(out, "{path}")?;
                }
            }
        }
        Ok(())
    }

    /// Run every line of `input`, reporting failures to `out` and going on.
    ///
    /// Returns the number of failed lines.
    ///
    /// # Errors
    /// Only I/O errors on `input` or `out`.
    pub fn run_script<I: BufRead, W: Write>(&mut self, input: I, out: &mut W) -> io::Result<usize> {
        let mut failures = 0;
        for (index, line) in input.lines().enumerate() {
            let line = line?;
            let result = match Command::parse(&line) {
                Ok(Some(cmd)) => self.execute(&cmd, out),
                Ok(None) => Ok(()),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {}
                Err(ShellError::Io(e)) => return Err(e),
                Err(e) => {
                    failures += 1;
                    writeln!(out, "line {}: error: {e}", index + 1)?;
                }
            }
        }
        Ok(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tdb_runtime_mocked::MemTdb;
    use tdbshare::consts;

    fn run(script: &str) -> (String, usize) {
        let mut shell = Shell::new(Registry::new(MemTdb::new()));
        let mut out = Vec::new();
        let failures = shell.run_script(script.as_bytes(), &mut out).unwrap();
        (String::from_utf8(out).unwrap(), failures)
    }

    #[test]
    fn test_tokenize_quotes() {
        assert_eq!(
            tokenize(r#"store a.db "two words" "" x"#).unwrap(),
            vec!["store", "a.db", "two words", "", "x"]
        );
        assert_eq!(tokenize(r#""a\"b\\""#).unwrap(), vec![r#"a"b\"#]);
        assert!(tokenize(r#""open"#).is_err());
        assert!(tokenize(r#""a"b"#).is_err());
    }

    #[test]
    fn test_parse_open_with_options() {
        let cmd = Command::parse("open a.db 0 0x1 0o0 0o644").unwrap().unwrap();
        assert_eq!(
            cmd,
            Command::Open {
                path: "a.db".to_string(),
                options: Some(
                    OpenOptions::new()
                        .tdb_flags(consts::CLEAR_IF_FIRST)
                        .open_flags(consts::O_RDONLY)
                        .mode(0o644)
                ),
            }
        );
    }

    #[test]
    fn test_parse_open_mode_radix() {
        for (text, mode) in [("420", 0o644), ("0x1a4", 0o644), ("0o600", 0o600), ("4294967295", u32::MAX)] {
            let cmd = Command::parse(&format!("open a.db 0 0 2 {text}")).unwrap().unwrap();
            let Command::Open { options: Some(options), .. } = cmd else {
                panic!("expected open with options for {text}");
            };
            assert_eq!(options.mode, mode, "{text}");
        }
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Command::parse("open a.db 0 0").is_err());
        assert!(Command::parse("open a.db 0 0 2 -1").is_err());
        assert!(Command::parse("open a.db 0 0 2 0o9").is_err());
        assert!(Command::parse("store a.db k").is_err());
        assert!(Command::parse("store a.db k v upsert").is_err());
        assert!(Command::parse("close").is_err());
        assert!(Command::parse("drop a.db").is_err());
        assert!(Command::parse("paths now").is_err());
        assert_eq!(Command::parse("  # comment").unwrap(), None);
        assert_eq!(Command::parse("").unwrap(), None);
    }

    #[test]
    fn test_script_end_to_end() {
        let script = "\
new a.db
store a.db k v insert
fetch a.db k
close a.db
fetch a.db k
open a.db
fetch a.db k
paths
";
        let (out, failures) = run(script);
        assert_eq!(failures, 1);
        assert_eq!(
            out,
            "\
DB{pth:\"a.db\", Dbg:false}
ok
v
ok
line 5: error: database \"a.db\" is closed
DB{pth:\"a.db\", Dbg:false}
v
a.db
"
        );
    }

    #[test]
    fn test_script_reports_engine_errors() {
        let script = "\
new a.db
store a.db k v insert
store a.db k w insert
debug a.db
store a.db \"\" \"\"
fetch a.db \"\"
fetch b.db k
";
        let (out, failures) = run(script);
        assert_eq!(failures, 2);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[2], "line 3: error: ERR_EXISTS: Record exists");
        assert_eq!(lines[3], "debug on");
        assert_eq!(lines[4], "ok");
        assert_eq!(lines[5], "");
        assert_eq!(lines[6], "line 7: error: \"b.db\" was never opened");
    }
}
