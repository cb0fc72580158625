//! Parsing of the Makefile subset found in `.d` files emitted by C compilers
//! under `-MMD -MF`: a single `target: dep dep ...` rule, possibly continued
//! across lines with a trailing backslash.  `\<space>` and `\\` escapes are
//! honored so paths containing spaces survive.

use crate::scanner::{ParseResult, Scanner};
use anyhow::{anyhow, bail};
use std::path::Path;

#[derive(Debug, PartialEq)]
pub struct Depfile {
    pub target: String,
    pub deps: Vec<String>,
}

/// Skip spaces and backslash-newline continuations.
fn skip_separators(scanner: &mut Scanner) {
    loop {
        if scanner.skip(' ') {
            continue;
        }
        if scanner.peek() == '\\' && scanner.peek2() == '\n' {
            scanner.bump();
            scanner.bump();
            continue;
        }
        return;
    }
}

/// Read one (unescaped) path token.  Returns None at end of line/input.
/// Accumulates bytes so multi-byte characters in paths pass through intact.
fn read_path(scanner: &mut Scanner) -> Option<String> {
    skip_separators(scanner);
    let mut path = Vec::new();
    loop {
        match scanner.peek() {
            '\0' | ' ' | '\n' => break,
            '\\' => {
                scanner.bump();
                match scanner.peek() {
                    ' ' | '\\' => {
                        path.push(scanner.peek() as u8);
                        scanner.bump();
                    }
                    '\n' => {
                        // Continuation; the token ended just before it.
                        scanner.bump();
                        break;
                    }
                    '\0' => {
                        path.push(b'\\');
                        break;
                    }
                    other => {
                        // Not an escape we understand; keep both chars.
                        path.push(b'\\');
                        path.push(other as u8);
                        scanner.bump();
                    }
                }
            }
            ch => {
                path.push(ch as u8);
                scanner.bump();
            }
        }
    }
    if path.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(&path).into_owned())
    }
}

/// Parse a `.d` file into its single rule.
pub fn parse(scanner: &mut Scanner) -> ParseResult<Depfile> {
    scanner.skip_run(|ch| ch == ' ' || ch == '\n');
    let target = match read_path(scanner) {
        None => return scanner.parse_error("expected target"),
        Some(target) => target,
    };
    let target = match target.strip_suffix(':') {
        Some(target) => target.to_string(),
        None => {
            scanner.skip_run(|ch| ch == ' ');
            scanner.expect(':')?;
            target
        }
    };
    let mut deps = Vec::new();
    loop {
        skip_separators(scanner);
        if matches!(scanner.peek(), '\n' | '\0') {
            break;
        }
        match read_path(scanner) {
            Some(dep) => deps.push(dep),
            None => break,
        }
    }
    Ok(Depfile { target, deps })
}

/// Read a depfile from disk.  When `expected_target` is given, a rule naming
/// any other target fails.
pub fn read(path: &Path, expected_target: Option<&str>) -> anyhow::Result<Vec<String>> {
    let mut bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => bail!("read {}: {}", path.display(), err),
    };
    bytes.push(0);
    let mut scanner = Scanner::new(&bytes);
    let depfile =
        parse(&mut scanner).map_err(|err| anyhow!(scanner.format_parse_error(path, err)))?;
    if let Some(expected) = expected_target {
        if depfile.target != expected {
            bail!(
                "{} names target {:?}, expected {:?}",
                path.display(),
                depfile.target,
                expected
            );
        }
    }
    Ok(depfile.deps)
}
