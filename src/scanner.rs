//! Character-level cursor over recipe and depfile text, with parse errors
//! that point at the offending line.

use std::path::Path;

#[derive(Debug)]
pub struct ParseError {
    msg: String,
    ofs: usize,
}

pub type ParseResult<T> = Result<T, ParseError>;

/// A cursor over a nul-terminated buffer.  The trailing nul stands in for
/// end-of-input, so callers can always look at "the current char"; the
/// cursor never moves past it.
pub struct Scanner<'a> {
    buf: &'a [u8],
    pub ofs: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        assert!(buf.ends_with(b"\0"), "scanner input must be nul-terminated");
        Scanner { buf, ofs: 0 }
    }

    pub fn peek(&self) -> char {
        self.buf[self.ofs] as char
    }

    /// The char after the current one; lookahead for two-char sequences.
    pub fn peek2(&self) -> char {
        match self.buf.get(self.ofs + 1) {
            Some(&byte) => byte as char,
            None => '\0',
        }
    }

    /// Advance one char, stopping at the trailing nul.
    pub fn bump(&mut self) {
        if self.ofs + 1 < self.buf.len() {
            self.ofs += 1;
        }
    }

    /// Advance past `ch` if it is the current char.
    pub fn skip(&mut self, ch: char) -> bool {
        if self.peek() == ch {
            self.bump();
            return true;
        }
        false
    }

    /// Advance while `pred` accepts the current char.
    /// Returns whether the cursor moved at all.
    pub fn skip_run(&mut self, pred: impl Fn(char) -> bool) -> bool {
        let start = self.ofs;
        while self.peek() != '\0' && pred(self.peek()) {
            self.bump();
        }
        self.ofs > start
    }

    /// The remainder of the current line, leaving the cursor on the newline.
    pub fn rest_of_line(&mut self) -> &'a str {
        let start = self.ofs;
        while !matches!(self.peek(), '\n' | '\0') {
            self.bump();
        }
        self.slice(start, self.ofs)
    }

    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        std::str::from_utf8(&self.buf[start..end]).expect("scanned text is utf-8")
    }

    pub fn expect(&mut self, ch: char) -> ParseResult<()> {
        if self.skip(ch) {
            return Ok(());
        }
        self.parse_error(format!("expected {:?}, got {:?}", ch, self.peek()))
    }

    pub fn parse_error<T, S: Into<String>>(&self, msg: S) -> ParseResult<T> {
        Err(ParseError {
            msg: msg.into(),
            ofs: self.ofs,
        })
    }

    /// Render a ParseError naming the file and line, with a window of the
    /// offending line and a caret under the column.
    pub fn format_parse_error(&self, filename: &Path, err: ParseError) -> String {
        let text = &self.buf[..self.buf.len() - 1];
        let ofs = err.ofs.min(text.len());
        let line_start = match text[..ofs].iter().rposition(|&byte| byte == b'\n') {
            Some(newline) => newline + 1,
            None => 0,
        };
        let line_len = text[ofs..]
            .iter()
            .position(|&byte| byte == b'\n')
            .unwrap_or(text.len() - ofs)
            + (ofs - line_start);
        let line_number = 1 + text[..line_start].iter().filter(|&&byte| byte == b'\n').count();

        let mut line = &text[line_start..line_start + line_len];
        let mut col = ofs - line_start;
        let mut msg = format!("parse error: {}\n", err.msg);
        let prefix = format!("{}:{}: ", filename.display(), line_number);
        msg.push_str(&prefix);
        if col > 40 {
            // Window the line so the column stays on screen.
            line = &line[col - 20..];
            col = 20 + 3;
            msg.push_str("...");
        }
        if line.len() > 40 {
            msg.push_str(&String::from_utf8_lossy(&line[..40]));
            msg.push_str("...");
        } else {
            msg.push_str(&String::from_utf8_lossy(line));
        }
        msg.push('\n');
        msg.push_str(&" ".repeat(prefix.len() + col));
        msg.push_str("^\n");
        msg
    }
}
