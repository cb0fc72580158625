//! The recipe model: rules, builds, bindings, and the line-oriented text
//! format they are read from and written to.
//!
//! A recipe file is a sequence of blocks and single-line directives:
//!
//! ```text
//! rule cc
//!     description compiling $in
//!     command gcc -MMD -MF$out.d -c -o $out $cflags $in
//!     depfile $out.d
//!     deps gcc
//!
//! build cc
//!     input src/a.c
//!     output obj/a.o
//!
//! binding cflags = -O2
//! cacheDir obj
//! ```
//!
//! Body lines are indented by any non-empty run of spaces or tabs; a block
//! ends at a blank line (or end of file).

use crate::scanner::{ParseError, ParseResult, Scanner};
use crate::smallmap::SmallMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// How a rule's compiler reports discovered dependencies.
/// `Msvc` and `Dmd` are accepted on load but currently treated like `None`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DepsFormat {
    #[default]
    None,
    Gcc,
    Msvc,
    Dmd,
}

impl DepsFormat {
    fn parse(text: &str) -> Option<DepsFormat> {
        Some(match text {
            "none" => DepsFormat::None,
            "gcc" => DepsFormat::Gcc,
            "msvc" => DepsFormat::Msvc,
            "dmd" => DepsFormat::Dmd,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DepsFormat::None => "none",
            DepsFormat::Gcc => "gcc",
            DepsFormat::Msvc => "msvc",
            DepsFormat::Dmd => "dmd",
        }
    }
}

/// A template for producing outputs from inputs via a command line.
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    pub name: String,
    pub description: String,
    pub command: String,
    pub depfile: Option<String>,
    pub deps: DepsFormat,
    pub jobs: usize,
}

impl Rule {
    pub fn new(name: impl Into<String>) -> Rule {
        Rule {
            name: name.into(),
            description: "Processing $in".to_string(),
            command: String::new(),
            depfile: None,
            deps: DepsFormat::None,
            jobs: 1,
        }
    }
}

/// An instantiation of a rule with concrete paths and local bindings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Build {
    pub rule: String,
    pub ins: Vec<String>,
    pub implicit_ins: Vec<String>,
    pub order_only_ins: Vec<String>,
    pub outs: Vec<String>,
    pub implicit_outs: Vec<String>,
    pub bindings: SmallMap<String, String>,
    pub jobs: Option<usize>,
}

impl Build {
    pub fn new(rule: impl Into<String>) -> Build {
        Build {
            rule: rule.into(),
            ..Build::default()
        }
    }
}

/// The declarative input to a build: rules + builds + bindings + cache dir.
#[derive(Clone, Debug, PartialEq)]
pub struct Recipe {
    pub rules: Vec<Rule>,
    pub builds: Vec<Build>,
    pub bindings: SmallMap<String, String>,
    pub cache_dir: PathBuf,
}

impl Default for Recipe {
    fn default() -> Recipe {
        Recipe {
            rules: Vec::new(),
            builds: Vec::new(),
            bindings: SmallMap::new(),
            cache_dir: PathBuf::from("."),
        }
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for rule in &self.rules {
            writeln!(f, "rule {}", rule.name)?;
            writeln!(f, "\tdescription {}", rule.description)?;
            writeln!(f, "\tcommand {}", rule.command)?;
            if let Some(depfile) = &rule.depfile {
                writeln!(f, "\tdepfile {}", depfile)?;
            }
            if rule.deps != DepsFormat::None {
                writeln!(f, "\tdeps {}", rule.deps.as_str())?;
            }
            if rule.jobs != 1 {
                writeln!(f, "\tjobs {}", rule.jobs)?;
            }
            writeln!(f)?;
        }
        for build in &self.builds {
            writeln!(f, "build {}", build.rule)?;
            for path in &build.ins {
                writeln!(f, "\tinput {}", path)?;
            }
            for path in &build.implicit_ins {
                writeln!(f, "\timplicitInput {}", path)?;
            }
            for path in &build.order_only_ins {
                writeln!(f, "\torderOnlyInput {}", path)?;
            }
            for path in &build.outs {
                writeln!(f, "\toutput {}", path)?;
            }
            for path in &build.implicit_outs {
                writeln!(f, "\timplicitOutput {}", path)?;
            }
            for (key, val) in build.bindings.iter() {
                writeln!(f, "\tbinding {} = {}", key, val)?;
            }
            if let Some(jobs) = build.jobs {
                writeln!(f, "\tjobs {}", jobs)?;
            }
            writeln!(f)?;
        }
        for (key, val) in self.bindings.iter() {
            writeln!(f, "binding {} = {}", key, val)?;
        }
        if self.cache_dir != Path::new(".") {
            writeln!(f, "cacheDir {}", self.cache_dir.display())?;
        }
        Ok(())
    }
}

pub struct Parser<'text> {
    scanner: Scanner<'text>,
}

impl<'text> Parser<'text> {
    pub fn new(buf: &'text [u8]) -> Parser<'text> {
        Parser {
            scanner: Scanner::new(buf),
        }
    }

    pub fn format_parse_error(&self, filename: &Path, err: ParseError) -> String {
        self.scanner.format_parse_error(filename, err)
    }

    pub fn read_recipe(&mut self) -> ParseResult<Recipe> {
        let mut recipe = Recipe::default();
        loop {
            match self.scanner.peek() {
                '\0' => break,
                '\n' => self.scanner.bump(),
                ' ' | '\t' => return self.scanner.parse_error("unexpected indent"),
                _ => {
                    let ident = self.read_ident()?;
                    self.skip_spaces();
                    match ident {
                        "rule" => {
                            let rule = self.read_rule()?;
                            if recipe.rules.iter().any(|r| r.name == rule.name) {
                                return self
                                    .scanner
                                    .parse_error(format!("duplicate rule {:?}", rule.name));
                            }
                            recipe.rules.push(rule);
                        }
                        "build" => recipe.builds.push(self.read_build()?),
                        "binding" => {
                            let (key, val) = self.read_binding()?;
                            recipe.bindings.insert(key, val);
                        }
                        "cacheDir" => {
                            recipe.cache_dir = PathBuf::from(self.read_line_value());
                        }
                        _ => {
                            return self
                                .scanner
                                .parse_error(format!("unknown directive {:?}", ident))
                        }
                    }
                }
            }
        }
        Ok(recipe)
    }

    fn read_rule(&mut self) -> ParseResult<Rule> {
        let name = self.read_ident()?.to_string();
        self.end_line()?;
        let mut rule = Rule::new(name);
        while self.skip_indent() {
            let key = self.read_ident()?;
            self.skip_spaces();
            match key {
                "description" => rule.description = self.read_line_value().to_string(),
                "command" => rule.command = self.read_line_value().to_string(),
                "depfile" => rule.depfile = Some(self.read_line_value().to_string()),
                "deps" => {
                    let tag = self.read_line_value();
                    rule.deps = match DepsFormat::parse(tag) {
                        Some(deps) => deps,
                        None => {
                            return self
                                .scanner
                                .parse_error(format!("unknown deps format {:?}", tag))
                        }
                    };
                }
                "jobs" => rule.jobs = self.read_jobs_value()?,
                _ => {
                    return self
                        .scanner
                        .parse_error(format!("unknown key {:?} in rule block", key))
                }
            }
        }
        self.end_block()?;
        Ok(rule)
    }

    fn read_build(&mut self) -> ParseResult<Build> {
        let rule = self.read_ident()?.to_string();
        self.end_line()?;
        let mut build = Build::new(rule);
        while self.skip_indent() {
            let key = self.read_ident()?;
            self.skip_spaces();
            match key {
                "input" => build.ins.push(self.read_line_value().to_string()),
                "implicitInput" => build.implicit_ins.push(self.read_line_value().to_string()),
                "orderOnlyInput" => build
                    .order_only_ins
                    .push(self.read_line_value().to_string()),
                "output" => build.outs.push(self.read_line_value().to_string()),
                "implicitOutput" => build.implicit_outs.push(self.read_line_value().to_string()),
                "binding" => {
                    let (key, val) = self.read_binding()?;
                    build.bindings.insert(key, val);
                }
                "jobs" => build.jobs = Some(self.read_jobs_value()?),
                _ => {
                    return self
                        .scanner
                        .parse_error(format!("unknown key {:?} in build block", key))
                }
            }
        }
        self.end_block()?;
        Ok(build)
    }

    /// Read a `<key> = <value>` pair and the line ending.
    fn read_binding(&mut self) -> ParseResult<(String, String)> {
        let key = self.read_ident()?.to_string();
        self.skip_spaces();
        self.scanner.expect('=')?;
        let val = self.read_line_value().to_string();
        Ok((key, val))
    }

    /// Read the remainder of the line as a value and consume the newline.
    fn read_line_value(&mut self) -> &'text str {
        self.skip_spaces();
        let val = self.scanner.rest_of_line().trim_end();
        self.scanner.skip('\n');
        val
    }

    fn read_jobs_value(&mut self) -> ParseResult<usize> {
        let text = self.read_line_value();
        let jobs = match text.parse::<usize>() {
            Ok(jobs) => jobs,
            Err(err) => return self.scanner.parse_error(format!("jobs: {}", err)),
        };
        if jobs == 0 {
            return self.scanner.parse_error("jobs must be positive");
        }
        Ok(jobs)
    }

    fn skip_spaces(&mut self) {
        self.scanner.skip_run(|ch| ch == ' ');
    }

    /// Consume the leading whitespace run of a block body line, if any.
    fn skip_indent(&mut self) -> bool {
        self.scanner.skip_run(|ch| ch == ' ' || ch == '\t')
    }

    /// Consume spaces and the newline ending a block header line.
    fn end_line(&mut self) -> ParseResult<()> {
        self.skip_spaces();
        if self.scanner.peek() == '\0' {
            return Ok(());
        }
        self.scanner.expect('\n')
    }

    /// A block must be followed by a blank line or end of file.
    fn end_block(&mut self) -> ParseResult<()> {
        match self.scanner.peek() {
            '\0' => Ok(()),
            '\n' => {
                self.scanner.bump();
                Ok(())
            }
            _ => self.scanner.parse_error("expected blank line after block"),
        }
    }

    /// Read an identifier: a rule name, directive, or block key.
    fn read_ident(&mut self) -> ParseResult<&'text str> {
        let start = self.scanner.ofs;
        while matches!(
            self.scanner.peek(),
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' | '.'
        ) {
            self.scanner.bump();
        }
        if self.scanner.ofs == start {
            return self.scanner.parse_error("failed to scan ident");
        }
        Ok(self.scanner.slice(start, self.scanner.ofs))
    }
}
