//! Expansion of `$var` references in rule templates, e.g.
//! `gcc -c -o $out $cflags $in`, into plain strings.

use crate::smallmap::SmallMap;
use anyhow::bail;

/// An environment providing a mapping of variable name to variable value.
/// A template is expanded against a chain of environments, first match wins.
pub trait Env {
    fn get_var(&self, var: &str) -> Option<&str>;
}

impl Env for SmallMap<String, String> {
    fn get_var(&self, var: &str) -> Option<&str> {
        self.get(var).map(|val| val.as_str())
    }
}

/// Escape a path for embedding in a command line, so that the worker's
/// tokenizer reassembles it into a single argument.
fn escape_path(path: &str, out: &mut String) {
    for ch in path.chars() {
        match ch {
            ' ' => out.push_str("\\ "),
            '"' => out.push_str("\\\""),
            _ => out.push(ch),
        }
    }
}

fn push_paths(paths: &[&str], out: &mut String) {
    for (i, path) in paths.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        escape_path(path, out);
    }
}

/// Expand a template: `$$` is a literal dollar, `$in`/`$out` name the edge's
/// explicit inputs/outputs, and any other `$name` is looked up along `envs`,
/// expanding to the empty string when absent.  Variable names are the longest
/// run matching `[A-Za-z][A-Za-z0-9]*`; an empty name is an error.
pub fn expand(
    template: &str,
    ins: &[&str],
    outs: &[&str],
    envs: &[&dyn Env],
) -> anyhow::Result<String> {
    let mut result = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }
        if chars.peek() == Some(&'$') {
            chars.next();
            result.push('$');
            continue;
        }
        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            let ok = if name.is_empty() {
                c.is_ascii_alphabetic()
            } else {
                c.is_ascii_alphanumeric()
            };
            if !ok {
                break;
            }
            name.push(c);
            chars.next();
        }
        if name.is_empty() {
            bail!("empty variable name in template {:?}", template);
        }
        match name.as_str() {
            "in" => push_paths(ins, &mut result),
            "out" => push_paths(outs, &mut result),
            _ => {
                for env in envs {
                    if let Some(val) = env.get_var(&name) {
                        result.push_str(val);
                        break;
                    }
                }
            }
        }
    }
    Ok(result)
}
