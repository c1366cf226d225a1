//! Macro capture and expansion.
//!
//! Bodies are captured verbatim during pass 1 and replayed (not
//! re-captured) during pass 2. Substitution applies positional `#1`..`#9`
//! parameters first, then whole-identifier named parameters — in that
//! order, since a named parameter could otherwise swallow a literal `#`.

use regex::Regex;

use super::cursor::{is_ident_start, skip_blank, take_token};
use super::engine::{Engine, Pass};
use super::error::{AssembleError, AsmResult, ErrorKind};

#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<String>,
}

impl Engine {
    fn read_same_file_line(&mut self) -> AsmResult<Option<String>> {
        match self.cur_reader.as_mut() {
            Some(r) => r.next_line().map_err(|e| {
                AssembleError::new(ErrorKind::CannotOpenFile, self.src_line, e.to_string())
            }),
            None => Ok(None),
        }
    }

    /// Handle a `macro NAME p1,p2,...` line: parses the header, then reads
    /// raw lines until `endm` directly off the active source (never
    /// following the include stack), storing the body only on pass 1.
    pub fn handle_macro_directive(&mut self, rest: &mut &str) -> AsmResult<()> {
        skip_blank(rest);
        let name = take_token(rest).to_string();
        if name.is_empty() {
            return Err(AssembleError::new(
                ErrorKind::SyntaxError,
                self.src_line,
                (*rest).to_string(),
            ));
        }

        let mut params = Vec::new();
        loop {
            skip_blank(rest);
            let p = take_token(rest);
            if p.is_empty() {
                break;
            }
            if params.len() >= 10 {
                return Err(AssembleError::new(
                    ErrorKind::ExtraSymbols,
                    self.src_line,
                    (*rest).to_string(),
                ));
            }
            params.push(p.to_string());
            skip_blank(rest);
            if rest.starts_with(',') {
                *rest = &rest[1..];
            } else {
                break;
            }
        }

        if matches!(self.pass, Pass::One) {
            let key = self.key(&name);
            if self.macros.contains_key(&key) {
                return Err(AssembleError::new(
                    ErrorKind::MacroAlreadyDefined,
                    self.src_line,
                    name,
                ));
            }
        }

        let mut body = Vec::new();
        loop {
            let line = match self.read_same_file_line()? {
                Some(l) => l,
                None => break,
            };
            let stripped = super::lexer::strip_comment(&line);
            let is_endm = stripped.trim().eq_ignore_ascii_case("endm");
            if matches!(self.pass, Pass::Two) {
                self.list_plain_line(self.src_line, &line)?;
            }
            if is_endm {
                break;
            }
            if matches!(self.pass, Pass::One) {
                body.push(line);
            }
            self.src_line += 1;
        }
        self.src_line += 2;

        if matches!(self.pass, Pass::One) {
            let key = self.key(&name);
            self.macros.insert(key, MacroDef { name, params, body });
        }
        Ok(())
    }

    /// Expand a call to a previously-defined macro, replaying its body
    /// through the normal statement dispatcher.
    pub fn expand_macro(&mut self, name: &str, args_str: &str) -> AsmResult<()> {
        let key = self.key(name);
        let mac = match self.macros.get(&key) {
            Some(m) => m.clone(),
            None => {
                return Err(AssembleError::new(
                    ErrorKind::SyntaxError,
                    self.src_line,
                    name.to_string(),
                ))
            }
        };

        let args: Vec<String> = if args_str.trim().is_empty() {
            Vec::new()
        } else {
            split_macro_args(args_str)
        };

        let case_sensitive = self.case_sensitive_symbols;
        self.in_macro += 1;
        let mut result = Ok(());
        for line in &mac.body {
            let positional = substitute_positional(line, &args);
            let substituted = substitute_named(&positional, &mac.params, &args, case_sensitive);
            if let Err(e) = self.process_line(&substituted) {
                result = Err(e);
                break;
            }
        }
        self.in_macro -= 1;
        result
    }
}

fn substitute_positional(line: &str, args: &[String]) -> String {
    let mut out = String::new();
    let mut it = line.chars().peekable();
    while let Some(c) = it.next() {
        if c == '#' {
            if let Some(&d) = it.peek() {
                if d.is_ascii_digit() && d != '0' {
                    it.next();
                    let idx = d.to_digit(10).unwrap() as usize;
                    if let Some(a) = args.get(idx - 1) {
                        out.push_str(a);
                    }
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn substitute_named(line: &str, params: &[String], args: &[String], case_sensitive: bool) -> String {
    let mut out = String::new();
    let mut s = line;
    loop {
        match s.find(is_ident_start) {
            None => {
                out.push_str(s);
                break;
            }
            Some(pos) => {
                out.push_str(&s[..pos]);
                let mut rest = &s[pos..];
                let tok = take_token(&mut rest);
                let hit = params.iter().position(|p| {
                    if case_sensitive {
                        p == tok
                    } else {
                        p.eq_ignore_ascii_case(tok)
                    }
                });
                match hit {
                    Some(idx) => out.push_str(args.get(idx).map(|s| s.as_str()).unwrap_or("")),
                    None => out.push_str(tok),
                }
                s = rest;
            }
        }
    }
    out
}

/// Split a macro call's argument text on commas, treating a double-quoted
/// span as a single atomic argument even if it contains a comma.
fn split_macro_args(args_str: &str) -> Vec<String> {
    let re = Regex::new(r#""[^"]*"|[^,]+"#).unwrap();
    re.find_iter(args_str)
        .map(|m| m.as_str().trim().to_string())
        .filter(|a| !a.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plain_args_on_commas() {
        assert_eq!(split_macro_args("r0, r1, #5"), vec!["r0", "r1", "#5"]);
    }

    #[test]
    fn keeps_quoted_comma_as_one_argument() {
        assert_eq!(
            split_macro_args(r#""a,b", r0"#),
            vec![r#""a,b""#, "r0"]
        );
    }
}
