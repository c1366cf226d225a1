//! The expression evaluator: eight precedence levels over a `&mut &str`
//! cursor, threading the engine for symbol resolution and pass-awareness.

use super::cursor::{is_ident_start, match_char, peek_char, skip_blank, take_token};
use super::engine::{Engine, Pass};
use super::error::{AssembleError, AsmResult, ErrorKind};

impl Engine {
    /// Entry point. A leading `/` means "evaluate the rest, then take the
    /// high byte" — `(value >> 8) & 0xff` of the whole expression.
    pub fn eval_expr(&mut self, s: &mut &str) -> AsmResult<i32> {
        skip_blank(s);
        if s.starts_with('/') {
            *s = &s[1..];
            let v = self.exp_bitor(s)?;
            Ok((v >> 8) & 0xff)
        } else {
            self.exp_bitor(s)
        }
    }

    fn exp_bitor(&mut self, s: &mut &str) -> AsmResult<i32> {
        let mut v = self.exp_bitxor(s)?;
        loop {
            skip_blank(s);
            if s.starts_with('|') {
                *s = &s[1..];
                v |= self.exp_bitxor(s)?;
            } else {
                return Ok(v);
            }
        }
    }

    fn exp_bitxor(&mut self, s: &mut &str) -> AsmResult<i32> {
        let mut v = self.exp_bitand(s)?;
        loop {
            skip_blank(s);
            if s.starts_with('^') {
                *s = &s[1..];
                v ^= self.exp_bitand(s)?;
            } else {
                return Ok(v);
            }
        }
    }

    fn exp_bitand(&mut self, s: &mut &str) -> AsmResult<i32> {
        let mut v = self.exp_add(s)?;
        loop {
            skip_blank(s);
            if s.starts_with('&') {
                *s = &s[1..];
                v &= self.exp_add(s)?;
            } else {
                return Ok(v);
            }
        }
    }

    fn exp_add(&mut self, s: &mut &str) -> AsmResult<i32> {
        let mut v = self.exp_mul(s)?;
        loop {
            skip_blank(s);
            if s.starts_with('+') {
                *s = &s[1..];
                v = v.wrapping_add(self.exp_mul(s)?);
            } else if s.starts_with('-') {
                *s = &s[1..];
                v = v.wrapping_sub(self.exp_mul(s)?);
            } else {
                return Ok(v);
            }
        }
    }

    fn exp_mul(&mut self, s: &mut &str) -> AsmResult<i32> {
        let mut v = self.exp_unary(s)?;
        loop {
            skip_blank(s);
            if s.starts_with('*') {
                *s = &s[1..];
                v = v.wrapping_mul(self.exp_unary(s)?);
            } else if s.starts_with('/') {
                *s = &s[1..];
                let rhs = self.exp_unary(s)?;
                if rhs == 0 {
                    return Err(self.syntax_error(s));
                }
                v /= rhs;
            } else if s.starts_with('%') {
                *s = &s[1..];
                let rhs = self.exp_unary(s)?;
                if rhs == 0 {
                    return Err(self.syntax_error(s));
                }
                v %= rhs;
            } else {
                return Ok(v);
            }
        }
    }

    fn exp_unary(&mut self, s: &mut &str) -> AsmResult<i32> {
        skip_blank(s);
        if s.starts_with('~') {
            *s = &s[1..];
            let v = self.exp_unary(s)?;
            Ok(!v)
        } else if s.starts_with('-') {
            *s = &s[1..];
            let v = self.exp_unary(s)?;
            Ok(v.wrapping_neg())
        } else {
            self.exp_paren(s)
        }
    }

    fn exp_paren(&mut self, s: &mut &str) -> AsmResult<i32> {
        skip_blank(s);
        if s.starts_with('(') {
            *s = &s[1..];
            let v = self.exp_bitor(s)?;
            if !match_char(s, ')') {
                return Err(AssembleError::new(
                    ErrorKind::MissedBracket,
                    self.src_line,
                    (*s).to_string(),
                ));
            }
            Ok(v)
        } else {
            self.primary(s)
        }
    }

    /// The lowest level: location counter, prefix-radix operators, a
    /// character constant, a symbol, or a bare numeric literal.
    fn primary(&mut self, s: &mut &str) -> AsmResult<i32> {
        skip_blank(s);
        match peek_char(s) {
            None => Err(self.syntax_error(s)),
            Some('*') => {
                *s = &s[1..];
                Ok(self.output_addr as i32)
            }
            Some('$') => {
                *s = &s[1..];
                self.take_radix_digits(s, 16, ErrorKind::InvalidHexNumber)
            }
            Some('@') => {
                *s = &s[1..];
                self.take_radix_digits(s, 8, ErrorKind::InvalidOctalNumber)
            }
            Some('%') => {
                *s = &s[1..];
                self.take_radix_digits(s, 2, ErrorKind::InvalidBinaryNumber)
            }
            Some('\'') => {
                *s = &s[1..];
                match peek_char(s) {
                    Some(c) => {
                        *s = &s[c.len_utf8()..];
                        Ok(c as i32)
                    }
                    None => Err(self.syntax_error(s)),
                }
            }
            Some(c) if is_ident_start(c) => {
                let name = take_token(s);
                self.resolve_symbol(name)
            }
            Some(c) if c.is_ascii_digit() => self.numeric_literal(s),
            _ => Err(self.syntax_error(s)),
        }
    }

    fn numeric_literal(&mut self, s: &mut &str) -> AsmResult<i32> {
        if s.starts_with("0x") || s.starts_with("0X") {
            *s = &s[2..];
            return self.take_radix_digits(s, 16, ErrorKind::InvalidHexNumber);
        }
        if s.starts_with("0b") || s.starts_with("0B") {
            *s = &s[2..];
            return self.take_radix_digits(s, 2, ErrorKind::InvalidBinaryNumber);
        }
        if s.starts_with("0d") || s.starts_with("0D") {
            *s = &s[2..];
            let v = self.take_radix_digits(s, 10, ErrorKind::InvalidDecimalNumber)?;
            if s.starts_with('.') {
                *s = &s[1..];
            }
            return Ok(v);
        }

        let digits_end = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        if digits_end == 0 {
            return Err(AssembleError::new(
                ErrorKind::InvalidNumber,
                self.src_line,
                (*s).to_string(),
            ));
        }
        let digits = &s[..digits_end];
        let rest = &s[digits_end..];
        if let Some(after_dot) = rest.strip_prefix('.') {
            let v = i32::from_str_radix(digits, 10).map_err(|_| {
                AssembleError::new(ErrorKind::InvalidDecimalNumber, self.src_line, digits.to_string())
            })?;
            *s = after_dot;
            Ok(v)
        } else {
            let v = i32::from_str_radix(digits, 8).map_err(|_| {
                AssembleError::new(ErrorKind::InvalidOctalNumber, self.src_line, digits.to_string())
            })?;
            *s = rest;
            Ok(v)
        }
    }

    fn take_radix_digits(&self, s: &mut &str, radix: u32, err: ErrorKind) -> AsmResult<i32> {
        let end = s.find(|c: char| !c.is_digit(radix)).unwrap_or(s.len());
        if end == 0 {
            return Err(AssembleError::new(err, self.src_line, (*s).to_string()));
        }
        let digits = &s[..end];
        let v = i32::from_str_radix(digits, radix)
            .map_err(|_| AssembleError::new(err, self.src_line, digits.to_string()))?;
        *s = &s[end..];
        Ok(v)
    }

    fn resolve_symbol(&mut self, name: &str) -> AsmResult<i32> {
        let cs = self.case_sensitive_symbols;
        if let Some(p) = self.current_proc() {
            if let Some(sym) = p.labels.find(name, cs) {
                return Ok(sym.value as i32);
            }
            if let Some(sym) = p.equs.find(name, cs) {
                return Ok(sym.value as i32);
            }
        }
        if let Some(sym) = self.labels.find(name, cs) {
            return Ok(sym.value as i32);
        }
        if let Some(sym) = self.equs.find(name, cs) {
            return Ok(sym.value as i32);
        }
        match self.pass {
            Pass::One => {
                self.to_second_pass = true;
                Ok(0)
            }
            Pass::Two => Err(AssembleError::new(
                ErrorKind::CannotResolveRef,
                self.src_line,
                name.to_string(),
            )),
        }
    }

    fn syntax_error(&self, s: &str) -> AssembleError {
        AssembleError::new(ErrorKind::SyntaxError, self.src_line, s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::super::engine::{Engine, EngineOptions};

    fn eval(src: &str, expr: &str) -> i32 {
        let mut engine = Engine::new(EngineOptions::default()).unwrap();
        engine
            .labels
            .insert("foo", 0o100, 1, false)
            .unwrap();
        let _ = src;
        let mut s = expr;
        engine.eval_expr(&mut s).unwrap()
    }

    #[test]
    fn bare_digits_are_octal() {
        assert_eq!(eval("", "10"), 8);
    }

    #[test]
    fn trailing_dot_forces_decimal() {
        assert_eq!(eval("", "10."), 10);
    }

    #[test]
    fn hex_prefix() {
        assert_eq!(eval("", "0x1f"), 31);
    }

    #[test]
    fn precedence_and_parens() {
        assert_eq!(eval("", "2+3*4"), 14);
        assert_eq!(eval("", "(2+3)*4"), 20);
    }

    #[test]
    fn symbol_lookup() {
        assert_eq!(eval("", "foo+1"), 0o101);
    }

    #[test]
    fn character_constant() {
        assert_eq!(eval("", "'A"), 'A' as i32);
    }
}
