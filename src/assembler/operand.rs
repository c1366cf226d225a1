//! The PDP-11 operand parser: decodes one addressing-mode operand into a
//! 6-bit specifier plus an optional extension word.

use super::cursor::{match_char, skip_blank, take_token};
use super::engine::Engine;
use super::error::{AssembleError, AsmResult, ErrorKind};
use super::opcodes::find_register;

#[derive(Debug, Clone, Copy)]
pub struct Operand {
    pub mode: u8,
    pub reg: u8,
    pub has_ext: bool,
    pub ext: u16,
    /// True when the extension word must be relocated relative to the
    /// address right after itself before being emitted.
    pub pc_relative: bool,
}

impl Operand {
    pub fn spec(&self) -> u16 {
        ((self.mode as u16) << 3) | (self.reg as u16)
    }
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphabetic() || matches!(c, '_' | '.' | ':' | '$')
}

impl Engine {
    fn try_parse_register(&self, s: &mut &str) -> Option<u8> {
        let mut look = *s;
        skip_blank(&mut look);
        let tok = take_token(&mut look);
        if tok.is_empty() {
            return None;
        }
        find_register(tok).map(|n| {
            *s = look;
            n
        })
    }

    /// Parse one addressing-mode operand, mirroring the reference's
    /// `parse_operand` fallthrough order: `@`-deferred, `#imm`,
    /// `-(Rn)`/`@-(Rn)`, `(Rn)`/`(Rn)+`/`@(Rn)+`, a bare register, and
    /// finally a general expression with an optional `(Rn)` index suffix.
    pub fn parse_operand(&mut self, s: &mut &str) -> AsmResult<Operand> {
        skip_blank(s);
        if s.is_empty() {
            return Err(AssembleError::new(
                ErrorKind::MissedOpcodeArg1,
                self.src_line,
                String::new(),
            ));
        }

        let deferred = s.starts_with('@');
        if deferred {
            *s = &s[1..];
            skip_blank(s);
        }

        if s.starts_with('#') {
            *s = &s[1..];
            let val = self.eval_expr(s)?;
            return Ok(Operand {
                mode: if deferred { 3 } else { 2 },
                reg: 7,
                has_ext: true,
                ext: val as u16,
                pc_relative: false,
            });
        }

        // Once `-` is seen it must be `-(Rn)`/`-@(Rn)` autodecrement; any
        // other shape past this point is a hard error, not a fallthrough
        // to the general expression parser.
        if s.starts_with('-') {
            let mut look = &s[1..];
            skip_blank(&mut look);
            if !look.starts_with('(') {
                return Err(AssembleError::new(
                    ErrorKind::SyntaxError,
                    self.src_line,
                    (*s).to_string(),
                ));
            }
            let mut inner = &look[1..];
            let reg = self.try_parse_register(&mut inner).ok_or_else(|| {
                AssembleError::new(ErrorKind::MissedRegisterArg2, self.src_line, (*s).to_string())
            })?;
            if !match_char(&mut inner, ')') {
                return Err(AssembleError::new(
                    ErrorKind::MissedBracket,
                    self.src_line,
                    (*s).to_string(),
                ));
            }
            *s = inner;
            return Ok(Operand {
                mode: if deferred { 5 } else { 4 },
                reg,
                has_ext: false,
                ext: 0,
                pc_relative: false,
            });
        }

        // Likewise, once `(` is seen it must close a register-deferred or
        // autoincrement operand; commit rather than falling through.
        if s.starts_with('(') {
            let mut inner = &s[1..];
            let reg = self.try_parse_register(&mut inner).ok_or_else(|| {
                AssembleError::new(ErrorKind::MissedRegisterArg2, self.src_line, (*s).to_string())
            })?;
            if !match_char(&mut inner, ')') {
                return Err(AssembleError::new(
                    ErrorKind::MissedBracket,
                    self.src_line,
                    (*s).to_string(),
                ));
            }
            if let Some(rest) = inner.strip_prefix('+') {
                *s = rest;
                return Ok(Operand {
                    mode: if deferred { 3 } else { 2 },
                    reg,
                    has_ext: false,
                    ext: 0,
                    pc_relative: false,
                });
            }
            *s = inner;
            return Ok(Operand {
                mode: 1,
                reg,
                has_ext: false,
                ext: 0,
                pc_relative: false,
            });
        }

        {
            let mut look = *s;
            if let Some(reg) = self.try_parse_register(&mut look) {
                *s = look;
                return Ok(Operand {
                    mode: if deferred { 1 } else { 0 },
                    reg,
                    has_ext: false,
                    ext: 0,
                    pc_relative: false,
                });
            }
        }

        let before = *s;
        let val = self.eval_expr(s)?;
        let consumed = &before[..before.len() - s.len()];
        let has_symbol = consumed.chars().any(is_symbol_char);

        skip_blank(s);
        if s.starts_with('(') {
            let mut inner = &s[1..];
            let reg = self.try_parse_register(&mut inner).ok_or_else(|| {
                AssembleError::new(ErrorKind::SyntaxError, self.src_line, (*s).to_string())
            })?;
            if !match_char(&mut inner, ')') {
                return Err(AssembleError::new(
                    ErrorKind::MissedBracket,
                    self.src_line,
                    (*s).to_string(),
                ));
            }
            *s = inner;
            let pc_relative = reg == 7 && has_symbol;
            return Ok(Operand {
                mode: if deferred { 7 } else { 6 },
                reg,
                has_ext: true,
                ext: val as u16,
                pc_relative,
            });
        }

        Ok(Operand {
            mode: if deferred { 7 } else { 6 },
            reg: 7,
            has_ext: true,
            ext: val as u16,
            pc_relative: true,
        })
    }

    /// Emit an operand's extension word, if it has one, relocating it if
    /// it is PC-relative. Must be called with `output_addr` sitting right
    /// where the extension word will land.
    pub fn emit_operand_ext(&mut self, op: &Operand) -> AsmResult<()> {
        if !op.has_ext {
            return Ok(());
        }
        let word = if op.pc_relative {
            (op.ext as i32).wrapping_sub(self.output_addr as i32 + 2) as u16
        } else {
            op.ext
        };
        self.emit_word(word)
    }
}
