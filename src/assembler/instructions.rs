//! Encoding of real machine instructions (as opposed to pseudo-ops, which
//! `directives.rs` handles). One branch per `OpKind`.

use super::cursor::{match_char, skip_blank, take_token};
use super::engine::{Engine, Pass};
use super::error::{AssembleError, AsmResult, ErrorKind};
use super::opcodes::{find_register, OpCode, OpKind};
use super::operand::Operand;

impl Engine {
    fn emit_word_tracked(&mut self, w: u16, words: &mut Vec<u16>) -> AsmResult<()> {
        words.push(w);
        self.emit_word(w)
    }

    fn emit_ext_tracked(&mut self, op: &Operand, words: &mut Vec<u16>) -> AsmResult<()> {
        if !op.has_ext {
            return Ok(());
        }
        let word = if op.pc_relative {
            (op.ext as i32).wrapping_sub(self.output_addr as i32 + 2) as u16
        } else {
            op.ext
        };
        words.push(word);
        self.emit_word(word)
    }

    fn expect_register(&mut self, s: &mut &str, kind: ErrorKind) -> AsmResult<u8> {
        skip_blank(s);
        let save = *s;
        let tok = take_token(s);
        find_register(tok).ok_or_else(|| AssembleError::new(kind, self.src_line, save.to_string()))
    }

    fn expect_comma(&mut self, s: &mut &str) -> AsmResult<()> {
        if match_char(s, ',') {
            Ok(())
        } else {
            Err(AssembleError::new(
                ErrorKind::ExpectedArg2,
                self.src_line,
                (*s).to_string(),
            ))
        }
    }

    /// Encode one real machine instruction and emit it, returning the words
    /// written (for the listing).
    pub fn encode_instruction(
        &mut self,
        op: &OpCode,
        is_byte: bool,
        rest: &mut &str,
    ) -> AsmResult<Vec<u16>> {
        let mut words = Vec::new();
        match op.kind {
            OpKind::None | OpKind::Ccode => {
                self.emit_word_tracked(op.base, &mut words)?;
            }
            OpKind::Single => {
                let dst = self.parse_operand(rest)?;
                let byte_bit: u16 = if is_byte { 0o100000 } else { 0 };
                self.emit_word_tracked(op.base | byte_bit | dst.spec(), &mut words)?;
                self.emit_ext_tracked(&dst, &mut words)?;
            }
            OpKind::Double => {
                let src = self.parse_operand(rest)?;
                self.expect_comma(rest)?;
                let dst = self.parse_operand(rest)?;
                let byte_bit: u16 = if is_byte { 0o100000 } else { 0 };
                let word = op.base | byte_bit | (src.spec() << 6) | dst.spec();
                self.emit_word_tracked(word, &mut words)?;
                self.emit_ext_tracked(&src, &mut words)?;
                self.emit_ext_tracked(&dst, &mut words)?;
            }
            OpKind::Branch => {
                let old_addr = self.output_addr;
                let target = self.eval_expr(rest)?;
                let offset = (target - (old_addr as i32 + 2)) / 2;
                if matches!(self.pass, Pass::Two) && !(-128..=127).contains(&offset) {
                    return Err(AssembleError::new(
                        ErrorKind::LongRelatedOffset,
                        self.src_line,
                        (*rest).to_string(),
                    ));
                }
                self.emit_word_tracked(op.base | (offset as u16 & 0xff), &mut words)?;
            }
            OpKind::Jmp => {
                let mut dst = self.parse_operand(rest)?;
                if dst.mode == 0 {
                    return Err(AssembleError::new(
                        ErrorKind::SyntaxError,
                        self.src_line,
                        (*rest).to_string(),
                    ));
                }
                if self.jmp_label_indirect && dst.pc_relative && dst.reg == 7 && dst.mode == 6 {
                    dst.mode = 7;
                }
                self.emit_word_tracked(op.base | dst.spec(), &mut words)?;
                self.emit_ext_tracked(&dst, &mut words)?;
            }
            OpKind::Jsr => {
                let reg = self.expect_register(rest, ErrorKind::MissedOpcodeArg1)?;
                self.expect_comma(rest)?;
                let dst = self.parse_operand(rest)?;
                self.emit_word_tracked(op.base | ((reg as u16) << 6) | dst.spec(), &mut words)?;
                self.emit_ext_tracked(&dst, &mut words)?;
            }
            OpKind::Rts => {
                let reg = self.expect_register(rest, ErrorKind::MissedOpcodeArg1)?;
                self.emit_word_tracked(op.base | reg as u16, &mut words)?;
            }
            OpKind::Sob => {
                let reg = self.expect_register(rest, ErrorKind::MissedOpcodeArg1)?;
                self.expect_comma(rest)?;
                let old_addr = self.output_addr;
                let target = self.eval_expr(rest)?;
                let offset = ((old_addr as i32 + 2) - target) / 2;
                if matches!(self.pass, Pass::Two) && !(0..=63).contains(&offset) {
                    return Err(AssembleError::new(
                        ErrorKind::LongRelatedOffset,
                        self.src_line,
                        (*rest).to_string(),
                    ));
                }
                self.emit_word_tracked(
                    op.base | ((reg as u16) << 6) | (offset as u16 & 0x3f),
                    &mut words,
                )?;
            }
            OpKind::Mark => {
                let val = self.eval_expr(rest)?;
                if !(0..=63).contains(&val) {
                    return Err(AssembleError::new(
                        ErrorKind::ConstantValueTooBig,
                        self.src_line,
                        (*rest).to_string(),
                    ));
                }
                self.emit_word_tracked(op.base | (val as u16 & 0x3f), &mut words)?;
            }
            OpKind::Eis => {
                let src = self.parse_operand(rest)?;
                self.expect_comma(rest)?;
                let reg = self.expect_register(rest, ErrorKind::MissedRegisterArg2)?;
                self.emit_word_tracked(op.base | ((reg as u16) << 6) | src.spec(), &mut words)?;
                self.emit_ext_tracked(&src, &mut words)?;
            }
            OpKind::Xor => {
                let reg = self.expect_register(rest, ErrorKind::MissedOpcodeArg1)?;
                self.expect_comma(rest)?;
                let dst = self.parse_operand(rest)?;
                self.emit_word_tracked(op.base | ((reg as u16) << 6) | dst.spec(), &mut words)?;
                self.emit_ext_tracked(&dst, &mut words)?;
            }
            OpKind::Fis => {
                let reg = self.expect_register(rest, ErrorKind::MissedOpcodeArg1)?;
                self.emit_word_tracked(op.base | reg as u16, &mut words)?;
            }
            OpKind::Trap | OpKind::Emt => {
                let val = self.eval_expr(rest)?;
                self.emit_word_tracked(op.base | (val as u16 & 0xff), &mut words)?;
            }
            OpKind::Spl => {
                let val = self.eval_expr(rest)?;
                self.emit_word_tracked(op.base | (val as u16 & 0x07), &mut words)?;
            }
            _ => unreachable!("pseudo-ops are dispatched by directives.rs"),
        }
        Ok(words)
    }
}
