//! A two-pass assembler for PDP-11 machine code, featuring:
//! - a hand-written recursive-descent lexer and expression evaluator
//! - macros, conditional assembly, procedures and includes
//! - hex, Verilog and raw binary output

pub mod assembler;
pub mod logging;
