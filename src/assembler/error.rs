//! Error kinds and diagnostic rendering for the assembler.

use colored::Colorize;
use std::fmt;

/// One numeric error kind, grouped the same way the reference assembler groups them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoMemoryForLabel,
    CannotResolveRef,
    NoMemoryForMacro,
    NoMemoryForProc,
    InvalidNumber,
    InvalidHexNumber,
    InvalidDecimalNumber,
    InvalidOctalNumber,
    InvalidBinaryNumber,
    MissedBracket,
    ExpectedCloseQuote,
    MissedOpcodeParam1,
    LongRelatedOffset,
    MissedOpcodeArg1,
    ExpectedArg2,
    MissedRegisterArg2,
    ExpectedArg3,
    ConstantValueTooBig,
    OutputBufferOverflow,
    MissedNameForEqu,
    MissedNameForProc,
    NestedProcUnsupported,
    OnlyInsideProc,
    LabelAlreadyDefined,
    MacroAlreadyDefined,
    ProcAlreadyDefined,
    ExtraSymbols,
    SyntaxError,
    CannotOpenFile,
    UnsupportedInstruction,
}

impl ErrorKind {
    pub fn message(self) -> &'static str {
        use ErrorKind::*;
        match self {
            NoMemoryForLabel => "No memory for labels",
            CannotResolveRef => "Cannot resolve reference",
            NoMemoryForMacro => "No memory for macro",
            NoMemoryForProc => "No memory for proc",
            InvalidNumber => "Invalid number",
            InvalidHexNumber => "Invalid hex number",
            InvalidDecimalNumber => "Invalid decimal number",
            InvalidOctalNumber => "Invalid octal number",
            InvalidBinaryNumber => "Invalid binary number",
            MissedBracket => "Missed bracket",
            ExpectedCloseQuote => "Expected close quote",
            MissedOpcodeParam1 => "Missed parameter",
            LongRelatedOffset => "Related offset too long",
            MissedOpcodeArg1 => "Missed argument 1",
            ExpectedArg2 => "Expected argument 2",
            MissedRegisterArg2 => "Missed register 2",
            ExpectedArg3 => "Expected argument 3",
            ConstantValueTooBig => "Constant value too big (> 16)",
            OutputBufferOverflow => "Output buffer overflow",
            MissedNameForEqu => "Missed name for equ",
            MissedNameForProc => "Missed name for procedure",
            NestedProcUnsupported => "Nested procedures are not supported",
            OnlyInsideProc => "Only onside procedure",
            LabelAlreadyDefined => "Label name already used",
            MacroAlreadyDefined => "Macro name already used",
            ProcAlreadyDefined => "Procedure name already used",
            ExtraSymbols => "Extra symbols",
            SyntaxError => "Syntax error",
            CannotOpenFile => "Cannot open file",
            UnsupportedInstruction => "Unsupported instruction for CPU",
        }
    }
}

/// An assembly failure, carrying enough context to reproduce the reference
/// tool's `Line N: <source>` / `Compilation failed: <message>` report.
#[derive(Debug, Clone)]
pub struct AssembleError {
    pub kind: ErrorKind,
    pub line: usize,
    pub text: String,
}

impl AssembleError {
    pub fn new(kind: ErrorKind, line: usize, text: impl Into<String>) -> Self {
        AssembleError {
            kind,
            line,
            text: text.into(),
        }
    }
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = "Compilation failed:".red().bold();
        writeln!(f, "Line {}: {}", self.line, self.text)?;
        write!(f, "{} {}", failed, self.kind.message())
    }
}

impl std::error::Error for AssembleError {}

pub type AsmResult<T> = Result<T, AssembleError>;
