//! The engine context: all process-wide state threaded explicitly through
//! every component, replacing the reference implementation's globals.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use super::error::{AssembleError, AsmResult, ErrorKind};
use super::macros::MacroDef;
use super::opcodes::{self, CPU_DEFAULT};
use super::symbols::{Procedure, SymbolTable};

pub const MAX_OUTPUT: usize = 65536;
pub const IF_STACK_MAX: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    One,
    Two,
}

#[derive(Debug, Clone, Copy)]
pub struct CondFrame {
    pub active: bool,
    pub seen_else: bool,
}

/// Options that are set once from the CLI and never change across passes.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub case_sensitive_symbols: bool,
    pub jmp_label_indirect: bool,
    pub cpu: Option<String>,
}

/// A restartable source of source lines: either a real file or an
/// in-memory list (used for macro-body replay and for `assemble_str`).
pub trait LineSource: Send {
    fn next_line(&mut self) -> io::Result<Option<String>>;
}

pub struct FileSource {
    reader: BufReader<File>,
}

impl FileSource {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(FileSource {
            reader: BufReader::new(File::open(path)?),
        })
    }
}

impl LineSource for FileSource {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        let n = read_until_newline(&mut self.reader, &mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        let mut s = String::from_utf8_lossy(&buf).into_owned();
        s.retain(|c| c != '\n' && c != '\r');
        Ok(Some(s))
    }
}

fn read_until_newline<R: Read>(r: &mut R, buf: &mut Vec<u8>) -> io::Result<usize> {
    let mut total = 0;
    let mut byte = [0u8; 1];
    loop {
        let n = r.read(&mut byte)?;
        if n == 0 {
            break;
        }
        total += 1;
        buf.push(byte[0]);
        if byte[0] == b'\n' {
            break;
        }
    }
    Ok(total)
}

pub struct LinesSource {
    lines: std::vec::IntoIter<String>,
}

impl LinesSource {
    pub fn new(lines: Vec<String>) -> Self {
        LinesSource {
            lines: lines.into_iter(),
        }
    }
}

impl LineSource for LinesSource {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.lines.next())
    }
}

/// Everything the assembled run produces once both passes complete.
pub struct AssembledImage {
    pub bytes: Vec<u8>,
    pub start_addr: u32,
}

pub struct Engine {
    pub output: Vec<u8>,
    pub start_addr: u32,
    pub output_addr: u32,

    pub use_chksum: bool,
    pub chksum_addr: u32,

    pub pass: Pass,
    pub src_line: usize,

    pub case_sensitive_symbols: bool,
    pub jmp_label_indirect: bool,
    pub current_cpu: u32,

    pub if_stack: Vec<CondFrame>,

    pub labels: SymbolTable,
    pub equs: SymbolTable,
    pub procs: HashMap<String, Procedure>,
    pub in_proc: Option<String>,

    pub macros: HashMap<String, MacroDef>,
    pub in_macro: u32,

    pub pad_tail_words: bool,
    pub emit_is_fill: bool,
    pub tail_zero_start: Option<u32>,

    pub to_second_pass: bool,

    pub list: Option<Box<dyn Write>>,

    pub(crate) cur_reader: Option<Box<dyn LineSource>>,
    pub(crate) cur_dir: PathBuf,
    pub(crate) file_stack: Vec<(Box<dyn LineSource>, PathBuf, usize)>,
}

impl Engine {
    pub fn new(options: EngineOptions) -> AsmResult<Self> {
        let current_cpu = match &options.cpu {
            Some(name) => opcodes::cpu_by_name(name).ok_or_else(|| {
                AssembleError::new(ErrorKind::SyntaxError, 0, format!("--cpu {name}"))
            })?,
            None => CPU_DEFAULT,
        };
        Ok(Engine {
            output: vec![0u8; MAX_OUTPUT],
            start_addr: 0,
            output_addr: 0,
            use_chksum: false,
            chksum_addr: 0,
            pass: Pass::One,
            src_line: 1,
            case_sensitive_symbols: options.case_sensitive_symbols,
            jmp_label_indirect: options.jmp_label_indirect,
            current_cpu,
            if_stack: Vec::new(),
            labels: SymbolTable::new(),
            equs: SymbolTable::new(),
            procs: HashMap::new(),
            in_proc: None,
            macros: HashMap::new(),
            in_macro: 0,
            pad_tail_words: false,
            emit_is_fill: false,
            tail_zero_start: None,
            to_second_pass: false,
            list: None,
            cur_reader: None,
            cur_dir: PathBuf::from("."),
            file_stack: Vec::new(),
        })
    }

    fn reset_for_pass(&mut self, pass: Pass) {
        self.pass = pass;
        self.output_addr = self.start_addr;
        self.src_line = 1;
        self.in_macro = 0;
        self.in_proc = None;
        self.emit_is_fill = false;
        self.tail_zero_start = None;
        self.file_stack.clear();
        self.if_stack.clear();
    }

    pub fn key(&self, name: &str) -> String {
        if self.case_sensitive_symbols {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }

    pub fn is_skipping(&self) -> bool {
        self.if_stack.iter().any(|f| !f.active)
    }

    pub fn symbol_defined(&self, name: &str) -> bool {
        if self.equs.find(name, self.case_sensitive_symbols).is_some()
            || self.labels.find(name, self.case_sensitive_symbols).is_some()
        {
            return true;
        }
        if let Some(p) = self.current_proc() {
            if p.labels.find(name, self.case_sensitive_symbols).is_some()
                || p.equs.find(name, self.case_sensitive_symbols).is_some()
                || p.globals.find(name, self.case_sensitive_symbols).is_some()
            {
                return true;
            }
        }
        false
    }

    pub fn current_proc(&self) -> Option<&Procedure> {
        self.in_proc.as_ref().and_then(|n| self.procs.get(n))
    }

    pub fn current_proc_mut(&mut self) -> Option<&mut Procedure> {
        match &self.in_proc {
            Some(n) => self.procs.get_mut(n),
            None => None,
        }
    }

    /// Emit one byte, honoring the trailing-zero-fill tracker.
    pub fn emit_byte(&mut self, b: u8) -> AsmResult<()> {
        if self.output_addr as usize >= MAX_OUTPUT {
            return Err(AssembleError::new(
                ErrorKind::OutputBufferOverflow,
                self.src_line,
                String::new(),
            ));
        }
        if self.emit_is_fill {
            if b == 0 {
                if self.tail_zero_start.is_none() {
                    self.tail_zero_start = Some(self.output_addr);
                }
            } else {
                self.tail_zero_start = None;
            }
        } else {
            self.tail_zero_start = None;
        }
        self.output[self.output_addr as usize] = b;
        self.output_addr += 1;
        Ok(())
    }

    pub fn emit_word(&mut self, w: u16) -> AsmResult<()> {
        self.emit_byte((w & 0xff) as u8)?;
        self.emit_byte((w >> 8) as u8)
    }

    fn next_raw_line(&mut self) -> AsmResult<Option<(String, PathBuf)>> {
        loop {
            if self.cur_reader.is_none() {
                return Ok(None);
            }
            let line = self
                .cur_reader
                .as_mut()
                .unwrap()
                .next_line()
                .map_err(|e| {
                    AssembleError::new(ErrorKind::CannotOpenFile, self.src_line, e.to_string())
                })?;
            match line {
                Some(l) => return Ok(Some((l, self.cur_dir.clone()))),
                None => {
                    if let Some((reader, dir, line_no)) = self.file_stack.pop() {
                        self.cur_reader = Some(reader);
                        self.cur_dir = dir;
                        self.src_line = line_no;
                        continue;
                    } else {
                        self.cur_reader = None;
                        return Ok(None);
                    }
                }
            }
        }
    }

    fn run_pass(
        &mut self,
        pass: Pass,
        root: Box<dyn LineSource>,
        root_dir: PathBuf,
    ) -> AsmResult<()> {
        self.reset_for_pass(pass);
        self.cur_reader = Some(root);
        self.cur_dir = root_dir;
        while let Some((line, _dir)) = self.next_raw_line()? {
            self.process_line(&line)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> AsmResult<()> {
        if self.use_chksum {
            self.calculate_chksum();
        }
        if self.pad_tail_words {
            self.emit_word(0)?;
            self.emit_word(0)?;
        }
        if self.list.is_some() {
            self.write_listing_summary()?;
        }
        Ok(())
    }

    fn calculate_chksum(&mut self) {
        let mut chksum: u16 = 0;
        let mut i = self.start_addr;
        while i < self.output_addr {
            let lo = self.output[i as usize] as u16;
            let hi = self.output[i as usize + 1] as u16;
            chksum = chksum.wrapping_add((hi << 8) | lo);
            i += 2;
        }
        chksum ^= 0xffff;
        let addr = self.chksum_addr as usize;
        self.output[addr] = (chksum & 0xff) as u8;
        self.output[addr + 1] = (chksum >> 8) as u8;
    }

    fn trimmed_end(&self) -> u32 {
        self.tail_zero_start.unwrap_or(self.output_addr)
    }

    pub fn assemble_from_file(path: &Path, options: EngineOptions) -> AsmResult<AssembledImage> {
        let mut engine = Engine::new(options)?;
        engine.assemble_file(path)
    }

    /// Assemble a file on disk using this engine instance — lets a caller
    /// set a list writer before running the passes, unlike the associated
    /// `assemble_from_file` which builds its own throwaway engine.
    pub fn assemble_file(&mut self, path: &Path) -> AsmResult<AssembledImage> {
        let dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let open_root = || -> AsmResult<Box<dyn LineSource>> {
            FileSource::open(path)
                .map(|f| Box::new(f) as Box<dyn LineSource>)
                .map_err(|e| AssembleError::new(ErrorKind::CannotOpenFile, 0, e.to_string()))
        };

        self.run_pass(Pass::One, open_root()?, dir.clone())?;
        self.run_pass(Pass::Two, open_root()?, dir)?;
        self.finish()?;

        Ok(AssembledImage {
            bytes: self.output[self.start_addr as usize..self.trimmed_end() as usize].to_vec(),
            start_addr: self.start_addr,
        })
    }

    /// Assemble from an in-memory source, with `base_dir` used to resolve
    /// `include` directives. Mainly useful for tests.
    pub fn assemble_str(
        source: &str,
        base_dir: &Path,
        options: EngineOptions,
    ) -> AsmResult<AssembledImage> {
        let mut engine = Engine::new(options)?;
        let lines: Vec<String> = source.lines().map(|l| l.to_string()).collect();

        engine.run_pass(
            Pass::One,
            Box::new(LinesSource::new(lines.clone())),
            base_dir.to_path_buf(),
        )?;
        engine.run_pass(
            Pass::Two,
            Box::new(LinesSource::new(lines)),
            base_dir.to_path_buf(),
        )?;
        engine.finish()?;

        Ok(AssembledImage {
            bytes: engine.output[engine.start_addr as usize..engine.trimmed_end() as usize]
                .to_vec(),
            start_addr: engine.start_addr,
        })
    }

    pub fn set_list_writer(&mut self, w: Box<dyn Write>) {
        self.list = Some(w);
    }

    // --- statement dispatch -------------------------------------------------

    /// Process one raw source line: this is the direct counterpart of the
    /// reference's `do_asm`.
    pub(crate) fn process_line(&mut self, raw: &str) -> AsmResult<()> {
        let list_line = self.src_line;
        let stripped = super::lexer::strip_comment(raw);
        let str_ = stripped.trim_start_matches([' ', '\t']);

        if self.try_conditional(str_)?.is_some() {
            if self.in_macro == 0 {
                self.src_line += 1;
            }
            return Ok(());
        }

        if self.is_skipping() {
            if self.in_macro == 0 {
                self.src_line += 1;
            }
            return Ok(());
        }

        self.dispatch_statement(str_, raw, list_line)?;
        if self.in_macro == 0 {
            self.src_line += 1;
        }
        Ok(())
    }

    /// Handles `if`/`ifdef`/`ifndef`/`else`/`endif`. Returns `Some(true)` if
    /// the line was a conditional directive (already fully handled).
    fn try_conditional(&mut self, str_: &str) -> AsmResult<Option<bool>> {
        let mut scan = str_;
        super::cursor::skip_blank(&mut scan);
        if scan.is_empty() {
            return Ok(None);
        }
        let tok_start = scan;
        let tok = super::cursor::take_token(&mut scan);
        if tok.is_empty() {
            return Ok(None);
        }
        let tok = tok.strip_prefix('.').unwrap_or(tok);
        let lower = tok.to_ascii_lowercase();

        let is_conditional = matches!(lower.as_str(), "if" | "ifdef" | "ifndef" | "else" | "endif");
        if !is_conditional {
            let _ = tok_start;
            return Ok(None);
        }

        let mut args = scan;
        match lower.as_str() {
            "if" => {
                let parent_active = !self.is_skipping();
                let cond = if parent_active {
                    self.eval_expr(&mut args)? != 0
                } else {
                    false
                };
                if self.if_stack.len() >= IF_STACK_MAX {
                    return Err(AssembleError::new(
                        ErrorKind::SyntaxError,
                        self.src_line,
                        str_.to_string(),
                    ));
                }
                self.if_stack.push(CondFrame {
                    active: cond,
                    seen_else: false,
                });
            }
            "ifdef" | "ifndef" => {
                let parent_active = !self.is_skipping();
                super::cursor::skip_blank(&mut args);
                let name = super::cursor::take_token(&mut args);
                let defined = self.symbol_defined(name);
                let cond = if parent_active {
                    if lower == "ifdef" {
                        defined
                    } else {
                        !defined
                    }
                } else {
                    false
                };
                if self.if_stack.len() >= IF_STACK_MAX {
                    return Err(AssembleError::new(
                        ErrorKind::SyntaxError,
                        self.src_line,
                        str_.to_string(),
                    ));
                }
                self.if_stack.push(CondFrame {
                    active: cond,
                    seen_else: false,
                });
            }
            "else" => {
                if self.if_stack.is_empty() {
                    return Err(AssembleError::new(
                        ErrorKind::SyntaxError,
                        self.src_line,
                        str_.to_string(),
                    ));
                }
                let top = self.if_stack.len() - 1;
                if self.if_stack[top].seen_else {
                    return Err(AssembleError::new(
                        ErrorKind::SyntaxError,
                        self.src_line,
                        str_.to_string(),
                    ));
                }
                let parent_active = self.if_stack[..top].iter().all(|f| f.active);
                self.if_stack[top].active = parent_active && !self.if_stack[top].active;
                self.if_stack[top].seen_else = true;
            }
            "endif" => {
                if self.if_stack.is_empty() {
                    return Err(AssembleError::new(
                        ErrorKind::SyntaxError,
                        self.src_line,
                        str_.to_string(),
                    ));
                }
                self.if_stack.pop();
            }
            _ => unreachable!(),
        }
        Ok(Some(true))
    }
}
