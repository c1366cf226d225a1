//! Listing output: one line per statement during pass 2, plus the
//! constants/labels/errors dump written once assembly finishes.

use super::engine::{Engine, Pass};
use super::error::{AsmResult, AssembleError, ErrorKind};

impl Engine {
    fn listing_active(&self) -> bool {
        matches!(self.pass, Pass::Two) && self.list.is_some()
    }

    fn write_list(&mut self, text: &str) -> AsmResult<()> {
        if let Some(w) = self.list.as_mut() {
            w.write_all(text.as_bytes()).map_err(|e| {
                AssembleError::new(ErrorKind::CannotOpenFile, self.src_line, e.to_string())
            })?;
        }
        Ok(())
    }

    /// `LLLL OOOOOO: W1 W2 W3  <source>`, padding out to three word slots.
    pub fn list_line_words(
        &mut self,
        line_no: usize,
        addr: u32,
        words: &[u16],
        source: &str,
    ) -> AsmResult<()> {
        if !self.listing_active() {
            return Ok(());
        }
        let expanded = super::lexer::expand_tabs(source, 8);
        let mut line = format!("{:4} {:06o}:", line_no, addr);
        for i in 0..3 {
            match words.get(i) {
                Some(w) => line.push_str(&format!(" {:06o}", w)),
                None => line.push_str("       "),
            }
        }
        line.push_str("  ");
        line.push_str(&expanded);
        line.push('\n');
        self.write_list(&line)
    }

    /// A listing line with no address or words, just the echoed source —
    /// used for blank lines and for macro-body definition lines replayed
    /// during pass 2 (the body itself isn't emitted at definition time).
    pub fn list_plain_line(&mut self, line_no: usize, source: &str) -> AsmResult<()> {
        if !self.listing_active() {
            return Ok(());
        }
        let expanded = super::lexer::expand_tabs(source, 8);
        let mut line = format!("{:4} {:6}:", line_no, "");
        for _ in 0..3 {
            line.push_str("       ");
        }
        line.push_str("  ");
        line.push_str(&expanded);
        line.push('\n');
        self.write_list(&line)
    }

    /// `db`/`ds`/`even` continuation dump: 8 octal bytes per row, address
    /// shown only on the first row of the group.
    pub fn list_data_bytes(
        &mut self,
        line_no: usize,
        start_addr: u32,
        bytes: &[u8],
        source: &str,
    ) -> AsmResult<()> {
        if !self.listing_active() {
            return Ok(());
        }
        if bytes.is_empty() {
            return self.list_line_words(line_no, start_addr, &[], source);
        }
        let expanded = super::lexer::expand_tabs(source, 8);
        for (i, chunk) in bytes.chunks(8).enumerate() {
            let mut line = if i == 0 {
                format!("{:4} {:06o}:", line_no, start_addr)
            } else {
                format!("{:4} {:12}", "", "")
            };
            for b in chunk {
                line.push_str(&format!(" {:03o}", b));
            }
            if i == 0 {
                line.push_str("  ");
                line.push_str(&expanded);
            }
            line.push('\n');
            self.write_list(&line)?;
        }
        Ok(())
    }

    /// `dw`/`dsw` continuation dump: 4 octal words per row.
    pub fn list_data_words(
        &mut self,
        line_no: usize,
        start_addr: u32,
        words: &[u16],
        source: &str,
    ) -> AsmResult<()> {
        if !self.listing_active() {
            return Ok(());
        }
        if words.is_empty() {
            return self.list_line_words(line_no, start_addr, &[], source);
        }
        let expanded = super::lexer::expand_tabs(source, 8);
        for (i, chunk) in words.chunks(4).enumerate() {
            let mut line = if i == 0 {
                format!("{:4} {:06o}:", line_no, start_addr)
            } else {
                format!("{:4} {:12}", "", "")
            };
            for w in chunk {
                line.push_str(&format!(" {:06o}", w));
            }
            if i == 0 {
                line.push_str("  ");
                line.push_str(&expanded);
            }
            line.push('\n');
            self.write_list(&line)?;
        }
        Ok(())
    }

    /// Written once, after both passes complete successfully: constants,
    /// then labels, newest-defined first, then a trailing error summary.
    pub fn write_listing_summary(&mut self) -> AsmResult<()> {
        if self.list.is_none() {
            return Ok(());
        }
        let mut out = String::new();
        out.push_str("\nConstants:\n");
        for sym in self.equs.iter_newest_first() {
            out.push_str(&format!("[{}] {:06o}\n", sym.name, sym.value));
        }
        out.push_str("\nLabels:\n");
        for sym in self.labels.iter_newest_first() {
            out.push_str(&format!("[{}] {:06o}\n", sym.name, sym.value));
        }
        out.push_str("\nErrors: none\n");
        self.write_list(&out)
    }
}
