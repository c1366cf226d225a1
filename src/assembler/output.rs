//! Output format writers: hex dump, a Verilog memory module, and raw binary.
//! All three operate on the already-trimmed byte range the engine produced.

use std::io::{self, Write};

pub fn write_hex<W: Write>(w: &mut W, start_addr: u32, bytes: &[u8]) -> io::Result<()> {
    for (row, chunk) in bytes.chunks(16).enumerate() {
        let addr = start_addr as usize + row * 16;
        write!(w, "{:04X}:", addr)?;
        for b in chunk {
            write!(w, " {:02X}", b)?;
        }
        writeln!(w)?;
    }
    Ok(())
}

pub fn write_binary<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    w.write_all(bytes)
}

/// A fixed `sram` module wrapper, its `Mem` array pre-initialized byte by
/// byte from the assembled image.
pub fn write_verilog<W: Write>(w: &mut W, start_addr: u32, bytes: &[u8]) -> io::Result<()> {
    writeln!(w, "module sram(")?;
    writeln!(w, "    input clk,")?;
    writeln!(w, "    input [15:0] addr,")?;
    writeln!(w, "    input [7:0] din,")?;
    writeln!(w, "    input we,")?;
    writeln!(w, "    output reg [7:0] dout")?;
    writeln!(w, ");")?;
    writeln!(w, "    reg [7:0] Mem [0:65535];")?;
    writeln!(w)?;
    writeln!(w, "    initial begin")?;
    for (i, b) in bytes.iter().enumerate() {
        writeln!(w, "        Mem[{}] = 8'h{:02X};", start_addr as usize + i, b)?;
    }
    writeln!(w, "    end")?;
    writeln!(w)?;
    writeln!(w, "    always @(posedge clk) begin")?;
    writeln!(w, "        if (we)")?;
    writeln!(w, "            Mem[addr] <= din;")?;
    writeln!(w, "        dout <= Mem[addr];")?;
    writeln!(w, "    end")?;
    writeln!(w, "endmodule")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_dump_formats_address_and_bytes() {
        let mut buf = Vec::new();
        write_hex(&mut buf, 0o1000, &[0x01, 0xff, 0x20]).unwrap();
        let s = String::from_utf8(buf).unwrap();
        assert!(s.starts_with("0200:"));
        assert!(s.contains("01 FF 20"));
    }

    #[test]
    fn binary_is_a_raw_copy() {
        let mut buf = Vec::new();
        write_binary(&mut buf, &[1, 2, 3]).unwrap();
        assert_eq!(buf, vec![1, 2, 3]);
    }
}
