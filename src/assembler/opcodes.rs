//! The PDP-11 instruction/pseudo-op table and CPU variant gating.

pub const CPU_DEFAULT: u32 = 1 << 0;
pub const CPU_DCJ11: u32 = 1 << 1;
pub const CPU_VM1: u32 = 1 << 2;
pub const CPU_VM1G: u32 = 1 << 3;
pub const CPU_VM2: u32 = 1 << 4;
pub const CPU_ALL: u32 = CPU_DEFAULT | CPU_DCJ11 | CPU_VM1 | CPU_VM1G | CPU_VM2;

pub fn cpu_by_name(name: &str) -> Option<u32> {
    match name.to_ascii_lowercase().as_str() {
        "default" => Some(CPU_DEFAULT),
        "dcj-11" | "dcj11" => Some(CPU_DCJ11),
        "vm1" => Some(CPU_VM1),
        "vm1g" => Some(CPU_VM1G),
        "vm2" => Some(CPU_VM2),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    None,
    Single,
    Double,
    Branch,
    Jmp,
    Jsr,
    Rts,
    Sob,
    Mark,
    Eis,
    Xor,
    Trap,
    Emt,
    Spl,
    Ccode,
    Fis,

    PseudoDb,
    PseudoDw,
    PseudoDs,
    PseudoDsw,
    PseudoAlign,
    PseudoMacro,
    PseudoEqu,
    PseudoProc,
    PseudoOrg,
    PseudoInclude,
    PseudoChksum,
    PseudoCpu,
}

impl OpKind {
    /// Pseudo-ops never gate on the active CPU mask; only real machine
    /// instructions do (mirrors `opcode->type < pseudo_db` in the source).
    pub fn is_machine_instruction(self) -> bool {
        !matches!(
            self,
            OpKind::PseudoDb
                | OpKind::PseudoDw
                | OpKind::PseudoDs
                | OpKind::PseudoDsw
                | OpKind::PseudoAlign
                | OpKind::PseudoMacro
                | OpKind::PseudoEqu
                | OpKind::PseudoProc
                | OpKind::PseudoOrg
                | OpKind::PseudoInclude
                | OpKind::PseudoChksum
                | OpKind::PseudoCpu
        )
    }
}

pub struct OpCode {
    pub name: &'static str,
    pub kind: OpKind,
    pub base: u16,
    pub allow_byte: bool,
    pub cpu_mask: u32,
}

macro_rules! op {
    ($name:expr, $kind:expr, $base:expr, $allow_byte:expr, $mask:expr) => {
        OpCode {
            name: $name,
            kind: $kind,
            base: $base,
            allow_byte: $allow_byte,
            cpu_mask: $mask,
        }
    };
}

pub static OPCODES: &[OpCode] = &[
    // double operand
    op!("mov", OpKind::Double, 0o010000, true, CPU_ALL),
    op!("cmp", OpKind::Double, 0o020000, true, CPU_ALL),
    op!("bit", OpKind::Double, 0o030000, true, CPU_ALL),
    op!("bic", OpKind::Double, 0o040000, true, CPU_ALL),
    op!("bis", OpKind::Double, 0o050000, true, CPU_ALL),
    op!("add", OpKind::Double, 0o060000, false, CPU_ALL),
    op!("sub", OpKind::Double, 0o160000, false, CPU_ALL),
    // single operand
    op!("clr", OpKind::Single, 0o5000, true, CPU_ALL),
    op!("com", OpKind::Single, 0o5100, true, CPU_ALL),
    op!("inc", OpKind::Single, 0o5200, true, CPU_ALL),
    op!("dec", OpKind::Single, 0o5300, true, CPU_ALL),
    op!("neg", OpKind::Single, 0o5400, true, CPU_ALL),
    op!("adc", OpKind::Single, 0o5500, true, CPU_ALL),
    op!("sbc", OpKind::Single, 0o5600, true, CPU_ALL),
    op!("tst", OpKind::Single, 0o5700, true, CPU_ALL),
    op!("ror", OpKind::Single, 0o6000, true, CPU_ALL),
    op!("rol", OpKind::Single, 0o6100, true, CPU_ALL),
    op!("asr", OpKind::Single, 0o6200, true, CPU_ALL),
    op!("asl", OpKind::Single, 0o6300, true, CPU_ALL),
    op!("swab", OpKind::Single, 0o300, false, CPU_ALL),
    op!("sxt", OpKind::Single, 0o6700, false, CPU_ALL),
    op!("csm", OpKind::Single, 0o7000, false, CPU_DEFAULT | CPU_DCJ11),
    op!(
        "tstset",
        OpKind::Single,
        0o7200,
        false,
        CPU_DEFAULT | CPU_DCJ11
    ),
    op!(
        "wrtlck",
        OpKind::Single,
        0o7300,
        false,
        CPU_DEFAULT | CPU_DCJ11
    ),
    // branches
    op!("br", OpKind::Branch, 0o000400, false, CPU_ALL),
    op!("bne", OpKind::Branch, 0o001000, false, CPU_ALL),
    op!("beq", OpKind::Branch, 0o001400, false, CPU_ALL),
    op!("bpl", OpKind::Branch, 0o100000, false, CPU_ALL),
    op!("bmi", OpKind::Branch, 0o100400, false, CPU_ALL),
    op!("bvc", OpKind::Branch, 0o102000, false, CPU_ALL),
    op!("bvs", OpKind::Branch, 0o102400, false, CPU_ALL),
    op!("bcc", OpKind::Branch, 0o103000, false, CPU_ALL),
    op!("bcs", OpKind::Branch, 0o103400, false, CPU_ALL),
    op!("bge", OpKind::Branch, 0o002000, false, CPU_ALL),
    op!("blt", OpKind::Branch, 0o002400, false, CPU_ALL),
    op!("bgt", OpKind::Branch, 0o003000, false, CPU_ALL),
    op!("ble", OpKind::Branch, 0o003400, false, CPU_ALL),
    op!("bhi", OpKind::Branch, 0o101000, false, CPU_ALL),
    op!("blos", OpKind::Branch, 0o101400, false, CPU_ALL),
    // program control
    op!("jmp", OpKind::Jmp, 0o000100, false, CPU_ALL),
    op!("jsr", OpKind::Jsr, 0o004000, false, CPU_ALL),
    op!("rts", OpKind::Rts, 0o000200, false, CPU_ALL),
    op!("sob", OpKind::Sob, 0o077000, false, CPU_ALL),
    op!("mark", OpKind::Mark, 0o006400, false, CPU_ALL),
    // EIS
    op!(
        "mul",
        OpKind::Eis,
        0o070000,
        false,
        CPU_DEFAULT | CPU_DCJ11 | CPU_VM1G | CPU_VM2
    ),
    op!(
        "div",
        OpKind::Eis,
        0o071000,
        false,
        CPU_DEFAULT | CPU_DCJ11 | CPU_VM1G | CPU_VM2
    ),
    op!(
        "ash",
        OpKind::Eis,
        0o072000,
        false,
        CPU_DEFAULT | CPU_DCJ11 | CPU_VM1G | CPU_VM2
    ),
    op!(
        "ashc",
        OpKind::Eis,
        0o073000,
        false,
        CPU_DEFAULT | CPU_DCJ11 | CPU_VM1G | CPU_VM2
    ),
    op!(
        "xor",
        OpKind::Xor,
        0o074000,
        false,
        CPU_DEFAULT | CPU_DCJ11 | CPU_VM1 | CPU_VM1G | CPU_VM2
    ),
    // FIS (KE11-F)
    op!(
        "fadd",
        OpKind::Fis,
        0o075000,
        false,
        CPU_DEFAULT | CPU_DCJ11 | CPU_VM2
    ),
    op!(
        "fsub",
        OpKind::Fis,
        0o075010,
        false,
        CPU_DEFAULT | CPU_DCJ11 | CPU_VM2
    ),
    op!(
        "fmul",
        OpKind::Fis,
        0o075020,
        false,
        CPU_DEFAULT | CPU_DCJ11 | CPU_VM2
    ),
    op!(
        "fdiv",
        OpKind::Fis,
        0o075030,
        false,
        CPU_DEFAULT | CPU_DCJ11 | CPU_VM2
    ),
    op!(
        "cfcc",
        OpKind::None,
        0o075004,
        false,
        CPU_DEFAULT | CPU_DCJ11 | CPU_VM2
    ),
    // system & trap
    op!("halt", OpKind::None, 0o000000, false, CPU_ALL),
    op!("wait", OpKind::None, 0o000001, false, CPU_ALL),
    op!("rti", OpKind::None, 0o000002, false, CPU_ALL),
    op!("bpt", OpKind::None, 0o000003, false, CPU_ALL),
    op!("iot", OpKind::None, 0o000004, false, CPU_ALL),
    op!("reset", OpKind::None, 0o000005, false, CPU_ALL),
    op!("rtt", OpKind::None, 0o000006, false, CPU_ALL),
    op!("mfpt", OpKind::None, 0o000007, false, CPU_ALL),
    op!("trap", OpKind::Trap, 0o104400, false, CPU_ALL),
    op!("emt", OpKind::Emt, 0o104000, false, CPU_ALL),
    // VM2 system
    op!("go", OpKind::None, 0o000012, false, CPU_DEFAULT | CPU_VM2),
    op!("step", OpKind::None, 0o000016, false, CPU_DEFAULT | CPU_VM2),
    op!("rsel", OpKind::None, 0o000020, false, CPU_DEFAULT | CPU_VM2),
    op!("mfus", OpKind::None, 0o000021, false, CPU_DEFAULT | CPU_VM2),
    op!("rcpc", OpKind::None, 0o000022, false, CPU_DEFAULT | CPU_VM2),
    op!("rcps", OpKind::None, 0o000024, false, CPU_DEFAULT | CPU_VM2),
    op!("mtus", OpKind::None, 0o000031, false, CPU_DEFAULT | CPU_VM2),
    op!("wcpc", OpKind::None, 0o000032, false, CPU_DEFAULT | CPU_VM2),
    op!("wcps", OpKind::None, 0o000034, false, CPU_DEFAULT | CPU_VM2),
    // memory management
    op!(
        "mfpi",
        OpKind::Single,
        0o006500,
        false,
        CPU_DEFAULT | CPU_DCJ11 | CPU_VM2
    ),
    op!(
        "mtpi",
        OpKind::Single,
        0o006600,
        false,
        CPU_DEFAULT | CPU_DCJ11 | CPU_VM2
    ),
    op!(
        "mfpd",
        OpKind::Single,
        0o106500,
        false,
        CPU_DEFAULT | CPU_DCJ11 | CPU_VM2
    ),
    op!(
        "mtpd",
        OpKind::Single,
        0o106600,
        false,
        CPU_DEFAULT | CPU_DCJ11 | CPU_VM2
    ),
    op!("mtps", OpKind::Single, 0o106400, false, CPU_ALL),
    op!("mfps", OpKind::Single, 0o106700, false, CPU_ALL),
    // spl
    op!("spl", OpKind::Spl, 0o000230, false, CPU_ALL),
    // condition codes
    op!("clc", OpKind::Ccode, 0o000241, false, CPU_ALL),
    op!("clv", OpKind::Ccode, 0o000242, false, CPU_ALL),
    op!("clz", OpKind::Ccode, 0o000244, false, CPU_ALL),
    op!("cln", OpKind::Ccode, 0o000250, false, CPU_ALL),
    op!("sec", OpKind::Ccode, 0o000261, false, CPU_ALL),
    op!("sev", OpKind::Ccode, 0o000262, false, CPU_ALL),
    op!("sez", OpKind::Ccode, 0o000264, false, CPU_ALL),
    op!("sen", OpKind::Ccode, 0o000270, false, CPU_ALL),
    op!("ccc", OpKind::Ccode, 0o000257, false, CPU_ALL),
    op!("scc", OpKind::Ccode, 0o000277, false, CPU_ALL),
    op!("nop", OpKind::Ccode, 0o000240, false, CPU_ALL),
    // pseudo ops
    op!("db", OpKind::PseudoDb, 0, false, CPU_ALL),
    op!("dw", OpKind::PseudoDw, 0, false, CPU_ALL),
    op!("ds", OpKind::PseudoDs, 0, false, CPU_ALL),
    op!("dsb", OpKind::PseudoDs, 0, false, CPU_ALL),
    op!("dsw", OpKind::PseudoDsw, 0, false, CPU_ALL),
    op!("even", OpKind::PseudoAlign, 0, false, CPU_ALL),
    op!("macro", OpKind::PseudoMacro, 0, false, CPU_ALL),
    op!("endm", OpKind::PseudoMacro, 0, false, CPU_ALL),
    op!("equ", OpKind::PseudoEqu, 0, false, CPU_ALL),
    op!("proc", OpKind::PseudoProc, 0, false, CPU_ALL),
    op!("endp", OpKind::PseudoProc, 0, false, CPU_ALL),
    op!("global", OpKind::PseudoProc, 0, false, CPU_ALL),
    op!("org", OpKind::PseudoOrg, 0, false, CPU_ALL),
    op!("include", OpKind::PseudoInclude, 0, false, CPU_ALL),
    op!("chksum", OpKind::PseudoChksum, 0, false, CPU_ALL),
    op!("cpu", OpKind::PseudoCpu, 0, false, CPU_ALL),
];

/// Look up a mnemonic, case-insensitively, ignoring a leading `.`. Returns
/// the matching opcode plus whether the `b`/`B` byte-variant suffix was used.
pub fn find_opcode(name: &str) -> Option<(&'static OpCode, bool)> {
    let name = name.strip_prefix('.').unwrap_or(name);

    for op in OPCODES {
        if op.name.eq_ignore_ascii_case(name) {
            return Some((op, false));
        }
    }

    if name.len() > 1 {
        let (head, tail) = name.split_at(name.len() - 1);
        if tail == "b" || tail == "B" {
            for op in OPCODES {
                if op.name.eq_ignore_ascii_case(head) {
                    if !op.allow_byte {
                        return None;
                    }
                    return Some((op, true));
                }
            }
        }
    }

    None
}

pub fn opcode_supported(op: &OpCode, current_cpu: u32) -> bool {
    (op.cpu_mask & current_cpu) != 0
}

pub struct Register {
    pub name: &'static str,
    pub n: u8,
}

pub static REGISTERS: &[Register] = &[
    Register { name: "r0", n: 0 },
    Register { name: "r1", n: 1 },
    Register { name: "r2", n: 2 },
    Register { name: "r3", n: 3 },
    Register { name: "r4", n: 4 },
    Register { name: "r5", n: 5 },
    Register { name: "r6", n: 6 },
    Register { name: "r7", n: 7 },
    Register { name: "sp", n: 6 },
    Register { name: "pc", n: 7 },
];

pub fn find_register(name: &str) -> Option<u8> {
    REGISTERS
        .iter()
        .find(|r| r.name.eq_ignore_ascii_case(name))
        .map(|r| r.n)
}
