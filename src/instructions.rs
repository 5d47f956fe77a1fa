//! The CHIP-8 instruction catalog and a table-driven decoder.
//!
//! An opcode matches an instruction when `opcode & mask == pattern`. The table is scanned in
//! order and the first match wins, so an entry must never be shadowed by an earlier one with a
//! broader mask.

use std::fmt;

/// Extracts one argument: `(opcode & mask) >> shift`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgMask {
    pub mask: u16,
    pub shift: u8,
}

impl ArgMask {
    pub fn extract(self, opcode: u16) -> u16 {
        (opcode & self.mask) >> self.shift
    }
}

/// 12-bit address.
pub const ARG_NNN: ArgMask = ArgMask { mask: 0x0FFF, shift: 0 };
/// Register index in the second nibble.
pub const ARG_X: ArgMask = ArgMask { mask: 0x0F00, shift: 8 };
/// Register index in the third nibble.
pub const ARG_Y: ArgMask = ArgMask { mask: 0x00F0, shift: 4 };
/// Byte immediate.
pub const ARG_KK: ArgMask = ArgMask { mask: 0x00FF, shift: 0 };
/// Nibble immediate.
pub const ARG_N: ArgMask = ArgMask { mask: 0x000F, shift: 0 };

const MASK_HIGH_NIBBLE: u16 = 0xF000;
const MASK_HIGH_AND_LOW_NIBBLE: u16 = 0xF00F;
const MASK_HIGH_NIBBLE_AND_LOW_BYTE: u16 = 0xF0FF;
const MASK_EXACT: u16 = 0xFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionId {
    Cls,
    Ret,
    JpAddr,
    CallAddr,
    SeVxByte,
    SneVxByte,
    SeVxVy,
    LdVxByte,
    AddVxByte,
    LdVxVy,
    OrVxVy,
    AndVxVy,
    XorVxVy,
    AddVxVy,
    SubVxVy,
    ShrVxVy,
    SubnVxVy,
    ShlVxVy,
    SneVxVy,
    LdIAddr,
    JpV0Addr,
    RndVxByte,
    DrwVxVyN,
    SkpVx,
    SknpVx,
    LdVxDt,
    LdVxK,
    LdDtVx,
    LdStVx,
    AddIVx,
    LdFVx,
    LdBVx,
    LdIndirectVx,
    LdVxIndirect,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Instruction {
    pub id: InstructionId,
    pub mnemonic: &'static str,
    pub mask: u16,
    pub pattern: u16,
    pub args: &'static [ArgMask],
}

impl Instruction {
    pub fn matches(&self, opcode: u16) -> bool {
        opcode & self.mask == self.pattern
    }
}

macro_rules! instruction {
    ($id:ident, $mnemonic:expr, $mask:expr, $pattern:expr, [$($arg:expr),*]) => {
        Instruction {
            id: InstructionId::$id,
            mnemonic: $mnemonic,
            mask: $mask,
            pattern: $pattern,
            args: &[$($arg),*],
        }
    };
}

/// The whole CHIP-8 instruction set, in match priority order.
#[rustfmt::skip]
pub static INSTRUCTION_SET: [Instruction; 34] = [
    instruction!(Cls,          "CLS",  MASK_EXACT,                    0x00E0, []),
    instruction!(Ret,          "RET",  MASK_EXACT,                    0x00EE, []),
    instruction!(JpAddr,       "JP",   MASK_HIGH_NIBBLE,              0x1000, [ARG_NNN]),
    instruction!(CallAddr,     "CALL", MASK_HIGH_NIBBLE,              0x2000, [ARG_NNN]),
    instruction!(SeVxByte,     "SE",   MASK_HIGH_NIBBLE,              0x3000, [ARG_X, ARG_KK]),
    instruction!(SneVxByte,    "SNE",  MASK_HIGH_NIBBLE,              0x4000, [ARG_X, ARG_KK]),
    instruction!(SeVxVy,       "SE",   MASK_HIGH_AND_LOW_NIBBLE,      0x5000, [ARG_X, ARG_Y]),
    instruction!(LdVxByte,     "LD",   MASK_HIGH_NIBBLE,              0x6000, [ARG_X, ARG_KK]),
    instruction!(AddVxByte,    "ADD",  MASK_HIGH_NIBBLE,              0x7000, [ARG_X, ARG_KK]),
    instruction!(LdVxVy,       "LD",   MASK_HIGH_AND_LOW_NIBBLE,      0x8000, [ARG_X, ARG_Y]),
    instruction!(OrVxVy,       "OR",   MASK_HIGH_AND_LOW_NIBBLE,      0x8001, [ARG_X, ARG_Y]),
    instruction!(AndVxVy,      "AND",  MASK_HIGH_AND_LOW_NIBBLE,      0x8002, [ARG_X, ARG_Y]),
    instruction!(XorVxVy,      "XOR",  MASK_HIGH_AND_LOW_NIBBLE,      0x8003, [ARG_X, ARG_Y]),
    instruction!(AddVxVy,      "ADD",  MASK_HIGH_AND_LOW_NIBBLE,      0x8004, [ARG_X, ARG_Y]),
    instruction!(SubVxVy,      "SUB",  MASK_HIGH_AND_LOW_NIBBLE,      0x8005, [ARG_X, ARG_Y]),
    instruction!(ShrVxVy,      "SHR",  MASK_HIGH_AND_LOW_NIBBLE,      0x8006, [ARG_X, ARG_Y]),
    instruction!(SubnVxVy,     "SUBN", MASK_HIGH_AND_LOW_NIBBLE,      0x8007, [ARG_X, ARG_Y]),
    instruction!(ShlVxVy,      "SHL",  MASK_HIGH_AND_LOW_NIBBLE,      0x800E, [ARG_X, ARG_Y]),
    instruction!(SneVxVy,      "SNE",  MASK_HIGH_AND_LOW_NIBBLE,      0x9000, [ARG_X, ARG_Y]),
    instruction!(LdIAddr,      "LD",   MASK_HIGH_NIBBLE,              0xA000, [ARG_NNN]),
    instruction!(JpV0Addr,     "JP",   MASK_HIGH_NIBBLE,              0xB000, [ARG_NNN]),
    instruction!(RndVxByte,    "RND",  MASK_HIGH_NIBBLE,              0xC000, [ARG_X, ARG_KK]),
    instruction!(DrwVxVyN,     "DRW",  MASK_HIGH_NIBBLE,              0xD000, [ARG_X, ARG_Y, ARG_N]),
    instruction!(SkpVx,        "SKP",  MASK_HIGH_NIBBLE_AND_LOW_BYTE, 0xE09E, [ARG_X]),
    instruction!(SknpVx,       "SKNP", MASK_HIGH_NIBBLE_AND_LOW_BYTE, 0xE0A1, [ARG_X]),
    instruction!(LdVxDt,       "LD",   MASK_HIGH_NIBBLE_AND_LOW_BYTE, 0xF007, [ARG_X]),
    instruction!(LdVxK,        "LD",   MASK_HIGH_NIBBLE_AND_LOW_BYTE, 0xF00A, [ARG_X]),
    instruction!(LdDtVx,       "LD",   MASK_HIGH_NIBBLE_AND_LOW_BYTE, 0xF015, [ARG_X]),
    instruction!(LdStVx,       "LD",   MASK_HIGH_NIBBLE_AND_LOW_BYTE, 0xF018, [ARG_X]),
    instruction!(AddIVx,       "ADD",  MASK_HIGH_NIBBLE_AND_LOW_BYTE, 0xF01E, [ARG_X]),
    instruction!(LdFVx,        "LD",   MASK_HIGH_NIBBLE_AND_LOW_BYTE, 0xF029, [ARG_X]),
    instruction!(LdBVx,        "LD",   MASK_HIGH_NIBBLE_AND_LOW_BYTE, 0xF033, [ARG_X]),
    instruction!(LdIndirectVx, "LD",   MASK_HIGH_NIBBLE_AND_LOW_BYTE, 0xF055, [ARG_X]),
    instruction!(LdVxIndirect, "LD",   MASK_HIGH_NIBBLE_AND_LOW_BYTE, 0xF065, [ARG_X]),
];

/// A matched instruction together with its extracted arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub opcode: u16,
    pub instruction: &'static Instruction,
    args: [u16; 3],
}

impl Decoded {
    pub fn id(&self) -> InstructionId {
        self.instruction.id
    }

    /// Argument values in the order the instruction declares them.
    pub fn args(&self) -> &[u16] {
        &self.args[..self.instruction.args.len()]
    }

    /// The `n`th argument. Panics if the instruction declares fewer arguments, which is a bug in
    /// the dispatcher rather than in the program being run.
    pub fn arg(&self, n: usize) -> u16 {
        self.args()[n]
    }

    /// Argument `n` as a register index.
    pub fn reg(&self, n: usize) -> usize {
        self.arg(n) as usize
    }

    /// Argument `n` as a byte immediate.
    pub fn byte(&self, n: usize) -> u8 {
        self.arg(n) as u8
    }
}

/// Find the instruction an opcode encodes. `None` means no entry matches.
pub fn decode(opcode: u16) -> Option<Decoded> {
    let instruction = INSTRUCTION_SET.iter().find(|instr| instr.matches(opcode))?;

    let mut args = [0; 3];
    for (value, arg) in args.iter_mut().zip(instruction.args) {
        *value = arg.extract(opcode);
    }

    Some(Decoded {
        opcode,
        instruction,
        args,
    })
}

/// Mnemonic form of an opcode, if it is one.
pub fn disassemble(opcode: u16) -> Option<String> {
    decode(opcode).map(|decoded| decoded.to_string())
}

impl fmt::Display for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use InstructionId::*;

        let m = self.instruction.mnemonic;
        match self.id() {
            Cls | Ret => write!(f, "{}", m),
            JpAddr | CallAddr => write!(f, "{} {:#05x}", m, self.arg(0)),
            SeVxByte | SneVxByte | LdVxByte | AddVxByte | RndVxByte => {
                write!(f, "{} V{:X}, {:#04x}", m, self.arg(0), self.arg(1))
            }
            SeVxVy | LdVxVy | OrVxVy | AndVxVy | XorVxVy | AddVxVy | SubVxVy | ShrVxVy
            | SubnVxVy | ShlVxVy | SneVxVy => {
                write!(f, "{} V{:X}, V{:X}", m, self.arg(0), self.arg(1))
            }
            LdIAddr => write!(f, "{} I, {:#05x}", m, self.arg(0)),
            JpV0Addr => write!(f, "{} V0, {:#05x}", m, self.arg(0)),
            DrwVxVyN => write!(
                f,
                "{} V{:X}, V{:X}, {}",
                m,
                self.arg(0),
                self.arg(1),
                self.arg(2)
            ),
            SkpVx | SknpVx => write!(f, "{} V{:X}", m, self.arg(0)),
            LdVxDt => write!(f, "{} V{:X}, DT", m, self.arg(0)),
            LdVxK => write!(f, "{} V{:X}, K", m, self.arg(0)),
            LdDtVx => write!(f, "{} DT, V{:X}", m, self.arg(0)),
            LdStVx => write!(f, "{} ST, V{:X}", m, self.arg(0)),
            AddIVx => write!(f, "{} I, V{:X}", m, self.arg(0)),
            LdFVx => write!(f, "{} F, V{:X}", m, self.arg(0)),
            LdBVx => write!(f, "{} B, V{:X}", m, self.arg(0)),
            LdIndirectVx => write!(f, "{} [I], V{:X}", m, self.arg(0)),
            LdVxIndirect => write!(f, "{} V{:X}, [I]", m, self.arg(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_mutually_exclusive() {
        for opcode in 0..=u16::MAX {
            let matching: Vec<_> = INSTRUCTION_SET
                .iter()
                .filter(|instr| instr.matches(opcode))
                .map(|instr| instr.id)
                .collect();
            assert!(
                matching.len() <= 1,
                "{:#06x} matches {:?}",
                opcode,
                matching
            );
        }
    }

    #[test]
    fn test_decode_agrees_with_table() {
        for opcode in 0..=u16::MAX {
            match decode(opcode) {
                Some(decoded) => assert!(decoded.instruction.matches(opcode)),
                None => assert!(INSTRUCTION_SET.iter().all(|i| !i.matches(opcode))),
            }
        }
    }

    #[test]
    fn test_patterns_fit_their_masks() {
        for instr in INSTRUCTION_SET.iter() {
            assert_eq!(instr.pattern & instr.mask, instr.pattern, "{:?}", instr.id);
            // arguments live in the bits the mask doesn't test
            for arg in instr.args {
                assert_eq!(arg.mask & instr.mask, 0, "{:?}", instr.id);
            }
        }
    }

    #[test]
    fn test_argument_extraction() {
        let d = decode(0xD12F).unwrap();
        assert_eq!(d.id(), InstructionId::DrwVxVyN);
        assert_eq!(d.args(), &[0x1, 0x2, 0xF]);

        let d = decode(0x2ABC).unwrap();
        assert_eq!(d.id(), InstructionId::CallAddr);
        assert_eq!(d.args(), &[0xABC]);

        let d = decode(0x7E42).unwrap();
        assert_eq!(d.id(), InstructionId::AddVxByte);
        assert_eq!((d.reg(0), d.byte(1)), (0xE, 0x42));

        let d = decode(0x00E0).unwrap();
        assert_eq!(d.id(), InstructionId::Cls);
        assert!(d.args().is_empty());
    }

    #[test]
    fn test_low_nibble_selects_alu_op() {
        let ids: Vec<_> = [0x8120, 0x8121, 0x8122, 0x8123, 0x8124, 0x8125, 0x8126, 0x8127, 0x812E]
            .iter()
            .map(|&op| decode(op).unwrap().id())
            .collect();
        use InstructionId::*;
        assert_eq!(
            ids,
            vec![LdVxVy, OrVxVy, AndVxVy, XorVxVy, AddVxVy, SubVxVy, ShrVxVy, SubnVxVy, ShlVxVy]
        );
    }

    #[test]
    fn test_unknown_opcodes() {
        for &opcode in &[0x0000, 0x0123, 0x00E1, 0x5121, 0x8128, 0x800F, 0x9001, 0xE000, 0xF0FF] {
            assert!(decode(opcode).is_none(), "{:#06x}", opcode);
        }
    }

    #[test]
    fn test_disassembly() {
        assert_eq!(disassemble(0x00E0).as_deref(), Some("CLS"));
        assert_eq!(disassemble(0x1200).as_deref(), Some("JP 0x200"));
        assert_eq!(disassemble(0x6005).as_deref(), Some("LD V0, 0x05"));
        assert_eq!(disassemble(0x8AB6).as_deref(), Some("SHR VA, VB"));
        assert_eq!(disassemble(0xA300).as_deref(), Some("LD I, 0x300"));
        assert_eq!(disassemble(0xB010).as_deref(), Some("JP V0, 0x010"));
        assert_eq!(disassemble(0xD125).as_deref(), Some("DRW V1, V2, 5"));
        assert_eq!(disassemble(0xF30A).as_deref(), Some("LD V3, K"));
        assert_eq!(disassemble(0xF355).as_deref(), Some("LD [I], V3"));
        assert_eq!(disassemble(0xF265).as_deref(), Some("LD V2, [I]"));
        assert_eq!(disassemble(0x0000), None);
    }
}
