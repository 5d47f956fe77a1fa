use crate::error::{Chip8Error, Result};
use crate::memory::PROGRAM_START;

/// Number of general purpose registers, V0 through VF.
pub const REGISTER_COUNT: usize = 16;
/// VF doubles as the carry/borrow/collision/shift-out flag.
pub const FLAG_REGISTER: usize = 0xF;
/// The original CHIP-8 supports up to 12 nested calls. We allow up to 16.
pub const STACK_DEPTH: usize = 16;
/// Width of one instruction in bytes.
pub const INSTRUCTION_SIZE: u16 = 2;

/// Processor state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    /// V0 through VF.
    pub v: [u8; REGISTER_COUNT],
    /// The I register is used to address memory in some instructions.
    pub i: u16,
    /// Address of the next instruction to execute.
    pub pc: u16,
    /// Count down at 60Hz while non-zero. A tone plays while the sound timer is non-zero.
    pub delay_timer: u8,
    pub sound_timer: u8,

    stack: [u16; STACK_DEPTH],
    // Index of the first free `stack` cell, 0 means empty.
    sp: usize,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers {
    pub fn new() -> Self {
        Registers {
            v: [0; REGISTER_COUNT],
            i: 0,
            pc: PROGRAM_START as u16,
            delay_timer: 0,
            sound_timer: 0,
            stack: [0; STACK_DEPTH],
            sp: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Registers::new();
    }

    /// Move to the next instruction. Skips call this a second time.
    pub fn advance(&mut self) {
        self.pc = self.pc.wrapping_add(INSTRUCTION_SIZE);
    }

    pub fn push(&mut self, address: u16) -> Result<()> {
        if self.sp >= STACK_DEPTH {
            return Err(Chip8Error::StackOverflow { depth: STACK_DEPTH });
        }
        self.stack[self.sp] = address;
        self.sp += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<u16> {
        if self.sp == 0 {
            return Err(Chip8Error::StackUnderflow);
        }
        self.sp -= 1;
        Ok(self.stack[self.sp])
    }

    /// Number of return addresses currently on the stack.
    pub fn stack_depth(&self) -> usize {
        self.sp
    }

    /// Live part of the call stack, oldest return address first.
    pub fn stack(&self) -> &[u16] {
        &self.stack[..self.sp]
    }

    /// Count both timers down by one, stopping at zero.
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    pub fn flag(&self) -> u8 {
        self.v[FLAG_REGISTER]
    }
}
