use crate::config::{Config, IndexIncrement, Quirks, ShiftQuirk};
use crate::display::Display;
use crate::error::{Chip8Error, Result};
use crate::instructions::{self, Decoded, InstructionId};
use crate::keyboard::{Keyboard, KEY_COUNT};
use crate::memory::{Memory, FONT_ADDR, FONT_GLYPH_SIZE};
use crate::registers::{Registers, FLAG_REGISTER};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Execution state of the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Running,
    /// Paused by the user, or no ROM loaded yet.
    Paused,
    /// Blocked in `LD Vx, K` until a key is released. Only a key release leaves this state.
    WaitingForKey { register: usize },
    /// Stopped by a fatal error. Only `reset` or loading a ROM leaves this state.
    Halted,
}

/// What the CPU tells the outside world about once per cycle.
///
/// All methods default to doing nothing so an adapter only implements what it cares about.
pub trait Host {
    /// Pixels changed since the last notification.
    fn frame_dirty(&mut self, _display: &Display) {}

    /// Whether a tone should be playing, sent every cycle.
    fn sound(&mut self, _enabled: bool) {}

    /// Execution stopped on `error`.
    fn fatal(&mut self, _error: &Chip8Error) {}
}

/// A host that ignores everything.
impl Host for () {}

/// The CHIP-8 interpreter. Owns the whole machine.
pub struct Cpu {
    memory: Memory,
    registers: Registers,
    display: Display,
    keyboard: Keyboard,
    state: ExecState,
    config: Config,
    rng: StdRng,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Cpu {
    /// A reset machine with no program. It stays paused until a ROM is loaded.
    pub fn new(config: Config) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Like `new`, with a caller supplied random source for `RND`.
    pub fn with_rng(config: Config, rng: StdRng) -> Self {
        Cpu {
            memory: Memory::new(),
            registers: Registers::new(),
            display: Display::new(),
            keyboard: Keyboard::new(),
            state: ExecState::Paused,
            config: Config {
                speed: config.speed.max(1),
                ..config
            },
            rng,
        }
    }

    /// Reinitialize memory, registers, display and keyboard. The program is gone afterwards so
    /// the CPU is left paused.
    pub fn reset(&mut self) {
        self.memory.reset();
        self.registers.reset();
        self.display.clear();
        self.keyboard.reset();
        self.state = ExecState::Paused;
        log::info!("machine reset");
    }

    /// Reset the machine, copy `rom` to the program area and start running.
    ///
    /// An oversized ROM is rejected before anything is touched.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<()> {
        let max = self.memory.size() - crate::memory::PROGRAM_START;
        if rom.len() > max {
            log::error!("rejecting ROM of {} bytes", rom.len());
            return Err(Chip8Error::RomTooLarge {
                len: rom.len(),
                max,
            });
        }

        self.reset();
        self.memory.load_program(rom)?;
        self.state = ExecState::Running;
        log::info!("loaded {} byte ROM", rom.len());
        Ok(())
    }

    /// Run `speed` instructions, then tick the timers and notify `host` once.
    ///
    /// Steps stop early if the CPU pauses, starts waiting for a key or halts. Timers only count
    /// down while running. A halted CPU is always silent. The sound and frame signals are sent
    /// even on the cycle that fails, before the error is returned.
    pub fn cycle<H: Host + ?Sized>(&mut self, host: &mut H) -> Result<()> {
        let mut outcome = Ok(());
        for _ in 0..self.config.speed {
            if self.state != ExecState::Running {
                break;
            }
            if let Err(error) = self.step() {
                log::error!("{}", error);
                host.fatal(&error);
                outcome = Err(error);
                break;
            }
        }

        if self.state == ExecState::Running {
            self.registers.tick_timers();
        }

        host.sound(self.state != ExecState::Halted && self.registers.sound_timer > 0);

        if self.display.take_dirty() {
            host.frame_dirty(&self.display);
        }

        outcome
    }

    /// Fetch, decode and execute one instruction. Does nothing unless running.
    ///
    /// A failure halts the CPU.
    pub fn step(&mut self) -> Result<()> {
        if self.state != ExecState::Running {
            return Ok(());
        }

        let result = self.fetch_and_execute();
        if result.is_err() {
            self.state = ExecState::Halted;
        }
        result
    }

    /// Execute exactly one instruction while paused by the user, for debugging. Marks the frame
    /// dirty so the renderer shows the result.
    pub fn step_instruction(&mut self) -> Result<()> {
        if self.state != ExecState::Paused {
            return self.step();
        }

        self.state = ExecState::Running;
        let result = self.step();
        if self.state == ExecState::Running {
            self.state = ExecState::Paused;
        }
        self.display.mark_dirty();
        result
    }

    fn fetch_and_execute(&mut self) -> Result<()> {
        let address = self.registers.pc;
        let opcode = self.memory.fetch16(address as usize)?;

        // Jumps overwrite this default advance
        self.registers.advance();

        let decoded =
            instructions::decode(opcode).ok_or(Chip8Error::UnknownOpcode { opcode, address })?;
        log::trace!("{:#05x}: {:04x}  {}", address, opcode, decoded);

        self.execute(&decoded)
    }

    /// Pause a running CPU. Doesn't affect a CPU waiting for a key or halted.
    pub fn pause(&mut self) {
        if self.state == ExecState::Running {
            self.state = ExecState::Paused;
            log::debug!("paused at {:#05x}", self.registers.pc);
        }
    }

    /// Resume a user-paused CPU. Key waits are only resumed by a key release.
    pub fn resume(&mut self) {
        if self.state == ExecState::Paused {
            self.state = ExecState::Running;
            log::debug!("resumed at {:#05x}", self.registers.pc);
        }
    }

    pub fn toggle_pause(&mut self) {
        match self.state {
            ExecState::Running => self.pause(),
            ExecState::Paused => self.resume(),
            _ => {}
        }
    }

    pub fn key_down(&mut self, symbol: u8) {
        self.keyboard.press(symbol);
    }

    /// Release a key, completing a pending `LD Vx, K`.
    pub fn key_up(&mut self, symbol: u8) {
        if let Some(key) = self.keyboard.release(symbol) {
            self.resume_from_key(key);
        }
    }

    /// Replace the whole keypad state, see [`Keyboard::update`].
    pub fn update_keys(&mut self, state: &[bool; KEY_COUNT]) {
        if let Some(key) = self.keyboard.update(state) {
            self.resume_from_key(key);
        }
    }

    /// Leave `WaitingForKey`, storing `symbol` in the waiting register. Returns false, and does
    /// nothing, if no key was being waited for.
    pub fn resume_from_key(&mut self, symbol: u8) -> bool {
        match self.state {
            ExecState::WaitingForKey { register } => {
                self.registers.v[register] = symbol;
                self.keyboard.disarm();
                self.state = ExecState::Running;
                log::debug!("got key {:#x} into V{:X}", symbol, register);
                true
            }
            _ => false,
        }
    }

    pub fn set_speed(&mut self, speed: u32) {
        self.config.speed = speed.max(1);
    }

    pub fn set_quirks(&mut self, quirks: Quirks) {
        self.config.quirks = quirks;
        log::info!("quirks set to {:?}", quirks);
    }

    pub fn set_config(&mut self, config: Config) {
        self.set_speed(config.speed);
        self.set_quirks(config.quirks);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> ExecState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ExecState::Running
    }

    pub fn is_waiting_for_key(&self) -> bool {
        matches!(self.state, ExecState::WaitingForKey { .. })
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    /// For a renderer that polls instead of implementing [`Host`].
    pub fn display_mut(&mut self) -> &mut Display {
        &mut self.display
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    /// The instruction at PC, or `None` if PC is out of bounds or the opcode is unknown.
    pub fn current_instruction(&self) -> Option<Decoded> {
        let opcode = self.memory.fetch16(self.registers.pc as usize).ok()?;
        instructions::decode(opcode)
    }
}

// Instruction implementations
impl Cpu {
    fn execute(&mut self, instr: &Decoded) -> Result<()> {
        use InstructionId::*;

        match instr.id() {
            Cls => self.display.clear(),
            Ret => self.registers.pc = self.registers.pop()?,
            JpAddr => self.registers.pc = instr.arg(0),
            CallAddr => {
                // PC already points past the CALL
                self.registers.push(self.registers.pc)?;
                self.registers.pc = instr.arg(0);
            }

            SeVxByte => self.skip_if(self.vx(instr) == instr.byte(1)),
            SneVxByte => self.skip_if(self.vx(instr) != instr.byte(1)),
            SeVxVy => self.skip_if(self.vx(instr) == self.vy(instr)),
            SneVxVy => self.skip_if(self.vx(instr) != self.vy(instr)),
            SkpVx => self.skip_if(self.keyboard.is_pressed(self.vx(instr))),
            SknpVx => self.skip_if(!self.keyboard.is_pressed(self.vx(instr))),

            LdVxByte => self.registers.v[instr.reg(0)] = instr.byte(1),
            AddVxByte => {
                let x = instr.reg(0);
                // No carry flag for the immediate form
                self.registers.v[x] = self.registers.v[x].wrapping_add(instr.byte(1));
            }
            LdVxVy => {
                let vy = self.vy(instr);
                self.registers.v[instr.reg(0)] = vy;
            }
            OrVxVy => {
                let vy = self.vy(instr);
                self.registers.v[instr.reg(0)] |= vy;
            }
            AndVxVy => {
                let vy = self.vy(instr);
                self.registers.v[instr.reg(0)] &= vy;
            }
            XorVxVy => {
                let vy = self.vy(instr);
                self.registers.v[instr.reg(0)] ^= vy;
            }

            AddVxVy => {
                let sum = self.vx(instr) as u16 + self.vy(instr) as u16;
                self.write_with_flag(instr.reg(0), sum as u8, (sum > 0xFF) as u8);
            }
            SubVxVy => {
                let (vx, vy) = (self.vx(instr), self.vy(instr));
                self.write_with_flag(instr.reg(0), vx.wrapping_sub(vy), (vx >= vy) as u8);
            }
            SubnVxVy => {
                let (vx, vy) = (self.vx(instr), self.vy(instr));
                self.write_with_flag(instr.reg(0), vy.wrapping_sub(vx), (vy >= vx) as u8);
            }
            ShrVxVy => {
                let source = self.shift_source(instr);
                self.write_with_flag(instr.reg(0), source >> 1, source & 1);
            }
            ShlVxVy => {
                let source = self.shift_source(instr);
                self.write_with_flag(instr.reg(0), source << 1, source >> 7);
            }

            LdIAddr => self.registers.i = instr.arg(0),
            JpV0Addr => self.registers.pc = instr.arg(0) + self.registers.v[0] as u16,
            RndVxByte => {
                let value = self.rng.gen::<u8>() & instr.byte(1);
                self.registers.v[instr.reg(0)] = value;
            }
            DrwVxVyN => self.draw_sprite(instr)?,

            LdVxDt => self.registers.v[instr.reg(0)] = self.registers.delay_timer,
            LdDtVx => self.registers.delay_timer = self.vx(instr),
            LdStVx => self.registers.sound_timer = self.vx(instr),
            LdVxK => {
                self.state = ExecState::WaitingForKey {
                    register: instr.reg(0),
                };
                self.keyboard.arm_next_key();
                log::debug!("waiting for a key for V{:X}", instr.reg(0));
            }

            AddIVx => {
                self.registers.i = self.registers.i.wrapping_add(self.vx(instr) as u16);
            }
            LdFVx => {
                // Each glyph is 5 bytes. Values past 0xF point beyond the font.
                let digit = self.vx(instr) as u16;
                self.registers.i = FONT_ADDR as u16 + digit * FONT_GLYPH_SIZE as u16;
            }
            LdBVx => {
                let i = self.registers.i as usize;
                self.memory.check_range(i, 3)?;
                let value = self.vx(instr);
                self.memory.set(i, value / 100)?;
                self.memory.set(i + 1, (value / 10) % 10)?;
                self.memory.set(i + 2, value % 10)?;
            }
            LdIndirectVx => {
                let last = instr.reg(0);
                let i = self.registers.i as usize;
                self.memory.check_range(i, last + 1)?;
                for reg in 0..=last {
                    self.memory.set(i + reg, self.registers.v[reg])?;
                }
                self.advance_index(last);
            }
            LdVxIndirect => {
                let last = instr.reg(0);
                let i = self.registers.i as usize;
                let bytes = self.memory.slice(i, last + 1)?;
                self.registers.v[..=last].copy_from_slice(bytes);
                self.advance_index(last);
            }
        }

        Ok(())
    }

    fn vx(&self, instr: &Decoded) -> u8 {
        self.registers.v[instr.reg(0)]
    }

    fn vy(&self, instr: &Decoded) -> u8 {
        self.registers.v[instr.reg(1)]
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.registers.advance();
        }
    }

    /// VF is written first, then the destination. Both values were computed from the operands
    /// as they were before the instruction.
    fn write_with_flag(&mut self, x: usize, value: u8, flag: u8) {
        self.registers.v[FLAG_REGISTER] = flag;
        self.registers.v[x] = value;
    }

    fn shift_source(&self, instr: &Decoded) -> u8 {
        match self.config.quirks.shift {
            ShiftQuirk::ShiftVy => self.vy(instr),
            ShiftQuirk::ShiftVx => self.vx(instr),
        }
    }

    fn advance_index(&mut self, last: usize) {
        let index: IndexIncrement = self.config.quirks.index;
        self.registers.i = self.registers.i.wrapping_add(index.amount(last));
    }

    /// `DRW Vx, Vy, n`: XOR an 8 pixel wide, `n` row sprite from memory at I onto the screen.
    /// Pixels that fall off an edge wrap around to the other side. VF is set if any lit pixel
    /// was erased.
    fn draw_sprite(&mut self, instr: &Decoded) -> Result<()> {
        let x = self.vx(instr) as usize;
        let y = self.vy(instr) as usize;
        let height = instr.arg(2) as usize;

        // Read the whole sprite up front so a bad I can't leave a half drawn sprite
        let mut sprite = [0u8; 15];
        sprite[..height].copy_from_slice(self.memory.slice(self.registers.i as usize, height)?);

        self.registers.v[FLAG_REGISTER] = 0;
        let mut collision = false;
        for (row, &bits) in sprite[..height].iter().enumerate() {
            for col in 0..8 {
                // The MSB is the leftmost pixel
                if bits & (0x80 >> col) != 0 && self.display.set_pixel(x + col, y + row) {
                    collision = true;
                }
            }
        }
        self.registers.v[FLAG_REGISTER] = collision as u8;

        self.display.mark_dirty();
        Ok(())
    }
}
