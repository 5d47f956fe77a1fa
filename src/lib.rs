mod utils;

pub mod config;
pub mod cpu;
pub mod display;
pub mod error;
pub mod instructions;
pub mod keyboard;
pub mod memory;
pub mod registers;

pub use config::{Config, IndexIncrement, QuirkMode, Quirks, Settings, SettingsStore, ShiftQuirk};
pub use cpu::{Cpu, ExecState, Host};
pub use display::{Display, SCREEN_HEIGHT, SCREEN_WIDTH};
pub use error::{Chip8Error, Result};
pub use instructions::{decode, disassemble, Decoded, Instruction, InstructionId};
pub use keyboard::{Keyboard, KEY_COUNT};
pub use memory::Memory;
pub use registers::Registers;

use log::LevelFilter;
use wasm_bindgen::prelude::*;

/// Latches what the CPU reports each cycle until the page polls it.
#[derive(Debug, Default)]
struct FrameSignals {
    screen_dirty: bool,
    play_tone: bool,
    last_error: Option<String>,
}

impl Host for FrameSignals {
    fn frame_dirty(&mut self, _display: &Display) {
        self.screen_dirty = true;
    }

    fn sound(&mut self, enabled: bool) {
        self.play_tone = enabled;
    }

    fn fatal(&mut self, error: &Chip8Error) {
        self.last_error = Some(error.to_string());
    }
}

/// Settings persisted in the browser's `localStorage`.
struct LocalStorage(web_sys::Storage);

impl LocalStorage {
    fn open() -> Option<Self> {
        let storage = web_sys::window()?.local_storage().ok()??;
        Some(LocalStorage(storage))
    }
}

impl SettingsStore for LocalStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get_item(key).ok().flatten()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.0
            .set_item(key, value)
            .map_err(|err| Chip8Error::Storage(format!("{:?}", err)))
    }
}

fn to_js(error: Chip8Error) -> JsValue {
    JsValue::from_str(&error.to_string())
}

#[wasm_bindgen]
/// A CHIP-8 machine driven from JavaScript.
///
/// The page calls `cycle` at 60Hz, then checks `handle_screen_dirty_flag` (and redraws from
/// `get_screen_buffer` if it is set) and `should_play_tone`.
pub struct Emulator {
    cpu: Cpu,
    signals: FrameSignals,
    settings: Settings,
}

#[wasm_bindgen]
impl Emulator {
    /// A paused machine configured from the saved settings, if there are any.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        utils::init(LevelFilter::Info);

        let settings = match LocalStorage::open() {
            Some(storage) => Settings::load(&storage),
            None => Settings::default(),
        };

        Emulator {
            cpu: Cpu::new(settings.config()),
            signals: FrameSignals::default(),
            settings,
        }
    }

    /// A machine running `rom`.
    pub fn with_rom(rom: &[u8]) -> std::result::Result<Emulator, JsValue> {
        let mut emulator = Emulator::new();
        emulator.load_rom(rom)?;
        Ok(emulator)
    }

    /// A machine running `rom` with the named quirk preset (`legacy`, `shift-only`, `modern`).
    pub fn with_rom_and_options(
        rom: &[u8],
        quirk: &str,
    ) -> std::result::Result<Emulator, JsValue> {
        let mut emulator = Emulator::with_rom(rom)?;
        emulator.set_quirk(quirk)?;
        Ok(emulator)
    }

    /// Reset the machine and start running `rom`. On failure the previous machine is untouched.
    pub fn load_rom(&mut self, rom: &[u8]) -> std::result::Result<(), JsValue> {
        self.cpu.load_rom(rom).map_err(to_js)?;
        self.signals = FrameSignals::default();
        Ok(())
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
        self.signals = FrameSignals::default();
    }

    /// Run one 60Hz tick worth of instructions.
    pub fn cycle(&mut self) -> std::result::Result<(), JsValue> {
        self.cpu.cycle(&mut self.signals).map_err(to_js)
    }

    /// Execute a single instruction, for the debugger.
    pub fn step(&mut self) -> std::result::Result<(), JsValue> {
        let result = self.cpu.step_instruction();
        if let Err(error) = &result {
            self.signals.fatal(error);
        }
        if self.cpu.display_mut().take_dirty() {
            self.signals.screen_dirty = true;
        }
        result.map_err(to_js)
    }

    pub fn pause(&mut self) {
        self.cpu.pause();
    }

    pub fn resume(&mut self) {
        self.cpu.resume();
    }

    pub fn toggle_pause(&mut self) {
        self.cpu.toggle_pause();
    }

    pub fn is_paused(&self) -> bool {
        self.cpu.state() == ExecState::Paused
    }

    /// Returns true if the cpu is waiting for a key to be released.
    pub fn is_waiting_for_keypress(&self) -> bool {
        self.cpu.is_waiting_for_key()
    }

    pub fn is_halted(&self) -> bool {
        self.cpu.state() == ExecState::Halted
    }

    pub fn key_down(&mut self, key: u8) {
        self.cpu.key_down(key);
    }

    pub fn key_up(&mut self, key: u8) {
        self.cpu.key_up(key);
    }

    /// Press the key mapped to a browser key code. Returns false for unmapped codes.
    pub fn key_down_code(&mut self, key_code: u32) -> bool {
        match keyboard::symbol_for_key_code(key_code) {
            Some(symbol) => {
                self.cpu.key_down(symbol);
                true
            }
            None => false,
        }
    }

    /// Release the key mapped to a browser key code. Returns false for unmapped codes.
    pub fn key_up_code(&mut self, key_code: u32) -> bool {
        match keyboard::symbol_for_key_code(key_code) {
            Some(symbol) => {
                self.cpu.key_up(symbol);
                true
            }
            None => false,
        }
    }

    /// Update the internal key state to the provided key state.
    /// `new_key_state` must be of length 16, non-zero means pressed.
    pub fn update_key_state(&mut self, new_key_state: &[u8]) -> std::result::Result<(), JsValue> {
        if new_key_state.len() != KEY_COUNT {
            return Err(JsValue::from_str("key state must have 16 entries"));
        }

        // `wasm_bindgen` doesn't support passing boolean arrays, so it comes in as bytes.
        let mut state = [false; KEY_COUNT];
        for (pressed, &byte) in state.iter_mut().zip(new_key_state) {
            *pressed = byte != 0;
        }
        self.cpu.update_keys(&state);
        Ok(())
    }

    pub fn speed(&self) -> u32 {
        self.cpu.config().speed
    }

    pub fn set_speed(&mut self, speed: u32) {
        self.cpu.set_speed(speed);
        self.settings.speed = self.cpu.config().speed;
    }

    pub fn quirk(&self) -> String {
        self.settings.quirk.to_string()
    }

    /// Select a quirk preset by name. Any explicit index behavior set before is dropped.
    pub fn set_quirk(&mut self, quirk: &str) -> std::result::Result<(), JsValue> {
        self.settings.quirk = quirk.parse().map_err(to_js)?;
        self.settings.index = None;
        self.cpu.set_quirks(self.settings.config().quirks);
        Ok(())
    }

    /// What loads/stores do to I: `unchanged`, `x` or `x+1`.
    pub fn set_index_increment(&mut self, index: &str) -> std::result::Result<(), JsValue> {
        self.settings.index = Some(index.parse().map_err(to_js)?);
        self.cpu.set_quirks(self.settings.config().quirks);
        Ok(())
    }

    pub fn index_increment(&self) -> String {
        self.cpu.config().quirks.index.to_string()
    }

    pub fn color(&self) -> String {
        self.settings.color.clone()
    }

    pub fn bg_color(&self) -> String {
        self.settings.bg_color.clone()
    }

    pub fn set_colors(&mut self, color: &str, bg_color: &str) {
        self.settings.color = color.to_string();
        self.settings.bg_color = bg_color.to_string();
    }

    pub fn volume(&self) -> f32 {
        self.settings.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.settings.volume = volume.max(0.0).min(1.0);
    }

    pub fn scale(&self) -> u32 {
        self.settings.scale
    }

    pub fn set_scale(&mut self, scale: u32) {
        self.settings.scale = scale.max(1);
    }

    pub fn wave(&self) -> String {
        self.settings.wave.clone()
    }

    pub fn set_wave(&mut self, wave: &str) {
        self.settings.wave = wave.to_string();
    }

    /// Persist the current settings to `localStorage`.
    pub fn save_settings(&self) -> std::result::Result<(), JsValue> {
        let mut storage = LocalStorage::open()
            .ok_or_else(|| to_js(Chip8Error::Storage("localStorage unavailable".to_string())))?;
        self.settings.save(&mut storage).map_err(to_js)
    }

    /// Get a pointer to the screen buffer memory, used from the JS side to render the screen.
    /// It holds `SCREEN_WIDTH * SCREEN_HEIGHT` booleans, row-major.
    pub fn get_screen_buffer(&self) -> *const bool {
        self.cpu.display().pixels().as_ptr()
    }

    pub fn screen_width() -> usize {
        SCREEN_WIDTH
    }

    pub fn screen_height() -> usize {
        SCREEN_HEIGHT
    }

    /// Returns whether or not the screen is dirty, and if it is, sets it to false.
    pub fn handle_screen_dirty_flag(&mut self) -> bool {
        std::mem::replace(&mut self.signals.screen_dirty, false)
    }

    /// Returns true if the emulator should play a tone.
    pub fn should_play_tone(&self) -> bool {
        self.signals.play_tone
    }

    /// The error that halted the machine, if any.
    pub fn last_error(&self) -> Option<String> {
        self.signals.last_error.clone()
    }

    pub fn v_registers(&self) -> Vec<u8> {
        self.cpu.registers().v.to_vec()
    }

    pub fn i_register(&self) -> u16 {
        self.cpu.registers().i
    }

    pub fn pc_register(&self) -> u16 {
        self.cpu.registers().pc
    }

    pub fn dt_register(&self) -> u8 {
        self.cpu.registers().delay_timer
    }

    pub fn st_register(&self) -> u8 {
        self.cpu.registers().sound_timer
    }

    pub fn stack_depth(&self) -> usize {
        self.cpu.registers().stack_depth()
    }

    /// Disassembly of the instruction at PC.
    pub fn current_instruction(&self) -> Option<String> {
        self.cpu.current_instruction().map(|decoded| decoded.to_string())
    }
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Mnemonic form of an opcode, for the debugger.
#[wasm_bindgen(js_name = disassemble)]
pub fn disassemble_opcode(opcode: u16) -> Option<String> {
    instructions::disassemble(opcode)
}

/// Keypad symbol for a browser key code.
#[wasm_bindgen]
pub fn key_symbol(key_code: u32) -> Option<u8> {
    keyboard::symbol_for_key_code(key_code)
}
