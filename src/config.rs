//! Runtime configuration: execution speed, quirk selection and the persisted settings they are
//! read from.

use crate::error::{Chip8Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Instructions executed per cycle unless configured otherwise.
pub const DEFAULT_SPEED: u32 = 10;

/// What `SHR Vx, Vy` / `SHL Vx, Vy` shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftQuirk {
    /// Original CHIP-8: shift Vy and store the result in Vx.
    ShiftVy,
    /// CHIP-48/S-CHIP: shift Vx in place, Vy is ignored.
    ShiftVx,
}

/// What `LD [I], Vx` / `LD Vx, [I]` do to I after the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexIncrement {
    Unchanged,
    ByX,
    ByXPlusOne,
}

impl IndexIncrement {
    /// How far I moves after transferring V0 through V`x`.
    pub fn amount(self, x: usize) -> u16 {
        match self {
            IndexIncrement::Unchanged => 0,
            IndexIncrement::ByX => x as u16,
            IndexIncrement::ByXPlusOne => x as u16 + 1,
        }
    }
}

impl FromStr for IndexIncrement {
    type Err = Chip8Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "unchanged" => Ok(IndexIncrement::Unchanged),
            "x" => Ok(IndexIncrement::ByX),
            "x+1" => Ok(IndexIncrement::ByXPlusOne),
            _ => Err(Chip8Error::InvalidSetting {
                key: KEY_INDEX.to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for IndexIncrement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IndexIncrement::Unchanged => "unchanged",
            IndexIncrement::ByX => "x",
            IndexIncrement::ByXPlusOne => "x+1",
        })
    }
}

/// The behaviors that differ between CHIP-8 variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quirks {
    pub shift: ShiftQuirk,
    pub index: IndexIncrement,
}

impl Default for Quirks {
    fn default() -> Self {
        QuirkMode::default().quirks()
    }
}

/// Named quirk presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuirkMode {
    /// Original COSMAC VIP behavior for both shifts and loads.
    Legacy,
    /// In-place shifts, loads still advance I past the last register.
    ShiftOnly,
    /// In-place shifts, loads leave I alone.
    Modern,
}

impl Default for QuirkMode {
    fn default() -> Self {
        QuirkMode::Modern
    }
}

impl QuirkMode {
    pub fn quirks(self) -> Quirks {
        match self {
            QuirkMode::Legacy => Quirks {
                shift: ShiftQuirk::ShiftVy,
                index: IndexIncrement::ByXPlusOne,
            },
            QuirkMode::ShiftOnly => Quirks {
                shift: ShiftQuirk::ShiftVx,
                index: IndexIncrement::ByXPlusOne,
            },
            QuirkMode::Modern => Quirks {
                shift: ShiftQuirk::ShiftVx,
                index: IndexIncrement::Unchanged,
            },
        }
    }
}

impl FromStr for QuirkMode {
    type Err = Chip8Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "legacy" => Ok(QuirkMode::Legacy),
            "shift-only" => Ok(QuirkMode::ShiftOnly),
            "modern" => Ok(QuirkMode::Modern),
            _ => Err(Chip8Error::InvalidSetting {
                key: KEY_QUIRK.to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for QuirkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QuirkMode::Legacy => "legacy",
            QuirkMode::ShiftOnly => "shift-only",
            QuirkMode::Modern => "modern",
        })
    }
}

/// What the CPU consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Instructions per cycle, at least 1.
    pub speed: u32,
    pub quirks: Quirks,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            speed: DEFAULT_SPEED,
            quirks: Quirks::default(),
        }
    }
}

impl Config {
    pub fn with_mode(mode: QuirkMode) -> Self {
        Config {
            quirks: mode.quirks(),
            ..Config::default()
        }
    }

    pub fn speed(mut self, speed: u32) -> Self {
        self.speed = speed.max(1);
        self
    }
}

/// Flat key/value storage for persisted settings.
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Settings kept in a plain map.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub const KEY_SPEED: &str = "speed";
pub const KEY_QUIRK: &str = "quirk";
pub const KEY_INDEX: &str = "index";
pub const KEY_COLOR: &str = "color";
pub const KEY_BG_COLOR: &str = "bgColor";
pub const KEY_VOLUME: &str = "volume";
pub const KEY_SCALE: &str = "scale";
pub const KEY_WAVE: &str = "wave";

/// Screen pixels per CHIP-8 pixel unless configured otherwise.
pub const DEFAULT_SCALE: u32 = 10;

/// User settings. Speed and quirks feed the CPU, the rest is only carried for the rendering and
/// audio adapters.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub speed: u32,
    pub quirk: QuirkMode,
    /// Overrides the index behavior of `quirk` when set.
    pub index: Option<IndexIncrement>,
    pub color: String,
    pub bg_color: String,
    /// Canvas pixels per CHIP-8 pixel, at least 1.
    pub scale: u32,
    pub volume: f32,
    /// Oscillator type for the tone, e.g. `square` or `sine`.
    pub wave: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            speed: DEFAULT_SPEED,
            quirk: QuirkMode::default(),
            index: None,
            color: "#ffffff".to_string(),
            bg_color: "#000000".to_string(),
            scale: DEFAULT_SCALE,
            volume: 0.3,
            wave: "square".to_string(),
        }
    }
}

impl Settings {
    /// Read settings from a store. Missing keys keep their defaults, values that don't parse are
    /// logged and also keep their defaults.
    pub fn load(store: &dyn SettingsStore) -> Self {
        let mut settings = Settings::default();

        if let Some(speed) = parse_setting::<u32>(store, KEY_SPEED) {
            settings.speed = speed.max(1);
        }
        if let Some(quirk) = parse_setting(store, KEY_QUIRK) {
            settings.quirk = quirk;
        }
        settings.index = parse_setting(store, KEY_INDEX);
        if let Some(color) = store.get(KEY_COLOR) {
            settings.color = color;
        }
        if let Some(bg_color) = store.get(KEY_BG_COLOR) {
            settings.bg_color = bg_color;
        }
        if let Some(scale) = parse_setting::<u32>(store, KEY_SCALE) {
            settings.scale = scale.max(1);
        }
        if let Some(volume) = parse_setting::<f32>(store, KEY_VOLUME) {
            settings.volume = volume.max(0.0).min(1.0);
        }
        if let Some(wave) = store.get(KEY_WAVE) {
            settings.wave = wave;
        }

        settings
    }

    pub fn save(&self, store: &mut dyn SettingsStore) -> Result<()> {
        store.set(KEY_SPEED, &self.speed.to_string())?;
        store.set(KEY_QUIRK, &self.quirk.to_string())?;
        if let Some(index) = self.index {
            store.set(KEY_INDEX, &index.to_string())?;
        }
        store.set(KEY_COLOR, &self.color)?;
        store.set(KEY_BG_COLOR, &self.bg_color)?;
        store.set(KEY_SCALE, &self.scale.to_string())?;
        store.set(KEY_VOLUME, &self.volume.to_string())?;
        store.set(KEY_WAVE, &self.wave)?;
        Ok(())
    }

    pub fn config(&self) -> Config {
        let mut quirks = self.quirk.quirks();
        if let Some(index) = self.index {
            quirks.index = index;
        }
        Config {
            speed: self.speed.max(1),
            quirks,
        }
    }
}

fn parse_setting<T: FromStr>(store: &dyn SettingsStore, key: &str) -> Option<T> {
    let value = store.get(key)?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            log::warn!(
                "{}, keeping the default",
                Chip8Error::InvalidSetting {
                    key: key.to_string(),
                    value,
                }
            );
            None
        }
    }
}
