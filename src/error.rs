use thiserror::Error;

/// Everything that can stop the machine or reject a request made of it.
///
/// None of these are recoverable in place: after a fatal error during execution the CPU halts
/// and only `reset` followed by a fresh ROM load brings it back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Chip8Error {
    #[error("memory access out of bounds at {address:#06x} (memory size is {size:#06x})")]
    OutOfBounds { address: usize, size: usize },

    #[error("stack overflow: more than {depth} nested CALLs")]
    StackOverflow { depth: usize },

    #[error("stack underflow: RET with an empty call stack")]
    StackUnderflow,

    #[error("unknown opcode {opcode:#06x} at {address:#06x}")]
    UnknownOpcode { opcode: u16, address: u16 },

    #[error("ROM is too large ({len} bytes), at most {max} bytes fit in memory")]
    RomTooLarge { len: usize, max: usize },

    #[error("invalid value {value:?} for setting {key:?}")]
    InvalidSetting { key: String, value: String },

    #[error("settings store error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, Chip8Error>;
