use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Identity must not be empty")]
    EmptyNodeId,

    #[error("Identity too long: {len} chars (max {max})")]
    NodeIdTooLong { len: usize, max: usize },

    #[error("Identity contains invalid character {0:?}")]
    InvalidNodeIdChar(char),

    #[error("Display name must not be empty")]
    EmptyName,

    #[error("Display name too long: {len} chars (max {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("Notice too long: {len} chars (max {max})")]
    NoticeTooLong { len: usize, max: usize },

    #[error("Security key must not be empty")]
    EmptySecret,

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Unknown gender: {0}")]
    UnknownGender(String),

    #[error("Unknown theme: {0}")]
    UnknownTheme(String),

    #[error("Invalid credential encoding")]
    CredentialEncoding,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    #[error("Empty signal payload")]
    Empty,

    #[error("Unexpected signal byte 0x{0:02x}")]
    UnknownByte(u8),

    #[error("Signal carries {count} detections (max {max})")]
    TooManyDetections { count: usize, max: usize },

    #[error("Device name must start with {prefix:?}")]
    BadDeviceName { prefix: &'static str },
}
