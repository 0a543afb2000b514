use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Device not found: {0}")]
    NotFound(String),
    #[error("Device busy: {0}")]
    Busy(String),
    #[error("Device IO error: {0:?}")]
    Io(#[from] std::io::Error),
    #[error("Device disconnected")]
    Disconnected,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Frame is {actual} bytes long, expected {expected}")]
    WrongLength { expected: usize, actual: usize },
    #[error("Field {0} could not be decoded")]
    InvalidField(usize),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Unknown field descriptor {0:?}")]
    UnknownField(String),
    #[error("Frame layout has no fields")]
    Empty,
}
