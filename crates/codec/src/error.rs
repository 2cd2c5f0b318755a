use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("header too short: {got} bytes, need {need}")]
    HeaderTooShort { got: usize, need: usize },
    #[error("invalid record count: {0}")]
    InvalidCount(i64),
    #[error("record count {count} exceeds cap {cap}")]
    CountExceedsCap { count: usize, cap: usize },
    #[error("payload of {bytes} bytes exceeds cap {cap}")]
    PayloadTooLarge { bytes: usize, cap: usize },
    #[error("entry region is empty but count is {0}")]
    EmptyEntries(usize),
}

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("frame too short: {got} bytes, need {need}")]
    TooShort { got: usize, need: usize },
    #[error("frame length field {declared} does not match body of {actual} bytes")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("queue name is not valid utf-8")]
    BadQueueName,
}
