use std::{fmt, io};

#[derive(Debug)]
pub enum SplatError {
    MalformedHeader(String),
    UnsupportedLayout(String),
    MalformedRecord(String),
    AllocationFailure(String),
    IoError(io::Error),
}

impl fmt::Display for SplatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplatError::MalformedHeader(e) => {
                write!(f, "Failed to decode the PLY header: {}", e)
            }
            SplatError::UnsupportedLayout(e) => {
                write!(f, "Unsupported splat property layout: {}", e)
            }
            SplatError::MalformedRecord(e) => {
                write!(f, "Failed to read a vertex record: {}", e)
            }
            SplatError::AllocationFailure(e) => {
                write!(f, "Failed to allocate a destination buffer: {}", e)
            }
            SplatError::IoError(e) => {
                write!(f, "An I/O error occurred: {}", e)
            }
        }
    }
}

impl std::error::Error for SplatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SplatError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SplatError {
    fn from(e: io::Error) -> Self {
        SplatError::IoError(e)
    }
}
