//! Error types for the umesh-core crate.

use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    TooShort { min: usize, actual: usize },
    PayloadTooLarge { max: usize, actual: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::TooShort { min, actual } => {
                write!(f, "frame too short: need at least {min} bytes, got {actual}")
            }
            FrameError::PayloadTooLarge { max, actual } => {
                write!(f, "payload too large: at most {max} bytes, got {actual}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FrameError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    InvalidLength { max: usize, actual: usize },
    InvalidHex,
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::InvalidLength { max, actual } => {
                write!(f, "invalid address length: at most {max} bytes, got {actual}")
            }
            AddressError::InvalidHex => write!(f, "invalid hex address"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AddressError {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_frame_error_display() {
        let err = FrameError::TooShort { min: 32, actual: 10 };
        assert_eq!(
            err.to_string(),
            "frame too short: need at least 32 bytes, got 10"
        );

        let err = FrameError::PayloadTooLarge {
            max: 512,
            actual: 600,
        };
        assert_eq!(err.to_string(), "payload too large: at most 512 bytes, got 600");
    }

    #[test]
    fn test_address_error_display() {
        let err = AddressError::InvalidLength { max: 8, actual: 9 };
        assert_eq!(
            err.to_string(),
            "invalid address length: at most 8 bytes, got 9"
        );
        assert_eq!(AddressError::InvalidHex.to_string(), "invalid hex address");
    }
}
