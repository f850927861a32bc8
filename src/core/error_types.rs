//! Shared constants for stream error categories.

use std::fmt;

pub const ERROR_CATEGORY_FRAME_READ: &str = "frame_read";
pub const ERROR_CATEGORY_DECODE: &str = "decode";
pub const ERROR_CATEGORY_UPSTREAM: &str = "upstream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategoryCode {
    FrameRead,
    Decode,
    Upstream,
}

impl ErrorCategoryCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FrameRead => ERROR_CATEGORY_FRAME_READ,
            Self::Decode => ERROR_CATEGORY_DECODE,
            Self::Upstream => ERROR_CATEGORY_UPSTREAM,
        }
    }
}

impl fmt::Display for ErrorCategoryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_code_as_str() {
        assert_eq!(ErrorCategoryCode::FrameRead.as_str(), "frame_read");
        assert_eq!(ErrorCategoryCode::Decode.as_str(), "decode");
        assert_eq!(ErrorCategoryCode::Upstream.as_str(), "upstream");
    }

    #[test]
    fn test_error_category_code_display() {
        assert_eq!(format!("{}", ErrorCategoryCode::FrameRead), "frame_read");
        assert_eq!(format!("{}", ErrorCategoryCode::Upstream), "upstream");
    }

    #[test]
    fn test_error_category_code_equality() {
        assert_eq!(ErrorCategoryCode::Decode, ErrorCategoryCode::Decode);
        assert_ne!(ErrorCategoryCode::Decode, ErrorCategoryCode::Upstream);
    }
}
