//! Opcode tables and the shared device status taxonomy
//!
//! Both modules report errors through small numeric code spaces. Rather
//! than interpreting raw codes at every call site, each decoded reply is
//! mapped once into [`DeviceStatus`] and callers pattern-match on that.

use std::fmt;

use crate::error::{Error, Result};

/// Capacitive module opcodes
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Acquire an image into the module's frame buffer
    GetImage = 0x20,
    /// Query the finger presence bit
    FingerDetect = 0x21,
    /// Stream the frame buffer contents to the host
    UploadImage = 0x22,
    /// Store the working template at a slot
    StoreChar = 0x40,
    /// Delete the templates in a slot range
    DeleteChar = 0x44,
    /// Find the first unoccupied slot in a range
    GetEmptyId = 0x45,
    /// Count enrolled templates in a range
    EnrolledCount = 0x48,
    /// Retrieve the slot occupancy bitmap
    EnrolledIdList = 0x49,
    /// Extract features from the frame buffer into a RAM buffer
    Generate = 0x60,
    /// Merge RAM buffers into one canonical template
    Merge = 0x61,
    /// Search a slot range for the working template
    Search = 0x63,
}

impl Opcode {
    /// Get opcode name as used in the module's command reference
    pub fn name(self) -> &'static str {
        match self {
            Self::GetImage => "CMD_GET_IMAGE",
            Self::FingerDetect => "CMD_FINGER_DETECT",
            Self::UploadImage => "CMD_UP_IMAGE_CODE",
            Self::StoreChar => "CMD_STORE_CHAR",
            Self::DeleteChar => "CMD_DEL_CHAR",
            Self::GetEmptyId => "CMD_GET_EMPTY_ID",
            Self::EnrolledCount => "CMD_GET_ENROLL_COUNT",
            Self::EnrolledIdList => "CMD_GET_ENROLLED_ID_LIST",
            Self::Generate => "CMD_GENERATE",
            Self::Merge => "CMD_MERGE",
            Self::Search => "CMD_SEARCH",
        }
    }
}

impl From<Opcode> for u8 {
    fn from(opcode: Opcode) -> u8 {
        opcode as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x20 => Ok(Self::GetImage),
            0x21 => Ok(Self::FingerDetect),
            0x22 => Ok(Self::UploadImage),
            0x40 => Ok(Self::StoreChar),
            0x44 => Ok(Self::DeleteChar),
            0x45 => Ok(Self::GetEmptyId),
            0x48 => Ok(Self::EnrolledCount),
            0x49 => Ok(Self::EnrolledIdList),
            0x60 => Ok(Self::Generate),
            0x61 => Ok(Self::Merge),
            0x63 => Ok(Self::Search),
            other => Err(Error::UnknownOpcode(other)),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Optical module instruction bytes (first payload byte of a command
/// packet)
pub mod instruction {
    /// Capture an image into the image buffer
    pub const GEN_IMG: u8 = 0x01;
    /// Convert the image buffer into a char buffer
    pub const IMG_2_TZ: u8 = 0x02;
    /// Compare char buffers 1 and 2
    pub const MATCH: u8 = 0x03;
    /// Search the template library for char buffer 1
    pub const SEARCH: u8 = 0x04;
    /// Combine char buffers 1 and 2 into a template
    pub const REG_MODEL: u8 = 0x05;
    /// Store the template at a library page
    pub const STORE: u8 = 0x06;
    /// Stream the image buffer to the host
    pub const UP_IMAGE: u8 = 0x0A;
    /// Delete templates starting at a library page
    pub const DELETE_CHAR: u8 = 0x0C;
    /// Count stored templates
    pub const TEMPLATE_COUNT: u8 = 0x1D;
}

/// Normalized device status, shared by both modules
///
/// Raw result codes differ per module; [`DeviceStatus::from_frame_code`]
/// and [`DeviceStatus::from_confirm_code`] map each module's code space
/// into this one taxonomy.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Operation succeeded
    Ok,
    /// No finger on the pad
    NotDetected,
    /// A parameter (slot, buffer, range) was rejected
    InvalidParameter,
    /// The addressed slot holds no template
    TemplateEmpty,
    /// No template matched
    NoMatch,
    /// Generic instruction failure
    Failure,
    /// Code outside the documented set
    Unknown(u16),
}

impl DeviceStatus {
    /// Map a capacitive module result code
    pub fn from_frame_code(code: u16) -> Self {
        match code {
            0x00 => Self::Ok,
            0x01 => Self::Failure,
            0x12 => Self::TemplateEmpty,
            0x22 => Self::InvalidParameter,
            0x28 => Self::NotDetected,
            other => Self::Unknown(other),
        }
    }

    /// Map an optical module confirmation code
    pub fn from_confirm_code(code: u8) -> Self {
        match code {
            0x00 => Self::Ok,
            0x01 => Self::Failure,
            0x02 => Self::NotDetected,
            // 0x08: buffers do not match, 0x09: not found in library
            0x08 | 0x09 => Self::NoMatch,
            0x0B => Self::InvalidParameter,
            other => Self::Unknown(other as u16),
        }
    }

    /// Check if this status is a success
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::NotDetected => write!(f, "finger not detected"),
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::TemplateEmpty => write!(f, "template slot empty"),
            Self::NoMatch => write!(f, "no match"),
            Self::Failure => write!(f, "instruction failure"),
            Self::Unknown(code) => write!(f, "unknown status 0x{code:04X}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_round_trip() {
        for raw in [0x20u8, 0x21, 0x22, 0x40, 0x44, 0x45, 0x48, 0x49, 0x60, 0x61, 0x63] {
            let opcode = Opcode::try_from(raw).unwrap();
            assert_eq!(u8::from(opcode), raw);
        }
    }

    #[test]
    fn test_opcode_unknown() {
        assert!(matches!(
            Opcode::try_from(0x99),
            Err(Error::UnknownOpcode(0x99))
        ));
    }

    #[test]
    fn test_frame_code_mapping() {
        assert_eq!(DeviceStatus::from_frame_code(0x00), DeviceStatus::Ok);
        assert_eq!(DeviceStatus::from_frame_code(0x01), DeviceStatus::Failure);
        assert_eq!(DeviceStatus::from_frame_code(0x12), DeviceStatus::TemplateEmpty);
        assert_eq!(DeviceStatus::from_frame_code(0x22), DeviceStatus::InvalidParameter);
        assert_eq!(DeviceStatus::from_frame_code(0x28), DeviceStatus::NotDetected);
        assert_eq!(
            DeviceStatus::from_frame_code(0x77),
            DeviceStatus::Unknown(0x77)
        );
    }

    #[test]
    fn test_confirm_code_mapping() {
        assert_eq!(DeviceStatus::from_confirm_code(0x00), DeviceStatus::Ok);
        assert_eq!(DeviceStatus::from_confirm_code(0x02), DeviceStatus::NotDetected);
        assert_eq!(DeviceStatus::from_confirm_code(0x08), DeviceStatus::NoMatch);
        assert_eq!(DeviceStatus::from_confirm_code(0x09), DeviceStatus::NoMatch);
        assert_eq!(DeviceStatus::from_confirm_code(0x0B), DeviceStatus::InvalidParameter);
    }
}
