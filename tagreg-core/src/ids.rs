//! Composed 32-bit tag ID.
//!
//! A `TagId` encodes the tag type ID and the per-type value ID into a
//! single `u32`:
//!
//! ```text
//! bits 31..16  tag type ID (u16)
//! bits 15..0   value ID (u16), allocated per tag type
//! ```
//!
//! Both halves come from the coordinated ID allocator. Value IDs are scoped
//! per tag type, so the same value ID may appear under different types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 16-bit tag type ID.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagTypeId(pub u16);

impl TagTypeId {
    #[inline]
    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// Convert an allocator slot into a type ID.
    ///
    /// Returns `None` if the slot does not fit in 16 bits.
    pub fn from_slot(slot: u32) -> Option<Self> {
        u16::try_from(slot).ok().map(Self)
    }
}

impl fmt::Debug for TagTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagTypeId({:#06x})", self.0)
    }
}

impl fmt::Display for TagTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// 16-bit value ID, unique within one tag type.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagValueId(pub u16);

impl TagValueId {
    #[inline]
    pub fn as_u16(self) -> u16 {
        self.0
    }

    pub fn from_slot(slot: u32) -> Option<Self> {
        u16::try_from(slot).ok().map(Self)
    }
}

impl fmt::Debug for TagValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagValueId({:#06x})", self.0)
    }
}

impl fmt::Display for TagValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Canonical 32-bit tag ID: `(type_id << 16) | value_id`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct TagId(pub u32);

impl TagId {
    /// Compose a tag ID from its type and value halves.
    #[inline]
    pub fn from_parts(type_id: TagTypeId, value_id: TagValueId) -> Self {
        Self(((type_id.0 as u32) << 16) | value_id.0 as u32)
    }

    /// Extract the tag type ID (upper 16 bits).
    #[inline]
    pub fn type_id(self) -> TagTypeId {
        TagTypeId((self.0 >> 16) as u16)
    }

    /// Extract the value ID (lower 16 bits).
    #[inline]
    pub fn value_id(self) -> TagValueId {
        TagValueId((self.0 & 0xFFFF) as u16)
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TagId(type={:#06x}, value={:#06x})",
            self.type_id().0,
            self.value_id().0
        )
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
