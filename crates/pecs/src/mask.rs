//! Capability masks.
//!
//! A [`Mask`] is a 64-bit set of capability flags. Entities carry the mask of
//! the components they currently hold; systems declare the mask they require.
//! An entity is visible to a system when it is alive and carries every bit of
//! the system's mask (see [`entity_matches`]).

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

use serde::{Deserialize, Serialize};

use crate::entity::Entity;

// ---------------------------------------------------------------------------
// Mask
// ---------------------------------------------------------------------------

/// A set of up to 64 capability flags.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mask(u64);

impl Mask {
    /// The empty mask. Every entity satisfies it.
    pub const EMPTY: Mask = Mask(0);

    /// Construct a mask from raw bits.
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// A mask with only bit `index` set.
    ///
    /// # Panics
    ///
    /// Panics (at compile time in const contexts) if `index >= 64`.
    #[inline]
    pub const fn bit(index: u32) -> Self {
        assert!(index < 64, "mask bit index out of range");
        Self(1 << index)
    }

    /// Raw bit representation.
    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns `true` if no bit is set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if every bit of `required` is also set in `self`.
    #[inline]
    pub const fn contains(self, required: Mask) -> bool {
        self.0 & required.0 == required.0
    }

    /// Union of two masks, usable in const contexts.
    #[inline]
    pub const fn union(self, other: Mask) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for Mask {
    type Output = Mask;

    #[inline]
    fn bitor(self, rhs: Mask) -> Mask {
        Mask(self.0 | rhs.0)
    }
}

impl BitOrAssign for Mask {
    #[inline]
    fn bitor_assign(&mut self, rhs: Mask) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Mask {
    type Output = Mask;

    #[inline]
    fn bitand(self, rhs: Mask) -> Mask {
        Mask(self.0 & rhs.0)
    }
}

impl BitAndAssign for Mask {
    #[inline]
    fn bitand_assign(&mut self, rhs: Mask) {
        self.0 &= rhs.0;
    }
}

impl Not for Mask {
    type Output = Mask;

    #[inline]
    fn not(self) -> Mask {
        Mask(!self.0)
    }
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mask({:#b})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Matching predicate
// ---------------------------------------------------------------------------

/// Returns `true` if `entity` is alive and carries every bit of `mask`.
///
/// This is the single visibility rule shared by update dispatch and the
/// matching iterator handed to systems.
#[inline]
pub fn entity_matches(entity: &Entity, mask: Mask) -> bool {
    entity.is_alive() && entity.mask().contains(mask)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
