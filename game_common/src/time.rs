//! Synchronized universal time.
//!
//! All peers agree on a shared simulation clock. Times are seconds as `f64` and are used both to
//! timestamp outgoing state and to decide when buffered remote state becomes due.

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::ops::{Add, AddAssign, Sub};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct UniversalTime(pub f64);

impl UniversalTime {
    pub const ZERO: Self = Self(0.0);

    #[inline]
    pub const fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    #[inline]
    pub const fn as_secs(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// Total ordering, see [`f64::total_cmp`].
    #[inline]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Add<f64> for UniversalTime {
    type Output = Self;

    #[inline]
    fn add(self, rhs: f64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<f64> for UniversalTime {
    #[inline]
    fn add_assign(&mut self, rhs: f64) {
        self.0 += rhs;
    }
}

/// Returns the elapsed seconds between two points in time.
impl Sub for UniversalTime {
    type Output = f64;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        self.0 - rhs.0
    }
}

impl Display for UniversalTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0)
    }
}
