//! Marker traits enforcing zeroization policy on key material.

use zeroize::Zeroize;

/// Types containing key material that must be wiped on drop.
pub trait ZeroizingKey {}

/// `ZeroizingKey` + the ability to zeroize explicitly before drop.
pub trait SecureKey: ZeroizingKey + Zeroize {}

impl<T: ZeroizingKey + Zeroize> SecureKey for T {}
