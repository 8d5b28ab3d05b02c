//! Unified identity model, contact book, presence publication, and the
//! keyserver public-key cache.

pub mod contacts;
pub mod error;
pub mod keyserver;
pub mod presence;
pub mod types;

pub use contacts::ContactBook;
pub use error::{IdentityError, Result};
pub use keyserver::KeyserverCache;
pub use types::{fingerprint_hex, fingerprint_of, Contact, Fingerprint, Identity, IdentityRecord, Profile};
