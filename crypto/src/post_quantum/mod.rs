//! NIST Category-5 lattice primitives: CRYSTALS-Kyber1024 (KEM) and
//! CRYSTALS-Dilithium5 (signatures).

pub mod kyber;
pub mod dilithium;

pub use kyber::{kem_keygen, kem_encap, kem_decap};
pub use dilithium::{sig_keygen, sig_sign, sig_verify};
