pub mod aead;
pub mod engine;

pub use aead::{Cipher, XChaChaCipher};
pub use engine::{CipherEngine, FailureKind, FileFailure, Operation, Report};
