pub mod key_vault;

pub use key_vault::{KeyHandle, KeyVault, KEY_LEN};
