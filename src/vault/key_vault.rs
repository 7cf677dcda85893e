use crate::common::{DataLayout, FaceLockError, Result};
use crate::core::identity::Identity;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use zeroize::Zeroizing;

pub const KEY_LEN: usize = 32;

/// Key material for one identity, borrowed by the cipher for a single
/// operation. Wiped on drop and never printed.
pub struct KeyHandle {
    identity: Identity,
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl KeyHandle {
    fn new(identity: Identity, bytes: Zeroizing<[u8; KEY_LEN]>) -> Self {
        Self { identity, bytes }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Raw key bytes, for the cipher only.
    pub fn expose(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("identity", &self.identity)
            .field("bytes", &"<redacted>")
            .finish()
    }
}

/// One random symmetric key per identity, stored as raw bytes under
/// `keys/<identity>.key`.
///
/// Keys are never derived from biometric data and are not encrypted at rest:
/// the biometric gate is enforced by the caller, so anyone who can read the
/// key directory bypasses it.
pub struct KeyVault {
    layout: DataLayout,
}

impl KeyVault {
    pub fn new(layout: &DataLayout) -> Self {
        Self { layout: layout.clone() }
    }

    pub fn has_key(&self, identity: &Identity) -> bool {
        self.layout.key_file(identity).is_file()
    }

    /// Load the identity's key, generating and persisting a new one if none
    /// exists. An existing key is never replaced.
    pub fn unlock_or_create(&self, identity: &Identity) -> Result<KeyHandle> {
        if self.has_key(identity) {
            return self.unlock(identity);
        }

        let keys_dir = self.layout.keys_dir();
        fs::create_dir_all(&keys_dir)?;
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut bytes[..]);

        let mut temp = tempfile::Builder::new()
            .prefix(".key-")
            .tempfile_in(&keys_dir)?;
        restrict_permissions(temp.as_file())?;
        temp.write_all(&bytes[..])?;
        temp.as_file().sync_all()?;

        match temp.persist_noclobber(self.layout.key_file(identity)) {
            Ok(_) => {
                tracing::info!("Created new key for {}", identity);
                Ok(KeyHandle::new(identity.clone(), bytes))
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!("Key for {} appeared concurrently, loading it", identity);
                self.unlock(identity)
            }
            Err(e) => Err(e.error.into()),
        }
    }

    /// Load the identity's existing key. Never creates one.
    pub fn unlock(&self, identity: &Identity) -> Result<KeyHandle> {
        let path = self.layout.key_file(identity);
        let raw = match fs::read(&path) {
            Ok(raw) => Zeroizing::new(raw),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FaceLockError::KeyNotFound(identity.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if raw.len() != KEY_LEN {
            return Err(FaceLockError::KeyCorrupt {
                identity: identity.to_string(),
                reason: format!("expected {} bytes, found {}", KEY_LEN, raw.len()),
            });
        }
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        bytes.copy_from_slice(&raw);

        tracing::debug!("Unlocked key for {}", identity);
        Ok(KeyHandle::new(identity.clone(), bytes))
    }
}

#[cfg(unix)]
fn restrict_permissions(file: &fs::File) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &fs::File) -> Result<()> {
    Ok(())
}
