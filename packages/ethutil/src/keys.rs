//! Loading the operator account key.

use std::{path::Path, str::FromStr};

use alloy::signers::local::{LocalSigner, PrivateKeySigner};

use crate::error::{Error, Result};

/// Decrypts a V3 JSON keystore file with `password`.
pub fn read_from_keystore<P: AsRef<Path>>(path: P, password: &str) -> Result<PrivateKeySigner> {
    let path = path.as_ref();
    LocalSigner::decrypt_keystore(path, password).map_err(|err| {
        Error::Key(format!(
            "failed to decrypt keystore [{}]: {err}",
            path.display()
        ))
    })
}

/// Parses a hex encoded secp256k1 private key, with or without `0x` prefix.
pub fn parse_private_key(key: &str) -> Result<PrivateKeySigner> {
    PrivateKeySigner::from_str(key.trim())
        .map_err(|err| Error::Key(format!("invalid private key: {err}")))
}
