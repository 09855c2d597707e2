//! Author key files: the 32-byte Ed25519 secret, hex-encoded, one line.

use anyhow::{bail, Context, Result};
use std::path::Path;

use tweetslot_protocol::crypto::Keypair;

pub fn write_keypair(path: &Path, keypair: &Keypair, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    std::fs::write(path, format!("{}\n", keypair.to_hex()))
        .with_context(|| format!("failed to write key file {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to restrict permissions on {}", path.display()))?;
    }
    Ok(())
}

pub fn read_keypair(path: &Path) -> Result<Keypair> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read key file {} (run `keygen` first)", path.display()))?;
    Keypair::from_hex(contents.trim())
        .with_context(|| format!("{} does not hold a hex secret key", path.display()))
}
