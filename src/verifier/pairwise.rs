use anyhow::{anyhow, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Derive a pairwise pseudonymous identifier for a holder at one relying party.
///
/// Lowercase hex of HMAC-SHA256 keyed with the holder's link secret over `rp_identifier`
/// (a DID, a domain, or any other stable relying-party name). The same secret yields unlinkable
/// identifiers at different relying parties and a stable one at each.
pub fn create_pairwise_id(secret: &[u8], rp_identifier: &str) -> Result<String> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(secret)
        .map_err(|e| anyhow!("invalid link secret: {e}"))?;
    mac.update(rp_identifier.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
