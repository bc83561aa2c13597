use anyhow::{Result, bail};
use chrono::{TimeDelta, Utc};
use pkg_constants::lease::{
    BLOCKCHAIN_ID_MAX_LEN, MAX_LEASE_TTL_SECS, SUBNET_ID_MAX_LEN, SUBNET_ID_MIN_LEN,
};

/// Validate a subnet id.
/// Rules: ASCII alphanumeric, 40 to 60 chars.
pub fn validate_subnet_id(subnet_id: &str) -> Result<()> {
    if subnet_id.is_empty() {
        bail!("subnet_id is required");
    }
    let len = subnet_id.len();
    if !(SUBNET_ID_MIN_LEN..=SUBNET_ID_MAX_LEN).contains(&len) {
        bail!(
            "subnet_id must be {}-{} characters (got {})",
            SUBNET_ID_MIN_LEN,
            SUBNET_ID_MAX_LEN,
            len
        );
    }
    if !subnet_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        bail!("subnet_id must contain only ASCII letters and digits");
    }
    Ok(())
}

/// Validate a blockchain id. It ends up in the derived RPC URL, so it must be
/// a plain alphanumeric token.
pub fn validate_blockchain_id(blockchain_id: &str) -> Result<()> {
    if blockchain_id.is_empty() {
        bail!("blockchain_id is required");
    }
    if blockchain_id.len() > BLOCKCHAIN_ID_MAX_LEN {
        bail!(
            "blockchain_id exceeds {} characters (got {})",
            BLOCKCHAIN_ID_MAX_LEN,
            blockchain_id.len()
        );
    }
    if !blockchain_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        bail!("blockchain_id must contain only ASCII letters and digits");
    }
    Ok(())
}

/// Validate a caller identity before it becomes part of a storage key.
pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.is_empty() {
        bail!("user id must not be empty");
    }
    if user_id.contains('/') || user_id.chars().any(|c| c.is_control()) {
        bail!("user id '{}' contains a forbidden character", user_id);
    }
    Ok(())
}

/// Turn a configured lease lifetime into a `TimeDelta` that can be added to
/// the current time.
pub fn validate_lease_ttl_secs(secs: u64) -> Result<TimeDelta> {
    if secs == 0 {
        bail!("lease-ttl-secs must be greater than zero");
    }
    if secs > MAX_LEASE_TTL_SECS {
        bail!(
            "lease-ttl-secs must be at most {} (got {})",
            MAX_LEASE_TTL_SECS,
            secs
        );
    }
    let Some(ttl) = i64::try_from(secs).ok().and_then(TimeDelta::try_seconds) else {
        bail!("lease-ttl-secs {} is out of range", secs);
    };
    if Utc::now().checked_add_signed(ttl).is_none() {
        bail!("lease-ttl-secs {} overflows the current time", secs);
    }
    Ok(ttl)
}
