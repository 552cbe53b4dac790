//! Opaque identifier types shared by every crate in the workspace.
//!
//! Everything here is a thin newtype over a fixed-width digest or integer.
//! None of these types know how to verify a signature or decode a wire
//! format — that lives outside this core (see spec §1 non-goals). What they
//! do know is how to be content-addressed: a [`BalanceId`] is the digest of
//! a withdraw condition, a [`SlateId`] is the digest of a sorted delegate
//! list, and both are produced by [`digest`] so every implementation that
//! feeds the same bytes in gets the same id out.

use std::fmt;

/// Width of the digests used to key balances and slates.
pub const DIGEST_LEN: usize = 32;

/// A fixed-width content digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest(pub [u8; DIGEST_LEN]);

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for b in &self.0[..4] {
            write!(f, "{:02x}", b)?;
        }
        write!(f, "..")
    }
}

/// FNV-1a over arbitrary bytes, stretched to [`DIGEST_LEN`] by re-hashing
/// with a different seed per 8-byte lane.
///
/// This is not a cryptographic hash. The wire/content hash function used by
/// a real chain is a non-goal here (spec §1): what the evaluator needs is
/// *some* deterministic, collision-avoiding function so that two
/// implementations fed the same condition bytes land on the same
/// [`BalanceId`]. Picking a production hash (blake2b, sha256, ...) would
/// imply a specific wire format this core does not own.
pub fn digest(bytes: &[u8]) -> Digest {
    const SEEDS: [u64; 4] = [
        0xcbf29ce484222325,
        0x100000001b3,
        0x9e3779b97f4a7c15,
        0xff51afd7ed558ccd,
    ];
    let mut out = [0u8; DIGEST_LEN];
    for (lane, seed) in SEEDS.iter().enumerate() {
        let mut hash = *seed;
        for &b in bytes {
            hash ^= b as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        hash ^= lane as u64;
        out[lane * 8..lane * 8 + 8].copy_from_slice(&hash.to_le_bytes());
    }
    Digest(out)
}

macro_rules! digest_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub Digest);

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:?})"), self.0)
            }
        }

        impl From<Digest> for $name {
            fn from(d: Digest) -> Self {
                $name(d)
            }
        }
    };
}

digest_id!(Address, "Owner key hash.");
digest_id!(BalanceId, "Content hash of a withdraw condition.");
digest_id!(SlateId, "Content hash of a sorted delegate list.");
digest_id!(TransactionId, "Identity of a submitted transaction.");

/// Small integer asset identifier. `0` is always the base coin.
pub type AssetId = u32;

/// Base coin's well-known asset id.
pub const BASE_ASSET_ID: AssetId = 0;

/// Signed account identifier; sign encodes approval direction in the voting
/// subsystem (spec §3) — this core never interprets the sign itself, it is
/// carried verbatim for the burn operation's optional account reference.
pub type AccountId = i64;

/// Share/quantity type. Negative values in a *stored* record are always a
/// bug (spec §3) — operations validate their own inputs, they never rely on
/// the type system to forbid negative balances.
pub type ShareType = i64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(digest(b"hello"), digest(b"hello"));
    }

    #[test]
    fn digest_distinguishes_inputs() {
        assert_ne!(digest(b"hello"), digest(b"world"));
    }

    #[test]
    fn digest_id_roundtrips_through_from() {
        let d = digest(b"condition-bytes");
        let id: BalanceId = d.into();
        assert_eq!(id.0, d);
    }
}
