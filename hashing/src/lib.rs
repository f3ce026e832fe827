use ethereum_types::H256;
use once_cell::sync::Lazy;
use sha2::{Digest as _, Sha256};

/// Depth of the deepest tree this crate is expected to Merkleize.
pub const MAX_TREE_DEPTH: usize = 40;

/// `ZERO_HASHES[n]` is the root of a tree of depth `n` filled with zero chunks.
pub static ZERO_HASHES: Lazy<[H256; MAX_TREE_DEPTH + 1]> = Lazy::new(|| {
    let mut hashes = [H256::zero(); MAX_TREE_DEPTH + 1];

    for depth in 1..=MAX_TREE_DEPTH {
        hashes[depth] = hash_256_256(hashes[depth - 1], hashes[depth - 1]);
    }

    hashes
});

#[inline]
#[must_use]
pub fn hash_bytes(bytes: impl AsRef<[u8]>) -> H256 {
    H256(Sha256::digest(bytes.as_ref()).into())
}

#[inline]
#[must_use]
pub fn hash_64(value: u64) -> H256 {
    hash_bytes(value.to_le_bytes())
}

#[inline]
#[must_use]
pub fn hash_256(bytes: H256) -> H256 {
    hash_bytes(bytes)
}

#[inline]
#[must_use]
pub fn hash_256_64(a: H256, b: u64) -> H256 {
    let mut hasher = Sha256::new();
    hasher.update(a);
    hasher.update(b.to_le_bytes());
    H256(hasher.finalize().into())
}

#[inline]
#[must_use]
pub fn hash_256_256(left: H256, right: H256) -> H256 {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    H256(hasher.finalize().into())
}

/// Packs a `u64` into a chunk the way SSZ packs basic values.
#[inline]
#[must_use]
pub fn chunk_64(value: u64) -> H256 {
    let mut chunk = H256::zero();
    chunk[..size_of::<u64>()].copy_from_slice(&value.to_le_bytes());
    chunk
}

/// Splits arbitrary bytes into zero-padded chunks.
#[must_use]
pub fn pack_bytes(bytes: &[u8]) -> Vec<H256> {
    bytes
        .chunks(H256::len_bytes())
        .map(|piece| {
            let mut chunk = H256::zero();
            chunk[..piece.len()].copy_from_slice(piece);
            chunk
        })
        .collect()
}

/// Computes the root of a binary tree with `chunks` as leaves.
///
/// The tree is padded with zero chunks up to the next power of two.
/// An empty list of chunks has the root `ZERO_HASHES[0]`.
#[must_use]
pub fn merkleize(chunks: &[H256]) -> H256 {
    let mut layer = chunks.to_vec();
    let mut depth = 0;

    while layer.len() > 1 {
        if layer.len() % 2 == 1 {
            layer.push(ZERO_HASHES[depth]);
        }

        layer = layer
            .chunks_exact(2)
            .map(|pair| hash_256_256(pair[0], pair[1]))
            .collect();

        depth += 1;
    }

    layer.first().copied().unwrap_or(ZERO_HASHES[0])
}

#[inline]
#[must_use]
pub fn mix_in_length(root: H256, length: usize) -> H256 {
    let length = u64::try_from(length).expect("collection lengths fit in u64");
    hash_256_256(root, chunk_64(length))
}
