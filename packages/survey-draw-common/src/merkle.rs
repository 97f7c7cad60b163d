use sha2::{Digest, Sha256};

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// Compute the leaf hash for a draw token.
///
/// `leaf_hash = sha256( 0x00 || token_bytes )`
///
/// The prefix keeps leaf hashes apart from internal nodes.
pub fn compute_leaf_hash(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Hash two sibling nodes. Sorted-pair: the smaller value goes first.
fn hash_pair(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    if a.as_slice() <= b.as_slice() {
        hasher.update(a);
        hasher.update(b);
    } else {
        hasher.update(b);
        hasher.update(a);
    }
    hasher.finalize().into()
}

fn next_level(level: &[[u8; 32]]) -> Vec<[u8; 32]> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_pair(left, right),
            // Odd node out is promoted unchanged
            [single] => *single,
            _ => unreachable!("chunks(2) yields one or two elements"),
        })
        .collect()
}

/// Compute the pool commitment: the Merkle root over the leaf hashes of a
/// canonical pool, in pool order.
///
/// Returns `None` for an empty pool; there is nothing to commit to.
pub fn compute_pool_hash(pool: &[String]) -> Option<[u8; 32]> {
    let mut level: Vec<[u8; 32]> = pool.iter().map(|t| compute_leaf_hash(t)).collect();
    if level.is_empty() {
        return None;
    }
    while level.len() > 1 {
        level = next_level(&level);
    }
    Some(level[0])
}

/// Build the inclusion proof for `pool[index]`: the hex-encoded sibling
/// hashes from the leaf up to the root. Levels where the node is promoted
/// without a sibling contribute nothing.
pub fn build_inclusion_proof(pool: &[String], index: usize) -> Option<Vec<String>> {
    if index >= pool.len() {
        return None;
    }

    let mut level: Vec<[u8; 32]> = pool.iter().map(|t| compute_leaf_hash(t)).collect();
    let mut idx = index;
    let mut proof = Vec::new();

    while level.len() > 1 {
        let sibling = idx ^ 1;
        if sibling < level.len() {
            proof.push(hex::encode(level[sibling]));
        }
        level = next_level(&level);
        idx /= 2;
    }

    Some(proof)
}

/// Verify an inclusion proof against a known pool hash.
///
/// Uses sorted-pair hashing: for each sibling in the proof,
/// if current <= sibling then hash(current || sibling), else hash(sibling || current).
///
/// Returns true if the computed root matches the expected root.
pub fn verify_inclusion_proof(root_hex: &str, proof_hex: &[String], leaf_hash: &[u8; 32]) -> bool {
    let expected_root = match hex::decode(root_hex) {
        Ok(v) => v,
        Err(_) => return false,
    };
    if expected_root.len() != 32 {
        return false;
    }

    let mut current = *leaf_hash;

    for sibling_hex in proof_hex {
        let sibling: [u8; 32] = match hex::decode(sibling_hex).map(<[u8; 32]>::try_from) {
            Ok(Ok(v)) => v,
            _ => return false,
        };
        current = hash_pair(&current, &sibling);
    }

    current.as_slice() == expected_root.as_slice()
}
