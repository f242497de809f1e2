//! Local spot-checks against a stack's block store, used by the
//! `show-tip` and `verify-proof` subcommands. Neither touches the bus or
//! the lock service — they only need a [`BlockStore`] handle.

use chronicle_crypto::sha256_hex;
use chronicle_storage::BlockStore;
use chronicle_types::block::zero_hash;

/// Prints the current tip block's id, type, and hash, or a message if the
/// stack has no blocks yet.
pub fn show_tip(store: &BlockStore) -> anyhow::Result<()> {
    match store.tip()? {
        Some(tip) => println!(
            "id={} type={} hash={}",
            tip.id,
            tip.block_type.as_str(),
            tip.hash
        ),
        None => println!("stack has no blocks yet"),
    }
    Ok(())
}

/// Recomputes `block_id`'s hash from its fields and checks it against the
/// stored hash, then checks its `prevHash` links to the preceding block
/// (or to the zero hash, for block 0).
pub fn verify_proof(store: &BlockStore, block_id: u64) -> anyhow::Result<()> {
    let block = store
    .by_id(block_id)?
    .ok_or_else(|| anyhow::anyhow!("no block with id {block_id}"))?;

    let expected_hash = sha256_hex(&block.hash_preimage());
    if expected_hash != block.hash {
        anyhow::bail!(
            "block {block_id} hash mismatch: stored {}, recomputed {}",
            block.hash,
            expected_hash
        );
    }

    let expected_prev = if block_id == 0 {
        zero_hash()
    } else {
        store
        .by_id(block_id - 1)?
        .ok_or_else(|| anyhow::anyhow!("block {} is missing but {block_id} links to it", block_id - 1))?
        .hash
    };
    if expected_prev != block.prev_hash {
        anyhow::bail!(
            "block {block_id} prevHash mismatch: stored {}, expected {}",
            block.prev_hash,
            expected_prev
        );
    }

    println!("block {block_id} verified: hash and prevHash are consistent");
    Ok(())
}
