//! `chronicle-node`'s `show-tip`/`verify-proof` subcommands only need a
//! block store, so these run without a live bus or lock backend.

use chronicle_crypto::{sha256_hex, Signer};
use chronicle_node::inspect;
use chronicle_storage::BlockStore;
use chronicle_types::{block::zero_hash, Block, BlockType, BLOCK_VERSION};

fn signed_block(signer: &Signer, id: u64, prev_hash: String, block_type: BlockType) -> Block {
    let mut block = Block {
        id,
        time: 1_700_000_000,
        version: BLOCK_VERSION,
        stack_id: "test-stack".into(),
        block_type,
        data_id: id.to_string(),
        data_val: "00".repeat(32),
        prev_hash,
        hash: String::new(),
        sig: String::new(),
    };
    block.hash = sha256_hex(&block.hash_preimage());
    block.sig = signer.sign(&block.hash).unwrap();
    block
}

#[test]
fn show_tip_reports_nothing_on_an_empty_stack() {
    let dir = tempfile::tempdir().unwrap();
    let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();
    assert!(store.tip().unwrap().is_none());
    inspect::show_tip(&store).unwrap();
}

#[test]
fn verify_proof_accepts_a_correctly_chained_pair_of_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();
    let signer = Signer::generate().unwrap();

    let genesis = signed_block(&signer, 0, zero_hash(), BlockType::Gen);
    store.append(&genesis).unwrap();
    let second = signed_block(&signer, 1, genesis.hash.clone(), BlockType::Cal);
    store.append(&second).unwrap();

    inspect::verify_proof(&store, 0).unwrap();
    inspect::verify_proof(&store, 1).unwrap();
}

#[test]
fn verify_proof_rejects_a_tampered_hash() {
    let dir = tempfile::tempdir().unwrap();
    let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();
    let signer = Signer::generate().unwrap();

    let mut genesis = signed_block(&signer, 0, zero_hash(), BlockType::Gen);
    genesis.data_val = "ff".repeat(32); // corrupt after signing, before append
    store.append(&genesis).unwrap();

    assert!(inspect::verify_proof(&store, 0).is_err());
}

#[test]
fn append_refuses_a_block_whose_prev_hash_does_not_match_the_tip() {
    let dir = tempfile::tempdir().unwrap();
    let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();
    let signer = Signer::generate().unwrap();

    let genesis = signed_block(&signer, 0, zero_hash(), BlockType::Gen);
    store.append(&genesis).unwrap();
    let second = signed_block(&signer, 1, "not-the-real-prev-hash".into(), BlockType::Cal);

    assert!(store.append(&second).is_err());
}

#[test]
fn verify_proof_errors_on_an_unknown_block_id() {
    let dir = tempfile::tempdir().unwrap();
    let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();
    assert!(inspect::verify_proof(&store, 42).is_err());
}
