//! Ledger scripting checks: pay-to-pubkey-hash construction, script
//! classification, and signing a transaction output.

use anyhow::{anyhow, bail, ensure, Context, Result};
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use log::info;
use rand::rngs::OsRng;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

const OP_RETURN: u8 = 0x6a;
const OP_DUP: u8 = 0x76;
const OP_EQUAL: u8 = 0x87;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_HASH160: u8 = 0xa9;
const OP_CHECKSIG: u8 = 0xac;
const OP_DATA_20: u8 = 0x14;
const OP_PUSHDATA1: u8 = 0x4c;

const SIGHASH_ALL: u8 = 0x01;

/// Standard output script templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptClass {
    PubKeyHash,
    ScriptHash,
    NullData,
    NonStandard,
}

/// Addresses extracted from an output script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptAddrs {
    pub class: ScriptClass,
    pub hashes: Vec<[u8; 20]>,
    pub required_sigs: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutPoint {
    pub txid: [u8; 32],
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub value: u64,
    pub pk_script: Vec<u8>,
}

pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

fn double_sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}

/// `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`
pub fn pay_to_pubkey_hash(hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.extend_from_slice(&[OP_DUP, OP_HASH160, OP_DATA_20]);
    script.extend_from_slice(hash);
    script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

pub fn extract_script_addrs(script: &[u8]) -> ScriptAddrs {
    let hash_at = |offset: usize| -> [u8; 20] {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&script[offset..offset + 20]);
        hash
    };

    match script {
        [OP_DUP, OP_HASH160, OP_DATA_20, .., OP_EQUALVERIFY, OP_CHECKSIG] if script.len() == 25 => {
            ScriptAddrs {
                class: ScriptClass::PubKeyHash,
                hashes: vec![hash_at(3)],
                required_sigs: 1,
            }
        }
        [OP_HASH160, OP_DATA_20, .., OP_EQUAL] if script.len() == 23 => ScriptAddrs {
            class: ScriptClass::ScriptHash,
            hashes: vec![hash_at(2)],
            required_sigs: 1,
        },
        [OP_RETURN, ..] => ScriptAddrs {
            class: ScriptClass::NullData,
            hashes: Vec::new(),
            required_sigs: 0,
        },
        _ => ScriptAddrs {
            class: ScriptClass::NonStandard,
            hashes: Vec::new(),
            required_sigs: 0,
        },
    }
}

fn push_data(script: &mut Vec<u8>, data: &[u8]) {
    if data.len() < usize::from(OP_PUSHDATA1) {
        script.push(data.len() as u8);
    } else {
        script.push(OP_PUSHDATA1);
        script.push(data.len() as u8);
    }
    script.extend_from_slice(data);
}

fn parse_pushes(script: &[u8]) -> Result<Vec<&[u8]>> {
    let mut pushes = Vec::new();
    let mut rest = script;
    while let Some((&op, tail)) = rest.split_first() {
        let (len, tail) = match op {
            1..=0x4b => (usize::from(op), tail),
            OP_PUSHDATA1 => {
                let (&len, tail) = tail
                    .split_first()
                    .ok_or_else(|| anyhow!("truncated OP_PUSHDATA1"))?;
                (usize::from(len), tail)
            }
            other => bail!("unexpected opcode {:#04x} in signature script", other),
        };
        ensure!(tail.len() >= len, "push of {} bytes overruns script", len);
        pushes.push(&tail[..len]);
        rest = &tail[len..];
    }
    Ok(pushes)
}

/// Digest committed to by a `SIGHASH_ALL` signature over a one-input,
/// one-output transaction.
pub fn signature_hash(prev: &OutPoint, prev_pk_script: &[u8], output: &TxOutput) -> [u8; 32] {
    let mut tx = Vec::with_capacity(128);
    tx.extend_from_slice(&1u32.to_le_bytes());
    tx.push(1);
    tx.extend_from_slice(&prev.txid);
    tx.extend_from_slice(&prev.index.to_le_bytes());
    tx.push(prev_pk_script.len() as u8);
    tx.extend_from_slice(prev_pk_script);
    tx.extend_from_slice(&u32::MAX.to_le_bytes());
    tx.push(1);
    tx.extend_from_slice(&output.value.to_le_bytes());
    tx.push(output.pk_script.len() as u8);
    tx.extend_from_slice(&output.pk_script);
    tx.extend_from_slice(&0u32.to_le_bytes());
    tx.extend_from_slice(&u32::from(SIGHASH_ALL).to_le_bytes());
    double_sha256(&tx)
}

/// Build the signature script `<der sig || sighash> <compressed pubkey>`.
pub fn sign_input(
    key: &SigningKey,
    prev: &OutPoint,
    prev_pk_script: &[u8],
    output: &TxOutput,
) -> Result<Vec<u8>> {
    let digest = signature_hash(prev, prev_pk_script, output);
    let signature: Signature = key.sign_prehash(&digest).context("signing sighash")?;

    let mut sig = signature.to_der().as_bytes().to_vec();
    sig.push(SIGHASH_ALL);
    let pubkey = key.verifying_key().to_encoded_point(true);

    let mut script = Vec::with_capacity(sig.len() + pubkey.len() + 2);
    push_data(&mut script, &sig);
    push_data(&mut script, pubkey.as_bytes());
    Ok(script)
}

/// Execute a signature script against a pay-to-pubkey-hash output script.
pub fn verify_input(
    sig_script: &[u8],
    prev: &OutPoint,
    prev_pk_script: &[u8],
    output: &TxOutput,
) -> Result<()> {
    let addrs = extract_script_addrs(prev_pk_script);
    ensure!(
        addrs.class == ScriptClass::PubKeyHash,
        "cannot spend {:?} output",
        addrs.class
    );

    let pushes = parse_pushes(sig_script)?;
    let [sig, pubkey] = pushes.as_slice() else {
        bail!("signature script has {} pushes, want 2", pushes.len());
    };

    ensure!(
        hash160(pubkey) == addrs.hashes[0],
        "public key does not match output hash"
    );

    let (&sighash, der) = sig
        .split_last()
        .ok_or_else(|| anyhow!("empty signature push"))?;
    ensure!(sighash == SIGHASH_ALL, "unsupported sighash {:#04x}", sighash);

    let key = VerifyingKey::from_sec1_bytes(pubkey).context("parsing public key")?;
    let signature = Signature::from_der(der).context("parsing DER signature")?;
    let digest = signature_hash(prev, prev_pk_script, output);
    key.verify_prehash(&digest, &signature)
        .context("signature does not verify")?;
    Ok(())
}

fn test_pay_to_addr_script() -> Result<()> {
    let key = SigningKey::from_slice(&[0x11; 32]).context("building fixed key")?;
    let pubkey = key.verifying_key().to_encoded_point(true);
    let hash = hash160(pubkey.as_bytes());

    let script = pay_to_pubkey_hash(&hash);
    ensure!(script.len() == 25, "script is {} bytes", script.len());

    info!("Script Hex: {}", hex::encode(&script));
    info!(
        "Script Disassembly: OP_DUP OP_HASH160 {} OP_EQUALVERIFY OP_CHECKSIG",
        hex::encode(hash)
    );
    Ok(())
}

fn test_extract_pk_script_addrs() -> Result<()> {
    let hash = hash160(b"bring-up harness redeem script");

    let mut p2sh = vec![OP_HASH160, OP_DATA_20];
    p2sh.extend_from_slice(&hash);
    p2sh.push(OP_EQUAL);

    let cases = [
        (pay_to_pubkey_hash(&hash), ScriptClass::PubKeyHash, 1),
        (p2sh, ScriptClass::ScriptHash, 1),
        (vec![OP_RETURN, 0x04, 0xde, 0xad, 0xbe, 0xef], ScriptClass::NullData, 0),
    ];

    for (script, class, required_sigs) in cases {
        let addrs = extract_script_addrs(&script);
        ensure!(
            addrs.class == class && addrs.required_sigs == required_sigs,
            "script {} classified as {:?}",
            hex::encode(&script),
            addrs
        );
        info!(
            "Script Class: {:?} Addresses: {:?} Required Signatures: {}",
            addrs.class,
            addrs.hashes.iter().map(hex::encode).collect::<Vec<_>>(),
            addrs.required_sigs
        );
    }
    Ok(())
}

fn test_sign_tx_output() -> Result<()> {
    let key = SigningKey::random(&mut OsRng);
    let pubkey = key.verifying_key().to_encoded_point(true);
    let prev_pk_script = pay_to_pubkey_hash(&hash160(pubkey.as_bytes()));

    let prev = OutPoint {
        txid: double_sha256(b"bring-up harness funding transaction"),
        index: 0,
    };
    let output = TxOutput {
        value: 100_000,
        pk_script: pay_to_pubkey_hash(&hash160(b"recipient")),
    };

    let sig_script = sign_input(&key, &prev, &prev_pk_script, &output)?;
    verify_input(&sig_script, &prev, &prev_pk_script, &output)?;

    let altered = TxOutput {
        value: output.value + 1,
        ..output.clone()
    };
    ensure!(
        verify_input(&sig_script, &prev, &prev_pk_script, &altered).is_err(),
        "signature verified against an altered output"
    );

    info!("Transaction successfully signed");
    Ok(())
}

/// The three scripting checks, run as one unit.
pub fn run() -> Result<()> {
    test_pay_to_addr_script().context("pay to address script")?;
    test_extract_pk_script_addrs().context("extract pk script addrs")?;
    test_sign_tx_output().context("sign tx output")?;
    Ok(())
}
