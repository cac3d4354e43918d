//! ECDSA sign/verify round trip over secp256k1.

use std::time::Instant;

use anyhow::{bail, Context, Result};
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey};
use log::info;
use rand::rngs::OsRng;

const MESSAGE: &[u8] = b"bring-up harness signing round trip";

pub fn run() -> Result<()> {
    let start = Instant::now();

    let signing_key = SigningKey::random(&mut OsRng);
    let verifying_key = signing_key.verifying_key();

    let signature: Signature = signing_key.sign(MESSAGE);
    verifying_key
        .verify(MESSAGE, &signature)
        .context("signature over the original message did not verify")?;

    let mut tampered = MESSAGE.to_vec();
    tampered[0] ^= 0x01;
    if verifying_key.verify(&tampered, &signature).is_ok() {
        bail!("signature verified over a tampered message");
    }

    info!(
        "ECDSA secp256k1 sign/verify ok, signature {} ({:?})",
        hex::encode(signature.to_bytes()),
        start.elapsed()
    );
    Ok(())
}
