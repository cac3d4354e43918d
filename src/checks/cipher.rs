//! Hardware cipher known-answer check.

use anyhow::Result;
use log::info;

use crate::board::Board;
use crate::error::HarnessError;

// NIST SP 800-38A, F.2.1 CBC-AES128.Encrypt, blocks 1-2
const KEY: [u8; 16] = [
    0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f, 0x3c,
];
const IV: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
];
pub const PLAINTEXT: [u8; 32] = [
    0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93, 0x17, 0x2a,
    0xae, 0x2d, 0x8a, 0x57, 0x1e, 0x03, 0xac, 0x9c, 0x9e, 0xb7, 0x6f, 0xac, 0x45, 0xaf, 0x8e, 0x51,
];
pub const CIPHERTEXT: [u8; 32] = [
    0x76, 0x49, 0xab, 0xac, 0x81, 0x19, 0xb2, 0x46, 0xce, 0xe9, 0x8e, 0x9b, 0x12, 0xe9, 0x19, 0x7d,
    0x50, 0x86, 0xcb, 0x9b, 0x50, 0x72, 0x19, 0xee, 0x95, 0xdb, 0x11, 0x3a, 0x91, 0x76, 0x78, 0xb2,
];

/// Encrypt the known-answer vector on the board's crypto engine.
pub fn run(board: &dyn Board) -> Result<()> {
    let output = board.cipher_cbc_encrypt(&KEY, &IV, &PLAINTEXT)?;

    if output != CIPHERTEXT {
        return Err(HarnessError::Cipher {
            reason: format!(
                "cbc-aes128 mismatch: got {}, want {}",
                hex::encode(&output),
                hex::encode(CIPHERTEXT)
            ),
        }
        .into());
    }

    info!("cbc-aes128 known answer ok: {}", hex::encode(&output));
    Ok(())
}
