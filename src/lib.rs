//! [ROCCA][1]: high-throughput [Authenticated Encryption with Associated
//! Data (AEAD)][2] cipher built entirely from the AES round function,
//! designed for software platforms with hardware AES acceleration
//! (AES-NI on x86, the Cryptography Extensions on ARMv8).
//!
//! ROCCA uses a 256-bit key, a 128-bit nonce, and a 128-bit tag, and
//! processes data in 256-bit blocks over an internal state of eight AES
//! blocks. The AES round itself is provided by the [`aes`] crate's
//! `hazmat` module, which autodetects hardware support and otherwise
//! falls back to a constant-time bitsliced software implementation.
//!
//! # Usage
//!
//! ```
//! use rocca::Rocca;
//! use rocca::aead::{Aead, NewAead, generic_array::GenericArray};
//!
//! let key = GenericArray::from_slice(b"an example very very secret key.");
//! let cipher = Rocca::new(key);
//!
//! let nonce = GenericArray::from_slice(b"my unique nonces"); // 128-bits; unique per message
//!
//! let ciphertext = cipher.encrypt(nonce, b"plaintext message".as_ref())
//!     .expect("encryption failure!");
//!
//! let plaintext = cipher.decrypt(nonce, ciphertext.as_ref())
//!     .expect("decryption failure!");
//!
//! assert_eq!(&plaintext, b"plaintext message");
//! ```
//!
//! ## In-place usage
//!
//! The [`AeadInPlace`] methods encrypt and decrypt a buffer in place with
//! a detached tag, and never allocate. They are available without the
//! `alloc` feature.
//!
//! [1]: https://tosc.iacr.org/index.php/ToSC/article/view/8904
//! [2]: https://en.wikipedia.org/wiki/Authenticated_encryption

#![no_std]
#![warn(missing_docs, rust_2018_idioms)]

pub use aead;

use aead::generic_array::{
    typenum::{U0, U16, U32},
    GenericArray,
};
use aead::{AeadCore, AeadInPlace, Error, Key, NewAead, Nonce, Tag};
use aes::hazmat::cipher_round;
use aes::Block;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Length of a ROCCA key in bytes: two AES-128 blocks.
pub const KEY_SIZE: usize = 32;

/// Length of a ROCCA nonce in bytes.
pub const NONCE_SIZE: usize = 16;

/// Length of a ROCCA authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Message block size in bytes: ROCCA absorbs two AES blocks per round.
const BLOCK_SIZE: usize = 32;

/// Number of state-update rounds run during initialization and again
/// during tag finalization.
const ROUNDS: usize = 20;

/// First two 128-bit chunks of the SHA-256 round constants, stored as the
/// little-endian byte strings the state schedule loads.
const Z0: [u8; 16] = 0x428a2f98d728ae227137449123ef65cd_u128.to_le_bytes();
const Z1: [u8; 16] = 0xb5c0fbcfec4d3b2fe9b5dba58189dbbc_u128.to_le_bytes();

/// Byte written over the entire plaintext buffer when tag verification
/// fails. Non-zero so accidental use of rejected plaintext is easy to
/// spot.
const POISON: u8 = 0xaa;

/// The ROCCA authenticated encryption cipher.
#[derive(Clone)]
pub struct Rocca {
    /// Secret key
    key: GenericArray<u8, U32>,
}

impl NewAead for Rocca {
    type KeySize = U32;

    fn new(key: &Key<Self>) -> Self {
        Self { key: *key }
    }
}

impl AeadCore for Rocca {
    type NonceSize = U16;
    type TagSize = U16;
    type CiphertextOverhead = U0;
}

impl AeadInPlace for Rocca {
    fn encrypt_in_place_detached(
        &self,
        nonce: &Nonce<Self>,
        associated_data: &[u8],
        buffer: &mut [u8],
    ) -> Result<Tag<Self>, Error> {
        let mut state = State::new(&self.key, nonce);
        state.absorb(associated_data);

        let msg_len = buffer.len();
        let mut blocks = buffer.chunks_exact_mut(BLOCK_SIZE);
        for block in &mut blocks {
            state.encrypt_block(block);
        }

        let rest = blocks.into_remainder();
        if !rest.is_empty() {
            // Zero-extend the final partial block, encrypt it whole (the
            // state absorbs the padded plaintext), emit only the bytes
            // that correspond to real input.
            let mut padded = [0u8; BLOCK_SIZE];
            padded[..rest.len()].copy_from_slice(rest);
            state.encrypt_block(&mut padded);
            rest.copy_from_slice(&padded[..rest.len()]);
            padded.zeroize();
        }

        Ok(state.finalize(associated_data.len(), msg_len))
    }

    fn decrypt_in_place_detached(
        &self,
        nonce: &Nonce<Self>,
        associated_data: &[u8],
        buffer: &mut [u8],
        tag: &Tag<Self>,
    ) -> Result<(), Error> {
        let mut state = State::new(&self.key, nonce);
        state.absorb(associated_data);

        let msg_len = buffer.len();
        let mut blocks = buffer.chunks_exact_mut(BLOCK_SIZE);
        for block in &mut blocks {
            state.decrypt_block(block);
        }

        let rest = blocks.into_remainder();
        if !rest.is_empty() {
            state.decrypt_partial(rest);
        }

        let expected = state.finalize(associated_data.len(), msg_len);
        if expected.ct_eq(tag).unwrap_u8() == 1 {
            Ok(())
        } else {
            // The buffer holds unauthenticated plaintext at this point.
            // Overwrite it before reporting failure.
            for byte in buffer.iter_mut() {
                *byte = POISON;
            }
            Err(Error)
        }
    }
}

impl Drop for Rocca {
    fn drop(&mut self) {
        self.key.as_mut_slice().zeroize();
    }
}

/// The ROCCA state: eight AES-block lanes advanced by a round update.
///
/// A `State` is created by one `encrypt`/`decrypt` invocation, mutated by
/// every absorb and block step, and consumed by [`State::finalize`].
struct State {
    lanes: [Block; 8],
}

impl State {
    /// Load the key and nonce into the lanes and run the initialization
    /// schedule.
    fn new(key: &GenericArray<u8, U32>, nonce: &Nonce<Rocca>) -> Self {
        let k0 = Block::clone_from_slice(&key[..16]);
        let k1 = Block::clone_from_slice(&key[16..]);
        let n = *nonce;
        let z0 = Block::from(Z0);
        let z1 = Block::from(Z1);
        let zero = Block::default();

        let mut state = Self {
            lanes: [k1, n, z0, z1, xor(&n, &k1), zero, k0, zero],
        };

        for _ in 0..ROUNDS {
            state.update(&z0, &z1);
        }

        state
    }

    /// One round of the update permutation with input blocks `x0`, `x1`.
    ///
    /// Every lane of the previous state is read before any lane is
    /// written: the assignment is a parallel one, done here by building
    /// the next register file from a copy of the old.
    fn update(&mut self, x0: &Block, x1: &Block) {
        let s = self.lanes;
        self.lanes = [
            xor(&s[7], x0),
            aes_round(s[0], &s[7]),
            xor(&s[1], &s[6]),
            aes_round(s[2], &s[1]),
            xor(&s[3], x1),
            aes_round(s[4], &s[3]),
            aes_round(s[5], &s[4]),
            xor(&s[0], &s[6]),
        ];
    }

    /// Keystream pair covering the next 32-byte block.
    fn keystream(&self) -> (Block, Block) {
        let s = &self.lanes;
        (aes_round(s[1], &s[5]), aes_round(xor(&s[0], &s[4]), &s[2]))
    }

    /// Encrypt one full 32-byte block in place, then absorb the
    /// plaintext pair into the state.
    fn encrypt_block(&mut self, block: &mut [u8]) {
        debug_assert_eq!(block.len(), BLOCK_SIZE);

        let m0 = Block::clone_from_slice(&block[..16]);
        let m1 = Block::clone_from_slice(&block[16..]);
        let (k0, k1) = self.keystream();
        block[..16].copy_from_slice(&xor(&m0, &k0));
        block[16..].copy_from_slice(&xor(&m1, &k1));
        self.update(&m0, &m1);
    }

    /// Decrypt one full 32-byte block in place. The update absorbs the
    /// recovered plaintext, not the ciphertext, so it runs last.
    fn decrypt_block(&mut self, block: &mut [u8]) {
        debug_assert_eq!(block.len(), BLOCK_SIZE);

        let (k0, k1) = self.keystream();
        let m0 = xor(&Block::clone_from_slice(&block[..16]), &k0);
        let m1 = xor(&Block::clone_from_slice(&block[16..]), &k1);
        block[..16].copy_from_slice(&m0);
        block[16..].copy_from_slice(&m1);
        self.update(&m0, &m1);
    }

    /// Decrypt a final partial block (fewer than 32 bytes) in place.
    ///
    /// The state absorbs the recovered plaintext zero-extended to a full
    /// block, so the tag is computed over a canonical 32-byte block even
    /// though only `block.len()` plaintext bytes are emitted. The
    /// keystream tail beyond the real ciphertext must be zeroed before
    /// the update, not fed through.
    fn decrypt_partial(&mut self, block: &mut [u8]) {
        debug_assert!(!block.is_empty() && block.len() < BLOCK_SIZE);

        let mut padded = [0u8; BLOCK_SIZE];
        padded[..block.len()].copy_from_slice(block);

        let (k0, k1) = self.keystream();
        for (byte, key) in padded.iter_mut().zip(k0.iter().chain(k1.iter())) {
            *byte ^= key;
        }
        block.copy_from_slice(&padded[..block.len()]);

        for byte in padded[block.len()..].iter_mut() {
            *byte = 0;
        }
        let m0 = Block::clone_from_slice(&padded[..16]);
        let m1 = Block::clone_from_slice(&padded[16..]);
        self.update(&m0, &m1);

        padded.zeroize();
    }

    /// Absorb associated data, zero-padding the final partial block.
    ///
    /// Absorption is encryption with the ciphertext discarded; since the
    /// update inputs are the plaintext blocks themselves, the keystream
    /// is never needed and is simply not computed.
    fn absorb(&mut self, data: &[u8]) {
        let mut blocks = data.chunks_exact(BLOCK_SIZE);
        for block in &mut blocks {
            self.update(
                &Block::clone_from_slice(&block[..16]),
                &Block::clone_from_slice(&block[16..]),
            );
        }

        let rest = blocks.remainder();
        if !rest.is_empty() {
            let mut padded = [0u8; BLOCK_SIZE];
            padded[..rest.len()].copy_from_slice(rest);
            self.update(
                &Block::clone_from_slice(&padded[..16]),
                &Block::clone_from_slice(&padded[16..]),
            );
        }
    }

    /// Run the finalization schedule and produce the tag.
    ///
    /// The associated-data and message lengths are absorbed in bits,
    /// each encoded as a 128-bit little-endian block; the tag is the XOR
    /// of all eight lanes.
    fn finalize(mut self, ad_len: usize, msg_len: usize) -> Tag<Rocca> {
        let ad_bits = Block::from(((ad_len as u128) * 8).to_le_bytes());
        let msg_bits = Block::from(((msg_len as u128) * 8).to_le_bytes());

        for _ in 0..ROUNDS {
            self.update(&ad_bits, &msg_bits);
        }

        let mut tag = Block::default();
        for lane in self.lanes.iter() {
            tag = xor(&tag, lane);
        }
        tag
    }
}

impl Drop for State {
    fn drop(&mut self) {
        for lane in self.lanes.iter_mut() {
            lane.as_mut_slice().zeroize();
        }
    }
}

/// XOR of two AES blocks.
#[inline]
fn xor(a: &Block, b: &Block) -> Block {
    let mut out = *a;
    for (byte, other) in out.iter_mut().zip(b.iter()) {
        *byte ^= other;
    }
    out
}

/// One AES round of `block` with `round_key`: SubBytes, ShiftRows,
/// MixColumns, AddRoundKey, matching the `AESENC` instruction. This is a
/// single round, not full AES encryption.
#[inline]
fn aes_round(mut block: Block, round_key: &Block) -> Block {
    cipher_round(&mut block, round_key);
    block
}
