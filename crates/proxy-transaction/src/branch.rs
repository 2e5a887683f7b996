//! Branch identifier generation
//!
//! Every outgoing transaction gets its own branch token before it ever talks
//! to the engine. The token is 128 bits drawn from the operating system's
//! CSPRNG, rendered five bits per character with a 32-symbol alphabet that is
//! safe inside a `Via` header parameter (RFC 3261 `token` grammar) and inside
//! a URI.

use std::fmt;

use rand::RngCore;
use rand::rngs::OsRng;

/// RFC 3261 §8.1.1.7 magic cookie that marks a compliant branch parameter.
pub const RFC3261_MAGIC_COOKIE: &str = "z9hG4bK";

/// Number of random bytes behind every branch (an MD5-digest worth).
pub const BRANCH_ENTROPY_BYTES: usize = 16;

/// Length of the encoded branch token.
pub const BRANCH_TOKEN_LEN: usize = (BRANCH_ENTROPY_BYTES * 8 + 4) / 5;

const TOKEN_ALPHABET: &[u8; 32] = b"aBcDeFgHjKmNpQrStUvXyZ0123456789";

/// A unique branch token owned by one outgoing transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchId(String);

impl BranchId {
    /// Generate a fresh random branch.
    pub fn generate() -> Self {
        let mut digest = [0u8; BRANCH_ENTROPY_BYTES];
        OsRng.fill_bytes(&mut digest);
        Self(encode_token(&digest))
    }

    /// The bare token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The value to put in a `Via` branch parameter.
    pub fn via_value(&self, magic_cookie: bool) -> String {
        if magic_cookie {
            format!("{}{}", RFC3261_MAGIC_COOKIE, self.0)
        } else {
            self.0.clone()
        }
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BranchId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Generate a random branch token
pub fn generate_branch() -> BranchId {
    BranchId::generate()
}

/// Encode bytes as a header-safe token, five bits per output character.
///
/// The trailing partial group is zero-padded, so the output always holds
/// `(len * 8 + 4) / 5` characters.
pub fn encode_token(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8 + 4) / 5);
    let mut acc: u16 = 0;
    let mut bits = 0u32;

    for &byte in data {
        acc = (acc << 8) | u16::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            let index = ((acc >> bits) & 0x1f) as usize;
            out.push(TOKEN_ALPHABET[index] as char);
        }
        acc &= (1 << bits) - 1;
    }

    if bits > 0 {
        let index = ((acc << (5 - bits)) & 0x1f) as usize;
        out.push(TOKEN_ALPHABET[index] as char);
    }

    out
}

/// Whether `c` may appear in an encoded token.
pub fn is_token_char(c: char) -> bool {
    c.is_ascii() && TOKEN_ALPHABET.contains(&(c as u8))
}
