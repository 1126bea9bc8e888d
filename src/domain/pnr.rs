use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const PNR_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const PNR_LENGTH: usize = 6;

/// Six-character booking reference drawn from [A-Z0-9]. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, sqlx::Type)]
#[sqlx(transparent)]
pub struct PnrCode(String);

impl PnrCode {
    /// Draws a fresh code from a cryptographically secure RNG. Does not check uniqueness;
    /// callers must probe the repository (see saga PNR-collision retry, spec §4.3 step 2).
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code: String = (0..PNR_LENGTH)
            .map(|_| PNR_ALPHABET[rng.gen_range(0..PNR_ALPHABET.len())] as char)
            .collect();
        PnrCode(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() != PNR_LENGTH || !raw.bytes().all(|b| PNR_ALPHABET.contains(&b)) {
            return None;
        }
        Some(PnrCode(raw.to_string()))
    }
}

impl fmt::Display for PnrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
