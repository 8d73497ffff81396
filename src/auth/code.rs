use rand::{rngs::OsRng, Rng};

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Short human-enterable reset code, uniform over uppercase letters and
/// digits. Not globally unique; the service layer owns collision behavior.
pub fn generate_verification_code(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
