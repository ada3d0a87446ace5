use rand::RngCore;

use crate::error::CoreError;

/// Appends length-obscuring padding: `v` copies of the byte `v`, where `v`
/// is one random byte masked to its low 4 bits. A zero draw is coerced to 15
/// so the transform always stays reversible.
pub fn pad(mut plaintext: Vec<u8>) -> Vec<u8> {
    let mut draw = [0u8; 1];
    rand::thread_rng().fill_bytes(&mut draw);
    let mut value = draw[0] & 0xf;
    if value == 0 {
        value = 0xf;
    }
    plaintext.extend(std::iter::repeat(value).take(value as usize));
    plaintext
}

/// Strips the trailing pad: the last byte names the pad length. With `check`
/// set, every pad byte must equal that length. An empty buffer, or a pad
/// longer than the buffer, always fails.
pub fn unpad(mut plaintext: Vec<u8>, check: bool) -> Result<Vec<u8>, CoreError> {
    let Some(&last) = plaintext.last() else {
        return Err(CoreError::BadPadding);
    };
    let pad_len = last as usize;
    if pad_len > plaintext.len() {
        return Err(CoreError::BadPadding);
    }
    let body_len = plaintext.len() - pad_len;
    if check && !plaintext[body_len..].iter().all(|&b| b == last) {
        return Err(CoreError::BadPadding);
    }
    plaintext.truncate(body_len);
    Ok(plaintext)
}
