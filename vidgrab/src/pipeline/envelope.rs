use aes::Aes128;
use aes::cipher::{BlockDecrypt, KeyInit};
use serde::Deserialize;

use crate::pipeline::error::PipelineError;
use crate::pipeline::rendition::Manifest;
use crate::util::b64;

const BLOCK: usize = 16;

/**
    Wire form of the protected metadata response: an AES-CBC ciphertext and
    its IV, both URL-safe base64. Consumed exactly once.
*/
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub iv: String,
    pub data: String,
}

/**
    Decrypt an envelope into the asset manifest it carries.

    Decryption is deterministic: same key, IV, and ciphertext always produce
    the same plaintext. Malformed base64, a ciphertext that is not
    block-aligned, and an out-of-range padding byte are decryption errors
    (the key has probably rotated); plaintext that is not the expected JSON
    is a parse error (the provider's schema has probably drifted).
*/
pub fn open(key: &[u8; 16], envelope: &Envelope) -> Result<Manifest, PipelineError> {
    let iv = b64::decode_urlsafe(&envelope.iv)
        .map_err(|e| PipelineError::Decrypt(format!("envelope iv is not valid base64: {e}")))?;
    let data = b64::decode_urlsafe(&envelope.data)
        .map_err(|e| PipelineError::Decrypt(format!("envelope data is not valid base64: {e}")))?;

    let padded = aes_cbc_decrypt(key, &iv, &data)?;
    let plaintext = strip_padding(&padded)?;

    serde_json::from_slice(plaintext)
        .map_err(|e| PipelineError::Parse(format!("decrypted envelope is not a manifest: {e}")))
}

/**
    AES-128-CBC decryption of the envelope payload.
*/
fn aes_cbc_decrypt(key: &[u8; 16], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, PipelineError> {
    if iv.len() != BLOCK {
        return Err(PipelineError::Decrypt(format!(
            "IV must be {BLOCK} bytes, got {}",
            iv.len()
        )));
    }
    if ciphertext.is_empty() || !ciphertext.len().is_multiple_of(BLOCK) {
        return Err(PipelineError::Decrypt(format!(
            "ciphertext length {} is not a positive multiple of {BLOCK}",
            ciphertext.len()
        )));
    }

    let cipher = Aes128::new(key.into());
    let mut plaintext = Vec::with_capacity(ciphertext.len());
    let mut prev: [u8; BLOCK] = iv.try_into().expect("length checked above");

    for chunk in ciphertext.chunks_exact(BLOCK) {
        let saved: [u8; BLOCK] = chunk.try_into().expect("chunks_exact yields full blocks");
        let mut block = *aes::cipher::generic_array::GenericArray::from_slice(chunk);
        cipher.decrypt_block(&mut block);
        let decrypted: [u8; BLOCK] = block.into();
        for i in 0..BLOCK {
            plaintext.push(decrypted[i] ^ prev[i]);
        }
        prev = saved;
    }

    Ok(plaintext)
}

/**
    Remove PKCS#7-style padding: the last plaintext byte is the padding
    length. A length of zero or one exceeding the plaintext is rejected
    rather than silently truncated.
*/
fn strip_padding(padded: &[u8]) -> Result<&[u8], PipelineError> {
    let pad = match padded.last() {
        Some(&n) => n as usize,
        None => return Err(PipelineError::Decrypt("empty plaintext".into())),
    };
    if pad == 0 || pad > padded.len() {
        return Err(PipelineError::Decrypt(format!(
            "padding length {pad} out of range for {} plaintext bytes",
            padded.len()
        )));
    }
    Ok(&padded[..padded.len() - pad])
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockEncrypt;
    use data_encoding::BASE64;

    const KEY: [u8; 16] = [0x42; 16];
    const IV: [u8; 16] = [0x13; 16];

    /// Test-side CBC encryption; input must already be block-aligned.
    fn aes_cbc_encrypt(key: &[u8; 16], iv: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
        assert!(!plaintext.is_empty() && plaintext.len().is_multiple_of(BLOCK));
        let cipher = Aes128::new(key.into());
        let mut ciphertext = Vec::with_capacity(plaintext.len());
        let mut prev = *iv;
        for chunk in plaintext.chunks_exact(BLOCK) {
            let mut block = [0u8; BLOCK];
            for i in 0..BLOCK {
                block[i] = chunk[i] ^ prev[i];
            }
            let mut block_ga = aes::cipher::generic_array::GenericArray::from(block);
            cipher.encrypt_block(&mut block_ga);
            prev.copy_from_slice(&block_ga);
            ciphertext.extend_from_slice(&block_ga);
        }
        ciphertext
    }

    fn pad(data: &[u8]) -> Vec<u8> {
        let pad = BLOCK - (data.len() % BLOCK);
        let mut out = data.to_vec();
        out.resize(data.len() + pad, pad as u8);
        out
    }

    fn envelope_for(plaintext_padded: &[u8]) -> Envelope {
        let ciphertext = aes_cbc_encrypt(&KEY, &IV, plaintext_padded);
        Envelope {
            iv: crate::util::b64::to_urlsafe_nopad(&BASE64.encode(&IV)),
            data: crate::util::b64::to_urlsafe_nopad(&BASE64.encode(&ciphertext)),
        }
    }

    #[test]
    fn round_trip_reproduces_manifest() {
        let json = br#"{"assets":[{"drm":"widevine","keyserver":"https://keys.example/wv","renditions":[{"url":"https://cdn.example/r/show_900.mpd"}]}]}"#;
        let manifest = open(&KEY, &envelope_for(&pad(json))).unwrap();
        assert_eq!(manifest.assets.len(), 1);
        assert_eq!(manifest.assets[0].drm.as_deref(), Some("widevine"));
    }

    #[test]
    fn round_trip_multi_block() {
        let json = format!(
            r#"{{"assets":[],"note":"{}"}}"#,
            "x".repeat(100) // force several blocks
        );
        let manifest = open(&KEY, &envelope_for(&pad(json.as_bytes()))).unwrap();
        assert!(manifest.assets.is_empty());
    }

    #[test]
    fn zero_padding_byte_rejected() {
        let mut block = [b'{'; BLOCK];
        block[BLOCK - 1] = 0;
        let err = open(&KEY, &envelope_for(&block)).unwrap_err();
        assert!(matches!(err, PipelineError::Decrypt(_)));
    }

    #[test]
    fn oversized_padding_byte_rejected() {
        let mut block = [b'{'; BLOCK];
        block[BLOCK - 1] = BLOCK as u8 + 1;
        let err = open(&KEY, &envelope_for(&block)).unwrap_err();
        assert!(matches!(err, PipelineError::Decrypt(_)));
    }

    #[test]
    fn unaligned_ciphertext_rejected() {
        let envelope = Envelope {
            iv: BASE64.encode(&IV),
            data: BASE64.encode(&[0u8; 17]),
        };
        let err = open(&KEY, &envelope).unwrap_err();
        assert!(matches!(err, PipelineError::Decrypt(_)));
    }

    #[test]
    fn malformed_base64_rejected() {
        let envelope = Envelope {
            iv: "!!!".into(),
            data: BASE64.encode(&[0u8; 16]),
        };
        let err = open(&KEY, &envelope).unwrap_err();
        assert!(matches!(err, PipelineError::Decrypt(_)));
    }

    #[test]
    fn wrong_iv_length_rejected() {
        let envelope = Envelope {
            iv: BASE64.encode(&[0u8; 8]),
            data: BASE64.encode(&[0u8; 16]),
        };
        let err = open(&KEY, &envelope).unwrap_err();
        assert!(matches!(err, PipelineError::Decrypt(_)));
    }

    #[test]
    fn non_json_plaintext_is_a_parse_error() {
        let err = open(&KEY, &envelope_for(&pad(b"certainly not json"))).unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
    }

    #[test]
    fn decryption_is_deterministic() {
        let json = br#"{"assets":[]}"#;
        let envelope = envelope_for(&pad(json));
        let a = open(&KEY, &envelope).unwrap();
        let b = open(&KEY, &envelope).unwrap();
        assert_eq!(a.assets.len(), b.assets.len());
    }
}
