use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use gitcache_core::ContentFingerprint;
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

pub fn md5_hex(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

pub fn sha1_hex(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn sha512_hex(bytes: &[u8]) -> String {
    hex::encode(Sha512::digest(bytes))
}

/// Base64 of the raw SHA-256 digest (not of its hex form).
pub fn sha256_base64(bytes: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(bytes))
}

/// Base64 of the raw SHA-512 digest (not of its hex form).
pub fn sha512_base64(bytes: &[u8]) -> String {
    STANDARD.encode(Sha512::digest(bytes))
}

pub fn fingerprint(bytes: &[u8]) -> ContentFingerprint {
    ContentFingerprint {
        md5: md5_hex(bytes),
        sha1: sha1_hex(bytes),
        sha256: sha256_hex(bytes),
        sha512: sha512_hex(bytes),
        sha256_base64: sha256_base64(bytes),
        sha512_base64: sha512_base64(bytes),
    }
}
