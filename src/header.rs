//! Archive (file) header framing — §4.8, §6 on-disk layout, §3 `ArchiveHeader`.

use crate::checksum::{crc32, ChecksumAlgo};
use crate::codec::AlgoId;
use crate::config::{self, MAC_BYTES, VERSION, VERSION_MIN};
use crate::crypto::{self, CryptoAlgo, CryptoParams};
use crate::error::{PcError, Result};

pub const FLAG_CRYPTO: u16 = 1 << 0;
pub const FLAG_DEDUPE: u16 = 1 << 1;
pub const FLAG_DEDUPE_FIXED: u16 = 1 << 2;
pub const FLAG_DEDUPE_GLOBAL: u16 = 1 << 3;
pub const FLAG_SINGLE_CHUNK: u16 = 1 << 4;
pub const FLAG_LZP: u16 = 1 << 5;
pub const FLAG_DELTA2: u16 = 1 << 6;
pub const FLAG_CRYPTO_SALSA20: u16 = 1 << 7;
const CKSUM_SHIFT: u16 = 8;
const CKSUM_MASK: u16 = 0b111 << CKSUM_SHIFT;

/// The version at/after which the header HMAC/CRC scope includes the crypto
/// parameter block. Ground truth: original_source/main.c guards this with
/// `version > 6`; `config::VERSION` is always above that boundary in this
/// build, but the conditional is preserved for archives written at
/// `VERSION_MIN`.
const CRYPTO_PARAMS_IN_MAC_SINCE: u16 = 6;

#[derive(Debug, Clone)]
pub struct ArchiveHeader {
    pub algo: AlgoId,
    pub version: u16,
    pub flags: u16,
    pub chunksize: u64,
    pub level: u32,
    pub crypto: Option<CryptoParams>,
    pub cksum: ChecksumAlgo,
}

impl ArchiveHeader {
    pub fn new(algo: AlgoId, chunksize: u64, level: u32, cksum: ChecksumAlgo) -> Self {
        ArchiveHeader {
            algo,
            version: VERSION,
            flags: (cksum_bits(cksum)),
            chunksize,
            level,
            crypto: None,
            cksum,
        }
    }

    pub fn crypto_enabled(&self) -> bool {
        self.flags & FLAG_CRYPTO != 0
    }
    pub fn dedupe_enabled(&self) -> bool {
        self.flags & FLAG_DEDUPE != 0
    }
    pub fn dedupe_fixed(&self) -> bool {
        self.flags & FLAG_DEDUPE_FIXED != 0
    }
    pub fn dedupe_global(&self) -> bool {
        self.flags & FLAG_DEDUPE_GLOBAL != 0
    }
    pub fn single_chunk(&self) -> bool {
        self.flags & FLAG_SINGLE_CHUNK != 0
    }
    pub fn lzp(&self) -> bool {
        self.flags & FLAG_LZP != 0
    }
    pub fn delta2(&self) -> bool {
        self.flags & FLAG_DELTA2 != 0
    }
    pub fn crypto_algo(&self) -> CryptoAlgo {
        if self.flags & FLAG_CRYPTO_SALSA20 != 0 {
            CryptoAlgo::Salsa20
        } else {
            CryptoAlgo::Aes
        }
    }

    pub fn set_flag(&mut self, bit: u16, v: bool) {
        if v {
            self.flags |= bit;
        } else {
            self.flags &= !bit;
        }
    }

    /// Digest width carried in every chunk frame: zero in crypto mode (the
    /// per-chunk digest region collapses to nothing, replaced by the HMAC).
    pub fn chunk_digest_width(&self) -> usize {
        if self.crypto_enabled() {
            0
        } else {
            self.cksum.width()
        }
    }

    pub fn chunk_mac_width(&self) -> usize {
        if self.crypto_enabled() {
            MAC_BYTES
        } else {
            4 // CRC32
        }
    }

    /// Serializes the header body (everything before the trailer).
    fn encode_body(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&self.algo.to_field());
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&self.flags.to_be_bytes());
        out.extend_from_slice(&self.chunksize.to_be_bytes());
        out.extend_from_slice(&self.level.to_be_bytes());
        if let Some(ref cp) = self.crypto {
            if self.version > CRYPTO_PARAMS_IN_MAC_SINCE {
                out.extend_from_slice(&(cp.salt.len() as u32).to_be_bytes());
                out.extend_from_slice(&cp.salt);
                out.extend_from_slice(&cp.nonce);
                out.extend_from_slice(&cp.key_len.to_be_bytes());
            }
        }
        out
    }

    /// Writes the full header (body + trailer) to `out`.
    pub fn write(&self, out: &mut Vec<u8>, key: Option<&[u8]>) -> Result<()> {
        let body = self.encode_body();
        out.extend_from_slice(&body);
        if self.crypto_enabled() {
            let key = key.ok_or_else(|| PcError::Config("crypto enabled but no key supplied".into()))?;
            let mac = crypto::hmac(key, &body);
            out.extend_from_slice(&mac);
        } else {
            out.extend_from_slice(&crc32(&body).to_be_bytes());
        }
        Ok(())
    }

    /// Parses and fully validates a header from `buf`, returning the header
    /// and the number of bytes consumed. Validation order matches
    /// original_source/main.c: magic/algo -> version bounds -> chunksize
    /// bound -> level bound -> trailer integrity, first failure wins.
    pub fn read(buf: &[u8], key: Option<&[u8]>) -> Result<(Self, usize)> {
        if buf.len() < 8 + 2 + 2 + 8 + 4 {
            return Err(PcError::Format("archive header truncated".into()));
        }
        let algo = AlgoId::from_field(buf[0..8].try_into().unwrap())?;
        let version = u16::from_be_bytes(buf[8..10].try_into().unwrap());
        validate_version(version)?;

        let flags = u16::from_be_bytes(buf[10..12].try_into().unwrap());
        let chunksize = u64::from_be_bytes(buf[12..20].try_into().unwrap());
        if chunksize > config::max_chunk_size() {
            return Err(PcError::Format(format!(
                "chunksize {chunksize} exceeds {}% of total RAM",
                (config::MAX_CHUNK_RAM_FRACTION * 100.0) as u32
            )));
        }
        let level = u32::from_be_bytes(buf[20..24].try_into().unwrap());
        if level > config::MAX_LEVEL {
            return Err(PcError::Format(format!("level {level} exceeds MAX_LEVEL {}", config::MAX_LEVEL)));
        }

        let cksum = ChecksumAlgo::from_name(cksum_name(flags))
            .ok_or_else(|| PcError::Format("unknown checksum selector in header flags".into()))?;

        let mut pos = 24usize;
        let crypto_enabled = flags & FLAG_CRYPTO != 0;
        let crypto_algo = if flags & FLAG_CRYPTO_SALSA20 != 0 { CryptoAlgo::Salsa20 } else { CryptoAlgo::Aes };
        let crypto = if crypto_enabled && version > CRYPTO_PARAMS_IN_MAC_SINCE {
            if buf.len() < pos + 4 {
                return Err(PcError::Format("archive header truncated before saltlen".into()));
            }
            let saltlen = u32::from_be_bytes(buf[pos..pos + 4].try_into().unwrap()) as usize;
            pos += 4;
            if buf.len() < pos + saltlen {
                return Err(PcError::Format("archive header truncated before salt".into()));
            }
            let salt = buf[pos..pos + saltlen].to_vec();
            pos += saltlen;
            let nonce_len = crypto_algo.nonce_len();
            if buf.len() < pos + nonce_len {
                return Err(PcError::Format("archive header truncated before nonce".into()));
            }
            let nonce = buf[pos..pos + nonce_len].to_vec();
            pos += nonce_len;
            if buf.len() < pos + 4 {
                return Err(PcError::Format("archive header truncated before keylen".into()));
            }
            let key_len = u32::from_be_bytes(buf[pos..pos + 4].try_into().unwrap());
            pos += 4;
            Some(CryptoParams { algo: crypto_algo, salt, nonce, key_len })
        } else {
            None
        };

        let body = &buf[..pos];
        let trailer_len = if crypto_enabled { MAC_BYTES } else { 4 };
        if buf.len() < pos + trailer_len {
            return Err(PcError::Format("archive header truncated before trailer".into()));
        }
        if crypto_enabled {
            let key = key.ok_or(PcError::HeaderVerification)?;
            let mac = &buf[pos..pos + trailer_len];
            if !crypto::verify_hmac(key, body, mac) {
                return Err(PcError::HeaderVerification);
            }
        } else {
            let stored = u32::from_be_bytes(buf[pos..pos + 4].try_into().unwrap());
            if crc32(body) != stored {
                return Err(PcError::HeaderVerification);
            }
        }

        let header = ArchiveHeader { algo, version, flags, chunksize, level, crypto, cksum };
        Ok((header, pos + trailer_len))
    }
}

pub fn validate_version(version: u16) -> Result<()> {
    // Open Question (b), resolved against original_source/main.c:
    // version == VERSION_MIN is accepted, version < VERSION_MIN is rejected.
    if version < VERSION_MIN || version > VERSION {
        return Err(PcError::Format(format!(
            "unsupported archive version {version} (supported: {VERSION_MIN}..={VERSION})"
        )));
    }
    Ok(())
}

fn cksum_bits(algo: ChecksumAlgo) -> u16 {
    let code: u16 = match algo {
        ChecksumAlgo::Crc32 => 0,
        ChecksumAlgo::Blake3 => 1,
        ChecksumAlgo::Xxh64 => 2,
        ChecksumAlgo::Sha256 => 3,
    };
    (code << CKSUM_SHIFT) & CKSUM_MASK
}

fn cksum_name(flags: u16) -> &'static str {
    match (flags & CKSUM_MASK) >> CKSUM_SHIFT {
        0 => "crc32",
        1 => "blake3",
        2 => "xxh64",
        _ => "sha256",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_without_crypto() {
        let header = ArchiveHeader::new(AlgoId::Zlib, 5 * 1024 * 1024, 6, ChecksumAlgo::Blake3);
        let mut buf = Vec::new();
        header.write(&mut buf, None).unwrap();
        let (parsed, consumed) = ArchiveHeader::read(&buf, None).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(parsed.algo, AlgoId::Zlib);
        assert_eq!(parsed.chunksize, 5 * 1024 * 1024);
        assert_eq!(parsed.cksum, ChecksumAlgo::Blake3);
    }

    #[test]
    fn round_trips_with_crypto() {
        let mut header = ArchiveHeader::new(AlgoId::Lzma, 1024 * 1024, 9, ChecksumAlgo::Sha256);
        header.set_flag(FLAG_CRYPTO, true);
        header.crypto = Some(CryptoParams::generate(CryptoAlgo::Aes, 32));
        let key = vec![5u8; 32];

        let mut buf = Vec::new();
        header.write(&mut buf, Some(&key)).unwrap();
        let (parsed, consumed) = ArchiveHeader::read(&buf, Some(&key)).unwrap();
        assert_eq!(consumed, buf.len());
        assert!(parsed.crypto_enabled());
        assert_eq!(parsed.crypto.unwrap().salt.len(), crate::crypto::SALT_LEN);
    }

    #[test]
    fn header_tamper_is_detected() {
        let header = ArchiveHeader::new(AlgoId::None, 4096, 1, ChecksumAlgo::Crc32);
        let mut buf = Vec::new();
        header.write(&mut buf, None).unwrap();
        buf[0] ^= 0xFF;
        assert!(ArchiveHeader::read(&buf, None).is_err());
    }

    #[test]
    fn version_boundary_matches_open_question_b() {
        assert!(validate_version(VERSION_MIN).is_ok());
        assert!(validate_version(VERSION_MIN - 1).is_err());
        assert!(validate_version(VERSION).is_ok());
        assert!(validate_version(VERSION + 1).is_err());
    }
}
