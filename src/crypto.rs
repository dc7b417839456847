//! PKWARE traditional encryption ("ZipCrypto"), spec §4.5.
//!
//! Three 32-bit keys are mixed with every plaintext byte as it is
//! encrypted/decrypted; the stream cipher is symmetric (the same
//! `update_keys` step runs regardless of direction, fed with the plaintext
//! byte in both cases). A 12-byte encryption header precedes the compressed
//! data; its last byte doubles as a cheap password check before committing
//! to decrypting the whole entry -- normally the CRC-32's high byte, or the
//! DOS mtime's high byte when general-purpose bit 3 defers the CRC to a
//! trailing data descriptor.

use crate::crc32::CRC32_TABLE;

const KEY0_INIT: u32 = 0x1234_5678;
const KEY1_INIT: u32 = 0x2345_6789;
const KEY2_INIT: u32 = 0x3456_7890;

/// Size of the PKWARE encryption header prepended to each encrypted entry's
/// compressed data.
pub const HEADER_LEN: usize = 12;

/// What the last byte of the decrypted header must equal for a password to
/// be accepted, per spec §4.3/§4.4: ordinarily the high byte of the entry's
/// CRC-32, but the high byte of the DOS mtime when general-purpose bit 3 (CRC
/// deferred to a trailing data descriptor) is set. Either way it is a single
/// byte check against `header[11]`; `header[10]` is pseudo-random filler.
#[derive(Debug, Clone, Copy)]
pub enum PasswordCheck {
    /// Single-byte check against the CRC-32's high byte.
    CrcHighByte(u8),
    /// Single-byte check against the DOS time's high byte (used when the CRC
    /// isn't known yet at header-write time).
    DosTimeHighByte(u8),
}

/// Running PKWARE traditional encryption/decryption state.
#[derive(Debug, Clone, Copy)]
pub struct ZipCrypto {
    k0: u32,
    k1: u32,
    k2: u32,
}

impl ZipCrypto {
    /// Derives the initial key state from a password, per spec §4.5 ("three
    /// keys seeded from fixed constants, then mixed with every password byte
    /// in turn").
    pub fn from_password(password: &[u8]) -> Self {
        let mut s = Self {
            k0: KEY0_INIT,
            k1: KEY1_INIT,
            k2: KEY2_INIT,
        };
        for &b in password {
            s.update_keys(b);
        }
        s
    }

    fn update_keys(&mut self, byte: u8) {
        self.k0 = crc32_mix(self.k0, byte);
        self.k1 = self.k1.wrapping_add(self.k0 & 0xff);
        self.k1 = self.k1.wrapping_mul(134775813).wrapping_add(1);
        self.k2 = crc32_mix(self.k2, (self.k1 >> 24) as u8);
    }

    fn keystream_byte(&self) -> u8 {
        let temp = (self.k2 | 2) as u16;
        (temp.wrapping_mul(temp ^ 1) >> 8) as u8
    }

    /// Decrypts `buf` in place, advancing the key state with each recovered
    /// plaintext byte.
    pub fn decrypt(&mut self, buf: &mut [u8]) {
        for c in buf.iter_mut() {
            let plain = *c ^ self.keystream_byte();
            *c = plain;
            self.update_keys(plain);
        }
    }

    /// Encrypts `buf` in place, advancing the key state with each consumed
    /// plaintext byte (mixed in before XOR-ing, same as decryption -- the
    /// cipher is its own inverse operation applied to the plaintext stream).
    pub fn encrypt(&mut self, buf: &mut [u8]) {
        for c in buf.iter_mut() {
            let plain = *c;
            *c = plain ^ self.keystream_byte();
            self.update_keys(plain);
        }
    }

    /// Decrypts the 12-byte encryption header and checks it against `check`,
    /// returning whether the password was accepted. Consumes `self` because
    /// a failed attempt leaves meaningless key state; callers should
    /// re-derive with [`ZipCrypto::from_password`] for the next candidate.
    pub fn verify_header(mut self, header: &mut [u8; HEADER_LEN], check: PasswordCheck) -> bool {
        self.decrypt(header);
        match check {
            PasswordCheck::CrcHighByte(expected) => header[11] == expected,
            PasswordCheck::DosTimeHighByte(expected) => header[11] == expected,
        }
    }
}

fn crc32_mix(crc: u32, byte: u8) -> u32 {
    CRC32_TABLE[((crc as u8) ^ byte) as usize] ^ (crc >> 8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc32::crc32;

    #[test]
    fn round_trips_header_and_payload() {
        let password = b"hunter2";
        let plaintext = b"the quick brown fox jumps over the lazy dog";
        let crc = crc32(plaintext);

        let mut enc = ZipCrypto::from_password(password);
        let mut header = [0xAAu8; HEADER_LEN];
        header[10] = 0x00;
        header[11] = (crc >> 24) as u8;
        enc.encrypt(&mut header);
        let mut payload = *plaintext;
        enc.encrypt(&mut payload);

        let mut dec = ZipCrypto::from_password(password);
        let mut header_copy = header;
        let ok = dec.verify_header(&mut header_copy, PasswordCheck::CrcHighByte((crc >> 24) as u8));
        assert!(ok);

        let mut dec2 = ZipCrypto::from_password(password);
        let mut recovered_header = header;
        dec2.decrypt(&mut recovered_header);
        let mut recovered = payload;
        dec2.decrypt(&mut recovered);
        assert_eq!(&recovered, plaintext);
    }

    #[test]
    fn wrong_password_fails_header_check() {
        let crc = crc32(b"data");
        let mut enc = ZipCrypto::from_password(b"correct horse");
        let mut header = [0x11u8; HEADER_LEN];
        header[11] = (crc >> 24) as u8;
        enc.encrypt(&mut header);

        let dec = ZipCrypto::from_password(b"wrong password");
        let mut header_copy = header;
        let ok = dec.verify_header(&mut header_copy, PasswordCheck::CrcHighByte((crc >> 24) as u8));
        assert!(!ok);
    }

    #[test]
    fn dos_time_high_byte_check_variant() {
        let dos_time: u16 = 0xABCD;
        let mut enc = ZipCrypto::from_password(b"pw");
        let mut header = [0x22u8; HEADER_LEN];
        header[10] = 0x99; // pseudo-random filler, not checked
        header[11] = (dos_time >> 8) as u8;
        enc.encrypt(&mut header);

        let dec = ZipCrypto::from_password(b"pw");
        let mut header_copy = header;
        assert!(dec.verify_header(
            &mut header_copy,
            PasswordCheck::DosTimeHighByte((dos_time >> 8) as u8)
        ));
    }
}
