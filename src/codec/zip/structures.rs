use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use anyhow::{Result, bail};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    /// WinZip AES marker; the real method lives in the 0x9901 extra field.
    Aes,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            99 => CompressionMethod::Aes,
            _ => CompressionMethod::Unknown(value),
        }
    }
}

/// General purpose bit 0: entry is encrypted.
pub const FLAG_ENCRYPTED: u16 = 0x0001;
/// General purpose bit 6: strong encryption (PKWARE SES), not supported.
pub const FLAG_STRONG_ENCRYPTION: u16 = 0x0040;

/// How an entry is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryEncryption {
    None,
    /// Traditional PKWARE stream cipher.
    ZipCrypto,
    /// WinZip AE-1/AE-2
    Aes,
    /// PKWARE strong encryption, which cannot be checked
    Unsupported,
}

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Invalid End of Central Directory");
        }

        // Skip the two disk-number fields; multi-disk archives are not handled.
        let mut cursor = Cursor::new(&data[8..]);

        Ok(Self {
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub eocd64_offset: u64,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 locator");
        }

        let mut cursor = Cursor::new(&data[8..]);
        Ok(Self {
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64EOCD {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 End of Central Directory");
        }

        // record size, versions and disk numbers precede the counters
        let mut cursor = Cursor::new(&data[32..]);
        Ok(Self {
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";

/// Parsed ZIP file entry information
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub is_directory: bool,
}

impl ZipFileEntry {
    pub fn encryption(&self) -> EntryEncryption {
        if self.flags & FLAG_ENCRYPTED == 0 {
            EntryEncryption::None
        } else if self.flags & FLAG_STRONG_ENCRYPTION != 0 {
            EntryEncryption::Unsupported
        } else if self.compression_method == CompressionMethod::Aes {
            EntryEncryption::Aes
        } else {
            EntryEncryption::ZipCrypto
        }
    }

    /// Whether a password can be checked against this entry.
    pub fn is_attackable(&self) -> bool {
        !self.is_directory
            && matches!(
                self.encryption(),
                EntryEncryption::ZipCrypto | EntryEncryption::Aes
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(flags: u16, method: u16) -> ZipFileEntry {
        ZipFileEntry {
            file_name: "a.txt".to_string(),
            flags,
            compression_method: CompressionMethod::from_u16(method),
            compressed_size: 20,
            uncompressed_size: 8,
            crc32: 0xAB12_3456,
            is_directory: false,
        }
    }

    #[test]
    fn classifies_encryption() {
        assert_eq!(entry(0, 8).encryption(), EntryEncryption::None);
        assert_eq!(entry(FLAG_ENCRYPTED, 8).encryption(), EntryEncryption::ZipCrypto);
        assert_eq!(entry(FLAG_ENCRYPTED, 99).encryption(), EntryEncryption::Aes);
        assert_eq!(
            entry(FLAG_ENCRYPTED | FLAG_STRONG_ENCRYPTION, 0).encryption(),
            EntryEncryption::Unsupported
        );
    }

    #[test]
    fn aes_entries_are_attackable_but_strong_ones_are_not() {
        assert!(entry(FLAG_ENCRYPTED, 99).is_attackable());
        assert!(entry(FLAG_ENCRYPTED, 8).is_attackable());
        assert!(!entry(FLAG_ENCRYPTED | FLAG_STRONG_ENCRYPTION, 8).is_attackable());
        assert!(!entry(0, 8).is_attackable());

        let mut dir = entry(FLAG_ENCRYPTED, 0);
        dir.is_directory = true;
        assert!(!dir.is_attackable());
    }
}
