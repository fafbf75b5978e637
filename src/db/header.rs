//! On-disk database header (page 0).
//!
//! The header pins the format version and the comparator configuration and
//! holds the roots every other structure is reached from. Record layouts
//! and comparator behavior are bit-exact per version: any change bumps the
//! version, and an existing database with a different version or
//! comparator stamp is refused as unusable rather than repaired.

use crate::error::{DbError, Result};
use crate::pager::PageId;
use crate::store::{RecordRef, NULL_REF};

const MAGIC: &[u8; 8] = b"SYMDEXDB";
const VERSION_MAJOR: u16 = 1;
const VERSION_MINOR: u16 = 0;
/// Bytes of page 0 occupied by the header.
pub const HEADER_REGION_SIZE: usize = 48;

const FLAG_CASE_SENSITIVE: u8 = 0x01;

/// Parsed header state.
#[derive(Debug, Clone)]
pub struct HeaderState {
    /// Comparator configuration stamped at creation.
    pub case_sensitive: bool,
    /// Ordered-index roots per language partition.
    pub linkage_roots: [RecordRef; 2],
    /// Root of the file index.
    pub file_index_root: RecordRef,
    /// Allocator: head of the free-page list.
    pub free_page_head: Option<PageId>,
    /// Allocator: most recently written record page.
    pub last_record_page: Option<PageId>,
}

impl HeaderState {
    /// Fresh header for a new database.
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            case_sensitive,
            linkage_roots: [NULL_REF; 2],
            file_index_root: NULL_REF,
            free_page_head: None,
            last_record_page: None,
        }
    }

    /// Reads the header region. Returns `None` for a fresh all-zero page.
    pub fn read(data: &[u8]) -> Result<Option<Self>> {
        if data.len() < HEADER_REGION_SIZE {
            return Err(DbError::Corruption(
                "header page shorter than expected".into(),
            ));
        }
        if data[..MAGIC.len()].iter().all(|&b| b == 0) {
            return Ok(None);
        }
        if &data[..MAGIC.len()] != MAGIC {
            return Err(DbError::Corruption("invalid database magic".into()));
        }

        let major = u16::from_le_bytes([data[8], data[9]]);
        let minor = u16::from_le_bytes([data[10], data[11]]);
        if major != VERSION_MAJOR || minor != VERSION_MINOR {
            return Err(DbError::Corruption(format!(
                "unsupported database version {major}.{minor}, full rebuild required"
            )));
        }

        let flags = data[12];
        let read_ref = |offset: usize| {
            RecordRef::from_u64(u64::from_le_bytes(
                data[offset..offset + 8]
                    .try_into()
                    .expect("slice is 8 bytes"),
            ))
        };
        let free_page_head =
            u32::from_le_bytes([data[40], data[41], data[42], data[43]]);
        let last_record_page =
            u32::from_le_bytes([data[44], data[45], data[46], data[47]]);

        Ok(Some(Self {
            case_sensitive: flags & FLAG_CASE_SENSITIVE != 0,
            linkage_roots: [read_ref(16), read_ref(24)],
            file_index_root: read_ref(32),
            free_page_head: (free_page_head != 0).then_some(free_page_head),
            last_record_page: (last_record_page != 0).then_some(last_record_page),
        }))
    }

    /// Writes the header region.
    pub fn write(&self, data: &mut [u8]) -> Result<()> {
        if data.len() < HEADER_REGION_SIZE {
            return Err(DbError::Corruption(
                "header page shorter than expected".into(),
            ));
        }
        data[..HEADER_REGION_SIZE].fill(0);
        data[..MAGIC.len()].copy_from_slice(MAGIC);
        data[8..10].copy_from_slice(&VERSION_MAJOR.to_le_bytes());
        data[10..12].copy_from_slice(&VERSION_MINOR.to_le_bytes());
        data[12] = if self.case_sensitive {
            FLAG_CASE_SENSITIVE
        } else {
            0
        };
        data[16..24].copy_from_slice(&self.linkage_roots[0].to_u64().to_le_bytes());
        data[24..32].copy_from_slice(&self.linkage_roots[1].to_u64().to_le_bytes());
        data[32..40].copy_from_slice(&self.file_index_root.to_u64().to_le_bytes());
        data[40..44].copy_from_slice(&self.free_page_head.unwrap_or(0).to_le_bytes());
        data[44..48].copy_from_slice(&self.last_record_page.unwrap_or(0).to_le_bytes());
        Ok(())
    }
}
