use byteorder::{BigEndian, ByteOrder};

use crate::config::*;
use crate::name::{encode_name, trim_zero};

/// Per-sector tag record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tag {
    pub version: u16,
    pub volid: u16,
    pub file_id: u16,   // 0 = free, 0x7FFF = erased
    pub data_used: u16,
    pub abs_page: u32,  // u24 on disk
    pub checksum: u8,   // XOR of sector data and the other 19 tag bytes
    pub rel_page: u16,
    pub fwd_link: u32,  // u24 on disk, NIL_LINK = none
    pub bkwd_link: u32, // u24 on disk, NIL_LINK = none
}

impl Tag {
    pub fn parse(raw: &[u8]) -> Self {
        Self {
            version: BigEndian::read_u16(&raw[TAG_VERSION..]),
            volid: BigEndian::read_u16(&raw[TAG_VOLID..]),
            file_id: BigEndian::read_u16(&raw[TAG_FILE_ID..]),
            data_used: BigEndian::read_u16(&raw[TAG_DATA_USED..]),
            abs_page: BigEndian::read_u24(&raw[TAG_ABS_PAGE..]),
            checksum: raw[TAG_CHECKSUM],
            rel_page: BigEndian::read_u16(&raw[TAG_REL_PAGE..]),
            fwd_link: BigEndian::read_u24(&raw[TAG_FWD_LINK..]),
            bkwd_link: BigEndian::read_u24(&raw[TAG_BKWD_LINK..]),
        }
    }

    /// Encodes every field but the checksum byte.
    pub fn encode(&self, raw: &mut [u8]) {
        BigEndian::write_u16(&mut raw[TAG_VERSION..], self.version);
        BigEndian::write_u16(&mut raw[TAG_VOLID..], self.volid);
        BigEndian::write_u16(&mut raw[TAG_FILE_ID..], self.file_id);
        BigEndian::write_u16(&mut raw[TAG_DATA_USED..], self.data_used);
        BigEndian::write_u24(&mut raw[TAG_ABS_PAGE..], self.abs_page & NIL_LINK);
        BigEndian::write_u16(&mut raw[TAG_REL_PAGE..], self.rel_page);
        BigEndian::write_u24(&mut raw[TAG_FWD_LINK..], self.fwd_link & NIL_LINK);
        BigEndian::write_u24(&mut raw[TAG_BKWD_LINK..], self.bkwd_link & NIL_LINK);
    }

    pub fn is_free(&self) -> bool {
        self.file_id == FILE_ID_FREE
    }

    /// A tag with no links owned by `file_id`.
    pub fn owned(file_id: u16, volid: u16, data_used: u16, abs_page: u32) -> Self {
        Self {
            version: 0,
            volid,
            file_id,
            data_used,
            abs_page,
            checksum: 0,
            rel_page: 0,
            fwd_link: NIL_LINK,
            bkwd_link: NIL_LINK,
        }
    }
}

/// Scalar fields of the volume descriptor. Every location is a page, i.e. a
/// sector index relative to the MDDF's own sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mddf {
    pub sector: u32,        // absolute sector holding the MDDF
    pub bitmap_addr: u32,
    pub bitmap_size: u16,   // sectors
    pub slist_addr: u32,
    pub slist_packing: u16, // records per sector
    pub slist_blocks: u16,  // sectors
    pub first_file: u16,    // identifier floor
    pub empty_file: u16,    // lowest free identifier
    pub file_count: u16,
    pub free_count: u32,
    pub root_page: u32,     // catalog root block
}

impl Mddf {
    pub fn parse(sector: u32, raw: &[u8]) -> Self {
        Self {
            sector,
            bitmap_addr: BigEndian::read_u32(&raw[MDDF_BITMAP_ADDR..]),
            bitmap_size: BigEndian::read_u16(&raw[MDDF_BITMAP_SIZE..]),
            slist_addr: BigEndian::read_u32(&raw[MDDF_SLIST_ADDR..]),
            slist_packing: BigEndian::read_u16(&raw[MDDF_SLIST_PACKING..]),
            slist_blocks: BigEndian::read_u16(&raw[MDDF_SLIST_BLOCKS..]),
            first_file: BigEndian::read_u16(&raw[MDDF_FIRST_FILE..]),
            empty_file: BigEndian::read_u16(&raw[MDDF_EMPTY_FILE..]),
            file_count: BigEndian::read_u16(&raw[MDDF_FILE_COUNT..]),
            free_count: BigEndian::read_u32(&raw[MDDF_FREE_COUNT..]),
            root_page: BigEndian::read_u32(&raw[MDDF_ROOT_PAGE..]),
        }
    }

    /// Writes the known fields, leaving every other byte of the sector alone.
    pub fn encode(&self, raw: &mut [u8]) {
        BigEndian::write_u32(&mut raw[MDDF_BITMAP_ADDR..], self.bitmap_addr);
        BigEndian::write_u16(&mut raw[MDDF_BITMAP_SIZE..], self.bitmap_size);
        BigEndian::write_u32(&mut raw[MDDF_SLIST_ADDR..], self.slist_addr);
        BigEndian::write_u16(&mut raw[MDDF_SLIST_PACKING..], self.slist_packing);
        BigEndian::write_u16(&mut raw[MDDF_SLIST_BLOCKS..], self.slist_blocks);
        BigEndian::write_u16(&mut raw[MDDF_FIRST_FILE..], self.first_file);
        BigEndian::write_u16(&mut raw[MDDF_EMPTY_FILE..], self.empty_file);
        BigEndian::write_u16(&mut raw[MDDF_FILE_COUNT..], self.file_count);
        BigEndian::write_u32(&mut raw[MDDF_FREE_COUNT..], self.free_count);
        BigEndian::write_u32(&mut raw[MDDF_ROOT_PAGE..], self.root_page);
    }

    pub fn sector_of(&self, page: u32) -> u32 {
        self.sector + page
    }

    pub fn page_of(&self, sector: u32) -> u32 {
        sector - self.sector
    }
}

/// One S-File record: where a file's hint sector and data live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SFileRecord {
    pub hint_page: u32, // 0 = unclaimed
    pub start_page: u32,
    pub length: u32,    // bytes
    pub version: u16,
}

impl SFileRecord {
    pub fn parse(raw: &[u8]) -> Self {
        Self {
            hint_page: BigEndian::read_u32(&raw[0..]),
            start_page: BigEndian::read_u32(&raw[4..]),
            length: BigEndian::read_u32(&raw[8..]),
            version: BigEndian::read_u16(&raw[12..]),
        }
    }

    pub fn encode(&self, raw: &mut [u8]) {
        BigEndian::write_u32(&mut raw[0..], self.hint_page);
        BigEndian::write_u32(&mut raw[4..], self.start_page);
        BigEndian::write_u32(&mut raw[8..], self.length);
        BigEndian::write_u16(&mut raw[12..], self.version);
    }

    pub fn is_claimed(&self) -> bool {
        self.hint_page != 0
    }
}

/// A leaf catalog record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub sfile: u16,
    pub created: u32,
    pub modified: u32,
    pub size: u32,
    pub phys_size: u32,
    pub flags: u16,
}

impl CatalogEntry {
    pub fn parse(raw: &[u8]) -> Self {
        Self {
            name: parse_key_name(raw),
            sfile: BigEndian::read_u16(&raw[ENTRY_SFILE..]),
            created: BigEndian::read_u32(&raw[ENTRY_CREATED..]),
            modified: BigEndian::read_u32(&raw[ENTRY_MODIFIED..]),
            size: BigEndian::read_u32(&raw[ENTRY_SIZE..]),
            phys_size: BigEndian::read_u32(&raw[ENTRY_PHYS_SIZE..]),
            flags: BigEndian::read_u16(&raw[ENTRY_FLAGS..]),
        }
    }

    pub fn encode(&self, raw: &mut [u8]) {
        raw[..CATALOG_ENTRY_SIZE].fill(0);
        encode_key(&self.name, raw);
        BigEndian::write_u16(&mut raw[ENTRY_TYPE..], ENTRY_TYPE_FILE);
        BigEndian::write_u16(&mut raw[ENTRY_SFILE..], self.sfile);
        BigEndian::write_u32(&mut raw[ENTRY_CREATED..], self.created);
        BigEndian::write_u32(&mut raw[ENTRY_MODIFIED..], self.modified);
        BigEndian::write_u32(&mut raw[ENTRY_SIZE..], self.size);
        BigEndian::write_u32(&mut raw[ENTRY_PHYS_SIZE..], self.phys_size);
        BigEndian::write_u16(&mut raw[ENTRY_OVERHEAD..], ENTRY_OVERHEAD_STANDARD);
        BigEndian::write_u16(&mut raw[ENTRY_FLAGS..], self.flags);
    }
}

/// A non-leaf catalog record: the first key of `child`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Separator {
    pub name: String,
    pub child: u32, // page of the child block
}

impl Separator {
    pub fn parse(raw: &[u8]) -> Self {
        Self {
            name: parse_key_name(raw),
            child: BigEndian::read_u32(&raw[KEY_SIZE..]),
        }
    }

    pub fn encode(&self, raw: &mut [u8]) {
        raw[..CATALOG_SEPARATOR_SIZE].fill(0);
        encode_key(&self.name, raw);
        BigEndian::write_u32(&mut raw[KEY_SIZE..], self.child);
    }
}

// Key: length byte, 2-byte parent id (always 0 on a flat volume), 32-byte name.
fn encode_key(name: &str, raw: &mut [u8]) {
    raw[0] = KEY_LEN;
    raw[1] = 0;
    raw[2] = 0;
    raw[KEY_NAME..KEY_NAME + MAX_NAME_LEN].copy_from_slice(&encode_name(name));
}

fn parse_key_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(trim_zero(&raw[KEY_NAME..KEY_NAME + MAX_NAME_LEN])).into_owned()
}
