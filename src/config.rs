//! On-disk constants for ProFile volumes.
//!
//! Several of the "standard" values below were recovered empirically from
//! volumes written by the Lisa Office System. Their meaning is unknown; they
//! are written verbatim because the consuming OS rejects volumes without them.

pub const SECTOR_SIZE: usize = 512;
pub const TAG_SIZE: usize = 20;

// Disk Copy 4.2 container header
pub const DC42_HEADER_LEN: usize = 0x54;
pub const DC42_NAME_LEN: usize = 63; // Pascal string, length byte at offset 0
pub const DC42_DATA_SIZE: usize = 0x40;
pub const DC42_TAG_SIZE: usize = 0x44;
pub const DC42_DATA_CHECKSUM: usize = 0x48;
pub const DC42_TAG_CHECKSUM: usize = 0x4C;
pub const DC42_ENCODING: usize = 0x50;
pub const DC42_FORMAT: usize = 0x51;
pub const DC42_MAGIC_OFFSET: usize = 0x52;
pub const DC42_MAGIC: u16 = 0x0100;

pub const PROFILE_5MB_SECTORS: u32 = 0x2600;
pub const PROFILE_5MB_MDDF_SECTOR: u32 = 0x26;

// Tag layout
pub const TAG_VERSION: usize = 0;
pub const TAG_VOLID: usize = 2;
pub const TAG_FILE_ID: usize = 4;
pub const TAG_DATA_USED: usize = 6;
pub const TAG_ABS_PAGE: usize = 8; // u24
pub const TAG_CHECKSUM: usize = 11;
pub const TAG_REL_PAGE: usize = 12;
pub const TAG_FWD_LINK: usize = 14; // u24
pub const TAG_BKWD_LINK: usize = 17; // u24
pub const NIL_LINK: u32 = 0x00FF_FFFF;

// Tag file ids
pub const FILE_ID_FREE: u16 = 0x0000;
pub const FILE_ID_MDDF: u16 = 0x0001;
pub const FILE_ID_BITMAP: u16 = 0x0002;
pub const FILE_ID_SFILE: u16 = 0x0003;
pub const FILE_ID_CATALOG: u16 = 0x0004;
pub const FILE_ID_ERASED: u16 = 0x7FFF;
pub const FILE_ID_BOOT: u16 = 0xAAAA;
pub const FILE_ID_LOADER: u16 = 0xBBBB;
pub const HINT_ID_FIRST: u16 = 0xFFFB; // hint ids count down from here
pub const HINT_ID_LAST: u16 = 0x8000;

// Tag "standard" values
pub const VOLID_DATA: u16 = 0x0000;
pub const VOLID_HINT: u16 = 0x0100;
pub const VOLID_CATALOG: u16 = 0x2500;
pub const DATA_USED_FULL: u16 = 0x8200;
pub const DATA_USED_HINT: u16 = 0x8000;

// MDDF field offsets. Those marked unconfirmed were never observed being
// read or written by a working tool.
pub const MDDF_BITMAP_ADDR: usize = 0x88; // u32, unconfirmed
pub const MDDF_BITMAP_SIZE: usize = 0x8C; // u16, unconfirmed
pub const MDDF_SLIST_ADDR: usize = 0x94; // u32
pub const MDDF_SLIST_PACKING: usize = 0x98; // u16
pub const MDDF_SLIST_BLOCKS: usize = 0x9A; // u16
pub const MDDF_FIRST_FILE: usize = 0x9C; // u16, unconfirmed
pub const MDDF_EMPTY_FILE: usize = 0x9E; // u16
pub const MDDF_FILE_COUNT: usize = 0xB0; // u16
pub const MDDF_FREE_COUNT: usize = 0xBA; // u32
pub const MDDF_ROOT_PAGE: usize = 0xBE; // u32, unconfirmed

// S-File table
pub const SFILE_RECORD_SIZE: usize = 14;
pub const SFILE_RECORDS_PER_SECTOR: u16 = (SECTOR_SIZE / SFILE_RECORD_SIZE) as u16;
pub const SFILE_FIRST_USER_ID: u16 = 10;

// Hint sector
pub const HINT_NAME_LEN: usize = 0;
pub const HINT_NAME: usize = 1;
pub const HINT_TYPE_LEN: usize = 4;
pub const HINT_SECTOR_COUNT: usize = 130;
pub const HINT_START_PAGE: usize = 138;
pub const HINT_SECTOR_COUNT_AGAIN: usize = 140;
pub const HINT_CREATED: usize = 46;
pub const HINT_MODIFIED: usize = 54;
/// Opaque (offset, value) pairs every hint sector carries.
pub const HINT_STANDARD_LONGS: [(usize, u32); 8] = [
    (34, 0xA24A_228C),
    (38, 0x0100_0000),
    (42, 0x0015_0E00),
    (50, 0xA24A_22A2),
    (100, 0x4E56_FEFC),
    (104, 0x206E_000C),
    (108, 0x0000_0001),
    (132, 0x0009_0001),
];

// Catalog
pub const CATALOG_BLOCK_SECTORS: usize = 4;
pub const CATALOG_BLOCK_SIZE: usize = SECTOR_SIZE * CATALOG_BLOCK_SECTORS;
pub const CATALOG_MAGIC: [u8; 3] = [0x24, 0x00, 0x00];
pub const CATALOG_ENTRY_SIZE: usize = 64;
pub const CATALOG_LEAF_CAPACITY: usize = 29;
pub const CATALOG_SEPARATOR_SIZE: usize = 40;
pub const CATALOG_NODE_CAPACITY: usize = 48;
// Trailer, in the last sector of the block. The sibling links sit where
// volumes written by the Lisa OS keep them, 10 and 6 bytes from the end.
pub const CATALOG_KIND: usize = CATALOG_BLOCK_SIZE - 12; // u16, unconfirmed
pub const CATALOG_PREV: usize = CATALOG_BLOCK_SIZE - 10; // u32 page
pub const CATALOG_NEXT: usize = CATALOG_BLOCK_SIZE - 6; // u32 page
pub const CATALOG_COUNT: usize = CATALOG_BLOCK_SIZE - 2; // u16, 0 ends an empty block
pub const CATALOG_NIL: u32 = 0xFFFF_FFFF;
pub const CATALOG_KIND_LEAF: u16 = 0;
pub const CATALOG_KIND_NODE: u16 = 1; // any other kind value reads as a leaf

// Catalog entry layout
pub const KEY_LEN: u8 = 0x24;
pub const KEY_SIZE: usize = 36;
pub const KEY_NAME: usize = 3;
pub const MAX_NAME_LEN: usize = 32;
/// Longest name that still fits the hint sector ahead of its fixed fields.
pub const MAX_FILE_NAME_LEN: usize = 28;
pub const ENTRY_TYPE: usize = 36;
pub const ENTRY_SFILE: usize = 38;
pub const ENTRY_CREATED: usize = 40;
pub const ENTRY_MODIFIED: usize = 44;
pub const ENTRY_SIZE: usize = 48;
pub const ENTRY_PHYS_SIZE: usize = 52;
pub const ENTRY_OVERHEAD: usize = 56;
pub const ENTRY_FLAGS: usize = 58;
pub const ENTRY_TYPE_FILE: u16 = 0x0300;
pub const ENTRY_OVERHEAD_STANDARD: u16 = 0x0001;

/// Seconds between 1901-01-01 (the Lisa epoch) and 1970-01-01.
pub const LISA_EPOCH_OFFSET: u64 = 2_177_452_800;

/// Container geometry. Sector and tag sizes never vary; only the header
/// length and the number of sectors do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub header_len: usize,
    pub num_sectors: u32,
}

impl Geometry {
    /// A 5 MB ProFile in a Disk Copy 4.2 container.
    pub const PROFILE_5MB: Self = Self {
        header_len: DC42_HEADER_LEN,
        num_sectors: PROFILE_5MB_SECTORS,
    };

    pub const fn new(num_sectors: u32) -> Self {
        Self { header_len: DC42_HEADER_LEN, num_sectors }
    }

    pub const fn image_len(&self) -> usize {
        self.header_len + self.num_sectors as usize * (SECTOR_SIZE + TAG_SIZE)
    }

    pub const fn data_offset(&self) -> usize {
        self.header_len
    }

    pub const fn tag_offset(&self) -> usize {
        self.header_len + self.num_sectors as usize * SECTOR_SIZE
    }
}
