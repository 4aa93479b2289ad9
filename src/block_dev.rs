use byteorder::{BigEndian, ByteOrder};

use crate::config::*;
use crate::structs::Tag;

/// Addressed access to the data sectors and the parallel tag records of a volume.
///
/// Sector indices are absolute (sector 0 is the boot sector). Indexing past
/// `num_sectors()` is a programming error and panics.
pub trait SectorDevice {
    /// Returns the number of sectors on the volume.
    fn num_sectors(&self) -> u32;

    /// `count` consecutive sectors of data as one slice.
    fn sectors(&self, first: u32, count: usize) -> &[u8];

    fn sectors_mut(&mut self, first: u32, count: usize) -> &mut [u8];

    /// The raw tag record of a sector, `TAG_SIZE` bytes.
    fn raw_tag(&self, sector: u32) -> &[u8];

    fn raw_tag_mut(&mut self, sector: u32) -> &mut [u8];

    fn sector(&self, sector: u32) -> &[u8] {
        self.sectors(sector, 1)
    }

    fn sector_mut(&mut self, sector: u32) -> &mut [u8] {
        self.sectors_mut(sector, 1)
    }

    fn read_tag(&self, sector: u32) -> Tag {
        Tag::parse(self.raw_tag(sector))
    }

    /// Writes every tag field except the checksum byte, which the
    /// checksum pass owns.
    fn write_tag(&mut self, sector: u32, tag: &Tag) {
        tag.encode(self.raw_tag_mut(sector));
    }

    fn tag_file_id(&self, sector: u32) -> u16 {
        BigEndian::read_u16(&self.raw_tag(sector)[TAG_FILE_ID..])
    }
}
