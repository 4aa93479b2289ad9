//! Management of the free-space bitmap.
//! One bit per page, eight pages per byte, least significant bit first.
//! Tags are the ground truth for whether a sector is in use; the bitmap is
//! always rederived from them a whole byte at a time, never toggled bit by bit.

use tracing::trace;

use crate::block_dev::SectorDevice;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::structs::Mddf;

/// Free according to the sector's tag.
pub fn tag_is_free(device: &impl SectorDevice, sector: u32) -> bool {
    device.tag_file_id(sector) == FILE_ID_FREE
}

/// (bitmap sector, byte offset within it, bit) for a sector.
fn locate_bit(mddf: &Mddf, sector: u32) -> (u32, usize, u8) {
    assert!(sector >= mddf.sector, "sector {} lies before the MDDF", sector);
    let page = mddf.page_of(sector) as usize;
    let byte_index = page / 8;
    let bitmap_sector = byte_index / SECTOR_SIZE;
    assert!(
        bitmap_sector < mddf.bitmap_size as usize,
        "page {} outside a {}-sector bitmap",
        page,
        mddf.bitmap_size
    );
    (
        mddf.sector_of(mddf.bitmap_addr) + bitmap_sector as u32,
        byte_index % SECTOR_SIZE,
        (page % 8) as u8,
    )
}

/// Free according to the bitmap. Sectors ahead of the MDDF are never free.
pub fn is_free(device: &impl SectorDevice, mddf: &Mddf, sector: u32) -> bool {
    if sector < mddf.sector {
        return false;
    }
    let (bitmap_sector, offset, bit) = locate_bit(mddf, sector);
    device.sector(bitmap_sector)[offset] & (1 << bit) == 0
}

/// Bitmap byte covering `sector`'s group of eight, computed from tags.
fn group_byte(device: &impl SectorDevice, mddf: &Mddf, sector: u32) -> u8 {
    let base = mddf.sector_of(mddf.page_of(sector) & !7);
    (0..8u32).fold(0u8, |byte, k| {
        let s = base + k;
        if s < device.num_sectors() && !tag_is_free(device, s) {
            byte | (1 << k)
        } else {
            byte
        }
    })
}

/// Rewrites the bitmap byte holding `sector` from the tags of all eight
/// sectors in its group. Call right after writing the sector's tag.
pub fn mark_allocated(device: &mut impl SectorDevice, mddf: &Mddf, sector: u32) {
    let (bitmap_sector, offset, _) = locate_bit(mddf, sector);
    let byte = group_byte(device, mddf, sector);
    trace!("bitmap byte for sector {:#x} = {:#04x}", sector, byte);
    device.sector_mut(bitmap_sector)[offset] = byte;
}

/// Rederives every bitmap byte from the tags.
pub fn rebuild(device: &mut impl SectorDevice, mddf: &Mddf) {
    let mut sector = mddf.sector;
    while sector < device.num_sectors() {
        mark_allocated(device, mddf, sector);
        sector += 8;
    }
}

/// Fails on the first sector whose bitmap bit disagrees with its tag.
pub fn check_consistency(device: &impl SectorDevice, mddf: &Mddf) -> Result<()> {
    for sector in mddf.sector..device.num_sectors() {
        if is_free(device, mddf, sector) != tag_is_free(device, sector) {
            return Err(FsError::IntegrityViolation(format!(
                "bitmap and tag disagree for sector {:#x}",
                sector
            )));
        }
    }
    Ok(())
}
