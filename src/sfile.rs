//! The S-File table: a sparse array indexed by file identifier, each record
//! locating a file's hint sector and data run.

use tracing::{debug, instrument};

use crate::bitmap::{mark_allocated, tag_is_free};
use crate::block_dev::SectorDevice;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::hint::{write_hint_sector, HintInfo};
use crate::mddf::{consume_free, write_mddf};
use crate::structs::{Mddf, SFileRecord};

/// Number of identifiers the table can hold.
pub fn capacity(mddf: &Mddf) -> u32 {
    mddf.slist_blocks as u32 * mddf.slist_packing as u32
}

/// (sector, byte offset) of a record.
fn record_location(mddf: &Mddf, id: u16) -> (u32, usize) {
    assert!((id as u32) < capacity(mddf), "identifier {} outside s-file table", id);
    let packing = mddf.slist_packing;
    let sector = mddf.sector_of(mddf.slist_addr) + (id / packing) as u32;
    (sector, (id % packing) as usize * SFILE_RECORD_SIZE)
}

pub fn read_record(device: &impl SectorDevice, mddf: &Mddf, id: u16) -> SFileRecord {
    let (sector, offset) = record_location(mddf, id);
    SFileRecord::parse(&device.sector(sector)[offset..offset + SFILE_RECORD_SIZE])
}

pub fn write_record(device: &mut impl SectorDevice, mddf: &Mddf, id: u16, record: &SFileRecord) {
    let (sector, offset) = record_location(mddf, id);
    record.encode(&mut device.sector_mut(sector)[offset..offset + SFILE_RECORD_SIZE]);
}

/// First sector after the table; hint sectors are searched from here.
pub fn table_end(mddf: &Mddf) -> u32 {
    mddf.sector_of(mddf.slist_addr + mddf.slist_blocks as u32)
}

/// Lowest unclaimed identifier at or above the table's floor.
pub fn find_next_free_identifier(device: &impl SectorDevice, mddf: &Mddf) -> Option<u16> {
    (mddf.first_file as u32..capacity(mddf))
        .map(|id| id as u16)
        .find(|&id| !read_record(device, mddf, id).is_claimed())
}

/// Claims `id`: writes its record, materializes the hint sector, then
/// recomputes the MDDF's lowest free identifier from a fresh scan.
#[instrument(skip_all, fields(id = id, hint_sector = hint_sector))]
pub fn claim(
    device: &mut impl SectorDevice,
    mddf: &mut Mddf,
    id: u16,
    hint_id: u16,
    hint_sector: u32,
    info: &HintInfo,
    length: u32,
) -> Result<()> {
    if id < mddf.first_file || read_record(device, mddf, id).is_claimed() {
        return Err(FsError::IntegrityViolation(format!("identifier {} is not claimable", id)));
    }
    if !tag_is_free(device, hint_sector) {
        return Err(FsError::IntegrityViolation(format!(
            "hint sector {:#x} is already in use",
            hint_sector
        )));
    }

    let record = SFileRecord {
        hint_page: mddf.page_of(hint_sector),
        start_page: info.start_page,
        length,
        version: 0,
    };
    write_record(device, mddf, id, &record);

    write_hint_sector(device, mddf, hint_sector, hint_id, info);
    mark_allocated(device, mddf, hint_sector);
    consume_free(device, mddf, 1)?;

    mddf.empty_file = find_next_free_identifier(device, mddf).unwrap_or(capacity(mddf) as u16);
    write_mddf(device, mddf);
    debug!("claimed s-file {} -> {:?}", id, record);
    Ok(())
}
