//! Building an empty volume from nothing.
//!
//! The layout follows what the Lisa Office System leaves on a freshly
//! initialized ProFile:
//! - Boot sector (sector 0) and OS loader sectors, ahead of the MDDF
//! - MDDF
//! - Free-space bitmap
//! - S-File table
//! - One empty catalog leaf, claimed like any other catalog block
//! - Everything else free

use tracing::{debug, info};

use crate::bitmap::rebuild;
use crate::block_dev::SectorDevice;
use crate::catalog::claim_next_free_catalog_block;
use crate::checksum::fix_all;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::image::VolumeImage;
use crate::mddf::write_mddf;
use crate::structs::{Mddf, Tag};

const SFILE_TABLE_SECTORS: u16 = 4;
// MDDF, bitmap, table, one catalog block, and room for at least one file.
const MIN_PAGES: u32 = 64;

/// Tags `count` sectors from `first` as one structure owned by `file_id`,
/// chained front to back.
fn tag_structure(
    device: &mut impl SectorDevice,
    mddf: &Mddf,
    first: u32,
    count: u32,
    file_id: u16,
) {
    for i in 0..count {
        let sector = first + i;
        let page = mddf.page_of(sector);
        let tag = Tag {
            rel_page: i as u16,
            fwd_link: if i + 1 == count { NIL_LINK } else { page + 1 },
            bkwd_link: if i == 0 { NIL_LINK } else { page - 1 },
            ..Tag::owned(file_id, VOLID_DATA, DATA_USED_FULL, page)
        };
        device.write_tag(sector, &tag);
    }
}

/// An empty, consistent volume: no files, a single empty catalog leaf as
/// root, every checksum current.
pub fn format_volume(geometry: Geometry, name: &str) -> Result<VolumeImage> {
    let mddf_sector = PROFILE_5MB_MDDF_SECTOR;
    if geometry.num_sectors < mddf_sector + MIN_PAGES {
        return Err(FsError::InvalidImage(format!(
            "{} sectors is too small for a volume",
            geometry.num_sectors
        )));
    }
    let mut image = VolumeImage::blank(geometry, name);

    let boot = Tag::owned(FILE_ID_BOOT, VOLID_DATA, DATA_USED_FULL, 0);
    image.write_tag(0, &boot);
    for sector in 1..mddf_sector {
        let loader = Tag {
            rel_page: (sector - 1) as u16,
            ..Tag::owned(FILE_ID_LOADER, VOLID_DATA, DATA_USED_FULL, sector)
        };
        image.write_tag(sector, &loader);
    }

    let pages = geometry.num_sectors - mddf_sector;
    let bitmap_size = (pages as usize).div_ceil(8).div_ceil(SECTOR_SIZE) as u16;
    let mut mddf = Mddf {
        sector: mddf_sector,
        bitmap_addr: 1,
        bitmap_size,
        slist_addr: 1 + bitmap_size as u32,
        slist_packing: SFILE_RECORDS_PER_SECTOR,
        slist_blocks: SFILE_TABLE_SECTORS,
        first_file: SFILE_FIRST_USER_ID,
        empty_file: SFILE_FIRST_USER_ID,
        file_count: 0,
        free_count: 0,
        root_page: 0,
    };

    image.write_tag(mddf_sector, &Tag::owned(FILE_ID_MDDF, VOLID_DATA, DATA_USED_FULL, 0));
    let bitmap_first = mddf.sector_of(mddf.bitmap_addr);
    tag_structure(&mut image, &mddf, bitmap_first, bitmap_size as u32, FILE_ID_BITMAP);
    let table_first = mddf.sector_of(mddf.slist_addr);
    tag_structure(&mut image, &mddf, table_first, SFILE_TABLE_SECTORS as u32, FILE_ID_SFILE);

    rebuild(&mut image, &mddf);
    mddf.free_count = (mddf_sector..geometry.num_sectors)
        .filter(|&s| image.tag_file_id(s) == FILE_ID_FREE)
        .count() as u32;
    write_mddf(&mut image, &mddf);
    debug!("laid out {:?}", mddf);

    mddf.root_page = claim_next_free_catalog_block(&mut image, &mut mddf, &[])?;
    write_mddf(&mut image, &mddf);

    fix_all(&mut image);
    image.update_container_checksums();
    info!(
        "formatted {} sectors: {} free, catalog root at page {:#x}",
        geometry.num_sectors, mddf.free_count, mddf.root_page
    );
    Ok(image)
}
