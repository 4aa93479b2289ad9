use tracing::debug;

use crate::block_dev::SectorDevice;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::structs::Mddf;

/// The MDDF is the first sector tagged with its reserved file id.
pub fn find_mddf_sector(device: &impl SectorDevice) -> Result<u32> {
    (0..device.num_sectors())
        .find(|&s| device.tag_file_id(s) == FILE_ID_MDDF)
        .ok_or_else(|| FsError::InvalidImage("no sector tagged as MDDF".into()))
}

/// Where the bitmap really is: the first sector tagged as bitmap.
pub fn find_bitmap_sector(device: &impl SectorDevice) -> Result<u32> {
    (0..device.num_sectors())
        .find(|&s| device.tag_file_id(s) == FILE_ID_BITMAP)
        .ok_or_else(|| FsError::InvalidImage("no sector tagged as bitmap".into()))
}

/// Fails unless `len` pages from `addr` lie inside a volume of `pages` pages.
fn check_span(addr: u32, len: u32, pages: u32, what: &str) -> Result<()> {
    match addr.checked_add(len) {
        Some(end) if end <= pages => Ok(()),
        _ => Err(FsError::InvalidImage(format!(
            "{} at page {:#x}, {} sectors long, lies outside the volume",
            what, addr, len
        ))),
    }
}

pub fn read_mddf(device: &impl SectorDevice) -> Result<Mddf> {
    let sector = find_mddf_sector(device)?;
    let mddf = Mddf::parse(sector, device.sector(sector));

    // Conceptual sanity only: every structure must lie inside the volume.
    let pages = device.num_sectors() - sector;
    if mddf.slist_packing == 0 || mddf.slist_packing > SFILE_RECORDS_PER_SECTOR {
        return Err(FsError::InvalidImage(format!(
            "{} s-file records per sector",
            mddf.slist_packing
        )));
    }
    check_span(mddf.slist_addr, mddf.slist_blocks as u32, pages, "s-file table")?;
    check_span(mddf.bitmap_addr, mddf.bitmap_size as u32, pages, "bitmap")?;
    check_span(mddf.root_page, CATALOG_BLOCK_SECTORS as u32, pages, "catalog root")?;

    // one bit per page
    if (mddf.bitmap_size as usize) * SECTOR_SIZE * 8 < pages as usize {
        return Err(FsError::InvalidImage(format!(
            "{}-sector bitmap cannot cover {} pages",
            mddf.bitmap_size, pages
        )));
    }
    let bitmap = find_bitmap_sector(device)?;
    if mddf.bitmap_addr.checked_add(sector) != Some(bitmap) {
        return Err(FsError::InvalidImage(format!(
            "MDDF places the bitmap at page {:#x}, tags place it at sector {:#x}",
            mddf.bitmap_addr, bitmap
        )));
    }
    debug!("MDDF at sector {:#x}: {:?}", sector, mddf);
    Ok(mddf)
}

pub fn write_mddf(device: &mut impl SectorDevice, mddf: &Mddf) {
    mddf.encode(device.sector_mut(mddf.sector));
}

/// Takes `count` sectors off the free count.
pub fn consume_free(device: &mut impl SectorDevice, mddf: &mut Mddf, count: u32) -> Result<()> {
    mddf.free_count = mddf.free_count.checked_sub(count).ok_or_else(|| {
        FsError::IntegrityViolation(format!(
            "free count {} cannot cover {} more sectors",
            mddf.free_count, count
        ))
    })?;
    write_mddf(device, mddf);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::format::format_volume;
    use crate::image::VolumeImage;

    fn formatted_with(offset: usize, value: &[u8]) -> VolumeImage {
        let mut image = format_volume(Geometry::PROFILE_5MB, "t").unwrap();
        let sector = find_mddf_sector(&image).unwrap();
        image.sector_mut(sector)[offset..offset + value.len()].copy_from_slice(value);
        image
    }

    fn assert_rejected(offset: usize, value: &[u8]) {
        let image = formatted_with(offset, value);
        assert!(
            matches!(read_mddf(&image), Err(FsError::InvalidImage(_))),
            "field at {:#x} = {:02x?} accepted",
            offset,
            value
        );
    }

    #[test]
    fn test_read_formatted() {
        let image = format_volume(Geometry::PROFILE_5MB, "t").unwrap();
        let mddf = read_mddf(&image).unwrap();
        assert_eq!(find_bitmap_sector(&image).unwrap(), mddf.sector_of(mddf.bitmap_addr));
    }

    #[test]
    fn test_overflowing_spans_rejected() {
        assert_rejected(MDDF_SLIST_ADDR, &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_rejected(MDDF_BITMAP_ADDR, &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_rejected(MDDF_ROOT_PAGE, &[0xFF, 0xFF, 0xFF, 0xFE]);
        assert_rejected(MDDF_SLIST_BLOCKS, &[0xFF, 0xFF]);
    }

    #[test]
    fn test_bitmap_too_small_rejected() {
        // 0x25DA pages need three bitmap sectors
        assert_rejected(MDDF_BITMAP_SIZE, &[0x00, 0x01]);
        assert_rejected(MDDF_BITMAP_SIZE, &[0x00, 0x02]);
    }

    #[test]
    fn test_bitmap_elsewhere_than_tags_rejected() {
        assert_rejected(MDDF_BITMAP_ADDR, &[0x00, 0x00, 0x00, 0x02]);
    }

    #[test]
    fn test_bad_packing_rejected() {
        assert_rejected(MDDF_SLIST_PACKING, &[0x00, 0x00]);
        assert_rejected(MDDF_SLIST_PACKING, &[0x00, 37]);
    }

    #[test]
    fn test_missing_bitmap_tag_rejected() {
        let mut image = format_volume(Geometry::PROFILE_5MB, "t").unwrap();
        let bitmap = find_bitmap_sector(&image).unwrap();
        for sector in bitmap..bitmap + 3 {
            image.raw_tag_mut(sector)[TAG_FILE_ID + 1] = 0x09;
        }
        assert!(matches!(read_mddf(&image), Err(FsError::InvalidImage(_))));
    }
}
