//! Hint sectors ("pseudo-inodes"): one metadata sector per file, reached
//! only through the file's S-File record.

use byteorder::{BigEndian, ByteOrder};
use tracing::debug;

use crate::block_dev::SectorDevice;
use crate::config::*;
use crate::error::{FsError, Resource, Result};
use crate::name::type_suffix;
use crate::structs::{Mddf, Tag};

/// Hint sectors carry their own tag file ids, counting down from
/// `HINT_ID_FIRST` and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HintIds {
    next: u16,
}

fn is_hint_id(id: u16) -> bool {
    (HINT_ID_LAST..=HINT_ID_FIRST).contains(&id) && id != FILE_ID_BOOT && id != FILE_ID_LOADER
}

impl HintIds {
    /// Continues below the lowest hint id already on the volume.
    pub fn scan(device: &impl SectorDevice) -> Self {
        let lowest = (0..device.num_sectors())
            .map(|s| device.tag_file_id(s))
            .filter(|&id| is_hint_id(id))
            .min();
        let next = match lowest {
            Some(id) => id.wrapping_sub(1),
            None => HINT_ID_FIRST,
        };
        Self { next }
    }

    pub fn peek(&self) -> Option<u16> {
        let mut id = self.next;
        while id >= HINT_ID_LAST {
            if is_hint_id(id) {
                return Some(id);
            }
            id -= 1;
        }
        None
    }

    pub fn take(&mut self) -> Result<u16> {
        let id = self.peek().ok_or(FsError::NotFound(Resource::HintSector))?;
        self.next = id.wrapping_sub(1);
        Ok(id)
    }
}

/// What the hint sector records about its file.
#[derive(Debug, Clone, Copy)]
pub struct HintInfo<'a> {
    pub name: &'a str,
    pub created: u32,
    pub modified: u32,
    pub start_page: u32,
    pub sector_count: u16,
}

/// Zero-fills `sector` and writes the hint record and its tag.
/// The caller marks the bitmap and accounts for the free count.
pub fn write_hint_sector(
    device: &mut impl SectorDevice,
    mddf: &Mddf,
    sector: u32,
    hint_id: u16,
    info: &HintInfo,
) {
    let name = info.name.as_bytes();
    debug_assert!(name.len() <= MAX_FILE_NAME_LEN);

    let buf = device.sector_mut(sector);
    buf.fill(0);
    buf[HINT_NAME_LEN] = name.len() as u8;
    buf[HINT_NAME..HINT_NAME + name.len()].copy_from_slice(name);
    // one zero byte, then the type
    let type_at = HINT_NAME + name.len() + 1;
    buf[type_at..type_at + HINT_TYPE_LEN].copy_from_slice(&type_suffix(info.name));

    for (offset, value) in HINT_STANDARD_LONGS {
        BigEndian::write_u32(&mut buf[offset..], value);
    }
    BigEndian::write_u32(&mut buf[HINT_CREATED..], info.created);
    BigEndian::write_u32(&mut buf[HINT_MODIFIED..], info.modified);
    BigEndian::write_u16(&mut buf[HINT_SECTOR_COUNT..], info.sector_count);
    BigEndian::write_u16(&mut buf[HINT_START_PAGE..], info.start_page as u16);
    BigEndian::write_u16(&mut buf[HINT_SECTOR_COUNT_AGAIN..], info.sector_count);

    let tag = Tag::owned(hint_id, VOLID_HINT, DATA_USED_HINT, mddf.page_of(sector));
    device.write_tag(sector, &tag);
    debug!("hint sector {:#x} (id {:#06x}) for {}", sector, hint_id, info.name);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_hint_ids_skip_reserved() {
        let mut ids = HintIds { next: FILE_ID_BOOT };
        assert_eq!(ids.take().unwrap(), FILE_ID_BOOT - 1);
        let mut ids = HintIds { next: HINT_ID_LAST };
        assert_eq!(ids.take().unwrap(), HINT_ID_LAST);
        assert!(matches!(ids.take(), Err(FsError::NotFound(Resource::HintSector))));
    }
}
