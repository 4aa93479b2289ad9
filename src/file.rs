//! Inserting one file: planning every allocation up front, then committing
//! the S-File record, hint sector, catalog entry and data run in that order.

use std::borrow::Cow;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, instrument, warn};

use crate::alloc::{find_contiguous_free, find_free_groups, find_single_free};
use crate::bitmap::mark_allocated;
use crate::block_dev::SectorDevice;
use crate::catalog;
use crate::config::*;
use crate::error::{FsError, Resource, Result};
use crate::hint::{HintIds, HintInfo};
use crate::mddf::{consume_free, write_mddf};
use crate::name::validate_name;
use crate::sfile;
use crate::structs::{CatalogEntry, Mddf, Tag};

/// How file contents are adapted to the Lisa's text conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextPolicy {
    /// Bytes are written unchanged.
    Raw,
    /// CRLF and LF line endings become CR.
    LisaText,
    /// `LisaText` for names ending in `.text`, otherwise `Raw`.
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    pub policy: TextPolicy,
    pub created: u32,  // Lisa timestamp
    pub modified: u32, // Lisa timestamp
}

impl Default for WriteOptions {
    fn default() -> Self {
        let now = lisa_timestamp(SystemTime::now());
        Self {
            policy: TextPolicy::Auto,
            created: now,
            modified: now,
        }
    }
}

/// Seconds since 1901-01-01, saturating at the 32-bit limit.
pub fn lisa_timestamp(time: SystemTime) -> u32 {
    let unix = time.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    u32::try_from(unix + LISA_EPOCH_OFFSET).unwrap_or(u32::MAX)
}

pub fn apply_policy<'a>(name: &str, content: &'a [u8], policy: TextPolicy) -> Cow<'a, [u8]> {
    let text = match policy {
        TextPolicy::Raw => false,
        TextPolicy::LisaText => true,
        TextPolicy::Auto => name.to_ascii_lowercase().ends_with(".text"),
    };
    if !text || !content.contains(&b'\n') {
        return Cow::Borrowed(content);
    }

    let mut out = Vec::with_capacity(content.len());
    let mut bytes = content.iter().copied().peekable();
    while let Some(b) = bytes.next() {
        match b {
            b'\r' if bytes.peek() == Some(&b'\n') => {
                bytes.next();
                out.push(b'\r');
            }
            b'\n' => out.push(b'\r'),
            _ => out.push(b),
        }
    }
    Cow::Owned(out)
}

/// Everything an insertion will claim, found before anything is written.
#[derive(Debug, Clone, Copy)]
struct Plan {
    start: u32,
    count: u32,
    id: u16,
    hint_sector: u32,
    hint_id: u16,
}

fn plan(
    device: &impl SectorDevice,
    mddf: &Mddf,
    hints: &HintIds,
    name: &str,
    length: usize,
) -> Result<Plan> {
    let count = length.div_ceil(SECTOR_SIZE).max(1) as u32;
    if count > u16::MAX as u32 {
        return Err(FsError::NotFound(Resource::Sectors));
    }
    let start = find_contiguous_free(device, mddf, count, &[])
        .ok_or(FsError::NotFound(Resource::Sectors))?;
    let run = start..start + count;

    let id = sfile::find_next_free_identifier(device, mddf)
        .ok_or(FsError::NotFound(Resource::Identifier))?;
    let hint_sector = find_single_free(device, mddf, sfile::table_end(mddf), &[run.clone()])
        .ok_or(FsError::NotFound(Resource::HintSector))?;
    let hint_id = hints.peek().ok_or(FsError::NotFound(Resource::HintSector))?;

    let blocks = catalog::blocks_needed(device, mddf, name)?;
    let avoid = [run, hint_sector..hint_sector + 1];
    if find_free_groups(device, mddf, blocks, &avoid).is_none() {
        return Err(FsError::NotFound(Resource::CatalogBlock));
    }

    let total = count + 1 + (blocks * CATALOG_BLOCK_SECTORS) as u32;
    if mddf.free_count < total {
        return Err(FsError::IntegrityViolation(format!(
            "free count {} cannot cover the {} free sectors found for this file",
            mddf.free_count, total
        )));
    }
    Ok(Plan { start, count, id, hint_sector, hint_id })
}

/// Inserts `content` under `name`. Name validation, the duplicate check and
/// every allocation happen before the first byte of the volume changes.
#[instrument(skip_all, fields(name = name, len = content.len()))]
pub fn write_file(
    device: &mut impl SectorDevice,
    mddf: &mut Mddf,
    hints: &mut HintIds,
    name: &str,
    content: &[u8],
    options: &WriteOptions,
) -> Result<CatalogEntry> {
    validate_name(name)?;
    if catalog::lookup(device, mddf, name)?.is_some() {
        warn!("{} is already on the volume", name);
        return Err(FsError::DuplicateName(name.to_string()));
    }
    let content = apply_policy(name, content, options.policy);
    let plan = plan(device, mddf, hints, name, content.len())?;
    debug!("plan: {:?}", plan);

    let hint_id = hints.take()?;
    debug_assert_eq!(hint_id, plan.hint_id);
    let info = HintInfo {
        name,
        created: options.created,
        modified: options.modified,
        start_page: mddf.page_of(plan.start),
        sector_count: plan.count as u16,
    };
    let length = content.len() as u32;
    sfile::claim(device, mddf, plan.id, hint_id, plan.hint_sector, &info, length)?;

    let entry = CatalogEntry {
        name: name.to_string(),
        sfile: plan.id,
        created: options.created,
        modified: options.modified,
        size: length,
        phys_size: plan.count * SECTOR_SIZE as u32,
        flags: 0,
    };
    let run = plan.start..plan.start + plan.count;
    catalog::insert(device, mddf, &entry, &[run])?;

    write_data(device, mddf, plan.id, plan.start, &content)?;
    mddf.file_count += 1;
    write_mddf(device, mddf);
    info!(
        "wrote {} as s-file {}: {} bytes in sectors {:#x}..{:#x}",
        name,
        plan.id,
        length,
        plan.start,
        plan.start + plan.count
    );
    Ok(entry)
}

/// Copies `content` into the run at `start` and chains the run's tags.
fn write_data(
    device: &mut impl SectorDevice,
    mddf: &mut Mddf,
    id: u16,
    start: u32,
    content: &[u8],
) -> Result<()> {
    let count = content.len().div_ceil(SECTOR_SIZE).max(1) as u32;
    for i in 0..count {
        let sector = start + i;
        let buf = device.sector_mut(sector);
        buf.fill(0);
        let lo = (i as usize * SECTOR_SIZE).min(content.len());
        let hi = (lo + SECTOR_SIZE).min(content.len());
        buf[..hi - lo].copy_from_slice(&content[lo..hi]);

        let page = mddf.page_of(sector);
        let tag = Tag {
            rel_page: i as u16,
            fwd_link: if i + 1 == count { NIL_LINK } else { page + 1 },
            bkwd_link: if i == 0 { NIL_LINK } else { page - 1 },
            ..Tag::owned(id, VOLID_DATA, DATA_USED_FULL, page)
        };
        device.write_tag(sector, &tag);
        mark_allocated(device, mddf, sector);
    }
    consume_free(device, mddf, count)
}

/// Reads a file back by following its S-File record and the forward links
/// of its data tags. `None` if the name is not in the catalog.
pub fn read_file(device: &impl SectorDevice, mddf: &Mddf, name: &str) -> Result<Option<Vec<u8>>> {
    let Some(entry) = catalog::lookup(device, mddf, name)? else {
        return Ok(None);
    };
    let record = sfile::read_record(device, mddf, entry.sfile);
    if !record.is_claimed() {
        return Err(FsError::IntegrityViolation(format!(
            "{} points at unclaimed s-file {}",
            name, entry.sfile
        )));
    }

    let mut out = Vec::with_capacity(record.length as usize);
    let mut page = record.start_page;
    let limit = device.num_sectors() - mddf.sector;
    let mut walked = 0;
    while page != NIL_LINK {
        let sector = mddf.sector_of(page);
        if page >= limit || walked >= limit {
            return Err(FsError::IntegrityViolation(format!("{}: broken data chain", name)));
        }
        let tag = device.read_tag(sector);
        if tag.file_id != entry.sfile {
            return Err(FsError::IntegrityViolation(format!(
                "{}: sector {:#x} belongs to file id {:#06x}",
                name, sector, tag.file_id
            )));
        }
        out.extend_from_slice(device.sector(sector));
        page = tag.fwd_link;
        walked += 1;
    }
    out.truncate(record.length as usize);
    Ok(Some(out))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_apply_policy() {
        let raw = b"one\r\ntwo\nthree\r";
        assert_eq!(&*apply_policy("a.text", raw, TextPolicy::Auto), b"one\rtwo\rthree\r");
        assert_eq!(&*apply_policy("A.TEXT", raw, TextPolicy::Auto), b"one\rtwo\rthree\r");
        assert_eq!(&*apply_policy("a.obj", raw, TextPolicy::Auto), raw);
        assert_eq!(&*apply_policy("a.text", raw, TextPolicy::Raw), raw);
        assert_eq!(&*apply_policy("a.obj", b"x\ny", TextPolicy::LisaText), b"x\ry");
    }

    #[test]
    fn test_lisa_timestamp() {
        assert_eq!(lisa_timestamp(UNIX_EPOCH), LISA_EPOCH_OFFSET as u32);
        let later = UNIX_EPOCH + std::time::Duration::from_secs(60);
        assert_eq!(lisa_timestamp(later), LISA_EPOCH_OFFSET as u32 + 60);
    }
}
