//! Searches for free sectors. Nothing here mutates the volume; callers claim
//! what they find by writing tags and marking the bitmap.
//!
//! A sector is allocatable only when both its tag and its bitmap bit say it
//! is free and it is not in one of the caller's `avoid` ranges (sectors
//! already promised to the same insertion but not yet tagged).

use core::ops::Range;

use crate::bitmap::{is_free, tag_is_free};
use crate::block_dev::SectorDevice;
use crate::config::*;
use crate::structs::Mddf;

fn allocatable(device: &impl SectorDevice, mddf: &Mddf, sector: u32, avoid: &[Range<u32>]) -> bool {
    !avoid.iter().any(|r| r.contains(&sector))
        && tag_is_free(device, sector)
        && is_free(device, mddf, sector)
}

/// Scans backward from the end of the volume toward the MDDF and returns the
/// highest start of `count` consecutive free sectors. The Lisa OS allocates
/// forward from the low end.
pub fn find_contiguous_free(
    device: &impl SectorDevice,
    mddf: &Mddf,
    count: u32,
    avoid: &[Range<u32>],
) -> Option<u32> {
    assert!(count > 0);
    let mut run = 0;
    for sector in (mddf.sector + 1..device.num_sectors()).rev() {
        if allocatable(device, mddf, sector, avoid) {
            run += 1;
            if run == count {
                return Some(sector);
            }
        } else {
            run = 0;
        }
    }
    None
}

/// First free sector at or after `hint`.
pub fn find_single_free(
    device: &impl SectorDevice,
    mddf: &Mddf,
    hint: u32,
    avoid: &[Range<u32>],
) -> Option<u32> {
    (hint.max(mddf.sector + 1)..device.num_sectors())
        .find(|&s| allocatable(device, mddf, s, avoid))
}

/// The first `wanted` groups of four free sectors whose first page is a
/// multiple of four, lowest first.
pub fn find_free_groups(
    device: &impl SectorDevice,
    mddf: &Mddf,
    wanted: usize,
    avoid: &[Range<u32>],
) -> Option<Vec<u32>> {
    let group = CATALOG_BLOCK_SECTORS as u32;
    let mut found = Vec::with_capacity(wanted);
    if wanted == 0 {
        return Some(found);
    }
    let mut sector = mddf.sector + group;
    while sector + group <= device.num_sectors() {
        if (sector..sector + group).all(|s| allocatable(device, mddf, s, avoid)) {
            found.push(sector);
            if found.len() == wanted {
                return Some(found);
            }
        }
        sector += group;
    }
    None
}
