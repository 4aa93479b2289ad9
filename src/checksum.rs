//! Per-sector integrity checksums: the XOR of the 512 data bytes and the
//! 19 tag bytes other than the checksum byte itself.

use tracing::{debug, info};

use crate::block_dev::SectorDevice;
use crate::config::*;
use crate::error::{FsError, Result};

pub fn compute(device: &impl SectorDevice, sector: u32) -> u8 {
    let data = device.sector(sector).iter().fold(0u8, |acc, b| acc ^ b);
    device
        .raw_tag(sector)
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != TAG_CHECKSUM)
        .fold(data, |acc, (_, b)| acc ^ b)
}

/// Rewrites every stale checksum. Returns how many were rewritten.
/// Run after all other mutation.
pub fn fix_all(device: &mut impl SectorDevice) -> u32 {
    let mut fixed = 0;
    for sector in 0..device.num_sectors() {
        let sum = compute(device, sector);
        let raw = device.raw_tag_mut(sector);
        if raw[TAG_CHECKSUM] != sum {
            raw[TAG_CHECKSUM] = sum;
            fixed += 1;
        }
    }
    info!("rewrote {} sector checksums", fixed);
    fixed
}

/// Fails on the first sector whose stored checksum is stale.
pub fn verify(device: &impl SectorDevice) -> Result<()> {
    for sector in 0..device.num_sectors() {
        let stored = device.raw_tag(sector)[TAG_CHECKSUM];
        let sum = compute(device, sector);
        if stored != sum {
            debug!("sector {:#x}: stored {:#04x}, computed {:#04x}", sector, stored, sum);
            return Err(FsError::IntegrityViolation(format!(
                "stale checksum on sector {:#x}",
                sector
            )));
        }
    }
    Ok(())
}
