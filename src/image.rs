//! The whole volume as one in-memory Disk Copy 4.2 image.
//!
//! Layout: a fixed header, then the data of every sector back to back, then
//! the tag of every sector back to back.

use std::fs;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, info};

use crate::block_dev::SectorDevice;
use crate::config::*;
use crate::error::{FsError, Result};

#[derive(Debug, Clone)]
pub struct VolumeImage {
    bytes: Vec<u8>,
    geometry: Geometry,
}

impl VolumeImage {
    /// Wraps an existing image. The length must match the geometry exactly,
    /// the image is never sparse or partial.
    pub fn from_bytes(bytes: Vec<u8>, geometry: Geometry) -> Result<Self> {
        if bytes.len() != geometry.image_len() {
            return Err(FsError::InvalidImage(format!(
                "expected {:#x} bytes for {} sectors, found {:#x}",
                geometry.image_len(),
                geometry.num_sectors,
                bytes.len()
            )));
        }
        Ok(Self { bytes, geometry })
    }

    /// Wraps an existing image, taking the sector count from the container
    /// header's data size field.
    pub fn from_dc42(bytes: Vec<u8>) -> Result<Self> {
        let geometry = Geometry::from_dc42_header(&bytes)?;
        Self::from_bytes(bytes, geometry)
    }

    /// A zeroed image with a valid container header.
    pub fn blank(geometry: Geometry, name: &str) -> Self {
        let mut image = Self {
            bytes: vec![0u8; geometry.image_len()],
            geometry,
        };
        image.write_header(name);
        image
    }

    pub fn load(path: impl AsRef<Path>, geometry: Option<Geometry>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        info!("read {} ({:#x} bytes)", path.display(), bytes.len());
        match geometry {
            Some(geometry) => Self::from_bytes(bytes, geometry),
            None => Self::from_dc42(bytes),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, &self.bytes)?;
        info!("wrote {} ({:#x} bytes)", path.display(), self.bytes.len());
        Ok(())
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    fn write_header(&mut self, name: &str) {
        let header = &mut self.bytes[..self.geometry.header_len];
        let name = name.as_bytes();
        let len = name.len().min(DC42_NAME_LEN);
        header[0] = len as u8;
        header[1..1 + len].copy_from_slice(&name[..len]);
        let n = self.geometry.num_sectors;
        BigEndian::write_u32(&mut header[DC42_DATA_SIZE..], n * SECTOR_SIZE as u32);
        BigEndian::write_u32(&mut header[DC42_TAG_SIZE..], n * TAG_SIZE as u32);
        header[DC42_ENCODING] = 0;
        header[DC42_FORMAT] = 0;
        BigEndian::write_u16(&mut header[DC42_MAGIC_OFFSET..], DC42_MAGIC);
    }

    /// Recomputes the container's data and tag checksums.
    pub fn update_container_checksums(&mut self) {
        let (data, tags) = self.container_checksums();
        let header = &mut self.bytes[..self.geometry.header_len];
        BigEndian::write_u32(&mut header[DC42_DATA_CHECKSUM..], data);
        BigEndian::write_u32(&mut header[DC42_TAG_CHECKSUM..], tags);
        debug!("container checksums: data={:#010x} tags={:#010x}", data, tags);
    }

    /// (data checksum, tag checksum) as stored in the header.
    pub fn stored_container_checksums(&self) -> (u32, u32) {
        (
            BigEndian::read_u32(&self.bytes[DC42_DATA_CHECKSUM..]),
            BigEndian::read_u32(&self.bytes[DC42_TAG_CHECKSUM..]),
        )
    }

    /// (data checksum, tag checksum) computed from the current contents.
    /// Sector 0's tag is left out of the tag sum.
    pub fn container_checksums(&self) -> (u32, u32) {
        let g = self.geometry;
        let data = &self.bytes[g.data_offset()..g.tag_offset()];
        let tags = &self.bytes[g.tag_offset() + TAG_SIZE..];
        (dc42_sum(data), dc42_sum(tags))
    }

    fn data_range(&self, first: u32, count: usize) -> core::ops::Range<usize> {
        assert!(
            count > 0 && first as usize + count <= self.geometry.num_sectors as usize,
            "sector range {}+{} outside volume of {} sectors",
            first,
            count,
            self.geometry.num_sectors
        );
        let start = self.geometry.data_offset() + first as usize * SECTOR_SIZE;
        start..start + count * SECTOR_SIZE
    }

    fn tag_range(&self, sector: u32) -> core::ops::Range<usize> {
        assert!(
            sector < self.geometry.num_sectors,
            "tag {} outside volume of {} sectors",
            sector,
            self.geometry.num_sectors
        );
        let start = self.geometry.tag_offset() + sector as usize * TAG_SIZE;
        start..start + TAG_SIZE
    }
}

impl SectorDevice for VolumeImage {
    fn num_sectors(&self) -> u32 {
        self.geometry.num_sectors
    }

    fn sectors(&self, first: u32, count: usize) -> &[u8] {
        let range = self.data_range(first, count);
        &self.bytes[range]
    }

    fn sectors_mut(&mut self, first: u32, count: usize) -> &mut [u8] {
        let range = self.data_range(first, count);
        &mut self.bytes[range]
    }

    fn raw_tag(&self, sector: u32) -> &[u8] {
        let range = self.tag_range(sector);
        &self.bytes[range]
    }

    fn raw_tag_mut(&mut self, sector: u32) -> &mut [u8] {
        let range = self.tag_range(sector);
        &mut self.bytes[range]
    }
}

impl Geometry {
    /// Derives the sector count from a container header's data size field.
    pub fn from_dc42_header(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < DC42_HEADER_LEN {
            return Err(FsError::InvalidImage("shorter than a Disk Copy 4.2 header".into()));
        }
        let magic = BigEndian::read_u16(&bytes[DC42_MAGIC_OFFSET..]);
        if magic != DC42_MAGIC {
            return Err(FsError::InvalidImage(format!("bad container magic {:#06x}", magic)));
        }
        let data_size = BigEndian::read_u32(&bytes[DC42_DATA_SIZE..]) as usize;
        let tag_size = BigEndian::read_u32(&bytes[DC42_TAG_SIZE..]) as usize;
        if data_size % SECTOR_SIZE != 0 || tag_size != data_size / SECTOR_SIZE * TAG_SIZE {
            return Err(FsError::InvalidImage(format!(
                "data size {:#x} and tag size {:#x} do not describe 512+20 byte sectors",
                data_size, tag_size
            )));
        }
        Ok(Geometry::new((data_size / SECTOR_SIZE) as u32))
    }
}

/// Disk Copy checksum: add each big-endian word, then rotate right by one.
fn dc42_sum(bytes: &[u8]) -> u32 {
    bytes.chunks_exact(2).fold(0u32, |sum, word| {
        sum.wrapping_add(BigEndian::read_u16(word) as u32).rotate_right(1)
    })
}
