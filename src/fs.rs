use tracing::info;

use crate::bitmap;
use crate::block_dev::SectorDevice;
use crate::catalog;
use crate::checksum;
use crate::error::Result;
use crate::file::{self, WriteOptions};
use crate::hint::HintIds;
use crate::image::VolumeImage;
use crate::mddf::read_mddf;
use crate::structs::{CatalogEntry, Mddf};

/// One insertion session over a volume. Holds the decoded MDDF and the
/// running hint-id counter; every operation re-reads whatever else it needs
/// from the device, so consecutive insertions see each other's effects.
#[derive(Debug)]
pub struct Volume<D: SectorDevice> {
    device: D,
    mddf: Mddf,
    hints: HintIds,
}

impl<D: SectorDevice> Volume<D> {
    pub fn open(device: D) -> Result<Self> {
        let mddf = read_mddf(&device)?;
        let hints = HintIds::scan(&device);
        info!(
            "opened volume: {} files, {} free sectors, catalog root page {:#x}",
            mddf.file_count, mddf.free_count, mddf.root_page
        );
        Ok(Self { device, mddf, hints })
    }

    // Following methods assume exclusive use of the device for the session.
    pub fn write_file(
        &mut self,
        name: &str,
        content: &[u8],
        options: &WriteOptions,
    ) -> Result<CatalogEntry> {
        file::write_file(
            &mut self.device,
            &mut self.mddf,
            &mut self.hints,
            name,
            content,
            options,
        )
    }

    pub fn lookup(&self, name: &str) -> Result<Option<CatalogEntry>> {
        catalog::lookup(&self.device, &self.mddf, name)
    }

    pub fn read_file(&self, name: &str) -> Result<Option<Vec<u8>>> {
        file::read_file(&self.device, &self.mddf, name)
    }

    /// Catalog entries in order.
    pub fn entries(&self) -> Result<Vec<CatalogEntry>> {
        catalog::entries(&self.device, &self.mddf)
    }

    /// Bitmap against tags, catalog order, then checksums.
    pub fn verify(&self) -> Result<()> {
        bitmap::check_consistency(&self.device, &self.mddf)?;
        catalog::check_order(&self.device, &self.mddf)?;
        checksum::verify(&self.device)
    }

    pub fn fix_checksums(&mut self) -> u32 {
        checksum::fix_all(&mut self.device)
    }

    /// Human-readable listing of the volume.
    pub fn dump(&self) -> Result<String> {
        let m = &self.mddf;
        let mut out = format!(
            "MDDF @ sector {:#x}: {} files, {} free sectors, root page {:#x}, lowest free id {}\n",
            m.sector, m.file_count, m.free_count, m.root_page, m.empty_file
        );
        for entry in self.entries()? {
            out.push_str(&format!(
                "  {:<28} id {:>4}  {:>8} bytes  {:>8} physical\n",
                entry.name, entry.sfile, entry.size, entry.phys_size
            ));
        }
        Ok(out)
    }

    pub fn mddf(&self) -> &Mddf {
        &self.mddf
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }
}

impl Volume<VolumeImage> {
    /// Fixes every sector checksum, then the container checksums, and hands
    /// back the finished image.
    pub fn finish(mut self) -> VolumeImage {
        self.fix_checksums();
        let mut image = self.device;
        image.update_container_checksums();
        image
    }
}
