use thiserror::Error;

/// What an allocation ran out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Sectors,
    Identifier,
    HintSector,
    CatalogBlock,
    CatalogSlot,
}

impl core::fmt::Display for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let what = match self {
            Resource::Sectors => "contiguous sector run",
            Resource::Identifier => "s-file identifier",
            Resource::HintSector => "hint sector",
            Resource::CatalogBlock => "catalog block",
            Resource::CatalogSlot => "catalog separator slot",
        };
        f.write_str(what)
    }
}

#[derive(Debug, Error)]
pub enum FsError {
    #[error("no free {0}")]
    NotFound(Resource),
    #[error("name already in catalog: {0}")]
    DuplicateName(String),
    #[error("volume integrity violation: {0}")]
    IntegrityViolation(String),
    #[error("invalid file name: {0:?}")]
    InvalidName(String),
    #[error("invalid volume image: {0}")]
    InvalidImage(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = core::result::Result<T, FsError>;
