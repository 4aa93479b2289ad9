//! The catalog: a sorted directory of fixed four-sector blocks.
//!
//! Leaves hold up to `CATALOG_LEAF_CAPACITY` entries in case-insensitive
//! order and are chained through prev/next sibling pages. When the catalog
//! outgrows one leaf, the MDDF root points at a single non-leaf block whose
//! separators mirror each child's first key, in order. Deeper trees are not
//! built; a full non-leaf block ends further growth.

use core::cmp::Ordering;
use core::ops::Range;

use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, info, instrument};

use crate::alloc::find_free_groups;
use crate::bitmap::{mark_allocated, tag_is_free};
use crate::block_dev::SectorDevice;
use crate::config::*;
use crate::error::{FsError, Resource, Result};
use crate::mddf::{consume_free, write_mddf};
use crate::name::{cmp_names, names_equal};
use crate::structs::{CatalogEntry, Mddf, Separator, Tag};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub page: u32,
    pub prev: u32,
    pub next: u32,
    pub entries: Vec<CatalogEntry>,
}

impl Leaf {
    pub fn empty(page: u32) -> Self {
        Self {
            page,
            prev: CATALOG_NIL,
            next: CATALOG_NIL,
            entries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub page: u32,
    pub separators: Vec<Separator>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Leaf(Leaf),
    Node(Node),
}

/// Where an insertion of a name lands: the leaf, and when the root is a
/// non-leaf, that block's page and the separator slot leading to the leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub leaf: u32,
    pub parent: Option<(u32, usize)>,
}

pub fn read_block(device: &impl SectorDevice, mddf: &Mddf, page: u32) -> Result<Block> {
    let raw = device.sectors(mddf.sector_of(page), CATALOG_BLOCK_SECTORS);
    if raw[..3] != CATALOG_MAGIC {
        return Err(FsError::IntegrityViolation(format!(
            "catalog block at page {:#x} lacks its marker",
            page
        )));
    }
    let kind = BigEndian::read_u16(&raw[CATALOG_KIND..]);
    let count = BigEndian::read_u16(&raw[CATALOG_COUNT..]) as usize;
    let capacity = if kind == CATALOG_KIND_NODE {
        CATALOG_NODE_CAPACITY
    } else {
        CATALOG_LEAF_CAPACITY
    };
    if count > capacity {
        return Err(FsError::IntegrityViolation(format!(
            "catalog block at page {:#x} claims {} records",
            page, count
        )));
    }

    if kind == CATALOG_KIND_NODE {
        Ok(Block::Node(Node {
            page,
            separators: raw
                .chunks_exact(CATALOG_SEPARATOR_SIZE)
                .take(count)
                .map(Separator::parse)
                .collect(),
        }))
    } else {
        Ok(Block::Leaf(Leaf {
            page,
            prev: BigEndian::read_u32(&raw[CATALOG_PREV..]),
            next: BigEndian::read_u32(&raw[CATALOG_NEXT..]),
            entries: raw
                .chunks_exact(CATALOG_ENTRY_SIZE)
                .take(count)
                .map(CatalogEntry::parse)
                .collect(),
        }))
    }
}

fn read_leaf(device: &impl SectorDevice, mddf: &Mddf, page: u32) -> Result<Leaf> {
    match read_block(device, mddf, page)? {
        Block::Leaf(leaf) => Ok(leaf),
        Block::Node(_) => Err(FsError::IntegrityViolation(format!(
            "page {:#x} is a non-leaf below the root; nested levels are unsupported",
            page
        ))),
    }
}

fn read_node(device: &impl SectorDevice, mddf: &Mddf, page: u32) -> Result<Node> {
    match read_block(device, mddf, page)? {
        Block::Node(node) => Ok(node),
        Block::Leaf(_) => Err(FsError::IntegrityViolation(format!(
            "page {:#x} expected to be a non-leaf block",
            page
        ))),
    }
}

fn write_trailer(raw: &mut [u8], prev: u32, next: u32, kind: u16, count: usize) {
    raw[..3].copy_from_slice(&CATALOG_MAGIC);
    BigEndian::write_u32(&mut raw[CATALOG_PREV..], prev);
    BigEndian::write_u32(&mut raw[CATALOG_NEXT..], next);
    BigEndian::write_u16(&mut raw[CATALOG_KIND..], kind);
    BigEndian::write_u16(&mut raw[CATALOG_COUNT..], count as u16);
}

/// Rewrites the record area and trailer. Slots past the valid count are zeroed.
pub fn write_leaf(device: &mut impl SectorDevice, mddf: &Mddf, leaf: &Leaf) {
    assert!(leaf.entries.len() <= CATALOG_LEAF_CAPACITY);
    let raw = device.sectors_mut(mddf.sector_of(leaf.page), CATALOG_BLOCK_SECTORS);
    raw[..CATALOG_LEAF_CAPACITY * CATALOG_ENTRY_SIZE].fill(0);
    for (slot, entry) in raw.chunks_exact_mut(CATALOG_ENTRY_SIZE).zip(&leaf.entries) {
        entry.encode(slot);
    }
    write_trailer(raw, leaf.prev, leaf.next, CATALOG_KIND_LEAF, leaf.entries.len());
}

pub fn write_node(device: &mut impl SectorDevice, mddf: &Mddf, node: &Node) {
    assert!(node.separators.len() <= CATALOG_NODE_CAPACITY);
    let raw = device.sectors_mut(mddf.sector_of(node.page), CATALOG_BLOCK_SECTORS);
    raw[..CATALOG_NODE_CAPACITY * CATALOG_SEPARATOR_SIZE].fill(0);
    for (slot, separator) in raw.chunks_exact_mut(CATALOG_SEPARATOR_SIZE).zip(&node.separators) {
        separator.encode(slot);
    }
    write_trailer(raw, CATALOG_NIL, CATALOG_NIL, CATALOG_KIND_NODE, node.separators.len());
}

/// Returns the leaf whose name range contains `name`, or the one whose range
/// ends closest before it.
pub fn locate(device: &impl SectorDevice, mddf: &Mddf, name: &str) -> Result<Location> {
    match read_block(device, mddf, mddf.root_page)? {
        Block::Leaf(leaf) => Ok(Location { leaf: leaf.page, parent: None }),
        Block::Node(node) => {
            if node.separators.is_empty() {
                return Err(FsError::IntegrityViolation("empty non-leaf catalog root".into()));
            }
            // last separator not after `name`; names before every separator go left
            let slot = node
                .separators
                .iter()
                .rposition(|s| cmp_names(&s.name, name) != Ordering::Greater)
                .unwrap_or(0);
            Ok(Location {
                leaf: node.separators[slot].child,
                parent: Some((node.page, slot)),
            })
        }
    }
}

pub fn lookup(device: &impl SectorDevice, mddf: &Mddf, name: &str) -> Result<Option<CatalogEntry>> {
    let location = locate(device, mddf, name)?;
    let leaf = read_leaf(device, mddf, location.leaf)?;
    Ok(leaf.entries.into_iter().find(|e| names_equal(&e.name, name)))
}

/// How many new blocks inserting `name` will claim: none if its leaf has
/// room, one for a split, two when the split leaf is the root.
pub fn blocks_needed(device: &impl SectorDevice, mddf: &Mddf, name: &str) -> Result<usize> {
    let location = locate(device, mddf, name)?;
    let leaf = read_leaf(device, mddf, location.leaf)?;
    if leaf.entries.iter().any(|e| names_equal(&e.name, name)) {
        return Err(FsError::DuplicateName(name.to_string()));
    }
    if leaf.entries.len() < CATALOG_LEAF_CAPACITY {
        return Ok(0);
    }
    match location.parent {
        Some((node_page, _)) => {
            let node = read_node(device, mddf, node_page)?;
            if node.separators.len() >= CATALOG_NODE_CAPACITY {
                return Err(FsError::NotFound(Resource::CatalogSlot));
            }
            Ok(1)
        }
        None => Ok(2),
    }
}

/// Inserts `entry` in order, splitting its leaf first if it is full.
#[instrument(skip_all, fields(name = %entry.name))]
pub fn insert(
    device: &mut impl SectorDevice,
    mddf: &mut Mddf,
    entry: &CatalogEntry,
    avoid: &[Range<u32>],
) -> Result<()> {
    for _ in 0..2 {
        let location = locate(device, mddf, &entry.name)?;
        let mut leaf = read_leaf(device, mddf, location.leaf)?;
        if leaf.entries.iter().any(|e| names_equal(&e.name, &entry.name)) {
            return Err(FsError::DuplicateName(entry.name.clone()));
        }

        if leaf.entries.len() < CATALOG_LEAF_CAPACITY {
            let pos = leaf
                .entries
                .iter()
                .position(|e| cmp_names(&e.name, &entry.name) == Ordering::Greater)
                .unwrap_or(leaf.entries.len());
            leaf.entries.insert(pos, entry.clone());
            write_leaf(device, mddf, &leaf);
            debug!("entry {} at slot {} of leaf {:#x}", entry.name, pos, leaf.page);

            // new first key: keep the parent's separator in step
            if pos == 0 {
                if let Some((node_page, slot)) = location.parent {
                    let mut node = read_node(device, mddf, node_page)?;
                    node.separators[slot].name = entry.name.clone();
                    write_node(device, mddf, &node);
                }
            }
            return Ok(());
        }

        split(device, mddf, &location, avoid)?;
    }
    Err(FsError::IntegrityViolation(format!(
        "no room for {} even after a split",
        entry.name
    )))
}

/// Moves the upper half of a full leaf into a newly claimed block, links it
/// in as the next sibling and adds its first key to the parent. When the
/// leaf is the root, a non-leaf root is claimed above both halves.
/// Returns the new leaf's page.
pub fn split(
    device: &mut impl SectorDevice,
    mddf: &mut Mddf,
    location: &Location,
    avoid: &[Range<u32>],
) -> Result<u32> {
    let mut leaf = read_leaf(device, mddf, location.leaf)?;
    let parent = match location.parent {
        Some((node_page, slot)) => {
            let node = read_node(device, mddf, node_page)?;
            if node.separators.len() >= CATALOG_NODE_CAPACITY {
                return Err(FsError::NotFound(Resource::CatalogSlot));
            }
            Some((node, slot))
        }
        None => None,
    };
    let wanted = if parent.is_some() { 1 } else { 2 };
    let groups = find_free_groups(device, mddf, wanted, avoid)
        .ok_or(FsError::NotFound(Resource::CatalogBlock))?;

    let new_page = claim_catalog_block(device, mddf, groups[0])?;
    let moved = leaf.entries.split_off(leaf.entries.len() / 2);
    let right = Leaf {
        page: new_page,
        prev: leaf.page,
        next: leaf.next,
        entries: moved,
    };
    if leaf.next != CATALOG_NIL {
        let mut after = read_leaf(device, mddf, leaf.next)?;
        after.prev = new_page;
        write_leaf(device, mddf, &after);
    }
    leaf.next = new_page;
    write_leaf(device, mddf, &leaf);
    write_leaf(device, mddf, &right);

    let separator = Separator {
        name: right.entries[0].name.clone(),
        child: new_page,
    };
    match parent {
        Some((mut node, slot)) => {
            node.separators.insert(slot + 1, separator);
            write_node(device, mddf, &node);
        }
        None => {
            let node = Node {
                page: claim_catalog_block(device, mddf, groups[1])?,
                separators: vec![
                    Separator {
                        name: leaf.entries[0].name.clone(),
                        child: leaf.page,
                    },
                    separator,
                ],
            };
            write_node(device, mddf, &node);
            mddf.root_page = node.page;
            write_mddf(device, mddf);
            info!("catalog root moved to non-leaf block {:#x}", node.page);
        }
    }
    debug!(
        "split leaf {:#x}: {} + {} entries, new leaf {:#x}",
        leaf.page,
        leaf.entries.len(),
        right.entries.len(),
        new_page
    );
    Ok(new_page)
}

/// Claims the four sectors starting at `sector` as an empty catalog leaf.
/// Returns the block's page.
pub fn claim_catalog_block(
    device: &mut impl SectorDevice,
    mddf: &mut Mddf,
    sector: u32,
) -> Result<u32> {
    let sectors = sector..sector + CATALOG_BLOCK_SECTORS as u32;
    if let Some(used) = sectors.clone().find(|&s| !tag_is_free(device, s)) {
        return Err(FsError::IntegrityViolation(format!(
            "catalog block claim over used sector {:#x}",
            used
        )));
    }

    for (j, s) in sectors.clone().enumerate() {
        let page = mddf.page_of(s);
        let tag = Tag {
            rel_page: j as u16,
            fwd_link: if j + 1 == CATALOG_BLOCK_SECTORS { NIL_LINK } else { page + 1 },
            bkwd_link: if j == 0 { NIL_LINK } else { page - 1 },
            ..Tag::owned(FILE_ID_CATALOG, VOLID_CATALOG, DATA_USED_FULL, page)
        };
        device.write_tag(s, &tag);
    }
    device.sectors_mut(sector, CATALOG_BLOCK_SECTORS).fill(0);
    let page = mddf.page_of(sector);
    write_leaf(device, mddf, &Leaf::empty(page));

    for s in sectors {
        mark_allocated(device, mddf, s);
    }
    consume_free(device, mddf, CATALOG_BLOCK_SECTORS as u32)?;
    debug!("claimed catalog block at sector {:#x}", sector);
    Ok(page)
}

/// Finds the lowest free aligned group of four sectors and claims it.
pub fn claim_next_free_catalog_block(
    device: &mut impl SectorDevice,
    mddf: &mut Mddf,
    avoid: &[Range<u32>],
) -> Result<u32> {
    let groups = find_free_groups(device, mddf, 1, avoid)
        .ok_or(FsError::NotFound(Resource::CatalogBlock))?;
    claim_catalog_block(device, mddf, groups[0])
}

/// All leaves, leftmost first, following the next-sibling links.
pub fn leaves(device: &impl SectorDevice, mddf: &Mddf) -> Result<Vec<Leaf>> {
    let first = match read_block(device, mddf, mddf.root_page)? {
        Block::Leaf(leaf) => leaf.page,
        Block::Node(node) => {
            node.separators
                .first()
                .ok_or_else(|| FsError::IntegrityViolation("empty non-leaf catalog root".into()))?
                .child
        }
    };

    let limit = device.num_sectors() as usize / CATALOG_BLOCK_SECTORS;
    let mut out: Vec<Leaf> = Vec::new();
    let mut page = first;
    while page != CATALOG_NIL {
        if out.len() >= limit {
            return Err(FsError::IntegrityViolation("catalog sibling links form a loop".into()));
        }
        let leaf = read_leaf(device, mddf, page)?;
        page = leaf.next;
        out.push(leaf);
    }
    Ok(out)
}

/// Every entry in catalog order.
pub fn entries(device: &impl SectorDevice, mddf: &Mddf) -> Result<Vec<CatalogEntry>> {
    Ok(leaves(device, mddf)?
        .into_iter()
        .flat_map(|leaf| leaf.entries)
        .collect())
}

/// Entries strictly ascending, sibling links symmetric, separators matching
/// each child's first key.
pub fn check_order(device: &impl SectorDevice, mddf: &Mddf) -> Result<()> {
    let leaves = leaves(device, mddf)?;

    let mut prev_page = CATALOG_NIL;
    for leaf in &leaves {
        if leaf.prev != prev_page {
            return Err(FsError::IntegrityViolation(format!(
                "leaf {:#x} links back to {:#x}, expected {:#x}",
                leaf.page, leaf.prev, prev_page
            )));
        }
        prev_page = leaf.page;
    }

    let all: Vec<&CatalogEntry> = leaves.iter().flat_map(|l| &l.entries).collect();
    if let Some(pair) = all
        .windows(2)
        .find(|pair| cmp_names(&pair[0].name, &pair[1].name) != Ordering::Less)
    {
        return Err(FsError::IntegrityViolation(format!(
            "catalog out of order: {} before {}",
            pair[0].name, pair[1].name
        )));
    }

    if let Block::Node(node) = read_block(device, mddf, mddf.root_page)? {
        let mirrored = node.separators.len() == leaves.len()
            && node.separators.iter().zip(&leaves).all(|(s, leaf)| {
                s.child == leaf.page
                    && leaf.entries.first().is_some_and(|e| e.name == s.name)
            });
        if !mirrored {
            return Err(FsError::IntegrityViolation(
                "non-leaf separators do not mirror the leaves".into(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::format::format_volume;
    use crate::mddf::read_mddf;

    #[test]
    fn test_trailer_layout() {
        let mut image = format_volume(Geometry::PROFILE_5MB, "t").unwrap();
        let mddf = read_mddf(&image).unwrap();
        let leaf = Leaf {
            page: mddf.root_page,
            prev: 0x0000_0039,
            next: 0x0000_0104,
            entries: Vec::new(),
        };
        write_leaf(&mut image, &mddf, &leaf);

        // last sector of the block: prev at 502, next at 506, count at 510
        let last = image.sector(mddf.sector_of(mddf.root_page) + 3);
        assert_eq!(&last[500..502], &[0x00, 0x00]);
        assert_eq!(&last[502..506], &[0x00, 0x00, 0x00, 0x39]);
        assert_eq!(&last[506..510], &[0x00, 0x00, 0x01, 0x04]);
        assert_eq!(&last[510..512], &[0x00, 0x00]);
        assert_eq!(read_block(&image, &mddf, leaf.page).unwrap(), Block::Leaf(leaf.clone()));
    }

    #[test]
    fn test_unknown_kind_reads_as_leaf() {
        let mut image = format_volume(Geometry::PROFILE_5MB, "t").unwrap();
        let mddf = read_mddf(&image).unwrap();
        let first = mddf.sector_of(mddf.root_page);
        image.sectors_mut(first, CATALOG_BLOCK_SECTORS)[CATALOG_KIND..CATALOG_KIND + 2]
            .copy_from_slice(&[0xFF, 0xFF]);
        assert!(matches!(
            read_block(&image, &mddf, mddf.root_page).unwrap(),
            Block::Leaf(ref leaf) if leaf.entries.is_empty()
        ));

        image.sectors_mut(first, CATALOG_BLOCK_SECTORS)[CATALOG_COUNT + 1] = 30;
        assert!(matches!(
            read_block(&image, &mddf, mddf.root_page),
            Err(FsError::IntegrityViolation(_))
        ));
    }
}
