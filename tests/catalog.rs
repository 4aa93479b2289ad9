#![allow(unused)]

mod common;

use std::cmp::Ordering;

use common::{fresh_volume, options, scrambled};
use lisafs::catalog::{self, Block};
use lisafs::cmp_names;
use lisafs::format_volume;
use lisafs::mddf::read_mddf;
use lisafs::Error;
use lisafs::Geometry;
use lisafs::SectorDevice;
use lisafs::Volume;
use lisafs::CATALOG_LEAF_CAPACITY;
use lisafs::CATALOG_NIL;
use lisafs::NIL_LINK;

#[test]
fn test_claim_catalog_block() {
    let mut image = format_volume(Geometry::PROFILE_5MB, "t").unwrap();
    let mut mddf = read_mddf(&image).unwrap();
    let free = mddf.free_count;

    let page = catalog::claim_next_free_catalog_block(&mut image, &mut mddf, &[]).unwrap();
    assert_eq!(page % 4, 0);
    assert_ne!(page, mddf.root_page);
    assert_eq!(free - mddf.free_count, 4);
    assert_eq!(read_mddf(&image).unwrap().free_count, mddf.free_count);

    let first = mddf.sector_of(page);
    for j in 0..4u32 {
        let tag = image.read_tag(first + j);
        assert_eq!(tag.file_id, 4);
        assert_eq!(tag.volid, 0x2500);
        assert_eq!(tag.data_used, 0x8200);
        assert_eq!(tag.rel_page, j as u16);
        assert_eq!(tag.fwd_link, if j == 3 { NIL_LINK } else { page + j + 1 });
        assert_eq!(tag.bkwd_link, if j == 0 { NIL_LINK } else { page + j - 1 });
    }
    assert_eq!(&image.sector(first)[..3], &[0x24, 0x00, 0x00]);
    match catalog::read_block(&image, &mddf, page).unwrap() {
        Block::Leaf(leaf) => {
            assert!(leaf.entries.is_empty());
            assert_eq!(leaf.prev, CATALOG_NIL);
            assert_eq!(leaf.next, CATALOG_NIL);
        }
        Block::Node(_) => panic!("fresh block should be a leaf"),
    }
    lisafs::bitmap::check_consistency(&image, &mddf).unwrap();
}

#[test]
fn test_root_split() {
    let mut volume = fresh_volume();
    for i in scrambled(CATALOG_LEAF_CAPACITY) {
        volume.write_file(&format!("name{:02}", i), b"x", &options()).unwrap();
    }
    let root = volume.mddf().root_page;
    assert!(matches!(
        catalog::read_block(volume.device(), volume.mddf(), root).unwrap(),
        Block::Leaf(ref leaf) if leaf.entries.len() == CATALOG_LEAF_CAPACITY
    ));
    assert_eq!(catalog::blocks_needed(volume.device(), volume.mddf(), "name29").unwrap(), 2);

    // the 30th entry needs a new leaf and a non-leaf root above both
    let free = volume.mddf().free_count;
    volume.write_file("name29", b"x", &options()).unwrap();
    assert_eq!(free - volume.mddf().free_count, 8 + 1 + 1);

    let mddf = *volume.mddf();
    let device = volume.device();
    assert_ne!(mddf.root_page, root);
    let Block::Node(node) = catalog::read_block(device, &mddf, mddf.root_page).unwrap() else {
        panic!("root should be a non-leaf block after the split");
    };
    let leaves = catalog::leaves(device, &mddf).unwrap();
    assert_eq!(leaves.len(), 2);
    let (left, right) = (&leaves[0], &leaves[1]);
    log!("split: {} + {} entries", left.entries.len(), right.entries.len());

    assert_eq!(left.page, root);
    assert_eq!(left.entries.len() + right.entries.len(), CATALOG_LEAF_CAPACITY + 1);
    assert_eq!(left.entries.len(), CATALOG_LEAF_CAPACITY / 2);
    assert_eq!((left.prev, left.next), (CATALOG_NIL, right.page));
    assert_eq!((right.prev, right.next), (left.page, CATALOG_NIL));

    assert_eq!(node.separators.len(), 2);
    assert_eq!(node.separators[0].child, left.page);
    assert_eq!(node.separators[0].name, "name00");
    assert_eq!(node.separators[1].child, right.page);
    assert_eq!(node.separators[1].name, right.entries[0].name);
    assert_eq!(right.entries[0].name, "name14");

    catalog::check_order(device, &mddf).unwrap();
}

#[test]
fn test_new_first_name_updates_separator() {
    let mut volume = fresh_volume();
    for i in 0..=CATALOG_LEAF_CAPACITY {
        volume.write_file(&format!("name{:02}", i), b"x", &options()).unwrap();
    }
    assert_eq!(catalog::blocks_needed(volume.device(), volume.mddf(), "aaa").unwrap(), 0);
    volume.write_file("AAA", b"x", &options()).unwrap();

    let mddf = *volume.mddf();
    let root = catalog::read_block(volume.device(), &mddf, mddf.root_page).unwrap();
    let Block::Node(node) = root else {
        panic!("expected a non-leaf root");
    };
    assert_eq!(node.separators[0].name, "AAA");
    catalog::check_order(volume.device(), &mddf).unwrap();

    let result = volume.write_file("NAME20", b"x", &options());
    assert!(matches!(result, Err(Error::DuplicateName(_))));
}

#[test]
fn test_scrambled_inserts_stay_ordered() {
    let mut volume = fresh_volume();
    let count = 120;
    for i in scrambled(count) {
        // mixed case, so the order has to ignore it
        let name = if i % 3 == 0 {
            format!("FILE{:03}.text", i)
        } else {
            format!("file{:03}.text", i)
        };
        volume.write_file(&name, &vec![i as u8; 100 + i * 7], &options()).unwrap();
    }

    let entries = volume.entries().unwrap();
    assert_eq!(entries.len(), count);
    assert!(entries
        .windows(2)
        .all(|pair| cmp_names(&pair[0].name, &pair[1].name) == Ordering::Less));
    let mut ids: Vec<u16> = entries.iter().map(|e| e.sfile).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), count);

    let mddf = *volume.mddf();
    let leaves = catalog::leaves(volume.device(), &mddf).unwrap();
    log!("{} entries across {} leaves", count, leaves.len());
    assert!(leaves.len() >= count.div_ceil(CATALOG_LEAF_CAPACITY));
    assert!(leaves
        .iter()
        .all(|l| !l.entries.is_empty() && l.entries.len() <= CATALOG_LEAF_CAPACITY));

    for i in [0, 57, 119] {
        let content = volume.read_file(&format!("file{:03}.TEXT", i)).unwrap().unwrap();
        assert_eq!(content, vec![i as u8; 100 + i * 7]);
    }
    Volume::open(volume.finish()).unwrap().verify().unwrap();
}

