#![allow(unused)]

mod common;

use lisafs::alloc::{find_contiguous_free, find_free_groups, find_single_free};
use lisafs::bitmap::{check_consistency, is_free, mark_allocated, rebuild};
use lisafs::format_volume;
use lisafs::mddf::read_mddf;
use lisafs::Geometry;
use lisafs::SectorDevice;
use lisafs::Tag;
use lisafs::VolumeImage;

fn claim(image: &mut VolumeImage, sector: u32, file_id: u16) {
    let mddf = read_mddf(image).unwrap();
    image.write_tag(sector, &Tag::owned(file_id, 0, 0x8200, mddf.page_of(sector)));
    mark_allocated(image, &mddf, sector);
}

#[test]
fn test_mark_allocated() {
    let mut image = format_volume(Geometry::PROFILE_5MB, "t").unwrap();
    let mddf = read_mddf(&image).unwrap();
    for sector in [0x100, 0x101, 0x107, 0x25FF] {
        assert!(is_free(&image, &mddf, sector));
        claim(&mut image, sector, 42);
        assert!(!is_free(&image, &mddf, sector));
    }
    check_consistency(&image, &mddf).unwrap();
}

#[test]
fn test_mark_allocated_rederives_group() {
    let mut image = format_volume(Geometry::PROFILE_5MB, "t").unwrap();
    let mddf = read_mddf(&image).unwrap();
    let bitmap = mddf.sector_of(mddf.bitmap_addr);
    let page = mddf.page_of(0x200);
    assert!(page % 8 < 7);

    // a stray bit for a sector no tag claims
    let byte = (page / 8) as usize;
    image.sector_mut(bitmap)[byte] |= 1 << (page % 8 + 1);
    assert!(check_consistency(&image, &mddf).is_err());

    // claiming a neighbour in the same group of eight clears it again
    claim(&mut image, 0x200, 42);
    check_consistency(&image, &mddf).unwrap();

    image.sector_mut(bitmap)[byte] = 0xFF;
    assert!(check_consistency(&image, &mddf).is_err());
    rebuild(&mut image, &mddf);
    check_consistency(&image, &mddf).unwrap();
}

#[test]
fn test_sectors_before_mddf_never_free() {
    let image = format_volume(Geometry::PROFILE_5MB, "t").unwrap();
    let mddf = read_mddf(&image).unwrap();
    assert!((0..mddf.sector).all(|s| !is_free(&image, &mddf, s)));
}

#[test]
fn test_contiguous_scans_from_the_top() {
    let mut image = format_volume(Geometry::PROFILE_5MB, "t").unwrap();
    let mddf = read_mddf(&image).unwrap();
    let top = image.num_sectors();

    assert_eq!(find_contiguous_free(&image, &mddf, 1, &[]), Some(top - 1));
    assert_eq!(find_contiguous_free(&image, &mddf, 3, &[]), Some(top - 3));

    // a used sector splits the top run
    claim(&mut image, top - 2, 42);
    assert_eq!(find_contiguous_free(&image, &mddf, 1, &[]), Some(top - 1));
    assert_eq!(find_contiguous_free(&image, &mddf, 2, &[]), Some(top - 4));
    assert_eq!(find_contiguous_free(&image, &mddf, 2, &[top - 4..top - 3]), Some(top - 6));

    assert_eq!(find_contiguous_free(&image, &mddf, top, &[]), None);
}

#[test]
fn test_single_and_groups() {
    let mut image = format_volume(Geometry::PROFILE_5MB, "t").unwrap();
    let mddf = read_mddf(&image).unwrap();
    // pages 12.. are the first free ones past the root leaf
    let first_free = mddf.sector_of(12);
    assert_eq!(find_single_free(&image, &mddf, 0, &[]), Some(mddf.sector_of(12)));
    let avoid = [first_free..first_free + 2];
    assert_eq!(find_single_free(&image, &mddf, first_free, &avoid), Some(first_free + 2));

    claim(&mut image, first_free + 1, 42);
    let groups = find_free_groups(&image, &mddf, 2, &[]).unwrap();
    assert_eq!(groups, [mddf.sector_of(16), mddf.sector_of(20)]);
    assert!(groups.iter().all(|&s| mddf.page_of(s) % 4 == 0));
    assert_eq!(find_free_groups(&image, &mddf, 0, &[]), Some(vec![]));
}
