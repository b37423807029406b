//! Tests for coordinate conversion

use super::*;
use proptest::prelude::*;

#[test]
fn test_new_york_city_at_zoom_16() {
    // New York City: 40.7128°N, 74.0060°W
    let tile = to_tile_coords(40.7128, -74.0060, 16).unwrap();
    assert_eq!(tile.x, 19295);
    assert_eq!(tile.y, 24640);
    assert_eq!(tile.z, 16);
}

#[test]
fn test_equator_prime_meridian() {
    // At zoom 1: 2×2 tiles, 0°N 0°E is the corner shared by all four
    let tile = to_tile_coords(0.0, 0.0, 1).unwrap();
    assert_eq!((tile.x, tile.y), (1, 1));
}

#[test]
fn test_east_edge_stays_in_grid() {
    let tile = to_tile_coords(0.0, 180.0, 3).unwrap();
    assert_eq!(tile.x, 7);
}

#[test]
fn test_invalid_latitude() {
    let result = to_tile_coords(90.0, 0.0, 10);
    assert!(matches!(result, Err(CoordError::InvalidLatitude(_))));
}

#[test]
fn test_invalid_zoom() {
    assert!(matches!(
        to_tile_coords(0.0, 0.0, 31),
        Err(CoordError::InvalidZoom(31))
    ));
    assert!(matches!(
        TileCoord::new(31, 0, 0),
        Err(CoordError::InvalidZoom(31))
    ));
}

#[test]
fn test_tile_new_rejects_out_of_grid() {
    assert!(TileCoord::new(0, 0, 0).is_ok());
    assert!(matches!(
        TileCoord::new(0, 1, 0),
        Err(CoordError::TileOutOfRange { z: 0, x: 1, y: 0 })
    ));
    assert!(TileCoord::new(2, 3, 3).is_ok());
    assert!(TileCoord::new(2, 4, 0).is_err());
}

#[test]
fn test_world_tile_bounds() {
    let tile = TileCoord::new(0, 0, 0).unwrap();
    let m = tile.mercator_bounds();
    assert!((m.min_x + ORIGIN_SHIFT).abs() < 1e-6);
    assert!((m.max_y - ORIGIN_SHIFT).abs() < 1e-6);

    let g = tile.lonlat_bounds();
    assert!((g.min_x + 180.0).abs() < 1e-9);
    assert!((g.max_x - 180.0).abs() < 1e-9);
    assert!((g.max_y - MAX_LAT).abs() < 1e-6);
}

#[test]
fn test_lonlat_bounds_northwest_corner() {
    let tile = TileCoord {
        z: 16,
        x: 19295,
        y: 24640,
    };
    let bounds = tile.lonlat_bounds();
    assert!((bounds.max_y - 40.713).abs() < 0.01);
    assert!((bounds.min_x - (-74.007)).abs() < 0.01);
}

#[test]
fn test_mercator_roundtrip_known_point() {
    let (x, y) = lonlat_to_mercator(13.4050, 52.5200);
    assert!((x - 1_492_237.8).abs() < 1.0);
    assert!((y - 6_894_699.8).abs() < 1.0);

    let (lon, lat) = mercator_to_lonlat(x, y);
    assert!((lon - 13.4050).abs() < 1e-9);
    assert!((lat - 52.5200).abs() < 1e-9);
}

#[test]
fn test_mercator_clamps_poles() {
    let (_, y) = lonlat_to_mercator(0.0, 90.0);
    assert!(y.is_finite());
    assert!((y - ORIGIN_SHIFT).abs() < 1.0);
}

#[test]
fn test_parent_and_children() {
    let tile = TileCoord::new(5, 10, 21).unwrap();
    let children = tile.children().unwrap();
    for child in children {
        assert_eq!(child.parent(), Some(tile));
    }
    assert_eq!(TileCoord::new(0, 0, 0).unwrap().parent(), None);
}

#[test]
fn test_zoom_for_resolution() {
    assert_eq!(zoom_for_resolution(resolution_at_zoom(0)), 0);
    assert_eq!(zoom_for_resolution(resolution_at_zoom(18)), 18);
    // 3cm drone imagery sits between zoom 22 and 23
    assert_eq!(zoom_for_resolution(0.03), 22);
    assert_eq!(zoom_for_resolution(1e-9), MAX_DATASET_ZOOM);
    assert_eq!(zoom_for_resolution(f64::NAN), DEFAULT_MAXZOOM);
}

#[test]
fn test_zoom_range_for_small_raster() {
    // A single 256px tile at zoom 18 resolution fits one tile at zoom 18
    let (min, max) = zoom_range(resolution_at_zoom(18), 256, 256);
    assert_eq!((min, max), (18, 18));

    // 4096px raster needs 4 more levels to shrink into a tile
    let (min, max) = zoom_range(resolution_at_zoom(18), 4096, 1024);
    assert_eq!((min, max), (14, 18));
}

#[test]
fn test_zoom_range_fallback() {
    assert_eq!(
        zoom_range(0.0, 100, 100),
        (DEFAULT_MINZOOM, DEFAULT_MAXZOOM)
    );
    assert_eq!(zoom_range(1.0, 0, 100), (DEFAULT_MINZOOM, DEFAULT_MAXZOOM));
}

#[test]
fn test_bounds_intersects_excludes_touching() {
    let a = Bounds::new(0.0, 0.0, 1.0, 1.0);
    let b = Bounds::new(1.0, 0.0, 2.0, 1.0);
    let c = Bounds::new(0.5, 0.5, 1.5, 1.5);
    assert!(!a.intersects(&b));
    assert!(a.intersects(&c));
    assert!(c.intersects(&b));
}

proptest! {
    #[test]
    fn prop_children_tile_parent_exactly(z in 0u8..20, fx in 0.0f64..1.0, fy in 0.0f64..1.0) {
        let n = 1u32 << z;
        let x = ((fx * n as f64) as u32).min(n - 1);
        let y = ((fy * n as f64) as u32).min(n - 1);
        let tile = TileCoord::new(z, x, y).unwrap();
        let parent = tile.mercator_bounds();
        let children = tile.children().unwrap();

        let min_x = children.iter().map(|c| c.mercator_bounds().min_x).fold(f64::INFINITY, f64::min);
        let max_x = children.iter().map(|c| c.mercator_bounds().max_x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = children.iter().map(|c| c.mercator_bounds().min_y).fold(f64::INFINITY, f64::min);
        let max_y = children.iter().map(|c| c.mercator_bounds().max_y).fold(f64::NEG_INFINITY, f64::max);

        let tol = 1e-6;
        prop_assert!((min_x - parent.min_x).abs() < tol);
        prop_assert!((max_x - parent.max_x).abs() < tol);
        prop_assert!((min_y - parent.min_y).abs() < tol);
        prop_assert!((max_y - parent.max_y).abs() < tol);
    }

    #[test]
    fn prop_point_lies_in_its_tile(lat in -85.0f64..85.0, lon in -179.9f64..179.9, z in 0u8..22) {
        let tile = to_tile_coords(lat, lon, z).unwrap();
        let b = tile.lonlat_bounds();
        prop_assert!(lon >= b.min_x - 1e-9 && lon <= b.max_x + 1e-9);
        prop_assert!(lat >= b.min_y - 1e-9 && lat <= b.max_y + 1e-9);
    }
}
