use super::*;
use crate::coord::{lonlat_to_mercator, to_tile_coords};
use crate::raster::geotiff::testutil::{write_solid_rgb, Georef};
use crate::raster::Crs;
use filetime::FileTime;
use std::path::Path;
use tempfile::TempDir;

const WEST: [u8; 3] = [200, 30, 30];
const EAST: [u8; 3] = [30, 30, 200];

/// Upper-left corner of the mosaic in Web Mercator metres.
fn mosaic_origin() -> (f64, f64) {
    let (cx, cy) = lonlat_to_mercator(13.4, 52.5);
    (cx - 128.0, cy + 64.0)
}

fn write_sources(dir: &Path, west: [u8; 3], east: [u8; 3]) {
    let (x0, y0) = mosaic_origin();
    let georef = |x: f64| Georef {
        origin: (x, y0),
        pixel_size: 1.0,
        epsg: 3857,
        nodata: None,
    };
    std::fs::create_dir_all(dir.join("src")).unwrap();
    write_solid_rgb(&dir.join("src/west.tif"), 128, 128, west, &georef(x0));
    write_solid_rgb(&dir.join("src/east.tif"), 128, 128, east, &georef(x0 + 128.0));
}

/// Two 128x128 sources at 1 m/px side by side around (13.4, 52.5).
fn write_mosaic(dir: &Path) {
    let (x0, y0) = mosaic_origin();
    write_sources(dir, WEST, EAST);

    let colours = ["Red", "Green", "Blue"];
    let mut bands = String::new();
    for band in 1..=3 {
        bands.push_str(&format!(
            r#"<VRTRasterBand dataType="Byte" band="{band}">
    <ColorInterp>{colour}</ColorInterp>
    <Metadata><MDI key="STATISTICS_MAXIMUM">200</MDI></Metadata>
    <SimpleSource><SourceFilename relativeToVRT="1">src/west.tif</SourceFilename><SourceBand>{band}</SourceBand>
      <SrcRect xOff="0" yOff="0" xSize="128" ySize="128"/><DstRect xOff="0" yOff="0" xSize="128" ySize="128"/></SimpleSource>
    <SimpleSource><SourceFilename relativeToVRT="1">src/east.tif</SourceFilename><SourceBand>{band}</SourceBand>
      <SrcRect xOff="0" yOff="0" xSize="128" ySize="128"/><DstRect xOff="128" yOff="0" xSize="128" ySize="128"/></SimpleSource>
  </VRTRasterBand>"#,
            colour = colours[band - 1],
        ));
    }
    let vrt = format!(
        r#"<VRTDataset rasterXSize="256" rasterYSize="128">
  <SRS>EPSG:3857</SRS>
  <GeoTransform>{x0}, 1, 0, {y0}, 0, -1</GeoTransform>
  {bands}
</VRTDataset>"#
    );
    std::fs::write(dir.join("mosaic.vrt"), vrt).unwrap();
}

fn service(dir: &Path, public_url: Option<&str>) -> TileService {
    let mut config = ServerConfig::default();
    config.data.data_dir = dir.to_path_buf();
    config.raster.threads = 2;
    config.server.public_url = public_url.map(str::to_string);
    TileService::new(config)
}

fn fixture() -> (TempDir, TileService) {
    let dir = TempDir::new().unwrap();
    write_mosaic(dir.path());
    let service = service(dir.path(), None);
    (dir, service)
}

#[test]
fn test_health() {
    let (_dir, service) = fixture();
    assert_eq!(service.health().status, "ok");
}

#[tokio::test]
async fn test_list_datasets() {
    let (_dir, service) = fixture();
    let list = service.list_datasets().await.unwrap();
    assert_eq!(list.datasets.len(), 1);
    assert_eq!(list.datasets[0].name, "mosaic");
    assert_eq!(list.datasets[0].path, "mosaic.vrt");
}

#[tokio::test]
async fn test_dataset_info() {
    let (_dir, service) = fixture();
    let info = service.dataset_info("mosaic").await.unwrap();

    assert_eq!(info.name, "mosaic");
    assert_eq!(info.crs, "EPSG:3857");
    assert_eq!((info.width, info.height, info.count), (256, 128, 3));
    assert_eq!(info.dtype, "uint8");
    assert_eq!(info.nodata_type, "None");
    assert_eq!(info.colorinterp, vec!["red", "green", "blue"]);
    assert_eq!(info.band_metadata[0].0, "b1");
    assert_eq!(
        info.band_metadata[0].1.get("STATISTICS_MAXIMUM").map(String::as_str),
        Some("200")
    );
    assert!((info.bounds[2] - info.bounds[0] - 256.0).abs() < 1e-6);

    let geo = info.geographic_bounds.unwrap();
    assert!(geo[0] < 13.4 && geo[2] > 13.4);
    assert!(geo[1] < 52.5 && geo[3] > 52.5);
    assert!(info.minzoom <= info.maxzoom);
}

#[tokio::test]
async fn test_unknown_dataset() {
    let (_dir, service) = fixture();
    let err = service.dataset_info("nope").await.unwrap_err();
    assert!(matches!(&err, ServiceError::DatasetNotFound(name) if name == "nope"));
    assert_eq!(err.to_string(), "Dataset nope not found");

    let err = service
        .tile("nope", 20, 0, 0, TileFormat::Png, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::DatasetNotFound(_)));
}

#[tokio::test]
async fn test_bounds_center() {
    let (_dir, service) = fixture();
    let bounds = service.dataset_bounds("mosaic").await.unwrap();
    assert!((bounds.center[0] - 13.4).abs() < 1e-6);
    assert!((bounds.center[1] - 52.5).abs() < 1e-6);
}

#[tokio::test]
async fn test_tilejson_with_public_url() {
    let dir = TempDir::new().unwrap();
    write_mosaic(dir.path());
    let service = service(dir.path(), Some("https://tiles.example.com"));

    let tj = service.tilejson("mosaic", "webp").await.unwrap();
    assert_eq!(tj.tilejson, "3.0.0");
    assert_eq!(
        tj.tiles,
        vec!["https://tiles.example.com/datasets/mosaic/tiles/{z}/{x}/{y}.webp".to_string()]
    );
    let zoom = tj.center[2] as u8;
    assert!(zoom >= tj.minzoom && zoom <= tj.maxzoom);
}

#[tokio::test]
async fn test_tilejson_relative_and_unknown_format() {
    let (_dir, service) = fixture();
    let tj = service.tilejson("mosaic", "tiff").await.unwrap();
    assert_eq!(tj.tiles[0], "/datasets/mosaic/tiles/{z}/{x}/{y}.png");
}

#[tokio::test]
async fn test_tile_renders_both_sources_and_caches() {
    let (_dir, service) = fixture();
    let t = to_tile_coords(52.5, 13.4, 20).unwrap();

    let tile = service
        .tile("mosaic", 20, t.x, t.y, TileFormat::Png, None)
        .await
        .unwrap();
    assert_eq!(tile.format, TileFormat::Png);
    let image = image::load_from_memory(&tile.data).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (256, 256));
    for p in image.pixels() {
        let rgb = [p[0], p[1], p[2]];
        assert!(rgb == WEST || rgb == EAST, "unexpected pixel {:?}", p);
        assert_eq!(p[3], 255);
    }

    let again = service
        .tile("mosaic", 20, t.x, t.y, TileFormat::Png, None)
        .await
        .unwrap();
    assert_eq!(again.data, tile.data);
    let cache = service.tile_cache().unwrap();
    let source = SourceLocation::Local(service.catalog().data_dir().join("mosaic.vrt")).to_string();
    let revision = service
        .pool
        .open(&SourceLocation::Local(service.catalog().data_dir().join("mosaic.vrt")))
        .unwrap()
        .revision();
    let key = TileKey {
        source: &source,
        revision,
        tile: t,
        format: TileFormat::Png,
        rescale: None,
    };
    assert_eq!(cache.get(&key).await, Some(tile.data));
}

#[tokio::test]
async fn test_rewritten_sources_are_rendered_again() {
    let (dir, service) = fixture();
    let t = to_tile_coords(52.5, 13.4, 20).unwrap();
    let before = service
        .tile("mosaic", 20, t.x, t.y, TileFormat::Png, None)
        .await
        .unwrap();

    let green = [30, 200, 30];
    write_sources(dir.path(), green, green);
    let stamp = FileTime::from_unix_time(1_000_000_000, 0);
    for name in ["src/west.tif", "src/east.tif"] {
        filetime::set_file_mtime(dir.path().join(name), stamp).unwrap();
    }

    let after = service
        .tile("mosaic", 20, t.x, t.y, TileFormat::Png, None)
        .await
        .unwrap();
    assert_ne!(after.data, before.data);
    let image = image::load_from_memory(&after.data).unwrap().to_rgba8();
    assert!(image.pixels().all(|p| [p[0], p[1], p[2]] == green));
}

#[tokio::test]
async fn test_tilejson_escapes_dataset_name() {
    let (dir, service) = fixture();
    std::fs::copy(dir.path().join("mosaic.vrt"), dir.path().join("site a#1.vrt")).unwrap();

    let tj = service.tilejson("site a#1", "png").await.unwrap();
    assert_eq!(tj.tiles[0], "/datasets/site%20a%231/tiles/{z}/{x}/{y}.png");
}

/// A 128x128 orthophoto at 1 m/px in UTM zone 33N centred on (13.4, 52.5).
fn write_utm_plot(dir: &Path) {
    let transform = Crs::Epsg(32633).transform().unwrap();
    let (x, y) = transform.from_lonlat(13.4, 52.5).unwrap();
    let (x0, y0) = (x - 64.0, y + 64.0);
    write_solid_rgb(
        &dir.join("plot.tif"),
        128,
        128,
        WEST,
        &Georef {
            origin: (x0, y0),
            pixel_size: 1.0,
            epsg: 32633,
            nodata: None,
        },
    );

    let mut bands = String::new();
    for band in 1..=3 {
        bands.push_str(&format!(
            r#"<VRTRasterBand dataType="Byte" band="{band}">
    <SimpleSource><SourceFilename relativeToVRT="1">plot.tif</SourceFilename><SourceBand>{band}</SourceBand>
      <SrcRect xOff="0" yOff="0" xSize="128" ySize="128"/><DstRect xOff="0" yOff="0" xSize="128" ySize="128"/></SimpleSource>
  </VRTRasterBand>"#
        ));
    }
    let vrt = format!(
        r#"<VRTDataset rasterXSize="128" rasterYSize="128">
  <SRS>EPSG:32633</SRS>
  <GeoTransform>{x0}, 1, 0, {y0}, 0, -1</GeoTransform>
  {bands}
</VRTDataset>"#
    );
    std::fs::write(dir.join("plot.vrt"), vrt).unwrap();
}

#[tokio::test]
async fn test_utm_dataset_is_served() {
    let dir = TempDir::new().unwrap();
    write_utm_plot(dir.path());
    let service = service(dir.path(), None);

    let info = service.dataset_info("plot").await.unwrap();
    assert_eq!(info.crs, "EPSG:32633");
    assert!(info.geographic_bounds.is_some());

    let bounds = service.dataset_bounds("plot").await.unwrap();
    assert!((bounds.center[0] - 13.4).abs() < 1e-4);
    assert!((bounds.center[1] - 52.5).abs() < 1e-4);

    let tj = service.tilejson("plot", "png").await.unwrap();
    assert!(tj.maxzoom >= 20);

    let t = to_tile_coords(52.5, 13.4, 20).unwrap();
    let tile = service
        .tile("plot", 20, t.x, t.y, TileFormat::Png, None)
        .await
        .unwrap();
    let image = image::load_from_memory(&tile.data).unwrap().to_rgba8();
    assert!(image.pixels().all(|p| [p[0], p[1], p[2], p[3]] == [200, 30, 30, 255]));
}

#[tokio::test]
async fn test_tile_outside_bounds() {
    let (_dir, service) = fixture();
    let t = to_tile_coords(-33.9, 151.2, 18).unwrap();
    let err = service
        .tile("mosaic", 18, t.x, t.y, TileFormat::Jpeg, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::TileOutsideBounds(tile) if tile == t));
}

#[tokio::test]
async fn test_invalid_parameters() {
    let (_dir, service) = fixture();
    let err = service
        .tile("mosaic", 2, 4, 0, TileFormat::Png, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTile(_)));

    let err = service
        .tile("mosaic", 300, 0, 0, TileFormat::Png, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidParameter(_)));

    let err = service
        .tile("mosaic", 20, 0, 0, TileFormat::Png, Some("1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidParameter(_)));
}

#[tokio::test]
async fn test_tile_by_url() {
    let (dir, service) = fixture();
    let t = to_tile_coords(52.5, 13.4, 19).unwrap();

    let err = service
        .tile_by_url(None, 19, t.x, t.y, TileFormat::Png, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::MissingUrl));

    let tile = service
        .tile_by_url(Some("mosaic.vrt"), 19, t.x, t.y, TileFormat::Webp, None)
        .await
        .unwrap();
    assert_eq!(
        image::guess_format(&tile.data).unwrap(),
        image::ImageFormat::WebP
    );

    let source = dir.path().join("src/west.tif");
    assert!(service
        .tile_by_url(Some(&source.to_string_lossy()), 19, t.x, t.y, TileFormat::Png, None)
        .await
        .is_ok());

    let err = service
        .tile_by_url(Some("missing.vrt"), 19, t.x, t.y, TileFormat::Png, None)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "File not found: missing.vrt");
}

#[tokio::test]
async fn test_shutdown_rejects_renders() {
    let (_dir, service) = fixture();
    service.shutdown();
    let t = to_tile_coords(52.5, 13.4, 20).unwrap();
    let err = service
        .tile("mosaic", 20, t.x, t.y, TileFormat::Png, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ShuttingDown));
}
