//! End-to-end resizes through the public API with the `image` engine.

use image::{GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};
use respimg::imaging::{
    Dimensions, Filter, RasterImage, ResizeError, RustRaster, SizeRequest, better_resize,
};
use std::path::Path;
use tempfile::TempDir;

fn write_jpeg(path: &Path, width: u32, height: u32) {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 90])
    })
    .save(path)
    .unwrap();
}

fn write_solid_png(path: &Path, width: u32, height: u32, color: Rgba<u8>) {
    RgbaImage::from_pixel(width, height, color).save(path).unwrap();
}

#[test]
fn width_only_resize_keeps_aspect_on_disk() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("wide.jpg");
    write_jpeg(&source, 1200, 600);

    let mut raster = RustRaster::open(&source).unwrap();
    let size = better_resize(&mut raster, &SizeRequest::width(320), Filter::Triangle, true).unwrap();
    assert_eq!(
        size,
        Dimensions {
            width: 320,
            height: 160
        }
    );

    let out = tmp.path().join("wide-w320.jpg");
    raster.save(&out).unwrap();
    assert_eq!(image::image_dimensions(&out).unwrap(), (320, 160));
}

#[test]
fn large_reduction_takes_two_stage_path_and_lands_exactly() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("big.png");
    write_solid_png(&source, 2000, 2000, Rgba([10, 200, 30, 255]));

    let mut raster = RustRaster::open(&source).unwrap();
    let size = better_resize(&mut raster, &SizeRequest::width(100), Filter::Lanczos, false).unwrap();
    assert_eq!(
        size,
        Dimensions {
            width: 100,
            height: 100
        }
    );
    assert_eq!(raster.dimensions(), size);
}

#[test]
fn fill_centers_result_on_background() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("banner.png");
    write_solid_png(&source, 400, 100, Rgba([0, 0, 0, 255]));

    let request = SizeRequest::new(200, 200)
        .unwrap()
        .with_best_fit(true)
        .with_fill(true);
    let mut raster = RustRaster::open(&source)
        .unwrap()
        .with_background(Rgba([255, 0, 0, 255]));
    let size = better_resize(&mut raster, &request, Filter::Triangle, true).unwrap();
    assert_eq!(
        size,
        Dimensions {
            width: 200,
            height: 200
        }
    );

    let out = tmp.path().join("banner-w200.png");
    raster.save(&out).unwrap();
    let saved = image::open(&out).unwrap().to_rgba8();
    // 200x50 content with 75px bands above and below
    assert_eq!(saved.get_pixel(100, 10).0, [255, 0, 0, 255]);
    assert_eq!(saved.get_pixel(100, 190).0, [255, 0, 0, 255]);
    assert_eq!(saved.get_pixel(100, 100).0, [0, 0, 0, 255]);
}

#[test]
fn jpeg_source_comes_out_opaque() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("photo.jpg");
    write_jpeg(&source, 300, 200);

    let mut raster = RustRaster::open(&source).unwrap();
    better_resize(&mut raster, &SizeRequest::width(150), Filter::Triangle, true).unwrap();

    let out = tmp.path().join("photo-w150.png");
    raster.save(&out).unwrap();
    let saved = image::open(&out).unwrap();
    assert!(saved.pixels().all(|(_, _, p)| p.0[3] == 255));
}

#[test]
fn encoder_hints_are_recorded() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("photo.jpg");
    write_jpeg(&source, 300, 200);

    let mut raster = RustRaster::open(&source).unwrap();
    better_resize(&mut raster, &SizeRequest::width(100), Filter::Triangle, true).unwrap();
    assert_eq!(raster.quality().value(), 82);
    assert_eq!(raster.option("filter:support"), Some("2.0"));
    assert_eq!(raster.option("png:exclude-chunk"), Some("all"));
}

#[test]
fn zero_by_zero_request_is_rejected_before_touching_pixels() {
    assert!(matches!(
        SizeRequest::new(0, 0),
        Err(ResizeError::InvalidSizeRequest { columns: 0, rows: 0 })
    ));

    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("photo.jpg");
    write_jpeg(&source, 40, 40);
    let mut raster = RustRaster::open(&source).unwrap();
    let err = better_resize(&mut raster, &SizeRequest::default(), Filter::Triangle, true)
        .unwrap_err();
    assert!(matches!(err, ResizeError::InvalidSizeRequest { .. }));
    assert_eq!(raster.dimensions(), Dimensions { width: 40, height: 40 });
}
