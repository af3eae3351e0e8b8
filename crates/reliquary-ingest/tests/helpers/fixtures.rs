use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

/// PNG of the given size filled with one colour.
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .expect("encode test png");
    buffer
}

pub fn dimensions_of(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).expect("decode test image");
    (img.width(), img.height())
}

pub const SAMPLE_TEXT: &str = "Reliquary sample\r\nsecond line\r\n";

/// Bytes no characterizer or generator recognizes.
pub fn opaque_bytes() -> Vec<u8> {
    vec![0x00, 0x13, 0x37, 0x00, 0xff, 0xfe, 0x42, 0x00]
}
