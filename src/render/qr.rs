//! Placeholder QR images.
//!
//! These look like QR codes but are not scannable. The module pattern is
//! derived deterministically from the encoded text, so the same invoice
//! number always produces the same image. Swapping in a real QR encoder is a
//! straightforward replacement of `module_grid`.

use std::{
    hash::{DefaultHasher, Hash, Hasher},
    io::Cursor,
};

use image::{GrayImage, ImageFormat, Luma};

use crate::prelude::*;

/// Modules per side, matching a version 2 QR code.
const GRID_SIZE: u32 = 25;

/// Pixels per module.
const MODULE_SCALE: u32 = 8;

/// Quiet zone around the grid, in modules.
const QUIET_ZONE: u32 = 2;

const BLACK: Luma<u8> = Luma([0]);
const WHITE: Luma<u8> = Luma([255]);

/// Render a placeholder QR image for the given text, as PNG bytes.
pub fn placeholder_qr_png(data: &str) -> Result<Vec<u8>> {
    let side = (GRID_SIZE + 2 * QUIET_ZONE) * MODULE_SCALE;
    let mut image = GrayImage::from_pixel(side, side, WHITE);
    for (x, y) in dark_modules(data) {
        let origin_x = (x + QUIET_ZONE) * MODULE_SCALE;
        let origin_y = (y + QUIET_ZONE) * MODULE_SCALE;
        for dx in 0..MODULE_SCALE {
            for dy in 0..MODULE_SCALE {
                image.put_pixel(origin_x + dx, origin_y + dy, BLACK);
            }
        }
    }

    let mut bytes = Cursor::new(vec![]);
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .context("failed to encode QR image as PNG")?;
    Ok(bytes.into_inner())
}

/// The dark modules of the grid: three finder patterns plus data modules
/// chosen by hashing the text with each module's position.
fn dark_modules(data: &str) -> Vec<(u32, u32)> {
    let mut modules = vec![];
    for x in 0..GRID_SIZE {
        for y in 0..GRID_SIZE {
            let dark = match finder_module(x, y) {
                Some(dark) => dark,
                None => position_hash(data, x, y) & 1 == 1,
            };
            if dark {
                modules.push((x, y));
            }
        }
    }
    modules
}

/// Whether this position falls inside a finder pattern, and if so whether it
/// is dark. Finder patterns sit in the top-left, top-right, and bottom-left
/// corners, 7x7 each with a one-module separator.
fn finder_module(x: u32, y: u32) -> Option<bool> {
    let corners = [(0, 0), (GRID_SIZE - 8, 0), (0, GRID_SIZE - 8)];
    for (corner_x, corner_y) in corners {
        if x < corner_x || y < corner_y || x >= corner_x + 8 || y >= corner_y + 8 {
            continue;
        }
        let (dx, dy) = (x - corner_x, y - corner_y);
        if dx == 7 || dy == 7 {
            // Separator.
            return Some(false);
        }
        let ring = dx.min(dy).min(6 - dx).min(6 - dy);
        return Some(ring != 1);
    }
    None
}

fn position_hash(data: &str, x: u32, y: u32) -> u64 {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    (x, y).hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_shape() {
        let bytes = placeholder_qr_png("INV-2023-0158").unwrap();
        let image = image::load_from_memory(&bytes).unwrap();
        let side = (GRID_SIZE + 2 * QUIET_ZONE) * MODULE_SCALE;
        assert_eq!(image.width(), side);
        assert_eq!(image.height(), side);
    }

    #[test]
    fn test_deterministic_for_the_same_text() {
        let a = placeholder_qr_png("INV-0001").unwrap();
        let b = placeholder_qr_png("INV-0001").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_texts_differ() {
        assert_ne!(dark_modules("INV-0001"), dark_modules("INV-0002"));
    }

    #[test]
    fn test_finder_patterns_are_present() {
        // Corner and center of the top-left finder pattern are dark, the
        // inner ring is light.
        let modules = dark_modules("anything");
        assert!(modules.contains(&(0, 0)));
        assert!(modules.contains(&(3, 3)));
        assert!(!modules.contains(&(1, 1)));
    }
}
