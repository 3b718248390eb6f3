//! Still-frame preparation with the `image` crate.

use std::path::Path;

use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use shortforge_core::{Error, Result, TargetSpec};

/// Largest centered rectangle of `src_w`x`src_h` with the aspect ratio of
/// `tgt_w`x`tgt_h`, as `(x, y, width, height)`.
pub fn center_crop_rect(src_w: u32, src_h: u32, tgt_w: u32, tgt_h: u32) -> (u32, u32, u32, u32) {
    let (sw, sh, tw, th) = (src_w as u64, src_h as u64, tgt_w.max(1) as u64, tgt_h.max(1) as u64);

    if sw * th > sh * tw {
        // Source is wider than the target: trim the sides.
        let w = ((sh * tw + th / 2) / th).clamp(1, sw);
        let x = (sw - w) / 2;
        (x as u32, 0, w as u32, src_h)
    } else {
        let h = ((sw * th + tw / 2) / tw).clamp(1, sh.max(1));
        let y = (sh - h) / 2;
        (0, y as u32, src_w, h as u32)
    }
}

/// Center-crop `src` to the target aspect ratio and resize it to exactly the
/// target resolution, writing the result to `dst` (format from extension).
pub fn prepare_frame(src: &Path, dst: &Path, target: &TargetSpec) -> Result<()> {
    let img = image::open(src)
        .map_err(|e| Error::tool("image", format!("failed to decode {}: {e}", src.display())))?;

    let (x, y, w, h) = center_crop_rect(img.width(), img.height(), target.width, target.height);
    let frame = img
        .crop_imm(x, y, w, h)
        .resize_exact(target.width, target.height, FilterType::Lanczos3)
        .to_rgb8();

    frame
        .save(dst)
        .map_err(|e| Error::tool("image", format!("failed to write {}: {e}", dst.display())))?;

    tracing::debug!(
        src = %src.display(),
        crop = ?(x, y, w, h),
        width = target.width,
        height = target.height,
        "prepared still frame"
    );
    Ok(())
}

/// Write a single-color frame of the given size.
pub fn solid_color_frame(dst: &Path, width: u32, height: u32, rgb: [u8; 3]) -> Result<()> {
    RgbImage::from_pixel(width, height, Rgb(rgb))
        .save(dst)
        .map_err(|e| Error::tool("image", format!("failed to write {}: {e}", dst.display())))
}

/// Parse `#rrggbb` or `rrggbb`.
pub fn parse_hex_color(s: &str) -> Option<[u8; 3]> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}
