//! Annotated page previews with role-colored boxes.

use std::path::Path;

use ab_glyph::FontVec;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{debug, info};

use crate::error::{MenuError, Result};
use crate::models::menu::BoundingBox;

const FALLBACK_FONTS: [&str; 5] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const LABEL_SCALE: f32 = 16.0;
const LABEL_OFFSET: i32 = 10;
const STROKE: i32 = 2;

/// Load a label font from `preferred`, falling back to common system locations.
pub fn load_font(preferred: Option<&Path>) -> Option<FontVec> {
    let candidates = preferred
        .into_iter()
        .map(Path::to_path_buf)
        .chain(FALLBACK_FONTS.iter().map(|p| Path::new(p).to_path_buf()));

    for path in candidates {
        let Ok(data) = std::fs::read(&path) else {
            continue;
        };
        if let Ok(font) = FontVec::try_from_vec(data) {
            debug!("Using label font {}", path.display());
            return Some(font);
        }
    }
    None
}

/// Draw every box onto a copy of the page.
///
/// Labels read `"<role> <confidence>"` and are skipped without a font.
pub fn draw_annotations(
    image: &DynamicImage,
    boxes: &[BoundingBox],
    font: Option<&FontVec>,
) -> RgbImage {
    let mut canvas = image.to_rgb8();

    for bbox in boxes {
        let color = Rgb(bbox.role.color());
        let x = bbox.x1 as i32;
        let y = bbox.y1 as i32;
        let width = (bbox.width() as u32).max(1);
        let height = (bbox.height() as u32).max(1);

        // Inset rings give the stroke its thickness
        for inset in 0..STROKE {
            let w = width.saturating_sub(2 * inset as u32).max(1);
            let h = height.saturating_sub(2 * inset as u32).max(1);
            draw_hollow_rect_mut(&mut canvas, Rect::at(x + inset, y + inset).of_size(w, h), color);
        }

        if let Some(font) = font {
            let label = format!("{} {:.2}", bbox.role, bbox.confidence);
            let label_y = (y - LABEL_OFFSET - LABEL_SCALE as i32).max(0);
            draw_text_mut(&mut canvas, color, x, label_y, LABEL_SCALE, font, &label);
        }
    }

    canvas
}

/// Draw the boxes and save the preview; the format follows the file extension.
pub fn save_annotated(
    image: &DynamicImage,
    boxes: &[BoundingBox],
    font: Option<&FontVec>,
    path: &Path,
) -> Result<()> {
    let canvas = draw_annotations(image, boxes, font);
    canvas.save(path).map_err(|e| match e {
        image::ImageError::IoError(source) => MenuError::OutputWrite {
            path: path.to_path_buf(),
            source,
        },
        other => MenuError::Image(other),
    })?;
    info!("Annotated image saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::menu::ComponentRole;
    use pretty_assertions::assert_eq;

    fn bbox(role: ComponentRole) -> BoundingBox {
        BoundingBox::new(10.0, 20.0, 50.0, 60.0, 0.87, role)
    }

    #[test]
    fn test_rectangle_uses_role_color() {
        let page = DynamicImage::ImageRgb8(RgbImage::new(100, 100));
        let canvas = draw_annotations(&page, &[bbox(ComponentRole::Price)], None);

        assert_eq!(canvas.get_pixel(10, 20), &Rgb([255, 0, 0]));
        assert_eq!(canvas.get_pixel(11, 40), &Rgb([255, 0, 0]));
        // Interior untouched
        assert_eq!(canvas.get_pixel(30, 40), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_save_annotated_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.png");
        let page = DynamicImage::ImageRgb8(RgbImage::new(64, 64));

        save_annotated(&page, &[bbox(ComponentRole::Title)], None, &path).unwrap();

        let saved = image::open(&path).unwrap().to_rgb8();
        assert_eq!(saved.get_pixel(10, 20), &Rgb([128, 0, 128]));
    }
}
