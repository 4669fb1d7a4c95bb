//! Component crops and resolution enhancement.

use image::{DynamicImage, GenericImageView, imageops::FilterType};

use crate::models::menu::{BoundingBox, ComponentRole};

/// Extra pixels around title crops on every side.
pub const TITLE_MARGIN_PX: i64 = 5;

/// Fixed upscale factor applied before recognition.
pub const UPSCALE_FACTOR: f64 = 1.5;

/// Margin used when cropping a component of the given role.
pub fn margin_for(role: ComponentRole) -> i64 {
    match role {
        ComponentRole::Title => TITLE_MARGIN_PX,
        _ => 0,
    }
}

/// Crop a component from the page.
///
/// Coordinates are truncated toward zero, grown by `margin` and clipped to
/// the page. Returns `None` when nothing of the box lies on the page.
pub fn crop_component(image: &DynamicImage, bbox: &BoundingBox, margin: i64) -> Option<DynamicImage> {
    let (width, height) = image.dimensions();

    let x1 = (bbox.x1.trunc() as i64 - margin).max(0);
    let y1 = (bbox.y1.trunc() as i64 - margin).max(0);
    let x2 = (bbox.x2.trunc() as i64 + margin).min(width as i64);
    let y2 = (bbox.y2.trunc() as i64 + margin).min(height as i64);

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(image.crop_imm(x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32))
}

/// Convert to grayscale and upscale by [`UPSCALE_FACTOR`] with a bicubic filter.
pub fn enhance_resolution(crop: &DynamicImage) -> DynamicImage {
    let gray = crop.to_luma8();
    let scaled = |side: u32| ((side as f64 * UPSCALE_FACTOR).round_ties_even() as u32).max(1);

    let resized = image::imageops::resize(
        &gray,
        scaled(gray.width()),
        scaled(gray.height()),
        FilterType::CatmullRom,
    );
    DynamicImage::ImageLuma8(resized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use pretty_assertions::assert_eq;

    fn page() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(100, 80))
    }

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
        BoundingBox::new(x1, y1, x2, y2, 0.9, ComponentRole::Price)
    }

    #[test]
    fn test_enhance_40x30() {
        let crop = DynamicImage::ImageRgb8(RgbImage::new(40, 30));
        let enhanced = enhance_resolution(&crop);
        assert_eq!(enhanced.dimensions(), (60, 45));
        assert!(matches!(enhanced, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn test_enhance_rounds_half_to_even() {
        // 5 * 1.5 = 7.5 -> 8, 3 * 1.5 = 4.5 -> 4, 1 * 1.5 = 1.5 -> 2
        let crop = DynamicImage::ImageRgb8(RgbImage::new(5, 3));
        assert_eq!(enhance_resolution(&crop).dimensions(), (8, 4));
        let crop = DynamicImage::ImageRgb8(RgbImage::new(1, 1));
        assert_eq!(enhance_resolution(&crop).dimensions(), (2, 2));
    }

    #[test]
    fn test_crop_truncates_then_applies_margin() {
        let crop = crop_component(&page(), &bbox(10.7, 10.2, 30.9, 20.5), TITLE_MARGIN_PX).unwrap();
        assert_eq!(crop.dimensions(), (30, 20));

        let crop = crop_component(&page(), &bbox(10.7, 10.2, 30.9, 20.5), 0).unwrap();
        assert_eq!(crop.dimensions(), (20, 10));
    }

    #[test]
    fn test_crop_clips_to_page() {
        let crop = crop_component(&page(), &bbox(2.0, 2.0, 98.0, 79.0), TITLE_MARGIN_PX).unwrap();
        assert_eq!(crop.dimensions(), (100, 80));
    }

    #[test]
    fn test_crop_off_page_is_none() {
        assert!(crop_component(&page(), &bbox(120.0, 10.0, 140.0, 20.0), 0).is_none());
        assert!(crop_component(&page(), &bbox(10.0, 10.0, 10.4, 20.0), 0).is_none());
    }

    #[test]
    fn test_only_titles_get_margin() {
        assert_eq!(margin_for(ComponentRole::Title), 5);
        assert_eq!(margin_for(ComponentRole::Description), 0);
        assert_eq!(margin_for(ComponentRole::Price), 0);
    }
}
