use crate::common::{Config, Result};
use crate::core::classifier::{RawFrame, Region, RegionBounds, RegionDetector};
use image::{imageops::FilterType, DynamicImage, GrayImage};

/// Default detector for pre-framed captures: the largest centered rectangle
/// with the sample's aspect ratio is the single region of a frame.
#[derive(Debug, Clone)]
pub struct WholeFrameDetector {
    sample_width: u32,
    sample_height: u32,
    equalize: bool,
    min_region_size: u32,
}

impl WholeFrameDetector {
    pub fn new(config: &Config) -> Self {
        Self {
            sample_width: config.sample.width,
            sample_height: config.sample.height,
            equalize: config.detector.equalize,
            min_region_size: config.detector.min_region_size,
        }
    }

    fn centered_bounds(&self, width: u32, height: u32) -> RegionBounds {
        let (sw, sh) = (self.sample_width as u64, self.sample_height as u64);
        let (w, h) = (width as u64, height as u64);

        let (crop_w, crop_h) = if w * sh > h * sw {
            ((h * sw / sh).max(1), h)
        } else {
            (w, (w * sh / sw).max(1))
        };

        RegionBounds {
            x: ((w - crop_w) / 2) as u32,
            y: ((h - crop_h) / 2) as u32,
            width: crop_w as u32,
            height: crop_h as u32,
        }
    }
}

impl RegionDetector for WholeFrameDetector {
    fn detect_regions(&self, frame: &RawFrame) -> Result<Vec<Region>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }

        let bounds = self.centered_bounds(frame.width(), frame.height());
        if bounds.width.min(bounds.height) < self.min_region_size {
            tracing::debug!(
                "Frame {}x{} too small for a region (min {})",
                frame.width(), frame.height(), self.min_region_size
            );
            return Ok(Vec::new());
        }

        let image = normalize_region(
            frame,
            bounds,
            self.sample_width,
            self.sample_height,
            self.equalize,
        );
        Ok(vec![Region { bounds, image }])
    }
}

/// Crop `bounds` out of `frame` and bring it to the fixed sample format:
/// grayscale, `width`x`height`, optionally histogram-equalized.
pub fn normalize_region(
    frame: &DynamicImage,
    bounds: RegionBounds,
    width: u32,
    height: u32,
    equalize: bool,
) -> GrayImage {
    let cropped = frame.crop_imm(bounds.x, bounds.y, bounds.width, bounds.height);
    let gray = cropped
        .resize_exact(width, height, FilterType::Triangle)
        .to_luma8();

    if equalize {
        imageproc::contrast::equalize_histogram(&gray)
    } else {
        gray
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    fn detector(width: u32, height: u32, equalize: bool) -> WholeFrameDetector {
        let mut config = Config::default();
        config.sample.width = width;
        config.sample.height = height;
        config.detector.equalize = equalize;
        WholeFrameDetector::new(&config)
    }

    #[test]
    fn landscape_frame_is_center_cropped() {
        let frame = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 200, Rgb([10, 20, 30])));
        let regions = detector(100, 100, false).detect_regions(&frame).unwrap();

        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bounds, RegionBounds { x: 50, y: 0, width: 200, height: 200 });
        assert_eq!(regions[0].image.dimensions(), (100, 100));
    }

    #[test]
    fn portrait_frame_keeps_sample_aspect() {
        let frame = DynamicImage::ImageLuma8(GrayImage::from_pixel(100, 400, Luma([7])));
        let regions = detector(64, 32, false).detect_regions(&frame).unwrap();

        assert_eq!(regions[0].bounds, RegionBounds { x: 0, y: 175, width: 100, height: 50 });
        assert_eq!(regions[0].image.dimensions(), (64, 32));
        assert!(regions[0].image.pixels().all(|p| p[0] == 7));
    }

    #[test]
    fn tiny_frame_has_no_region() {
        let frame = DynamicImage::ImageLuma8(GrayImage::from_pixel(20, 20, Luma([0])));
        assert!(detector(100, 100, true).detect_regions(&frame).unwrap().is_empty());
    }

    #[test]
    fn equalization_spreads_intensities() {
        let frame = DynamicImage::ImageLuma8(GrayImage::from_fn(64, 64, |x, _| {
            Luma([100 + (x % 8) as u8])
        }));
        let regions = detector(64, 64, true).detect_regions(&frame).unwrap();
        let max = regions[0].image.pixels().map(|p| p[0]).max().unwrap();
        assert_eq!(max, 255);
    }
}
