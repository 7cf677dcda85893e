use image::GrayImage;

/// Photometric quality of a normalized sample, each score in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityMetrics {
    pub brightness_score: f32,
    pub contrast_score: f32,
    pub overall_score: f32,
}

impl QualityMetrics {
    /// Calculate quality metrics for a normalized sample
    pub fn calculate(sample: &GrayImage) -> Self {
        let count = sample.width() as u64 * sample.height() as u64;
        if count == 0 {
            return Self { brightness_score: 0.0, contrast_score: 0.0, overall_score: 0.0 };
        }

        let mut sum = 0u64;
        let mut sum_sq = 0u64;
        for pixel in sample.pixels() {
            let value = pixel[0] as u64;
            sum += value;
            sum_sq += value * value;
        }

        let mean = sum as f32 / count as f32;
        let variance = (sum_sq as f32 / count as f32 - mean * mean).max(0.0);
        let std_dev = variance.sqrt();

        // Ideal mean around mid-gray for 8-bit samples
        let brightness_score = 1.0 - ((mean - 127.5).abs() / 127.5).min(1.0);
        // A standard deviation of 64 or more counts as full contrast
        let contrast_score = (std_dev / 64.0).min(1.0);

        let overall_score = brightness_score * 0.5 + contrast_score * 0.5;

        Self { brightness_score, contrast_score, overall_score }
    }

    /// Check if the quality meets minimum requirements
    pub fn meets_minimum_requirements(&self, min_quality: f32) -> bool {
        self.overall_score >= min_quality
    }

    /// Get a human-readable quality assessment
    pub fn get_quality_assessment(&self) -> String {
        let quality_level = if self.overall_score >= 0.8 {
            "Excellent"
        } else if self.overall_score >= 0.6 {
            "Good"
        } else if self.overall_score >= 0.4 {
            "Acceptable"
        } else if self.overall_score >= 0.2 {
            "Poor"
        } else {
            "Very Poor"
        };

        format!("Quality: {} (score: {:.2})", quality_level, self.overall_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn black_frame_is_very_poor() {
        let metrics = QualityMetrics::calculate(&GrayImage::new(32, 32));
        assert_eq!(metrics.overall_score, 0.0);
        assert!(!metrics.meets_minimum_requirements(0.1));
        assert!(metrics.get_quality_assessment().contains("Very Poor"));
    }

    #[test]
    fn textured_mid_gray_scores_high() {
        let sample = GrayImage::from_fn(32, 32, |x, y| {
            Luma([if (x + y) % 2 == 0 { 50 } else { 205 }])
        });
        let metrics = QualityMetrics::calculate(&sample);
        assert!(metrics.brightness_score > 0.95);
        assert_eq!(metrics.contrast_score, 1.0);
        assert!(metrics.meets_minimum_requirements(0.9));
    }

    #[test]
    fn flat_gray_has_no_contrast() {
        let metrics = QualityMetrics::calculate(&GrayImage::from_pixel(16, 16, Luma([128])));
        assert_eq!(metrics.contrast_score, 0.0);
        assert!((metrics.overall_score - 0.5).abs() < 0.01);
    }
}
