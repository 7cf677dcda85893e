use crate::camera::source::SampleSource;
use crate::common::{config::CameraConfig, FaceLockError, Result};
use crate::core::classifier::RawFrame;
use image::{DynamicImage, ImageBuffer, Luma};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

/// V4L2 camera as a live sample source. Grayscale (IR) and MJPG devices
/// are supported.
pub struct CameraSource {
    device: Device,
    config: CameraConfig,
    warmed_up: bool,
}

impl CameraSource {
    pub fn new(config: &CameraConfig) -> Result<Self> {
        let index = config.device_index;
        tracing::info!("Opening camera device {}", index);

        let device = Device::new(index as usize)
            .map_err(|e| FaceLockError::Capture(format!("Failed to open camera {}: {}", index, e)))?;

        let caps = device.query_caps()
            .map_err(|e| FaceLockError::Capture(format!("Failed to query capabilities: {}", e)))?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            // Some IR devices only advertise metadata capture but still stream
            tracing::warn!("Device {} may not support standard video capture", index);
        }

        let mut fmt = device.format()
            .map_err(|e| FaceLockError::Capture(format!("Failed to get format: {}", e)))?;
        fmt.width = config.width;
        fmt.height = config.height;
        if fmt.fourcc != FourCC::new(b"GREY") {
            fmt.fourcc = FourCC::new(b"MJPG");
        }

        if let Err(e) = device.set_format(&fmt) {
            tracing::warn!("Could not set exact format: {}. Using device defaults.", e);
        }

        let actual = device.format()
            .map_err(|e| FaceLockError::Capture(format!("Failed to get final format: {}", e)))?;
        if actual.width != config.width || actual.height != config.height {
            tracing::warn!(
                "Camera resolution {}x{} differs from requested {}x{}",
                actual.width, actual.height, config.width, config.height
            );
        }

        Ok(Self { device, config: config.clone(), warmed_up: false })
    }

    fn capture(&mut self) -> Result<RawFrame> {
        let fmt = self.device.format()
            .map_err(|e| FaceLockError::Capture(format!("Failed to get format: {}", e)))?;

        let mut stream = v4l::io::mmap::Stream::with_buffers(&mut self.device, Type::VideoCapture, 4)
            .map_err(|e| FaceLockError::Capture(format!("Failed to create stream: {}", e)))?;

        // Warmup frames for the IR emitter, first capture only
        if !self.warmed_up {
            for _ in 0..self.config.warmup_frames {
                stream.next()
                    .map_err(|e| FaceLockError::Capture(format!("Failed to capture warmup frame: {}", e)))?;
                std::thread::sleep(std::time::Duration::from_millis(self.config.warmup_delay_ms));
            }
            self.warmed_up = true;
        }

        let (buf, _meta) = stream.next()
            .map_err(|e| FaceLockError::Capture(format!("Failed to capture: {}", e)))?;

        if fmt.fourcc == FourCC::new(b"GREY") {
            let gray = ImageBuffer::<Luma<u8>, _>::from_raw(fmt.width, fmt.height, buf.to_vec())
                .ok_or_else(|| FaceLockError::Capture("Failed to create grayscale image buffer".into()))?;
            Ok(DynamicImage::ImageLuma8(gray))
        } else if fmt.fourcc == FourCC::new(b"MJPG") {
            Ok(image::load_from_memory(buf)?)
        } else {
            Err(FaceLockError::Capture(format!("Unsupported pixel format {}", fmt.fourcc)))
        }
    }
}

impl SampleSource for CameraSource {
    fn next_sample(&mut self) -> Result<Option<RawFrame>> {
        match self.capture() {
            Ok(frame) => Ok(Some(frame)),
            Err(FaceLockError::Image(e)) => {
                tracing::warn!("Dropping undecodable frame: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
