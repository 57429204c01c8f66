//! Video4Linux2 webcam backend.

use kiosk_types::{CameraConstraints, Frame};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::convert::yuyv_to_rgb;
use crate::{CameraBackend, CameraError, VideoStream};

const BUFFER_COUNT: u32 = 4;

/// Opens `/dev/video{index}` and streams YUYV frames converted to RGB.
pub struct V4l2Backend {
    index: usize,
}

impl V4l2Backend {
    pub fn new(index: usize) -> Self {
        Self { index }
    }
}

impl CameraBackend for V4l2Backend {
    fn name(&self) -> &str {
        "v4l2"
    }

    fn open(&self, constraints: &CameraConstraints) -> Result<Box<dyn VideoStream>, CameraError> {
        let unavailable =
            |e: std::io::Error| CameraError::Unavailable(format!("/dev/video{}: {e}", self.index));

        let device = Device::new(self.index).map_err(unavailable)?;
        let mut format = device.format().map_err(unavailable)?;
        format.width = constraints.width;
        format.height = constraints.height;
        format.fourcc = FourCC::new(b"YUYV");
        let format = device.set_format(&format).map_err(unavailable)?;
        if format.fourcc != FourCC::new(b"YUYV") {
            return Err(CameraError::Unavailable(format!(
                "/dev/video{} does not offer YUYV (got {})",
                self.index, format.fourcc
            )));
        }

        let stream =
            Stream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT).map_err(unavailable)?;

        Ok(Box::new(V4l2Stream {
            _device: device,
            stream: Some(stream),
            width: format.width,
            height: format.height,
        }))
    }
}

struct V4l2Stream {
    _device: Device,
    stream: Option<Stream<'static>>,
    width: u32,
    height: u32,
}

impl VideoStream for V4l2Stream {
    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        let stream = self.stream.as_mut().ok_or(CameraError::Released)?;
        let (buf, _meta) = stream
            .next()
            .map_err(|e| CameraError::Frame(e.to_string()))?;
        let rgb = yuyv_to_rgb(buf, self.width, self.height)
            .ok_or_else(|| CameraError::Frame(format!("short YUYV buffer ({} bytes)", buf.len())))?;
        Ok(Frame::rgb(self.width, self.height, rgb))
    }

    fn stop(&mut self) {
        // Dropping the mmap stream issues VIDIOC_STREAMOFF and unmaps buffers.
        self.stream.take();
    }
}
