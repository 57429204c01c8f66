//! Raw video frames and the hints used to open a camera.

use serde::{Deserialize, Serialize};

/// Pixel layout of a [`Frame`] buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGB, three bytes per pixel.
    Rgb8,
    /// 8-bit greyscale, one byte per pixel.
    Luma8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Luma8 => 1,
        }
    }
}

/// One sampled video frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn rgb(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Rgb8,
            data,
        }
    }

    pub fn luma(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Luma8,
            data,
        }
    }

    /// A uniformly black RGB frame.
    pub fn blank(width: u32, height: u32) -> Self {
        let mut frame = Self::rgb(width, height, Vec::new());
        frame.data = vec![0; frame.expected_len()];
        frame
    }

    /// Length the data buffer must have for the declared geometry.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    pub fn is_well_formed(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.expected_len()
    }

    /// Greyscale intensity at `(x, y)` (ITU-R BT.601 weights for RGB).
    pub fn luma_at(&self, x: u32, y: u32) -> u8 {
        let idx = (y as usize * self.width as usize + x as usize) * self.format.bytes_per_pixel();
        match self.format {
            PixelFormat::Luma8 => self.data[idx],
            PixelFormat::Rgb8 => {
                let r = self.data[idx] as u32;
                let g = self.data[idx + 1] as u32;
                let b = self.data[idx + 2] as u32;
                ((r * 299 + g * 587 + b * 114) / 1000) as u8
            }
        }
    }

    /// The frame expanded to 8-bit RGB.
    pub fn to_rgb(&self) -> Vec<u8> {
        match self.format {
            PixelFormat::Rgb8 => self.data.clone(),
            PixelFormat::Luma8 => self.data.iter().flat_map(|&v| [v, v, v]).collect(),
        }
    }
}

/// Which way the requested camera should face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Towards the person standing at the kiosk.
    #[default]
    User,
    /// Away from the person (rear camera).
    Environment,
}

/// Facing and resolution hints passed when acquiring a camera.
///
/// Backends treat the resolution as an ideal, not a requirement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConstraints {
    #[serde(default)]
    pub facing: FacingMode,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            facing: FacingMode::User,
            width: default_width(),
            height: default_height(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn geometry_beyond_u32_pixels_does_not_wrap() {
        let frame = Frame::rgb(70_000, 70_000, Vec::new());
        assert_eq!(frame.expected_len(), 14_700_000_000);
        assert!(!frame.is_well_formed());
    }

    #[test]
    fn blank_frame_is_well_formed() {
        let frame = Frame::blank(4, 3);
        assert!(frame.is_well_formed());
        assert_eq!(frame.data.len(), 36);
    }

    #[test]
    fn luma_of_white_rgb_is_full_scale() {
        let frame = Frame::rgb(1, 1, vec![255, 255, 255]);
        assert_eq!(frame.luma_at(0, 0), 255);
    }

    #[test]
    fn luma_frame_expands_to_grey_rgb() {
        let frame = Frame::luma(2, 1, vec![10, 200]);
        assert_eq!(frame.to_rgb(), vec![10, 10, 10, 200, 200, 200]);
    }

    #[test]
    fn default_constraints_face_the_user_at_vga() {
        let c = CameraConstraints::default();
        assert_eq!(c.facing, FacingMode::User);
        assert_eq!((c.width, c.height), (640, 480));
    }
}
