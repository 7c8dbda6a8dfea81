use image::RgbImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// Decoded 3-channel interleaved pixel buffer. The pixel type of the inner
/// buffer only fixes the channel count, `order` says which channel is which.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    buffer: RgbImage,
    order: ChannelOrder,
}

impl RasterImage {
    pub fn from_rgb(buffer: RgbImage) -> Self {
        Self {
            buffer,
            order: ChannelOrder::Rgb,
        }
    }

    pub fn from_bgr(buffer: RgbImage) -> Self {
        Self {
            buffer,
            order: ChannelOrder::Bgr,
        }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    pub fn channels(&self) -> usize {
        3
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// The buffer in RGB order, or `None` when it is BGR.
    pub fn as_rgb(&self) -> Option<&RgbImage> {
        match self.order {
            ChannelOrder::Rgb => Some(&self.buffer),
            ChannelOrder::Bgr => None,
        }
    }

    pub fn into_buffer(self) -> RgbImage {
        self.buffer
    }

    /// Raw buffer regardless of channel order.
    pub(crate) fn buffer(&self) -> &RgbImage {
        &self.buffer
    }

    /// New image with the same channel order.
    pub(crate) fn with_buffer(&self, buffer: RgbImage) -> RasterImage {
        Self {
            buffer,
            order: self.order,
        }
    }

    /// Colour-order normalisation: reverses the channel axis of a BGR image.
    /// RGB input is returned as an identical copy.
    pub fn to_rgb(&self) -> RasterImage {
        match self.order {
            ChannelOrder::Rgb => self.clone(),
            ChannelOrder::Bgr => RasterImage::from_rgb(reverse_channels(&self.buffer)),
        }
    }

    /// Same pixels re-labelled in BGR order.
    pub fn to_bgr(&self) -> RasterImage {
        match self.order {
            ChannelOrder::Bgr => self.clone(),
            ChannelOrder::Rgb => RasterImage::from_bgr(reverse_channels(&self.buffer)),
        }
    }
}

fn reverse_channels(buffer: &RgbImage) -> RgbImage {
    let mut out = buffer.clone();
    for pixel in out.pixels_mut() {
        pixel.0.reverse();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_to_rgb_reverses_bgr_channels() {
        let bgr = RasterImage::from_bgr(RgbImage::from_pixel(2, 2, Rgb([10, 20, 30])));

        let rgb = bgr.to_rgb();

        assert_eq!(rgb.order(), ChannelOrder::Rgb);
        assert_eq!(&rgb.as_bytes()[..3], &[30, 20, 10]);
        assert_eq!(bgr.order(), ChannelOrder::Bgr);
        assert_eq!(&bgr.as_bytes()[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_to_rgb_is_identity_for_rgb() {
        let rgb = RasterImage::from_rgb(RgbImage::from_pixel(3, 1, Rgb([1, 2, 3])));

        assert_eq!(rgb.to_rgb(), rgb);
        assert_eq!(rgb.to_bgr().to_rgb(), rgb);
    }

    #[test]
    fn test_as_rgb_refuses_bgr() {
        let bgr = RasterImage::from_bgr(RgbImage::new(1, 1));

        assert!(bgr.as_rgb().is_none());
        assert!(bgr.to_rgb().as_rgb().is_some());
    }
}
