use super::{
    error::{DecodeError, PipelineError},
    raster::RasterImage,
};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, ImageReader};
use std::io::Cursor;

pub fn decode_image(bytes: &[u8]) -> Result<RasterImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    let image = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(DecodeError::Format)?
        .decode()?;

    Ok(RasterImage::from_rgb(image.to_rgb8()))
}

pub fn encode_jpeg(image: &RasterImage, quality: u8) -> Result<Vec<u8>, PipelineError> {
    let rgb = image.as_rgb().ok_or(PipelineError::ChannelOrder("jpeg encode"))?;

    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .encode_image(rgb)
        .map_err(PipelineError::Encode)?;

    Ok(buffer)
}

/// Scales to exactly `width` x `height`; aspect ratio is not preserved.
pub fn resize_exact(image: &RasterImage, width: u32, height: u32) -> RasterImage {
    if image.width() == width && image.height() == height {
        return image.clone();
    }
    let resized = image::imageops::resize(image.buffer(), width, height, FilterType::Triangle);
    image.with_buffer(resized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::raster::ChannelOrder;
    use image::{ImageFormat, Rgb, RgbImage};

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
            .unwrap();
        bytes
    }

    #[test]
    fn test_decode_jpeg_and_png() {
        let decoded = decode_image(&jpeg_bytes(100, 100)).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 100));
        assert_eq!(decoded.order(), ChannelOrder::Rgb);

        let img = RgbImage::from_pixel(7, 3, Rgb([1, 2, 3]));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let decoded = decode_image(&png).unwrap();
        assert_eq!(decoded.as_bytes(), img.as_raw().as_slice());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_image(&[]), Err(DecodeError::EmptyPayload)));
        assert!(decode_image(b"definitely not an image").is_err());

        let mut truncated = jpeg_bytes(64, 64);
        truncated.truncate(20);
        assert!(decode_image(&truncated).is_err());
    }

    #[test]
    fn test_reencoding_is_stable_in_shape() {
        let raster = RasterImage::from_rgb(RgbImage::from_fn(40, 30, |x, y| {
            Rgb([(x * 6) as u8, (y * 8) as u8, 128])
        }));

        let first = decode_image(&encode_jpeg(&raster, 50).unwrap()).unwrap();
        let second = decode_image(&encode_jpeg(&raster, 50).unwrap()).unwrap();

        assert_eq!((first.width(), first.height()), (second.width(), second.height()));
        assert_eq!(first.channels(), second.channels());
        assert_eq!((first.width(), first.height()), (40, 30));
    }

    #[test]
    fn test_encode_requires_rgb() {
        let bgr = RasterImage::from_bgr(RgbImage::new(4, 4));
        assert!(matches!(
            encode_jpeg(&bgr, 75),
            Err(PipelineError::ChannelOrder(_))
        ));
    }

    #[test]
    fn test_resize_exact_ignores_aspect_ratio() {
        let raster = RasterImage::from_bgr(RgbImage::new(4000, 3000));
        let resized = resize_exact(&raster, 320, 240);
        assert_eq!((resized.width(), resized.height()), (320, 240));
        assert_eq!(resized.order(), ChannelOrder::Bgr);

        let square = resize_exact(&RasterImage::from_rgb(RgbImage::new(100, 100)), 320, 240);
        assert_eq!((square.width(), square.height()), (320, 240));
    }
}
