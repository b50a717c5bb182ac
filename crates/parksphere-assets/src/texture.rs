//! Texture decoding, dispatched on the file extension of the asset path.

use image::ImageFormat;
use parksphere_render::TextureData;

use crate::error::DecodeError;

/// Lower-cased extension of `path`, ignoring any query string.
pub fn extension_of(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let file = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = file.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

/// True if `decode_texture` has a decoder for this path.
pub fn is_supported(path: &str) -> bool {
    matches!(extension_of(path).as_deref(), Some("png" | "jpg" | "jpeg"))
}

/// Decode `bytes` into RGBA8 using the decoder for `path`'s extension.
pub fn decode_texture(path: &str, bytes: &[u8]) -> Result<TextureData, DecodeError> {
    let format = match extension_of(path).as_deref() {
        Some("png") => ImageFormat::Png,
        Some("jpg" | "jpeg") => ImageFormat::Jpeg,
        Some(other) => return Err(DecodeError::UnsupportedFormat(other.to_string())),
        None => return Err(DecodeError::UnsupportedFormat(path.to_string())),
    };
    let image = image::load_from_memory_with_format(bytes, format)?.to_rgba8();
    Ok(TextureData {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

/// Encode RGBA8 pixels as PNG. Used to build fixtures and embedded data.
pub fn encode_png(texture: &TextureData) -> Result<Vec<u8>, DecodeError> {
    let mut out = std::io::Cursor::new(Vec::new());
    image::write_buffer_with_format(
        &mut out,
        &texture.rgba,
        texture.width,
        texture.height,
        image::ExtendedColorType::Rgba8,
        ImageFormat::Png,
    )?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_parsing() {
        assert_eq!(extension_of("earth/earth_day_4k.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension_of("a/b.png?v=3").as_deref(), Some("png"));
        assert_eq!(extension_of("a/b.ktx2").as_deref(), Some("ktx2"));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of("dir.d/noext"), None);
        assert_eq!(extension_of(".hidden"), None);
    }

    #[test]
    fn test_png_decodes() {
        let source = TextureData::solid(4, 3, [10, 20, 30, 255]);
        let png = encode_png(&source).unwrap();
        let decoded = decode_texture("tex/solid.png", &png).unwrap();
        assert_eq!(decoded, source);
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            decode_texture("earth/clouds.ktx2", &[0u8; 16]),
            Err(DecodeError::UnsupportedFormat(ext)) if ext == "ktx2"
        ));
        assert!(!is_supported("earth/clouds.ktx2"));
        assert!(is_supported("earth/clouds.jpeg"));
    }

    #[test]
    fn test_corrupt_image_is_error() {
        assert!(matches!(
            decode_texture("bad.png", b"not a png"),
            Err(DecodeError::Image(_))
        ));
    }
}
