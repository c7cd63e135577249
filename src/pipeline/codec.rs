//! Image codec: raw file bytes ⇄ `data:` URI ⇄ request payload.
//!
//! A data URI is the canonical in-memory form of a card image. It is
//! self-describing (it carries its MIME type), can be shown as a preview by
//! any surface that understands `data:` URLs, and is what history entries
//! snapshot. Before the image goes to the extraction service the transport
//! prefix is stripped and the MIME type travels separately.
//!
//! Images are never re-compressed or resized here; size policy belongs to
//! the caller (see [`crate::config::ScanConfig::max_image_bytes`]).

use crate::error::ScanError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_TRANSPORT_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:image/(png|jpeg|jpg|webp);base64,").unwrap());

/// An image split into MIME type and bare base64 data, ready for the
/// extraction request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: String,
}

/// Encode raw image bytes as a `data:<mime>;base64,…` URI.
///
/// The MIME type is sniffed from the magic bytes, not taken from a file
/// extension. PNG, JPEG and WebP are accepted.
pub fn encode(bytes: &[u8]) -> Result<String, ScanError> {
    if bytes.is_empty() {
        return Err(ScanError::UnsupportedFormat {
            detail: "image is empty".into(),
        });
    }

    let format = image::guess_format(bytes).map_err(|_| ScanError::UnsupportedFormat {
        detail: format!("unrecognised image data (first bytes: {:02x?})", head(bytes)),
    })?;

    let mime = match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        other => {
            return Err(ScanError::UnsupportedFormat {
                detail: format!("{other:?} images are not accepted; use PNG, JPEG or WebP"),
            })
        }
    };

    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} image → {} bytes base64", mime, b64.len());

    Ok(format!("data:{mime};base64,{b64}"))
}

/// Remove the `data:image/<type>;base64,` prefix and return the bare base64.
pub fn strip_transport_prefix(data_uri: &str) -> Result<&str, ScanError> {
    let m = RE_TRANSPORT_PREFIX
        .find(data_uri)
        .ok_or_else(|| unsupported_prefix(data_uri))?;
    Ok(&data_uri[m.end()..])
}

/// Split a data URI into its MIME type and base64 data.
///
/// `image/jpg` is normalised to `image/jpeg`.
pub fn parse_data_uri(data_uri: &str) -> Result<ImagePayload, ScanError> {
    let caps = RE_TRANSPORT_PREFIX
        .captures(data_uri)
        .ok_or_else(|| unsupported_prefix(data_uri))?;

    let subtype = match &caps[1] {
        "jpg" => "jpeg",
        s => s,
    };
    let data = &data_uri[caps[0].len()..];

    Ok(ImagePayload {
        mime_type: format!("image/{subtype}"),
        data: data.to_string(),
    })
}

fn unsupported_prefix(data_uri: &str) -> ScanError {
    let shown: String = data_uri.chars().take(32).collect();
    ScanError::UnsupportedFormat {
        detail: format!("expected a data:image/(png|jpeg|jpg|webp);base64 URI, got '{shown}…'"),
    }
}

fn head(bytes: &[u8]) -> &[u8] {
    &bytes[..bytes.len().min(4)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("encode png");
        buf
    }

    #[test]
    fn encode_png_produces_data_uri() {
        let bytes = png_bytes();
        let uri = encode(&bytes).expect("encode should succeed");
        assert!(uri.starts_with("data:image/png;base64,"));

        let b64 = strip_transport_prefix(&uri).unwrap();
        assert_eq!(STANDARD.decode(b64).expect("valid base64"), bytes);
    }

    #[test]
    fn encode_sniffs_jpeg_magic() {
        let jpeg_header = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
        let uri = encode(&jpeg_header).unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn encode_rejects_non_images() {
        let err = encode(b"%PDF-1.7 not an image").unwrap_err();
        assert!(matches!(err, ScanError::UnsupportedFormat { .. }));
        assert!(matches!(
            encode(&[]).unwrap_err(),
            ScanError::UnsupportedFormat { .. }
        ));
    }

    #[test]
    fn encode_rejects_gif() {
        let err = encode(b"GIF89a\x01\x00\x01\x00").unwrap_err();
        assert!(err.to_string().contains("Gif"), "got: {err}");
    }

    #[test]
    fn strip_accepts_all_four_subtypes() {
        for subtype in ["png", "jpeg", "jpg", "webp"] {
            let uri = format!("data:image/{subtype};base64,QUJD");
            assert_eq!(strip_transport_prefix(&uri).unwrap(), "QUJD");
        }
    }

    #[test]
    fn strip_rejects_other_prefixes() {
        for uri in [
            "data:image/gif;base64,QUJD",
            "data:application/pdf;base64,QUJD",
            "QUJD",
            "data:image/png,QUJD",
        ] {
            assert!(
                matches!(
                    strip_transport_prefix(uri),
                    Err(ScanError::UnsupportedFormat { .. })
                ),
                "{uri} should be rejected"
            );
        }
    }

    #[test]
    fn parse_normalises_jpg() {
        let p = parse_data_uri("data:image/jpg;base64,QUJD").unwrap();
        assert_eq!(p.mime_type, "image/jpeg");
        assert_eq!(p.data, "QUJD");

        let p = parse_data_uri("data:image/webp;base64,").unwrap();
        assert_eq!(p.mime_type, "image/webp");
        assert!(p.data.is_empty());
    }
}
