use std::io::Cursor;
use std::path::Path;

use actix_multipart::Multipart;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::StreamExt;
use tracing::debug;

use crate::dispatcher::IMAGE_FIELD;
use crate::error::UploadError;
use crate::models::infer_mime;

pub const ACCEPTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// The fundus image as received from the browser.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    pub fn mime_type(&self) -> String {
        infer_mime(&self.file_name)
    }

    /// Pixel size, when the bytes are an image the `image` crate understands.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        image::io::Reader::new(Cursor::new(&self.bytes))
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    }

    pub fn preview(&self) -> Preview {
        let caption = match self.dimensions() {
            Some((w, h)) => format!("{} · {}×{}", self.file_name, w, h),
            None => self.file_name.clone(),
        };

        Preview {
            caption,
            data_url: format!("data:{};base64,{}", self.mime_type(), STANDARD.encode(&self.bytes)),
        }
    }
}

/// Inline copy of the upload for the page, so it needs no second request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub caption: String,
    pub data_url: String,
}

pub fn is_accepted(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .map_or(false, |ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Drains the form and returns the `image` file, if one was chosen.
///
/// Browsers submit an empty part with a blank filename when the picker was
/// left empty; that is treated the same as no part at all.
pub async fn read_image(
    mut payload: Multipart,
    max_bytes: usize,
) -> Result<Option<UploadedImage>, UploadError> {
    let mut image = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| UploadError::Multipart(e.to_string()))?;

        let (name, file_name) = {
            let disposition = field.content_disposition();
            (
                disposition.get_name().map(str::to_owned),
                disposition.get_filename().map(str::to_owned),
            )
        };

        let file_name = match (name.as_deref(), file_name) {
            (Some(IMAGE_FIELD), Some(file_name)) if !file_name.trim().is_empty() => file_name,
            _ => {
                while let Some(chunk) = field.next().await {
                    chunk.map_err(|e| UploadError::Multipart(e.to_string()))?;
                }
                continue;
            }
        };

        if !is_accepted(&file_name) {
            return Err(UploadError::UnsupportedType(file_name));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| UploadError::Multipart(e.to_string()))?;
            if bytes.len() + data.len() > max_bytes {
                return Err(UploadError::TooLarge { limit_bytes: max_bytes });
            }
            bytes.extend_from_slice(&data);
        }

        debug!(file = %file_name, size = bytes.len(), "upload received");
        image = Some(UploadedImage { file_name, bytes });
    }

    Ok(image)
}
