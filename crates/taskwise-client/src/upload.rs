use std::path::Path;

use taskwise_core::attachment::{guess_mime, AttachmentType};

use crate::ClientError;

/// A file to send as `multipart/form-data`.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: &str, content_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            bytes,
        }
    }

    /// Read a file from disk, guessing the content type from its extension.
    pub async fn from_path(path: &Path) -> Result<Self, ClientError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let content_type = guess_mime(&file_name);
        Ok(Self {
            file_name,
            content_type: content_type.to_string(),
            bytes,
        })
    }

    /// `image` for `image/*` content, `file` for everything else.
    pub fn attachment_type(&self) -> AttachmentType {
        AttachmentType::from_mime(&self.content_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_type_follows_content_type() {
        let image = UploadFile::new("foto.png", "image/png", vec![1, 2, 3]);
        assert_eq!(image.attachment_type(), AttachmentType::Image);

        let doc = UploadFile::new("laporan.pdf", "application/pdf", vec![]);
        assert_eq!(doc.attachment_type(), AttachmentType::File);
    }

    #[tokio::test]
    async fn from_path_reads_bytes_and_guesses_type() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("diagram.webp");
        tokio::fs::write(&path, b"RIFF").await.unwrap();

        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.file_name, "diagram.webp");
        assert_eq!(file.content_type, "image/webp");
        assert_eq!(file.bytes, b"RIFF");
        assert_eq!(file.attachment_type(), AttachmentType::Image);
    }
}
