use anyhow::{Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// Readable handle on a stored file.
pub type FileReader = Pin<Box<dyn AsyncRead + Send>>;

pub struct UploadResult {
    pub hash: String,
    pub size: i64,
    pub key: String,
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Writes the stream under `key`, returning its SHA-256 and size.
    async fn put_stream_with_hash<'a>(
        &self,
        key: &str,
        reader: Pin<Box<dyn AsyncRead + Send + 'a>>,
    ) -> Result<UploadResult>;
    async fn open_read(&self, key: &str) -> Result<FileReader>;
    async fn file_exists(&self, key: &str) -> Result<bool>;
    async fn delete_file(&self, key: &str) -> Result<()>;
}

/// Files under a directory on the local filesystem.
pub struct LocalStorageService {
    root: PathBuf,
}

impl LocalStorageService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(anyhow!("invalid storage key: {}", key));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn put_stream_with_hash<'a>(
        &self,
        key: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send + 'a>>,
    ) -> Result<UploadResult> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(&path).await?;
        let mut hasher = Sha256::new();
        let mut total_size = 0i64;
        let mut buffer = vec![0u8; 64 * 1024];

        let written = async {
            loop {
                let n = reader.read(&mut buffer).await?;
                if n == 0 {
                    break;
                }
                hasher.update(&buffer[..n]);
                file.write_all(&buffer[..n]).await?;
                total_size += n as i64;
            }
            file.flush().await?;
            Ok::<(), anyhow::Error>(())
        }
        .await;

        if let Err(e) = written {
            drop(file);
            if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                tracing::warn!("Failed to remove partial upload {}: {}", key, cleanup);
            }
            return Err(e);
        }

        Ok(UploadResult {
            hash: hex::encode(hasher.finalize()),
            size: total_size,
            key: key.to_string(),
        })
    }

    async fn open_read(&self, key: &str) -> Result<FileReader> {
        let file = tokio::fs::File::open(self.resolve(key)?).await?;
        Ok(Box::pin(file))
    }

    async fn file_exists(&self, key: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.resolve(key)?).await?)
    }

    async fn delete_file(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.resolve(key)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct S3StorageService {
    client: Client,
    bucket: String,
}

impl S3StorageService {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Sends the stream as 10 MB parts, feeding the hasher as it goes.
    async fn upload_parts<'a>(
        &self,
        key: &str,
        upload_id: &str,
        reader: &mut Pin<Box<dyn AsyncRead + Send + 'a>>,
        hasher: &mut Sha256,
        total_size: &mut i64,
    ) -> Result<Vec<CompletedPart>> {
        let mut chunk_index = 1;
        let mut completed_parts = Vec::new();

        let chunk_size = 10 * 1024 * 1024;
        let mut buffer = vec![0u8; chunk_size];

        loop {
            let mut n = 0;
            while n < chunk_size {
                let read = reader.read(&mut buffer[n..]).await?;
                if read == 0 {
                    break;
                }
                hasher.update(&buffer[n..n + read]);
                n += read;
            }

            if n == 0 {
                break;
            }

            *total_size += n as i64;
            let upload_part_res = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .body(ByteStream::from(buffer[..n].to_vec()))
                .part_number(chunk_index)
                .send()
                .await?;

            completed_parts.push(
                CompletedPart::builder()
                    .e_tag(upload_part_res.e_tag().unwrap_or_default())
                    .part_number(chunk_index)
                    .build(),
            );

            chunk_index += 1;
        }

        Ok(completed_parts)
    }

    async fn abort_upload(&self, key: &str, upload_id: &str) {
        let aborted = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await;
        if let Err(e) = aborted {
            tracing::warn!("Failed to abort multipart upload for {}: {}", key, e);
        }
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn put_stream_with_hash<'a>(
        &self,
        key: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send + 'a>>,
    ) -> Result<UploadResult> {
        let multipart_upload_res = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;

        let upload_id = multipart_upload_res
            .upload_id()
            .ok_or_else(|| anyhow!("No upload ID"))?;
        let mut hasher = Sha256::new();
        let mut total_size = 0;

        let parts = self
            .upload_parts(key, upload_id, &mut reader, &mut hasher, &mut total_size)
            .await;
        let completed_parts = match parts {
            Ok(parts) => parts,
            Err(e) => {
                self.abort_upload(key, upload_id).await;
                return Err(e);
            }
        };

        if completed_parts.is_empty() {
            // S3 rejects a multipart upload without parts
            self.abort_upload(key, upload_id).await;
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(ByteStream::from(Vec::new()))
                .send()
                .await?;
        } else {
            let completed_multipart_upload = CompletedMultipartUpload::builder()
                .set_parts(Some(completed_parts))
                .build();

            let completed = self
                .client
                .complete_multipart_upload()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .multipart_upload(completed_multipart_upload)
                .send()
                .await;
            if let Err(e) = completed {
                self.abort_upload(key, upload_id).await;
                return Err(e.into());
            }
        }

        Ok(UploadResult {
            hash: hex::encode(hasher.finalize()),
            size: total_size,
            key: key.to_string(),
        })
    }

    async fn open_read(&self, key: &str) -> Result<FileReader> {
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(Box::pin(res.body.into_async_read()))
    }

    async fn file_exists(&self, key: &str) -> Result<bool> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(anyhow!(service_error))
                }
            }
        }
    }

    async fn delete_file(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_roundtrip_and_hash() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(dir.path());

        let data: &'static [u8] = b"hello notes";
        let res = storage
            .put_stream_with_hash("materials/2026/10/a.pdf", Box::pin(data))
            .await
            .unwrap();

        assert_eq!(res.size, data.len() as i64);
        assert_eq!(res.hash, hex::encode(Sha256::digest(data)));
        assert!(storage.file_exists("materials/2026/10/a.pdf").await.unwrap());

        let mut reader = storage.open_read("materials/2026/10/a.pdf").await.unwrap();
        let mut back = Vec::new();
        reader.read_to_end(&mut back).await.unwrap();
        assert_eq!(back, data);

        storage.delete_file("materials/2026/10/a.pdf").await.unwrap();
        assert!(!storage.file_exists("materials/2026/10/a.pdf").await.unwrap());
        // deleting twice is fine
        storage.delete_file("materials/2026/10/a.pdf").await.unwrap();
    }

    /// Yields some bytes, then fails like a dropped client connection.
    struct BrokenReader {
        sent: bool,
    }

    impl AsyncRead for BrokenReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            if self.sent {
                return std::task::Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "client went away",
                )));
            }
            self.sent = true;
            buf.put_slice(&[7u8; 1000]);
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_local_removes_partial_file_on_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(dir.path());

        let res = storage
            .put_stream_with_hash("materials/2026/10/cut.pdf", Box::pin(BrokenReader { sent: false }))
            .await;

        assert!(res.is_err());
        assert!(!storage.file_exists("materials/2026/10/cut.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_local_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(dir.path());
        assert!(storage.file_exists("../etc/passwd").await.is_err());
        assert!(storage.open_read("/etc/passwd").await.is_err());
    }
}
