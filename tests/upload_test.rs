mod common;

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use study_vault::api::error::AppError;
use study_vault::services::material_service::MaterialService;
use tokio::io::{AsyncRead, ReadBuf};

/// Sends one chunk, then fails the way a dropped connection does.
struct DroppedConnection {
    sent: bool,
}

impl AsyncRead for DroppedConnection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if self.sent {
            return Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        self.sent = true;
        buf.put_slice(&[b'x'; 1000]);
        Poll::Ready(Ok(()))
    }
}

fn stored_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files
}

fn service(ctx: &common::TestContext) -> MaterialService {
    MaterialService::new(
        ctx.state.db.clone(),
        ctx.state.storage.clone(),
        ctx.state.config.clone(),
    )
}

#[tokio::test]
async fn test_interrupted_upload_leaves_nothing_behind() {
    let ctx = common::setup().await;

    let result = service(&ctx)
        .store_upload("notes.pdf", DroppedConnection { sent: false })
        .await;

    assert!(result.is_err());
    assert_eq!(stored_files(ctx.media.path()), Vec::<PathBuf>::new());
}

#[tokio::test]
async fn test_rejected_uploads_leave_nothing_behind() {
    let ctx = common::setup_with(|config| config.max_file_size = 16).await;
    let service = service(&ctx);

    let oversize = service.store_upload("big.pdf", &[b'a'; 64][..]).await;
    assert!(matches!(oversize, Err(AppError::PayloadTooLarge(_))));

    match service.store_upload("empty.pdf", &b""[..]).await {
        Err(AppError::Validation(errors)) => assert!(errors.contains("file")),
        other => panic!("expected a file error, got {:?}", other.map(|s| s.key)),
    }

    assert_eq!(stored_files(ctx.media.path()), Vec::<PathBuf>::new());

    let kept = service.store_upload("small.pdf", &b"%PDF"[..]).await.unwrap();
    assert_eq!(kept.size, 4);
    assert_eq!(stored_files(ctx.media.path()).len(), 1);
}
