//! Content digests for pre- and post-copy integrity comparison.

use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUFFER_SIZE: usize = 64 * 1024;

/// Compute the lowercase hex MD5 digest of a file, streaming in 64 KB blocks.
pub fn file_digest(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        context.consume(&buffer[..n]);
    }

    Ok(format!("{:x}", context.compute()))
}

/// [`file_digest`] off the async runtime.
pub async fn file_digest_async(path: &Path) -> std::io::Result<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || file_digest(&path))
        .await
        .map_err(std::io::Error::other)?
}
