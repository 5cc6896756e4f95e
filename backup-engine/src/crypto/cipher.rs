//! Built-in fallback cipher.
//!
//! Byte-wise XOR with a fixed mask. Applying it twice restores the input, so
//! the same function decrypts. This keeps targets unreadable at a glance; it
//! is not cryptographically secure.

use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const BUFFER_SIZE: usize = 4096;

pub fn xor_in_place(buf: &mut [u8], mask: u8) {
    for byte in buf.iter_mut() {
        *byte ^= mask;
    }
}

/// Stream `source` through the XOR mask into `target` (created or truncated).
pub async fn apply_fallback_cipher(source: &Path, target: &Path, mask: u8) -> std::io::Result<u64> {
    let mut input = tokio::fs::File::open(source).await?;
    let mut output = tokio::fs::File::create(target).await?;
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut written = 0u64;

    loop {
        let n = input.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        xor_in_place(&mut buffer[..n], mask);
        output.write_all(&buffer[..n]).await?;
        written += n as u64;
    }

    output.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_xor_is_self_inverse() {
        let original = b"hello, backup".to_vec();
        let mut buf = original.clone();
        xor_in_place(&mut buf, 0xFF);
        assert_ne!(buf, original);
        xor_in_place(&mut buf, 0xFF);
        assert_eq!(buf, original);
    }

    #[tokio::test]
    async fn test_file_round_trip() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        let plain = dir.path().join("s.txt");
        let sealed = dir.path().join("s.txt.enc");
        let restored = dir.path().join("s.txt.out");
        let content: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&plain, &content)?;

        assert_eq!(apply_fallback_cipher(&plain, &sealed, 0xFF).await?, content.len() as u64);
        assert_ne!(std::fs::read(&sealed)?, content);

        apply_fallback_cipher(&sealed, &restored, 0xFF).await?;
        assert_eq!(std::fs::read(&restored)?, content);
        Ok(())
    }
}
