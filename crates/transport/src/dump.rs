//! Raw-frame trace sink (`spec.md` §6 `--dump <path>`): every byte read off
//! the live bus is appended here verbatim, so a session can later be fed
//! back through [`crate::file::open_replay`] with `--dry-run`.

use tokio::io::AsyncWriteExt;

use crate::error::TransportError;

pub struct DumpSink {
    file: tokio::fs::File,
}

impl DumpSink {
    pub async fn create(path: &str) -> Result<Self, TransportError> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|source| TransportError::Open { kind: "dump-sink", source })?;
        Ok(DumpSink { file })
    }

    pub async fn record(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.file.write_all(bytes).await.map_err(TransportError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_recorded_bytes_to_the_dump_file() {
        let mut path = std::env::temp_dir();
        path.push(format!("ehs-gateway-dump-test-{}", std::process::id()));
        tokio::fs::remove_file(&path).await.ok();

        let mut sink = DumpSink::create(path.to_str().unwrap()).await.unwrap();
        sink.record(b"one").await.unwrap();
        sink.record(b"two").await.unwrap();

        let contents = tokio::fs::read(&path).await.unwrap();
        assert_eq!(contents, b"onetwo");

        tokio::fs::remove_file(&path).await.ok();
    }
}
