use std::path::{Path, PathBuf};

use thiserror::Error;

/// File header for per-video embedding stores.
pub const EMBEDDING_MAGIC: &[u8; 8] = b"VTSEMB01";

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding store not found: {0}")]
    Missing(PathBuf),
    #[error("embedding store {path}: bad magic")]
    BadMagic { path: PathBuf },
    #[error("embedding store {path}: truncated (need {need} bytes, have {have})")]
    Truncated {
        path: PathBuf,
        need: usize,
        have: usize,
    },
    #[error("embedding store {path}: zero dimension")]
    ZeroDim { path: PathBuf },
    #[error("embedding store {path}: row/dim header overflows the addressable size")]
    HeaderOverflow { path: PathBuf },
    #[error("embedding store {path}: row {row} out of range ({rows} rows)")]
    RowOutOfRange {
        path: PathBuf,
        row: usize,
        rows: usize,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-video embedding matrix, row-aligned with the caption table.
///
/// Layout: 8-byte magic, u32 LE row count, u32 LE dimension, then
/// `rows * dim` f32 LE values.
#[derive(Debug, Clone)]
pub struct EmbeddingStore {
    rows: usize,
    dim: usize,
    data: Vec<f32>,
}

impl EmbeddingStore {
    /// Loads `<dir>/<video_id>.emb`.
    pub fn load(dir: &Path, video_id: &str) -> Result<Self, EmbeddingError> {
        let path = dir.join(format!("{video_id}.emb"));
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(EmbeddingError::Missing(path));
            }
            Err(err) => return Err(EmbeddingError::Io(err)),
        };
        Self::parse(&bytes, path)
    }

    pub fn parse(bytes: &[u8], path: PathBuf) -> Result<Self, EmbeddingError> {
        let header = EMBEDDING_MAGIC.len() + 8;
        if bytes.len() < header {
            return Err(EmbeddingError::Truncated {
                path,
                need: header,
                have: bytes.len(),
            });
        }
        if &bytes[..EMBEDDING_MAGIC.len()] != EMBEDDING_MAGIC {
            return Err(EmbeddingError::BadMagic { path });
        }
        let rows = read_u32(bytes, EMBEDDING_MAGIC.len()) as usize;
        let dim = read_u32(bytes, EMBEDDING_MAGIC.len() + 4) as usize;
        if dim == 0 {
            return Err(EmbeddingError::ZeroDim { path });
        }
        // Header counts are attacker-controlled as far as this parser
        // is concerned; the size math must not wrap.
        let cells = rows
            .checked_mul(dim)
            .ok_or_else(|| EmbeddingError::HeaderOverflow { path: path.clone() })?;
        let need = cells
            .checked_mul(4)
            .and_then(|n| n.checked_add(header))
            .ok_or_else(|| EmbeddingError::HeaderOverflow { path: path.clone() })?;
        if bytes.len() < need {
            return Err(EmbeddingError::Truncated {
                path,
                need,
                have: bytes.len(),
            });
        }
        let mut data = Vec::with_capacity(cells);
        for chunk in bytes[header..need].chunks_exact(4) {
            data.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        Ok(Self { rows, dim, data })
    }

    /// Serializes a row-major matrix; the writer-side counterpart used
    /// by fixtures and the packing tools.
    pub fn encode(dim: usize, rows: &[Vec<f32>]) -> Vec<u8> {
        let mut out = Vec::with_capacity(EMBEDDING_MAGIC.len() + 8 + rows.len() * dim * 4);
        out.extend_from_slice(EMBEDDING_MAGIC);
        out.extend_from_slice(&(rows.len() as u32).to_le_bytes());
        out.extend_from_slice(&(dim as u32).to_le_bytes());
        for row in rows {
            for v in row.iter().take(dim) {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        out
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.dim;
        self.data.get(start..start + self.dim)
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_parse_round_trip() {
        let rows = vec![vec![1.0f32, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let bytes = EmbeddingStore::encode(2, &rows);
        let store = EmbeddingStore::parse(&bytes, PathBuf::from("t.emb")).unwrap();
        assert_eq!(store.rows(), 3);
        assert_eq!(store.dim(), 2);
        assert_eq!(store.row(1).unwrap(), &[3.0, 4.0]);
        assert!(store.row(3).is_none());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = EmbeddingStore::encode(1, &[vec![1.0]]);
        bytes[0] = b'X';
        let err = EmbeddingStore::parse(&bytes, PathBuf::from("t.emb")).unwrap_err();
        assert!(matches!(err, EmbeddingError::BadMagic { .. }));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let bytes = EmbeddingStore::encode(4, &[vec![1.0, 2.0, 3.0, 4.0]]);
        let err =
            EmbeddingStore::parse(&bytes[..bytes.len() - 2], PathBuf::from("t.emb"))
                .unwrap_err();
        assert!(matches!(err, EmbeddingError::Truncated { .. }));
    }

    #[test]
    fn overflowing_header_counts_are_rejected() {
        // 16-byte file whose row/dim product wraps the size math.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(EMBEDDING_MAGIC);
        bytes.extend_from_slice(&(1u32 << 31).to_le_bytes());
        bytes.extend_from_slice(&(1u32 << 31).to_le_bytes());
        let err = EmbeddingStore::parse(&bytes, PathBuf::from("t.emb")).unwrap_err();
        assert!(matches!(err, EmbeddingError::HeaderOverflow { .. }));
    }

    #[test]
    fn missing_file_is_distinguished() {
        let err = EmbeddingStore::load(Path::new("/nonexistent-dir"), "vid").unwrap_err();
        assert!(matches!(err, EmbeddingError::Missing(_)));
    }
}
