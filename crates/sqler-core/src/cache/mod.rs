use std::{
    fs, io,
    path::{Path, PathBuf},
};

use aes_gcm::{
    Aes256Gcm,
    aead::{Aead, KeyInit},
};
use thiserror::Error;

use crate::DataSource;

const ENCRYPTION_KEY: [u8; 32] = [
    0x7f, 0x3e, 0x9a, 0x5c, 0x2b, 0x8f, 0x1d, 0x6e, 0x4a, 0x0c, 0x7b, 0x9f, 0x3d, 0x5a, 0x8e, 0x2c, 0x1f, 0x6b, 0x4d,
    0x9a, 0x0e, 0x7c, 0x3f, 0x5b, 0x8d, 0x2a, 0x9e, 0x1c, 0x6f, 0x4b, 0x0d, 0x7a,
];

const NONCE: [u8; 12] = [0xa1, 0xb2, 0xc3, 0xd4, 0xe5, 0xf6, 0x07, 0x18, 0x29, 0x3a, 0x4b, 0x5c];

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("数据源不存在: {0}")]
    SourceNotFound(String),
}

/// 数据源存储（~/.sqler/sources.db，AES-256-GCM 加密的 JSON）
pub struct AppCache {
    sources: Vec<DataSource>,
    sources_path: PathBuf,
}

impl AppCache {
    /// 从指定文件加载，文件不存在时视为空
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        let sources: Vec<DataSource> = if path.exists() {
            let encrypted = fs::read(path)?;
            let decrypted = Self::decrypt(&encrypted)?;
            serde_json::from_slice(&decrypted)?
        } else {
            vec![]
        };
        tracing::debug!("加载数据源 {} 个: {:?}", sources.len(), path);

        Ok(Self {
            sources,
            sources_path: path.to_path_buf(),
        })
    }

    pub fn sources(&self) -> &[DataSource] {
        &self.sources
    }

    pub fn sources_path(&self) -> &Path {
        &self.sources_path
    }

    pub fn source(
        &self,
        id: &str,
    ) -> Result<DataSource, CacheError> {
        self.sources
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| CacheError::SourceNotFound(id.to_string()))
    }

    fn decrypt(data: &[u8]) -> Result<Vec<u8>, CacheError> {
        Aes256Gcm::new(&ENCRYPTION_KEY.into())
            .decrypt(&NONCE.into(), data)
            .map_err(|e| CacheError::Decryption(e.to_string()))
    }
}
