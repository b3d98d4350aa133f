//! On-disk certificate material and the canned specification documents.
//!
//! 磁盘上的证书材料以及预置的规范文档。

use crate::error::{HandshakeError, Result};
use crate::protocol::ConnectionType;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CSR_FILE: &str = "cert.csr";
pub const PRIVATE_KEY_FILE: &str = "private.key";
pub const CERT_CHAIN_FILE: &str = "crtChain.crt";
pub const PLACEHOLDER_CERT_FILE: &str = "placeholder.crt";

/// Suffix of the sibling a file is staged in before it is renamed into place.
const STAGING_SUFFIX: &str = ".tmp";

/// Directory holding one session's key, CSR and issued chain.
///
/// Created on first write.
#[derive(Debug, Clone)]
pub struct CertStore {
    dir: PathBuf,
}

impl CertStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn csr_path(&self) -> PathBuf {
        self.dir.join(CSR_FILE)
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.dir.join(PRIVATE_KEY_FILE)
    }

    pub fn chain_path(&self) -> PathBuf {
        self.dir.join(CERT_CHAIN_FILE)
    }

    pub fn placeholder_path(&self) -> PathBuf {
        self.dir.join(PLACEHOLDER_CERT_FILE)
    }

    pub async fn write_csr(&self, csr_pem: &str) -> Result<()> {
        self.write(self.csr_path(), csr_pem.as_bytes()).await
    }

    pub async fn write_placeholder(&self, certificate_pem: &str) -> Result<()> {
        self.write(self.placeholder_path(), certificate_pem.as_bytes()).await
    }

    /// Persists the private key and the decoded certificate chain.
    ///
    /// Both files are staged next to their targets and renamed into place,
    /// chain first and key last. If staging fails the previous pair is left
    /// as it was and the staged files are removed.
    ///
    /// 持久化私钥和解码后的证书链。两个文件先写入临时文件，再依次重命名到位；
    /// 失败时保留原有的文件对并清理临时文件。
    pub async fn write_identity(&self, private_key_pem: &str, chain_pem: &[u8]) -> Result<()> {
        self.ensure_dir().await?;
        let key_path = self.private_key_path();
        let chain_path = self.chain_path();
        let key_staged = staging_path(&key_path);
        let chain_staged = staging_path(&chain_path);

        let result = async {
            write_file(&key_staged, private_key_pem.as_bytes()).await?;
            write_file(&chain_staged, chain_pem).await?;
            rename(&chain_staged, &chain_path).await?;
            rename(&key_staged, &key_path).await
        }
        .await;

        if result.is_err() {
            for staged in [&key_staged, &chain_staged] {
                if let Err(e) = tokio::fs::remove_file(staged).await {
                    debug!(path = %staged.display(), error = %e, "staged file not removed");
                }
            }
        }
        result
    }

    /// Reads back what [`CertStore::write_identity`] wrote.
    pub async fn read_identity(&self) -> Result<(String, Vec<u8>)> {
        let key_path = self.private_key_path();
        let private_key_pem = tokio::fs::read_to_string(&key_path)
            .await
            .map_err(|e| HandshakeError::persistence(&key_path, e))?;

        let chain_path = self.chain_path();
        let chain_pem = tokio::fs::read(&chain_path)
            .await
            .map_err(|e| HandshakeError::persistence(&chain_path, e))?;

        Ok((private_key_pem, chain_pem))
    }

    async fn write(&self, path: PathBuf, contents: &[u8]) -> Result<()> {
        self.ensure_dir().await?;
        write_file(&path, contents).await
    }

    async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| HandshakeError::persistence(&self.dir, e))
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(STAGING_SUFFIX);
    path.with_file_name(name)
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| HandshakeError::persistence(path, e))?;
    debug!(path = %path.display(), bytes = contents.len(), "wrote certificate material");
    Ok(())
}

async fn rename(from: &Path, to: &Path) -> Result<()> {
    tokio::fs::rename(from, to)
        .await
        .map_err(|e| HandshakeError::persistence(to, e))
}

/// Which canned document to register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecKind {
    Api,
    Event,
}

/// File name of the canned document for `kind` in the `connection_type` flavour.
pub fn spec_file_name(kind: SpecKind, connection_type: ConnectionType) -> &'static str {
    match (kind, connection_type) {
        (SpecKind::Api, ConnectionType::Rest) => "api-rest.json",
        (SpecKind::Api, ConnectionType::GraphQl) => "api-graphql.yaml",
        (SpecKind::Event, ConnectionType::Rest) => "event-rest.json",
        (SpecKind::Event, ConnectionType::GraphQl) => "event-graphql.yaml",
    }
}

pub async fn load_spec_document(
    spec_docs_dir: &Path,
    kind: SpecKind,
    connection_type: ConnectionType,
) -> Result<Vec<u8>> {
    let path = spec_docs_dir.join(spec_file_name(kind, connection_type));
    tokio::fs::read(&path)
        .await
        .map_err(|e| HandshakeError::persistence(&path, e))
}
