//! 受根目录约束的文件存储：路径解析、列表、保存与删除。

use axum::body::Bytes;
use serde::Serialize;
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use walkdir::WalkDir;

use crate::atomic::AtomicFile;

#[derive(Clone, Debug)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// 打开已存在的根目录，根目录在整个生命周期内不变。
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref();
        let root = match std::fs::canonicalize(root) {
            Ok(path) => path,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StorageError::RootMissing(root.to_path_buf()));
            }
            Err(err) => return Err(StorageError::Io(err)),
        };
        if !root.is_dir() {
            return Err(StorageError::RootMissing(root));
        }
        Ok(Self { root })
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// 将请求路径解析为根目录下的绝对路径，越界时返回错误。
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let trimmed = relative
            .strip_prefix(std::path::is_separator)
            .unwrap_or(relative);
        let mut resolved = self.root.clone();

        for component in Path::new(trimmed).components() {
            match component {
                Component::Normal(segment) => resolved.push(segment),
                Component::CurDir => continue,
                Component::ParentDir => {
                    if !resolved.pop() {
                        return Err(StorageError::BoundaryViolation(relative.to_string()));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::BoundaryViolation(relative.to_string()));
                }
            }
        }

        if !resolved.starts_with(&self.root) {
            return Err(StorageError::BoundaryViolation(relative.to_string()));
        }
        Ok(resolved)
    }

    pub async fn list(
        &self,
        relative: &str,
        recursive: bool,
    ) -> Result<Vec<FileEntry>, StorageError> {
        debug!(path = relative, recursive, "list");
        let target = self.resolve(relative)?;
        if !fs::try_exists(&target).await? {
            return Ok(Vec::new());
        }
        run_blocking(move || collect_files(&target, recursive)).await
    }

    /// 保存上传内容，已存在的同名文件会被替换。返回相对根目录的路径。
    pub async fn save(
        &self,
        payload: &UploadedPayload,
        destination_dir: &str,
        destination_name: &str,
    ) -> Result<String, StorageError> {
        debug!(
            size = payload.len(),
            destination_dir, destination_name, "save"
        );
        if payload.is_empty() {
            return Err(StorageError::EmptyPayload);
        }

        let dir = self.resolve(destination_dir)?;
        let name = single_segment(destination_name)?;
        let target = dir.join(name);

        fs::create_dir_all(&dir).await?;
        let mut atomic = AtomicFile::new(&target).await?;
        if let Err(err) = atomic.file_mut().write_all(payload.bytes()).await {
            atomic.cleanup().await;
            return Err(StorageError::Io(err));
        }
        atomic.finalize().await?;

        Ok(self.relative_name(&target))
    }

    /// 删除文件或不含普通文件的目录。
    pub async fn delete(&self, relative: &str) -> Result<(), StorageError> {
        debug!(path = relative, "delete");
        let target = self.resolve(relative)?;
        let metadata = match fs::symlink_metadata(&target).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StorageError::PathNotFound(relative.to_string()));
            }
            Err(err) => return Err(StorageError::Io(err)),
        };

        if metadata.is_dir() {
            let probe = target.clone();
            if run_blocking(move || contains_regular_file(&probe)).await? {
                return Err(StorageError::DirectoryNotEmpty(relative.to_string()));
            }
            self.remove_tree(&target).await
        } else {
            fs::remove_file(&target).await?;
            Ok(())
        }
    }

    /// 无条件递归删除，目标不存在时视为成功。
    pub async fn hard_delete(&self, relative: &str) -> Result<(), StorageError> {
        debug!(path = relative, "hard delete");
        let target = self.resolve(relative)?;
        let result = match fs::symlink_metadata(&target).await {
            Ok(metadata) if metadata.is_dir() => self.remove_tree(&target).await,
            Ok(_) => fs::remove_file(&target).await.map_err(StorageError::from),
            Err(err) => Err(StorageError::Io(err)),
        };
        match result {
            Err(StorageError::Io(err)) if err.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    /// 删除目录树；根目录本身只清空不删除。
    async fn remove_tree(&self, target: &Path) -> Result<(), StorageError> {
        if target != self.root {
            fs::remove_dir_all(target).await?;
            return Ok(());
        }

        let mut dir = fs::read_dir(target).await?;
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(entry.path()).await?;
            } else {
                fs::remove_file(entry.path()).await?;
            }
        }
        Ok(())
    }

    fn relative_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(slash_joined)
            .unwrap_or_default()
    }
}

/// 上传的文件内容。
#[derive(Clone, Debug, Default)]
pub struct UploadedPayload {
    data: Bytes,
}

impl UploadedPayload {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub full_file_name: String,
    pub file_name: String,
    pub size: u64,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("root directory {} does not exist", .0.display())]
    RootMissing(PathBuf),
    #[error("cannot access {0}: path is outside the root directory")]
    BoundaryViolation(String),
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error("invalid file name {0:?}")]
    InvalidFileName(String),
    #[error("directory {0} is not empty")]
    DirectoryNotEmpty(String),
    #[error("path {0} does not exist")]
    PathNotFound(String),
    #[error("storage i/o error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    /// 是否由请求内容引起（而非存储故障）。
    pub fn is_client_error(&self) -> bool {
        !matches!(self, StorageError::Io(_) | StorageError::RootMissing(_))
    }
}

/// 启动失败时保留底层 I/O 错误类别。
impl From<StorageError> for io::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(err) => err,
            StorageError::RootMissing(_) => io::Error::new(ErrorKind::NotFound, err.to_string()),
            other => io::Error::new(ErrorKind::InvalidInput, other.to_string()),
        }
    }
}

impl From<walkdir::Error> for StorageError {
    fn from(err: walkdir::Error) -> Self {
        StorageError::Io(err.into())
    }
}

async fn run_blocking<T, F>(task: F) -> Result<T, StorageError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| io::Error::other(err.to_string()))?
}

fn collect_files(base: &Path, recursive: bool) -> Result<Vec<FileEntry>, StorageError> {
    let walker = WalkDir::new(base).follow_root_links(false);
    let walker = if recursive {
        walker
    } else {
        walker.max_depth(1)
    };

    let mut entries = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let size = entry.metadata()?.len();
        let file_name = entry.file_name().to_string_lossy().to_string();
        let full_file_name = match entry.path().strip_prefix(base) {
            Ok(relative) if !relative.as_os_str().is_empty() => slash_joined(relative),
            _ => file_name.clone(),
        };
        entries.push(FileEntry {
            full_file_name,
            file_name,
            size,
        });
    }
    Ok(entries)
}

fn contains_regular_file(dir: &Path) -> Result<bool, StorageError> {
    for entry in WalkDir::new(dir).follow_root_links(false).min_depth(1) {
        if entry?.file_type().is_file() {
            return Ok(true);
        }
    }
    Ok(false)
}

fn single_segment(name: &str) -> Result<&Path, StorageError> {
    let path = Path::new(name);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(std::path::is_separator) => Ok(path),
        _ => Err(StorageError::InvalidFileName(name.to_string())),
    }
}

fn slash_joined(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
