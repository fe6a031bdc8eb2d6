//! JSON 文件持久化
//!
//! 将任意可序列化的值写入/读出单个 JSON 文件；FileSessionStore 用它为每个会话保存一份 SessionState。

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// 单文件 JSON 持久化
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取并反序列化；文件不存在时返回 None
    pub async fn load<T: DeserializeOwned>(&self) -> anyhow::Result<Option<T>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 序列化后写入；父目录不存在时自动创建。先写临时文件再 rename，避免读到半截内容
    pub async fn save<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_string_pretty(value)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
