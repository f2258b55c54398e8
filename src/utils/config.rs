//! 偏好设置：记住上次打开文件的目录，保存在 `~/.yamlviewer.yaml`

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::data_core::AppError;

pub const PREFERENCES_FILE_NAME: &str = ".yamlviewer.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// 文件对话框的起始目录
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// 未识别的键原样保留，写回时不丢失
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

fn default_directory() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            extra: BTreeMap::new(),
        }
    }
}

/// 默认偏好文件位置；没有主目录时返回 None
pub fn preferences_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(PREFERENCES_FILE_NAME))
}

impl Preferences {
    /// 读取偏好文件；文件缺失或格式错误时使用默认值
    pub fn load_from(p: &Path) -> Self {
        let text = match fs::read_to_string(p) {
            Ok(text) => text,
            Err(e) => {
                tracing::info!("未读取偏好文件 {}，使用默认值: {}", p.display(), e);
                return Self::default();
            }
        };
        if text.trim().is_empty() {
            return Self::default();
        }
        match serde_yaml::from_str(&text) {
            Ok(prefs) => prefs,
            Err(e) => {
                tracing::warn!("偏好文件格式错误 {}，使用默认值: {}", p.display(), e);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, p: &Path) -> Result<(), AppError> {
        let text = serde_yaml::to_string(self).map_err(|e| AppError::Config(e.to_string()))?;
        fs::write(p, text).map_err(|e| AppError::Config(format!("{}: {}", p.display(), e)))?;
        Ok(())
    }

    /// 从默认位置读取
    pub fn load() -> Self {
        match preferences_path() {
            Some(p) => Self::load_from(&p),
            None => Self::default(),
        }
    }

    /// 写回默认位置（尽力而为，失败只记录日志）
    pub fn save(&self) {
        let Some(p) = preferences_path() else {
            tracing::warn!("找不到主目录，偏好设置未保存");
            return;
        };
        match self.save_to(&p) {
            Ok(()) => tracing::info!("偏好设置已保存到: {}", p.display()),
            Err(e) => tracing::warn!("偏好设置保存失败: {}", e),
        }
    }

    /// 记住文件所在目录，供下次打开对话框使用
    pub fn remember_file(&mut self, file: &Path) {
        if let Some(parent) = file.parent().filter(|d| !d.as_os_str().is_empty()) {
            self.directory = parent.to_path_buf();
        }
    }
}
