//! AppState：应用核心状态，负责加载、重新加载与节点展开

use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;

use crate::model::document::LoadError;
use crate::model::lazy_tree::{LazyTree, ViewId, ViewKind, ViewRow};
use crate::utils::config::Preferences;
use crate::utils::fs::read_document;

/// “全部展开”最多执行的填充次数，防止超大文档卡死界面
pub const EXPAND_ALL_LIMIT: usize = 10_000;

#[derive(Debug, Default)]
pub struct AppState {
    pub source_path: Option<PathBuf>,
    pub tree: LazyTree,
    pub preferences: Preferences,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("无法读取文件 {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML解析失败 {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: LoadError,
    },
    #[error("当前没有已加载的文件")]
    NoCurrentFile,
    #[error("未知节点: {0}")]
    UnknownNode(ViewId),
    #[error("偏好设置错误: {0}")]
    Config(String),
    #[error("YAML输出失败: {0}")]
    Render(#[from] serde_yaml::Error),
}

impl AppState {
    pub fn new(preferences: Preferences) -> Self {
        Self {
            preferences,
            ..Self::default()
        }
    }

    /// 加载YAML文件并重建视图树，返回顶层节点数
    ///
    /// 先完整读取并解析，成功后才替换当前树；失败时保持原状态不变。
    pub fn load_file(&mut self, p: &Path) -> Result<usize, AppError> {
        let document = Rc::new(read_document(p)?);
        let top_level = self.tree.reset(document);
        self.source_path = Some(p.to_path_buf());
        self.preferences.remember_file(p);
        tracing::info!("已加载 {}: 顶层 {} 个节点", p.display(), top_level);
        Ok(top_level)
    }

    /// 从磁盘重新读取当前文件
    pub fn reload(&mut self) -> Result<usize, AppError> {
        let path = self.source_path.clone().ok_or(AppError::NoCurrentFile)?;
        self.load_file(&path)
    }

    /// 切换节点的展开状态，返回切换后是否展开
    pub fn toggle_node_expanded(&mut self, id: ViewId) -> Result<bool, AppError> {
        self.tree.toggle(id)
    }

    pub fn expand_all(&mut self) -> usize {
        self.tree.expand_all(EXPAND_ALL_LIMIT)
    }

    /// 当前可见的行
    pub fn rows(&self) -> Vec<ViewRow> {
        self.tree.visible_rows()
    }

    /// 复制用文本：叶子为其值，分支为整棵子树的YAML文本
    pub fn copy_text_for(&self, id: ViewId) -> Result<String, AppError> {
        let node = self.tree.node(id).ok_or(AppError::UnknownNode(id))?;
        match (node.kind, node.source, self.tree.document()) {
            (ViewKind::Branch, Some(source), Some(document)) => {
                Ok(document.to_yaml(source)?.trim_end().to_string())
            }
            _ => Ok(node.value.clone()),
        }
    }
}
