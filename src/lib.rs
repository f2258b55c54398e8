//! YAML 只读树形查看器库
//!
//! 提供YAML文件加载、懒加载视图树与偏好设置持久化
//! 遵循MVVM架构模式：model 不依赖 UI，vm 负责与 Slint 界面对接

pub mod model;
pub mod utils;
pub mod vm;

// 重新导出主要类型
pub use model::data_core::{AppError, AppState};
pub use model::document::{Document, DocumentNode, LoadError, NodeKind, NodeRef, ScalarKind};
pub use model::lazy_tree::{Expansion, ExpansionState, LazyTree, ViewId, ViewKind, ViewNode, ViewRow};
pub use utils::config::Preferences;
