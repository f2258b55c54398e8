//! VM桥接层：连接Slint UI与AppState数据模型
//!
//! 注意：回调绑定在main.rs中，因为依赖于Slint生成的类型
//! 这里只提供状态文本与不依赖UI的格式化函数

use std::path::Path;

// === 常量定义（消除魔法值） ===
pub const STATUS_READY: &str = "就绪";
pub const STATUS_LOADING: &str = "正在加载文件...";
pub const STATUS_NO_FILE_SELECTED: &str = "未选择文件";
pub const STATUS_COPIED: &str = "已复制到剪贴板";
pub const STATUS_ERROR_PREFIX: &str = "错误: ";
pub const DIALOG_TITLE_ERROR: &str = "出错了";

/// 加载成功后的状态栏文本
pub fn loaded_status(path: &Path, top_level: usize) -> String {
    format!("已加载 {}（顶层 {} 项）", path.display(), top_level)
}

/// 展开/折叠后的状态栏文本
pub fn toggled_status(label: &str, open: bool) -> String {
    let action = if open { "展开" } else { "折叠" };
    format!("{}: {}", action, label)
}

pub fn error_status(err: &dyn std::fmt::Display) -> String {
    format!("{}{}", STATUS_ERROR_PREFIX, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::data_core::AppError;

    #[test]
    fn test_status_texts() {
        assert_eq!(loaded_status(Path::new("/tmp/a.yaml"), 3), "已加载 /tmp/a.yaml（顶层 3 项）");
        assert_eq!(toggled_status("users", true), "展开: users");
        assert_eq!(toggled_status("users", false), "折叠: users");
        assert_eq!(error_status(&AppError::NoCurrentFile), "错误: 当前没有已加载的文件");
    }
}
