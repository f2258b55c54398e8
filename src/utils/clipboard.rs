//! 剪贴板：把选中节点的值或子树YAML文本写入系统剪贴板

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClipboardError {
    /// 系统剪贴板不可用或写入失败
    #[error("剪贴板不可用: {0}")]
    Unavailable(String),
    /// 选中节点没有可复制的文本
    #[error("选中节点没有可复制的内容")]
    Empty,
}

/// 将节点值复制到系统剪贴板；空文本不覆盖剪贴板
pub fn copy_to_clipboard(text: &str) -> Result<(), ClipboardError> {
    use copypasta::{ClipboardContext, ClipboardProvider};
    if text.is_empty() {
        return Err(ClipboardError::Empty);
    }
    let mut ctx = ClipboardContext::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
    ctx.set_contents(text.to_string())
        .map_err(|e| ClipboardError::Unavailable(e.to_string()))
}

/// 从系统剪贴板获取文本（用于测试）
#[cfg(test)]
pub fn get_clipboard_contents() -> Result<String, ClipboardError> {
    use copypasta::{ClipboardContext, ClipboardProvider};
    let mut ctx = ClipboardContext::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
    ctx.get_contents()
        .map_err(|e| ClipboardError::Unavailable(e.to_string()))
}
