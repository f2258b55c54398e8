//! 文件读取：从磁盘读取并解析YAML文档

use std::{fs, path::Path};

use crate::model::data_core::AppError;
use crate::model::document::Document;

/// 从文件读取并解析YAML文档
pub fn read_document(p: &Path) -> Result<Document, AppError> {
    let text = fs::read_to_string(p).map_err(|source| AppError::Read {
        path: p.to_path_buf(),
        source,
    })?;
    Document::parse_str(&text).map_err(|source| AppError::Parse {
        path: p.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_document(&dir.path().join("absent.yaml"));
        assert!(matches!(result, Err(AppError::Read { .. })));
    }

    #[test]
    fn test_read_malformed_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"key: [unclosed\n").unwrap();
        let result = read_document(file.path());
        assert!(matches!(result, Err(AppError::Parse { .. })));
    }

    #[test]
    fn test_read_json_document() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"name": "test", "value": 42}"#).unwrap();
        let doc = read_document(file.path()).unwrap();
        assert_eq!(doc.flow_text(doc.root()), "{name: test, value: 42}");
    }
}
