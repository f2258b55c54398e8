//! 文档图：YAML 加载后的只读节点集合
//!
//! 节点存放在一个扁平数组里，子节点用 `NodeRef` 下标引用。别名直接指向锚点节点，
//! 所以共享子树只存一份，自引用的锚点会形成环；视图树按需逐层展开，环不会被穷举。
//! 自定义标签一律忽略，非字符串键转换成文本。

use std::collections::{HashMap, HashSet};

use serde_yaml::Value;
use thiserror::Error;
use yaml_rust2::parser::{Event, EventReceiver, Parser, Tag};
use yaml_rust2::scanner::{ScanError, TScalarStyle};

/// 复制文本中代替环引用的占位文本
pub const RECURSIVE_MARKER: &str = "<recursive>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(u32);

impl NodeRef {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Mapping,
    Sequence,
    Scalar,
}

/// 标量的解析类型，决定复制时的引号规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Integer,
    Float,
    Bool,
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentNode {
    /// 键已转换为文本，保持文档顺序
    Mapping(Vec<(String, NodeRef)>),
    Sequence(Vec<NodeRef>),
    Scalar { text: String, kind: ScalarKind },
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("{0}")]
    Scan(#[from] ScanError),
    #[error("文件包含 {0} 个文档，只支持单个文档")]
    MultipleDocuments(usize),
    #[error("别名引用了未定义的锚点")]
    UnknownAlias,
}

impl DocumentNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            DocumentNode::Mapping(_) => NodeKind::Mapping,
            DocumentNode::Sequence(_) => NodeKind::Sequence,
            DocumentNode::Scalar { .. } => NodeKind::Scalar,
        }
    }

    pub fn is_branch(&self) -> bool {
        !matches!(self, DocumentNode::Scalar { .. })
    }

    pub fn len(&self) -> usize {
        match self {
            DocumentNode::Mapping(entries) => entries.len(),
            DocumentNode::Sequence(items) => items.len(),
            DocumentNode::Scalar { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 列表中显示的值：标量为文本，分支为规模预览
    pub fn preview(&self) -> String {
        match self {
            DocumentNode::Scalar { text, .. } => text.clone(),
            DocumentNode::Sequence(items) => {
                let n = items.len();
                format!("(list with {} item{})", n, if n == 1 { "" } else { "s" })
            }
            DocumentNode::Mapping(entries) => {
                let n = entries.len();
                format!("(map with {} key{})", n, if n == 1 { "" } else { "s" })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    nodes: Vec<DocumentNode>,
    root: NodeRef,
}

impl Document {
    /// 解析单个YAML文档；空文本视为 `null`
    pub fn parse_str(text: &str) -> Result<Self, LoadError> {
        let mut builder = Builder::default();
        Parser::new(text.chars()).load(&mut builder, true)?;
        if let Some(err) = builder.error {
            return Err(err);
        }
        if builder.documents > 1 {
            return Err(LoadError::MultipleDocuments(builder.documents));
        }

        let mut nodes = builder.nodes;
        let root = match builder.root {
            Some(root) => root,
            None => {
                nodes.push(DocumentNode::Scalar {
                    text: "null".to_string(),
                    kind: ScalarKind::Null,
                });
                NodeRef(nodes.len() as u32 - 1)
            }
        };
        tracing::debug!("文档已解析: {} 个节点", nodes.len());
        Ok(Self { nodes, root })
    }

    pub fn root(&self) -> NodeRef {
        self.root
    }

    pub fn get(&self, node: NodeRef) -> &DocumentNode {
        &self.nodes[node.index()]
    }

    /// 从 `node` 出发可达的标量数量；指回祖先的引用不计
    pub fn scalar_count(&self, node: NodeRef) -> usize {
        fn walk(doc: &Document, node: NodeRef, ancestors: &mut Vec<NodeRef>) -> usize {
            if ancestors.contains(&node) {
                return 0;
            }
            ancestors.push(node);
            let count = match doc.get(node) {
                DocumentNode::Scalar { .. } => 1,
                DocumentNode::Sequence(items) => items.iter().map(|&c| walk(doc, c, ancestors)).sum(),
                DocumentNode::Mapping(entries) => {
                    entries.iter().map(|&(_, c)| walk(doc, c, ancestors)).sum()
                }
            };
            ancestors.pop();
            count
        }
        walk(self, node, &mut Vec::new())
    }

    /// 单行流式文本，用于复合键的显示
    pub fn flow_text(&self, node: NodeRef) -> String {
        flow_text_in(&self.nodes, node, &mut Vec::new())
    }

    /// 子树对应的 `serde_yaml::Value`；环引用处替换为 [`RECURSIVE_MARKER`]
    pub fn to_value(&self, node: NodeRef) -> Value {
        fn walk(doc: &Document, node: NodeRef, ancestors: &mut Vec<NodeRef>) -> Value {
            if ancestors.contains(&node) {
                return Value::String(RECURSIVE_MARKER.to_string());
            }
            ancestors.push(node);
            let value = match doc.get(node) {
                DocumentNode::Scalar { text, kind } => scalar_value(text, *kind),
                DocumentNode::Sequence(items) => {
                    Value::Sequence(items.iter().map(|&c| walk(doc, c, ancestors)).collect())
                }
                DocumentNode::Mapping(entries) => {
                    let mut map = serde_yaml::Mapping::new();
                    for (key, child) in entries {
                        map.insert(Value::String(key.clone()), walk(doc, *child, ancestors));
                    }
                    Value::Mapping(map)
                }
            };
            ancestors.pop();
            value
        }
        walk(self, node, &mut Vec::new())
    }

    /// 子树的YAML文本，字符串按YAML规则加引号
    pub fn to_yaml(&self, node: NodeRef) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.to_value(node))
    }
}

fn scalar_value(text: &str, kind: ScalarKind) -> Value {
    match kind {
        ScalarKind::String => Value::String(text.to_string()),
        ScalarKind::Null => Value::Null,
        ScalarKind::Bool => Value::Bool(text == "true"),
        ScalarKind::Integer | ScalarKind::Float => {
            serde_yaml::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
        }
    }
}

fn flow_text_in(nodes: &[DocumentNode], node: NodeRef, ancestors: &mut Vec<NodeRef>) -> String {
    if ancestors.contains(&node) {
        return RECURSIVE_MARKER.to_string();
    }
    ancestors.push(node);
    let text = match &nodes[node.index()] {
        DocumentNode::Scalar { text, .. } => text.clone(),
        DocumentNode::Sequence(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|&c| flow_text_in(nodes, c, ancestors))
                .collect();
            format!("[{}]", parts.join(", "))
        }
        DocumentNode::Mapping(entries) => {
            let parts: Vec<String> = entries
                .iter()
                .map(|(k, c)| format!("{}: {}", k, flow_text_in(nodes, *c, ancestors)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    };
    ancestors.pop();
    text
}

/// YAML 1.2 core schema 的纯量类型判定
fn resolve_plain(text: &str) -> ScalarKind {
    match text {
        "" | "~" | "null" | "Null" | "NULL" => ScalarKind::Null,
        "true" | "True" | "TRUE" | "false" | "False" | "FALSE" => ScalarKind::Bool,
        _ if is_integer(text) => ScalarKind::Integer,
        _ if is_float(text) => ScalarKind::Float,
        _ => ScalarKind::String,
    }
}

fn is_integer(text: &str) -> bool {
    if let Some(hex) = text.strip_prefix("0x") {
        return !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    if let Some(oct) = text.strip_prefix("0o") {
        return !oct.is_empty() && oct.chars().all(|c| ('0'..='7').contains(&c));
    }
    let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_float(text: &str) -> bool {
    let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
    if matches!(unsigned, ".inf" | ".Inf" | ".INF") || matches!(text, ".nan" | ".NaN" | ".NAN") {
        return true;
    }
    text.chars().any(|c| c.is_ascii_digit())
        && text.chars().all(|c| c.is_ascii_digit() || "+-.eE".contains(c))
        && text.parse::<f64>().is_ok()
}

fn is_core_tag(tag: &Tag, suffix: &str) -> bool {
    (tag.handle == "!!" || tag.handle == "tag:yaml.org,2002:") && tag.suffix == suffix
}

struct PendingKey {
    text: String,
    merge: bool,
}

struct Entry {
    key: String,
    value: NodeRef,
    merge: bool,
}

/// 尚未结束的集合
enum Frame {
    Sequence {
        node: NodeRef,
        items: Vec<NodeRef>,
    },
    Mapping {
        node: NodeRef,
        entries: Vec<Entry>,
        key: Option<PendingKey>,
    },
}

/// 事件接收器：按解析事件构建节点数组
///
/// 集合节点在开始事件时就分配下标并登记锚点，因此集合内部指向自身锚点的别名
/// 会得到同一个下标，形成环。
#[derive(Default)]
struct Builder {
    nodes: Vec<DocumentNode>,
    anchors: HashMap<usize, NodeRef>,
    merge_keys: HashSet<NodeRef>,
    stack: Vec<Frame>,
    root: Option<NodeRef>,
    documents: usize,
    error: Option<LoadError>,
}

impl Builder {
    fn alloc(&mut self, node: DocumentNode) -> NodeRef {
        self.nodes.push(node);
        NodeRef(self.nodes.len() as u32 - 1)
    }

    fn register_anchor(&mut self, anchor: usize, node: NodeRef) {
        // 0 表示没有锚点
        if anchor > 0 {
            self.anchors.insert(anchor, node);
        }
    }

    fn scalar(&mut self, text: String, style: TScalarStyle, tag: Option<&Tag>) -> NodeRef {
        let plain = style == TScalarStyle::Plain;
        let kind = match tag {
            Some(tag) if is_core_tag(tag, "str") => ScalarKind::String,
            _ if plain => resolve_plain(&text),
            _ => ScalarKind::String,
        };
        let merge = plain && tag.is_none() && text == "<<";
        let text = match kind {
            ScalarKind::Null => "null".to_string(),
            ScalarKind::Bool => text.to_ascii_lowercase(),
            _ => text,
        };
        let node = self.alloc(DocumentNode::Scalar { text, kind });
        if merge {
            self.merge_keys.insert(node);
        }
        node
    }

    /// 把完成的节点挂到当前集合：序列追加；映射交替作为键和值
    fn attach(&mut self, node: NodeRef) {
        let wants_key = matches!(self.stack.last(), Some(Frame::Mapping { key: None, .. }));
        let pending = wants_key.then(|| PendingKey {
            text: flow_text_in(&self.nodes, node, &mut Vec::new()),
            merge: self.merge_keys.contains(&node),
        });

        match self.stack.last_mut() {
            None => {
                if self.root.is_none() {
                    self.root = Some(node);
                }
            }
            Some(Frame::Sequence { items, .. }) => items.push(node),
            Some(Frame::Mapping { entries, key, .. }) => match pending {
                Some(pending) => *key = Some(pending),
                None => {
                    if let Some(k) = key.take() {
                        entries.push(Entry {
                            key: k.text,
                            value: node,
                            merge: k.merge,
                        });
                    }
                }
            },
        }
    }

    /// 展开 `<<` 合并键并处理重复键
    ///
    /// 合并来源排在前面，显式键覆盖合并来的键；多个来源时靠前的优先。
    /// 重复键保留第一次出现的位置和最后一次的值。
    fn finish_mapping(&self, entries: Vec<Entry>) -> Vec<(String, NodeRef)> {
        let mut sources: Vec<NodeRef> = Vec::new();
        let mut own: Vec<(String, NodeRef)> = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.merge {
                match self.merge_sources(entry.value) {
                    Some(found) => {
                        sources.extend(found);
                        continue;
                    }
                    None => tracing::debug!("合并键的值不是映射，按普通键处理"),
                }
            }
            own.push((entry.key, entry.value));
        }

        let mut combined: Vec<(String, NodeRef)> = Vec::new();
        for source in sources.iter().rev() {
            if let DocumentNode::Mapping(items) = &self.nodes[source.index()] {
                combined.extend(items.iter().cloned());
            }
        }
        combined.extend(own);

        let mut out: Vec<(String, NodeRef)> = Vec::with_capacity(combined.len());
        let mut seen: HashMap<String, usize> = HashMap::new();
        for (key, value) in combined {
            match seen.get(&key) {
                Some(&slot) => out[slot].1 = value,
                None => {
                    seen.insert(key.clone(), out.len());
                    out.push((key, value));
                }
            }
        }
        out
    }

    /// 合并键的值只能是映射或映射的序列
    fn merge_sources(&self, value: NodeRef) -> Option<Vec<NodeRef>> {
        let is_mapping = |n: NodeRef| matches!(self.nodes[n.index()], DocumentNode::Mapping(_));
        match &self.nodes[value.index()] {
            DocumentNode::Mapping(_) => Some(vec![value]),
            DocumentNode::Sequence(items) if items.iter().all(|&n| is_mapping(n)) => {
                Some(items.clone())
            }
            _ => None,
        }
    }
}

impl EventReceiver for Builder {
    fn on_event(&mut self, ev: Event) {
        if self.error.is_some() {
            return;
        }
        match ev {
            Event::DocumentStart { .. } => self.documents += 1,
            Event::Alias(anchor) => match self.anchors.get(&anchor).copied() {
                Some(target) => self.attach(target),
                None => self.error = Some(LoadError::UnknownAlias),
            },
            Event::Scalar(text, style, anchor, tag) => {
                let node = self.scalar(text, style, tag.as_ref());
                self.register_anchor(anchor, node);
                self.attach(node);
            }
            Event::SequenceStart(anchor, ..) => {
                let node = self.alloc(DocumentNode::Sequence(Vec::new()));
                self.register_anchor(anchor, node);
                self.stack.push(Frame::Sequence {
                    node,
                    items: Vec::new(),
                });
            }
            Event::SequenceEnd => {
                if let Some(Frame::Sequence { node, items }) = self.stack.pop() {
                    self.nodes[node.index()] = DocumentNode::Sequence(items);
                    self.attach(node);
                }
            }
            Event::MappingStart(anchor, ..) => {
                let node = self.alloc(DocumentNode::Mapping(Vec::new()));
                self.register_anchor(anchor, node);
                self.stack.push(Frame::Mapping {
                    node,
                    entries: Vec::new(),
                    key: None,
                });
            }
            Event::MappingEnd => {
                if let Some(Frame::Mapping { node, entries, .. }) = self.stack.pop() {
                    let entries = self.finish_mapping(entries);
                    self.nodes[node.index()] = DocumentNode::Mapping(entries);
                    self.attach(node);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(doc: &Document, node: NodeRef) -> Vec<String> {
        match doc.get(node) {
            DocumentNode::Mapping(entries) => entries.iter().map(|(k, _)| k.clone()).collect(),
            _ => Vec::new(),
        }
    }

    fn child(doc: &Document, node: NodeRef, key: &str) -> NodeRef {
        match doc.get(node) {
            DocumentNode::Mapping(entries) => {
                entries.iter().find(|(k, _)| k == key).expect("找不到键").1
            }
            _ => panic!("不是映射"),
        }
    }

    fn items(doc: &Document, node: NodeRef) -> Vec<NodeRef> {
        match doc.get(node) {
            DocumentNode::Sequence(items) => items.clone(),
            _ => panic!("不是序列"),
        }
    }

    #[test]
    fn test_parse_nested_document() {
        let doc = Document::parse_str("a: 1\nb: [2, 3]\nc:\n  d: 4\n").unwrap();

        assert_eq!(doc.get(doc.root()).kind(), NodeKind::Mapping);
        assert_eq!(keys(&doc, doc.root()), vec!["a", "b", "c"]);
        assert_eq!(doc.scalar_count(doc.root()), 4);
        assert_eq!(doc.flow_text(doc.root()), "{a: 1, b: [2, 3], c: {d: 4}}");
    }

    #[test]
    fn test_keys_keep_document_order() {
        let doc = Document::parse_str("zeta: 1\nalpha: 2\nmid: 3\n").unwrap();
        assert_eq!(keys(&doc, doc.root()), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_non_string_keys_become_text() {
        let doc = Document::parse_str("5: five\ntrue: yes\n~: nothing\n? [1, 2]\n: pair\n").unwrap();
        assert_eq!(keys(&doc, doc.root()), vec!["5", "true", "null", "[1, 2]"]);
    }

    #[test]
    fn test_scalar_rendering() {
        let doc = Document::parse_str("[text, 42, 1.5, false, null, ~, 'quoted']").unwrap();
        let rendered: Vec<String> = items(&doc, doc.root())
            .into_iter()
            .map(|c| doc.get(c).preview())
            .collect();
        assert_eq!(rendered, vec!["text", "42", "1.5", "false", "null", "null", "quoted"]);
    }

    #[test]
    fn test_scalar_kinds() {
        let doc = Document::parse_str("[1, '1', 2.5, 0x1F, True, ~, .inf, 1.2.3, !!str 7]").unwrap();
        let kinds: Vec<ScalarKind> = items(&doc, doc.root())
            .into_iter()
            .map(|c| match doc.get(c) {
                DocumentNode::Scalar { kind, .. } => *kind,
                _ => panic!("应该是标量"),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                ScalarKind::Integer,
                ScalarKind::String,
                ScalarKind::Float,
                ScalarKind::Integer,
                ScalarKind::Bool,
                ScalarKind::Null,
                ScalarKind::Float,
                ScalarKind::String,
                ScalarKind::String,
            ]
        );
    }

    #[test]
    fn test_custom_tags_are_flattened() {
        let text = "point: !Point {x: 1, y: 2}\nlist: !Bag [a, b]\nname: !Name bob\n";
        let doc = Document::parse_str(text).unwrap();
        let root = doc.root();

        let point = child(&doc, root, "point");
        assert_eq!(doc.get(point).kind(), NodeKind::Mapping);
        assert_eq!(keys(&doc, point), vec!["x", "y"]);
        assert_eq!(doc.get(child(&doc, root, "list")).kind(), NodeKind::Sequence);
        assert_eq!(doc.get(child(&doc, root, "name")).preview(), "bob");
    }

    #[test]
    fn test_aliases_share_anchor_node() {
        let doc = Document::parse_str("base: &b {k: v}\ncopy: *b\n").unwrap();
        assert_eq!(child(&doc, doc.root(), "base"), child(&doc, doc.root(), "copy"));
    }

    #[test]
    fn test_self_referential_anchor_forms_cycle() {
        let doc = Document::parse_str("a: &x [1, *x]\n").unwrap();
        let a = child(&doc, doc.root(), "a");
        let inner = items(&doc, a);

        assert_eq!(inner.len(), 2);
        assert_eq!(doc.get(inner[0]).preview(), "1");
        assert_eq!(inner[1], a, "别名应该指回锚点本身");
        assert_eq!(doc.scalar_count(doc.root()), 1);
        assert_eq!(doc.flow_text(a), "[1, <recursive>]");
    }

    #[test]
    fn test_recursive_mapping_renders_marker() {
        let doc = Document::parse_str("node: &n\n  name: top\n  next: *n\n").unwrap();
        let node = child(&doc, doc.root(), "node");
        assert_eq!(child(&doc, node, "next"), node);

        let yaml = doc.to_yaml(node).unwrap();
        let value: Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(value["name"], Value::String("top".into()));
        assert_eq!(value["next"], Value::String(RECURSIVE_MARKER.into()));
    }

    #[test]
    fn test_merge_keys_are_applied() {
        let doc = Document::parse_str("base: &b {k: 1}\nchild: {<<: *b, own: 2}\n").unwrap();
        let child_node = child(&doc, doc.root(), "child");

        assert_eq!(keys(&doc, child_node), vec!["k", "own"]);
        assert_eq!(doc.get(child(&doc, child_node, "k")).preview(), "1");
    }

    #[test]
    fn test_explicit_keys_override_merged_keys() {
        let text = "a: &a {k: from_a, x: 1}\nb: &b {k: from_b, y: 2}\nc:\n  <<: [*a, *b]\n  x: own\n";
        let doc = Document::parse_str(text).unwrap();
        let c = child(&doc, doc.root(), "c");

        assert_eq!(keys(&doc, c), vec!["k", "y", "x"]);
        assert_eq!(doc.get(child(&doc, c, "k")).preview(), "from_a");
        assert_eq!(doc.get(child(&doc, c, "x")).preview(), "own");
    }

    #[test]
    fn test_quoted_merge_key_is_plain_key() {
        let doc = Document::parse_str("base: &b {k: 1}\nchild: {'<<': *b}\n").unwrap();
        let child_node = child(&doc, doc.root(), "child");
        assert_eq!(keys(&doc, child_node), vec!["<<"]);
    }

    #[test]
    fn test_duplicate_keys_keep_last_value() {
        let doc = Document::parse_str("a: 1\nb: x\na: 2\n").unwrap();
        assert_eq!(keys(&doc, doc.root()), vec!["a", "b"]);
        assert_eq!(doc.get(child(&doc, doc.root(), "a")).preview(), "2");
    }

    #[test]
    fn test_yaml_rendering_quotes_strings() {
        let text = "{a: \"x, y\", b: \"1\", c: 1, d: \"k: v\", e: true, f: ~}";
        let doc = Document::parse_str(text).unwrap();
        let yaml = doc.to_yaml(doc.root()).unwrap();

        let rendered: Value = serde_yaml::from_str(&yaml).unwrap();
        let original: Value = serde_yaml::from_str(text).unwrap();
        assert_eq!(rendered, original, "复制文本应能还原原始值: {}", yaml);
        assert_eq!(rendered["b"], Value::String("1".into()));
        assert_eq!(rendered["c"], Value::Number(1.into()));
    }

    #[test]
    fn test_empty_document_is_null_scalar() {
        let doc = Document::parse_str("").unwrap();
        assert_eq!(
            *doc.get(doc.root()),
            DocumentNode::Scalar {
                text: "null".into(),
                kind: ScalarKind::Null
            }
        );
        assert!(!doc.get(doc.root()).is_branch());
        assert!(Document::parse_str("# only a comment\n").is_ok());
    }

    #[test]
    fn test_malformed_document_fails() {
        assert!(matches!(
            Document::parse_str("a: [1, 2\nb: }"),
            Err(LoadError::Scan(_))
        ));
        assert!(Document::parse_str("a: *missing\n").is_err());
    }

    #[test]
    fn test_multiple_documents_rejected() {
        assert!(matches!(
            Document::parse_str("a: 1\n---\nb: 2\n"),
            Err(LoadError::MultipleDocuments(2))
        ));
    }

    #[test]
    fn test_preview_text() {
        let doc = Document::parse_str("one: [x]\nmany: [x, y, z]\nm1: {a: 1}\nm0: {}\n").unwrap();
        let previews: Vec<String> = keys(&doc, doc.root())
            .iter()
            .map(|k| doc.get(child(&doc, doc.root(), k)).preview())
            .collect();
        assert_eq!(
            previews,
            vec!["(list with 1 item)", "(list with 3 items)", "(map with 1 key)", "(map with 0 keys)"]
        );
    }
}
