//! 懒加载视图树：节点展开时才生成子节点
//!
//! 每个尚未展开的分支节点下挂一个占位子节点，使其在 UI 中显示为可展开；
//! 第一次展开时移除占位节点并生成真实子节点，之后不再重复生成（一次性展开）。
//! 展开完全由用户操作驱动，树本身从不自动递归，所以自引用文档每次只多展开一层。

use std::fmt;
use std::rc::Rc;

use crate::model::data_core::AppError;
use crate::model::document::{Document, DocumentNode, NodeRef};

/// 视图节点标识：竞技场下标 + 代数
///
/// 每次 `reset` 代数加一，旧文档的标识不会误指向新节点。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId {
    index: u32,
    generation: u32,
}

impl ViewId {
    pub const fn from_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ViewId({}@{})", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    /// 不可见的根节点，承载文档顶层
    Root,
    Branch,
    Leaf,
    Placeholder,
}

/// 展开状态标签，取代“每个节点一个回调”的做法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionState {
    /// 仍挂着占位节点，等待第一次展开
    Unexpanded,
    /// 已生成真实子节点；叶子与占位节点创建时即为此状态
    Expanded,
}

/// `on_expand` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    /// 本次生成了 N 个子节点
    Populated(usize),
    /// 已展开过或是叶子，什么都没做
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct ViewNode {
    /// 键名，或序列中的下标文本
    pub label: String,
    /// 标量文本，或分支的规模预览
    pub value: String,
    /// 文档路径，如 `$.b[0]`
    pub path: String,
    pub kind: ViewKind,
    pub parent: Option<ViewId>,
    pub children: Vec<ViewId>,
    /// 当前是否处于展开手势状态（折叠后保留已生成的子节点）
    pub open: bool,
    pub state: ExpansionState,
    /// 该节点对应的文档节点；占位节点没有
    pub source: Option<NodeRef>,
}

/// 扁平化后的一行，供 UI 列表渲染
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    pub id: ViewId,
    pub label: String,
    pub value: String,
    pub path: String,
    pub depth: u32,
    pub expandable: bool,
    pub open: bool,
}

/// 视图节点竞技场
///
/// 展开时摘下的占位节点留在 `nodes` 里直到下一次 `reset`，每个分支至多一个。
#[derive(Debug)]
pub struct LazyTree {
    nodes: Vec<ViewNode>,
    document: Option<Rc<Document>>,
    generation: u32,
    populate_passes: usize,
    pending: usize,
}

impl Default for LazyTree {
    fn default() -> Self {
        Self {
            nodes: vec![Self::root_node(None)],
            document: None,
            generation: 0,
            populate_passes: 0,
            pending: 0,
        }
    }
}

impl LazyTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn root_node(source: Option<NodeRef>) -> ViewNode {
        ViewNode {
            label: "$".to_string(),
            value: String::new(),
            path: "$".to_string(),
            kind: ViewKind::Root,
            parent: None,
            children: Vec::new(),
            open: true,
            state: ExpansionState::Expanded,
            source,
        }
    }

    pub fn root(&self) -> ViewId {
        ViewId::from_parts(0, self.generation)
    }

    /// 丢弃全部视图节点与展开状态，然后用新文档填充根节点
    pub fn reset(&mut self, document: Rc<Document>) -> usize {
        self.nodes.clear();
        self.generation = self.generation.wrapping_add(1);
        self.populate_passes = 0;
        self.pending = 0;
        let root = document.root();
        self.nodes.push(Self::root_node(Some(root)));
        self.document = Some(document);
        let created = self.populate(root, self.root());
        tracing::debug!("视图树已重置: 第 {} 代，顶层 {} 个节点", self.generation, created);
        created
    }

    pub fn document(&self) -> Option<&Rc<Document>> {
        self.document.as_ref()
    }

    pub fn node(&self, id: ViewId) -> Option<&ViewNode> {
        if id.generation != self.generation {
            return None;
        }
        self.nodes.get(id.index as usize)
    }

    fn node_mut(&mut self, id: ViewId) -> Result<&mut ViewNode, AppError> {
        if id.generation != self.generation {
            return Err(AppError::UnknownNode(id));
        }
        self.nodes
            .get_mut(id.index as usize)
            .ok_or(AppError::UnknownNode(id))
    }

    pub fn children(&self, id: ViewId) -> Result<&[ViewId], AppError> {
        self.node(id)
            .map(|n| n.children.as_slice())
            .ok_or(AppError::UnknownNode(id))
    }

    /// 仍在等待第一次展开的分支数量
    pub fn pending_count(&self) -> usize {
        self.pending
    }

    /// 自上次 `reset` 以来执行过的展开填充次数
    pub fn populate_passes(&self) -> usize {
        self.populate_passes
    }

    fn push(&mut self, node: ViewNode) -> ViewId {
        let id = ViewId::from_parts(self.nodes.len() as u32, self.generation);
        self.nodes.push(node);
        id
    }

    fn child_path(parent: &str, label: &str, in_sequence: bool) -> String {
        if in_sequence {
            format!("{}[{}]", parent, label)
        } else if !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            format!("{}.{}", parent, label)
        } else {
            format!("{}['{}']", parent, label.replace('\'', "\\'"))
        }
    }

    /// 为 `target` 生成一层子节点；不检查展开状态，调用方负责一次性语义
    fn populate(&mut self, content: NodeRef, target: ViewId) -> usize {
        let parent_path = match self.node(target) {
            Some(n) => n.path.clone(),
            None => return 0,
        };
        let Some(document) = self.document.clone() else {
            return 0;
        };
        let entries: Vec<(String, NodeRef, bool)> = match document.get(content) {
            DocumentNode::Mapping(entries) => entries
                .iter()
                .map(|(k, v)| (k.clone(), *v, false))
                .collect(),
            DocumentNode::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(n, v)| (n.to_string(), *v, true))
                .collect(),
            DocumentNode::Scalar { .. } => return 0,
        };

        let mut created = Vec::with_capacity(entries.len());
        for (label, value, in_sequence) in entries {
            let path = Self::child_path(&parent_path, &label, in_sequence);
            let content = document.get(value);
            let id = if content.is_branch() {
                self.pending += 1;
                let id = self.push(ViewNode {
                    label,
                    value: content.preview(),
                    path,
                    kind: ViewKind::Branch,
                    parent: Some(target),
                    children: Vec::new(),
                    open: false,
                    state: ExpansionState::Unexpanded,
                    source: Some(value),
                });
                let marker = self.push(ViewNode {
                    label: "marker".to_string(),
                    value: String::new(),
                    path: String::new(),
                    kind: ViewKind::Placeholder,
                    parent: Some(id),
                    children: Vec::new(),
                    open: false,
                    state: ExpansionState::Expanded,
                    source: None,
                });
                self.nodes[id.index as usize].children.push(marker);
                id
            } else {
                self.push(ViewNode {
                    label,
                    value: content.preview(),
                    path,
                    kind: ViewKind::Leaf,
                    parent: Some(target),
                    children: Vec::new(),
                    open: false,
                    state: ExpansionState::Expanded,
                    source: Some(value),
                })
            };
            created.push(id);
        }

        let count = created.len();
        if let Some(node) = self.nodes.get_mut(target.index as usize) {
            node.children.extend(created);
        }
        count
    }

    /// 处理展开事件：未展开的分支移除占位节点并填充，其余情况不做任何事
    pub fn on_expand(&mut self, id: ViewId) -> Result<Expansion, AppError> {
        let node = self.node_mut(id)?;
        if node.state == ExpansionState::Expanded {
            return Ok(Expansion::Unchanged);
        }
        node.state = ExpansionState::Expanded;
        let source = node.source;

        let placeholders: Vec<ViewId> = std::mem::take(&mut node.children);
        for marker in placeholders {
            if let Some(m) = self.nodes.get_mut(marker.index as usize) {
                m.parent = None;
            }
        }

        self.pending = self.pending.saturating_sub(1);

        let created = match source {
            Some(content) => self.populate(content, id),
            None => 0,
        };
        self.populate_passes += 1;
        tracing::debug!("展开节点 {}: 生成 {} 个子节点", id, created);
        Ok(Expansion::Populated(created))
    }

    /// 设置展开/折叠；展开前先保证已填充。叶子与占位节点始终保持折叠
    pub fn set_open(&mut self, id: ViewId, open: bool) -> Result<bool, AppError> {
        let kind = self.node_mut(id)?.kind;
        if !matches!(kind, ViewKind::Branch | ViewKind::Root) {
            return Ok(false);
        }
        if open {
            self.on_expand(id)?;
        }
        self.node_mut(id)?.open = open;
        Ok(open)
    }

    /// 切换展开状态，返回切换后的状态
    pub fn toggle(&mut self, id: ViewId) -> Result<bool, AppError> {
        let open = self.node(id).ok_or(AppError::UnknownNode(id))?.open;
        self.set_open(id, !open)
    }

    /// 逐层展开所有分支，最多执行 `limit` 次填充；返回本次填充次数
    pub fn expand_all(&mut self, limit: usize) -> usize {
        let mut work: Vec<ViewId> = (0..self.nodes.len())
            .filter(|&i| {
                self.nodes[i].kind == ViewKind::Branch && self.nodes[i].parent.is_some()
            })
            .map(|i| ViewId::from_parts(i as u32, self.generation))
            .collect();
        let mut passes = 0;

        while let Some(id) = work.pop() {
            if passes >= limit {
                tracing::warn!("全部展开在 {} 次填充后停止", limit);
                break;
            }
            match self.on_expand(id) {
                Ok(Expansion::Populated(_)) => passes += 1,
                Ok(Expansion::Unchanged) => {}
                Err(e) => {
                    tracing::warn!("展开失败: {}", e);
                    continue;
                }
            }
            self.nodes[id.index as usize].open = true;
            let children = self.nodes[id.index as usize].children.clone();
            work.extend(
                children
                    .into_iter()
                    .filter(|c| self.nodes[c.index as usize].kind == ViewKind::Branch),
            );
        }
        passes
    }

    /// 按先序扁平化所有可见节点（根的子节点总是可见，其余取决于父节点是否展开）
    pub fn visible_rows(&self) -> Vec<ViewRow> {
        let mut rows = Vec::new();
        let mut stack: Vec<(ViewId, u32)> = self.nodes[0]
            .children
            .iter()
            .rev()
            .map(|&c| (c, 0))
            .collect();

        while let Some((id, depth)) = stack.pop() {
            let node = &self.nodes[id.index as usize];
            if node.kind == ViewKind::Placeholder {
                continue;
            }
            rows.push(ViewRow {
                id,
                label: node.label.clone(),
                value: node.value.clone(),
                path: node.path.clone(),
                depth,
                expandable: node.kind == ViewKind::Branch,
                open: node.open,
            });
            if node.open {
                for &child in node.children.iter().rev() {
                    stack.push((child, depth + 1));
                }
            }
        }
        rows
    }
}
