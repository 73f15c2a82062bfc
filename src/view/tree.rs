use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::{ResourceNode, SortConfig, SortDirection, SortField};
use crate::tree::{ResourceTree, APPLICATION_KIND};

use super::frame::{Line, Span, Tone};

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const PIPE: &str = "│   ";
const GAP: &str = "    ";
const COLLAPSED: &str = "▸ ";

/// Identity of a rendered node: the synthetic root of `app` when `id` is `None`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub app: String,
    pub id: Option<String>,
}

impl NodeKey {
    pub fn root(app: &str) -> Self {
        Self { app: app.to_string(), id: None }
    }

    pub fn node(app: &str, id: &str) -> Self {
        Self {
            app: app.to_string(),
            id: Some(id.to_string()),
        }
    }
}

/// One rendered row of the tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeLine {
    /// `None` for the blank separator between roots.
    pub key: Option<NodeKey>,
    pub depth: usize,
    pub child_count: usize,
    pub expanded: bool,
    pub line: Line,
}

impl TreeLine {
    pub fn text(&self) -> String {
        self.line.text()
    }

    fn separator() -> Self {
        Self {
            key: None,
            depth: 0,
            child_count: 0,
            expanded: false,
            line: Line::blank(),
        }
    }
}

/// Parenthesized status suffix: the non-empty values of (health, sync), one
/// value when they are equal ignoring case, empty when both are empty.
pub fn status_suffix(health: &str, sync: &str) -> String {
    match (health.is_empty(), sync.is_empty()) {
        (true, true) => String::new(),
        (false, true) => format!("({})", health),
        (true, false) => format!("({})", sync),
        (false, false) if health.eq_ignore_ascii_case(sync) => format!("({})", health),
        (false, false) => format!("({}, {})", health, sync),
    }
}

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

fn by_name(a: &ResourceNode, b: &ResourceNode) -> Ordering {
    cmp_ignore_case(&a.name, &b.name)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.kind.cmp(&b.kind))
        .then_with(|| a.namespace.cmp(&b.namespace))
        .then_with(|| a.id.cmp(&b.id))
}

fn by_health(a: &ResourceNode, b: &ResourceNode) -> Ordering {
    let rank = |n: &ResourceNode| n.health.unwrap_or_default().rank();
    rank(a).cmp(&rank(b))
}

fn by_sync(a: &ResourceNode, b: &ResourceNode) -> Ordering {
    let rank = |n: &ResourceNode| n.sync.unwrap_or_default().rank();
    rank(a).cmp(&rank(b))
}

type Comparator = fn(&ResourceNode, &ResourceNode) -> Ordering;

fn comparator(field: SortField) -> Comparator {
    match field {
        SortField::Name => by_name,
        SortField::Health => by_health,
        SortField::Sync => by_sync,
    }
}

/// Order two siblings. Direction flips the primary key only; ties fall back
/// to ascending name so the order is deterministic.
pub fn compare_nodes(a: &ResourceNode, b: &ResourceNode, sort: SortConfig) -> Ordering {
    let primary = comparator(sort.field)(a, b);
    let primary = match sort.direction {
        SortDirection::Asc => primary,
        SortDirection::Desc => primary.reverse(),
    };
    primary.then_with(|| by_name(a, b))
}

/// Renders resource trees into lines and owns the per-node view state
/// (expand/collapse, sort, cursor, search).
#[derive(Clone, Debug, Default)]
pub struct TreeView {
    expanded: HashMap<NodeKey, bool>,
    sort: SortConfig,
    selected: usize,
    filter: String,
}

impl TreeView {
    pub fn new(sort: SortConfig) -> Self {
        Self {
            sort,
            ..Default::default()
        }
    }

    pub fn sort(&self) -> SortConfig {
        self.sort
    }

    /// Change traversal order. Structure and expand state are untouched.
    pub fn set_sort(&mut self, field: SortField, direction: SortDirection) {
        self.sort = SortConfig::new(field, direction);
    }

    /// Nodes are expanded unless explicitly collapsed.
    pub fn is_expanded(&self, key: &NodeKey) -> bool {
        self.expanded.get(key).copied().unwrap_or(true)
    }

    pub fn set_expanded(&mut self, key: NodeKey, expanded: bool) {
        self.expanded.insert(key, expanded);
    }

    pub fn toggle(&mut self, key: NodeKey) {
        let next = !self.is_expanded(&key);
        self.expanded.insert(key, next);
    }

    pub fn expand_all(&mut self) {
        self.expanded.clear();
    }

    /// Collapse every node that has children, roots included.
    pub fn collapse_all(&mut self, trees: &[&ResourceTree]) {
        for tree in trees {
            let app = tree.app_name();
            self.expanded.insert(NodeKey::root(app), false);
            for (idx, node) in tree.nodes().iter().enumerate() {
                if !tree.children(idx).is_empty() {
                    self.expanded.insert(NodeKey::node(app, &node.id), false);
                }
            }
        }
        self.selected = 0;
    }

    /// Pre-order walk of every tree, roots in application-name order with a
    /// blank line between them.
    pub fn render(&self, trees: &[&ResourceTree]) -> Vec<TreeLine> {
        let mut ordered: Vec<&ResourceTree> = trees.to_vec();
        ordered.sort_by(|a, b| a.app_name().cmp(b.app_name()));

        let mut lines = Vec::new();
        for (i, tree) in ordered.iter().enumerate() {
            if i > 0 {
                lines.push(TreeLine::separator());
            }
            self.render_root(tree, &mut lines);
        }
        lines
    }

    fn render_root(&self, tree: &ResourceTree, lines: &mut Vec<TreeLine>) {
        let app = tree.app_name();
        let key = NodeKey::root(app);
        let meta = tree.meta();
        let expanded = self.is_expanded(&key);
        let kids = tree.roots();

        let health = meta.health.map(|h| h.as_str()).unwrap_or("");
        let sync = meta.sync.map(|s| s.as_str()).unwrap_or("");
        let tone = meta.health.map(Tone::for_health).or(meta.sync.map(Tone::for_sync));
        let line = node_line("", APPLICATION_KIND, app, health, sync, None, tone, kids.len(), expanded);

        lines.push(TreeLine {
            key: Some(key),
            depth: 0,
            child_count: kids.len(),
            expanded,
            line,
        });
        if expanded {
            self.render_children(tree, kids, "", 1, lines);
        }
    }

    fn render_children(&self, tree: &ResourceTree, kids: &[usize], indent: &str, depth: usize, lines: &mut Vec<TreeLine>) {
        let app = tree.app_name();
        let mut sorted = kids.to_vec();
        sorted.sort_by(|&a, &b| compare_nodes(tree.node(a), tree.node(b), self.sort));

        let last = sorted.len().saturating_sub(1);
        for (i, &idx) in sorted.iter().enumerate() {
            let node = tree.node(idx);
            let key = NodeKey::node(app, &node.id);
            let children = tree.children(idx);
            let expanded = self.is_expanded(&key);
            let is_last = i == last;

            let prefix = format!("{}{}", indent, if is_last { LAST_BRANCH } else { BRANCH });
            let health = node.health.map(|h| h.as_str()).unwrap_or("");
            let sync = node.sync.map(|s| s.as_str()).unwrap_or("");
            let tone = node.health.map(Tone::for_health).or(node.sync.map(Tone::for_sync));
            let line = node_line(
                &prefix,
                &node.kind,
                &node.qualified_name(),
                health,
                sync,
                node.status_reason(),
                tone,
                children.len(),
                expanded,
            );

            lines.push(TreeLine {
                key: Some(key),
                depth,
                child_count: children.len(),
                expanded,
                line,
            });

            if expanded && !children.is_empty() {
                let child_indent = format!("{}{}", indent, if is_last { GAP } else { PIPE });
                self.render_children(tree, children, &child_indent, depth + 1, lines);
            }
        }
    }

    // --- Cursor ---

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_key<'a>(&self, lines: &'a [TreeLine]) -> Option<&'a NodeKey> {
        lines.get(self.selected).and_then(|l| l.key.as_ref())
    }

    /// Keep the cursor inside `lines` and off separator rows.
    pub fn clamp(&mut self, lines: &[TreeLine]) {
        if lines.is_empty() {
            self.selected = 0;
            return;
        }
        self.selected = self.selected.min(lines.len() - 1);
        if lines[self.selected].key.is_none() {
            self.move_up(lines);
        }
    }

    pub fn move_up(&mut self, lines: &[TreeLine]) {
        let mut idx = self.selected;
        while idx > 0 {
            idx -= 1;
            if lines.get(idx).is_some_and(|l| l.key.is_some()) {
                self.selected = idx;
                return;
            }
        }
    }

    pub fn move_down(&mut self, lines: &[TreeLine]) {
        let mut idx = self.selected;
        while idx + 1 < lines.len() {
            idx += 1;
            if lines[idx].key.is_some() {
                self.selected = idx;
                return;
            }
        }
    }

    /// Expand the selected node if it has hidden children.
    pub fn expand_selected(&mut self, lines: &[TreeLine]) -> bool {
        match lines.get(self.selected) {
            Some(TreeLine { key: Some(key), child_count, expanded: false, .. }) if *child_count > 0 => {
                self.set_expanded(key.clone(), true);
                true
            }
            _ => false,
        }
    }

    /// Collapse the selected node, or move to its parent when it is already
    /// collapsed or a leaf.
    pub fn collapse_or_parent(&mut self, lines: &[TreeLine]) -> bool {
        let Some(line) = lines.get(self.selected) else { return false };
        let Some(ref key) = line.key else { return false };

        if line.expanded && line.child_count > 0 {
            self.set_expanded(key.clone(), false);
            return true;
        }
        if line.depth == 0 {
            return false;
        }
        let mut idx = self.selected;
        while idx > 0 {
            idx -= 1;
            if lines[idx].key.is_some() && lines[idx].depth + 1 == line.depth {
                self.selected = idx;
                return true;
            }
        }
        false
    }

    // --- Search ---

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn set_filter(&mut self, query: &str) {
        self.filter = query.trim().to_string();
    }

    /// Indices of lines whose text contains the filter, ignoring case.
    pub fn matches(&self, lines: &[TreeLine]) -> Vec<usize> {
        if self.filter.is_empty() {
            return Vec::new();
        }
        let needle = self.filter.to_lowercase();
        lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.key.is_some() && l.text().to_lowercase().contains(&needle))
            .map(|(i, _)| i)
            .collect()
    }

    /// Move to the first match after the cursor, wrapping around.
    pub fn next_match(&mut self, lines: &[TreeLine]) -> bool {
        let hits = self.matches(lines);
        match hits.iter().copied().find(|&i| i > self.selected).or(hits.first().copied()) {
            Some(i) => {
                self.selected = i;
                true
            }
            None => false,
        }
    }

    /// Move to the last match before the cursor, wrapping around.
    pub fn prev_match(&mut self, lines: &[TreeLine]) -> bool {
        let hits = self.matches(lines);
        match hits.iter().copied().rev().find(|&i| i < self.selected).or(hits.last().copied()) {
            Some(i) => {
                self.selected = i;
                true
            }
            None => false,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn node_line(
    prefix: &str,
    kind: &str,
    name: &str,
    health: &str,
    sync: &str,
    reason: Option<&str>,
    tone: Option<Tone>,
    child_count: usize,
    expanded: bool,
) -> Line {
    let collapsed = !expanded && child_count > 0;
    let mut line = Line::default();
    if !prefix.is_empty() {
        line.push(Span::new(prefix, Tone::Muted));
    }
    if collapsed {
        line.push(Span::new(COLLAPSED, Tone::Accent));
    }
    line.push(Span::new(kind, Tone::Title));
    line.push(Span::plain(format!(" [{}]", name)));

    let suffix = status_suffix(health, sync);
    if !suffix.is_empty() {
        line.push(Span::new(format!(" {}", suffix), tone.unwrap_or_default()));
    }
    if let Some(reason) = reason {
        line.push(Span::new(format!(" {}", reason), Tone::Muted));
    }
    if collapsed {
        line.push(Span::new(format!(" +{}", child_count), Tone::Muted));
    }
    line
}
