//! Command tree: an arena-backed trie of command path segments.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::ConfigurationError;
use crate::handler::CommandHandler;
use crate::lazy::{ImportDescriptor, LazyHandler};
use crate::validate::FlagsValidator;

/// Index of a node in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The root node, which always exists.
    pub const ROOT: NodeId = NodeId(0);
}

/// Registration options for a command.
#[derive(Clone, Default)]
pub struct CommandOptions {
    pub description: Option<String>,
    pub examples: Vec<String>,
    pub aliases: Vec<String>,
    /// Hidden commands dispatch normally but are left out of help.
    pub hidden: bool,
    pub validator: Option<Arc<dyn FlagsValidator>>,
}

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn validator(mut self, validator: impl FlagsValidator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }
}

impl fmt::Debug for CommandOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandOptions")
            .field("description", &self.description)
            .field("examples", &self.examples)
            .field("aliases", &self.aliases)
            .field("hidden", &self.hidden)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// What a node does when dispatched to.
#[derive(Clone, Default)]
pub enum NodeKind {
    /// Intermediate segment without an implementation.
    #[default]
    Group,
    Handler {
        handler: Arc<dyn CommandHandler>,
        options: CommandOptions,
    },
    Lazy {
        entry: Arc<LazyHandler>,
        options: CommandOptions,
    },
}

impl NodeKind {
    fn options(&self) -> Option<&CommandOptions> {
        match self {
            NodeKind::Group => None,
            NodeKind::Handler { options, .. } | NodeKind::Lazy { options, .. } => Some(options),
        }
    }

    /// Same implementation, hidden from help.
    fn as_alias(&self) -> NodeKind {
        match self {
            NodeKind::Group => NodeKind::Group,
            NodeKind::Handler { handler, options } => NodeKind::Handler {
                handler: Arc::clone(handler),
                options: CommandOptions {
                    hidden: true,
                    ..options.clone()
                },
            },
            NodeKind::Lazy { entry, options } => NodeKind::Lazy {
                entry: Arc::clone(entry),
                options: CommandOptions {
                    hidden: true,
                    ..options.clone()
                },
            },
        }
    }
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Group => f.write_str("Group"),
            NodeKind::Handler { options, .. } => f
                .debug_struct("Handler")
                .field("options", options)
                .finish_non_exhaustive(),
            NodeKind::Lazy { entry, options } => f
                .debug_struct("Lazy")
                .field("entry", entry)
                .field("options", options)
                .finish(),
        }
    }
}

/// One path segment in the tree.
#[derive(Debug)]
pub struct CommandNode {
    name: String,
    kind: NodeKind,
    children: BTreeMap<String, NodeId>,
}

impl CommandNode {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Group,
            children: BTreeMap::new(),
        }
    }

    /// Segment name; empty for the root.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Whether the node has a handler or a lazy import.
    pub fn is_registered(&self) -> bool {
        !matches!(self.kind, NodeKind::Group)
    }

    pub fn options(&self) -> Option<&CommandOptions> {
        self.kind.options()
    }

    pub fn is_hidden(&self) -> bool {
        self.options().is_some_and(|o| o.hidden)
    }

    /// The handler, if registered directly or already resolved.
    pub fn handler(&self) -> Option<Arc<dyn CommandHandler>> {
        match &self.kind {
            NodeKind::Group => None,
            NodeKind::Handler { handler, .. } => Some(Arc::clone(handler)),
            NodeKind::Lazy { entry, .. } => entry.get(),
        }
    }

    /// The import still to be performed, if any.
    pub fn pending_import(&self) -> Option<&ImportDescriptor> {
        match &self.kind {
            NodeKind::Lazy { entry, .. } if !entry.is_resolved() => Some(entry.descriptor()),
            _ => None,
        }
    }

    pub fn lazy_entry(&self) -> Option<&Arc<LazyHandler>> {
        match &self.kind {
            NodeKind::Lazy { entry, .. } => Some(entry),
            _ => None,
        }
    }

    pub fn child(&self, segment: &str) -> Option<NodeId> {
        self.children.get(segment).copied()
    }

    /// Children in lexicographic order.
    pub fn children(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.children.iter().map(|(name, id)| (name.as_str(), *id))
    }
}

/// Result of walking the tree along a segment sequence.
#[derive(Debug, Clone, Copy)]
pub struct Traversal<'a> {
    pub id: NodeId,
    pub node: &'a CommandNode,
    /// Number of leading segments matched.
    pub consumed: usize,
}

/// A registered command with its full path.
#[derive(Debug, Clone)]
pub struct CommandEntry<'a> {
    pub path: Vec<&'a str>,
    pub node: &'a CommandNode,
}

impl CommandEntry<'_> {
    /// Path segments joined by spaces.
    pub fn display_path(&self) -> String {
        self.path.join(" ")
    }
}

/// Trie of command nodes.
#[derive(Debug)]
pub struct CommandTree {
    nodes: Vec<CommandNode>,
}

impl Default for CommandTree {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![CommandNode::new("")],
        }
    }

    pub fn root(&self) -> &CommandNode {
        &self.nodes[NodeId::ROOT.0]
    }

    pub fn node(&self, id: NodeId) -> &CommandNode {
        &self.nodes[id.0]
    }

    /// Number of registered commands, aliases included.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_registered()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a handler at `path`.
    pub fn register(
        &mut self,
        path: &[&str],
        handler: Arc<dyn CommandHandler>,
        options: CommandOptions,
    ) -> Result<NodeId, ConfigurationError> {
        self.insert(path, NodeKind::Handler { handler, options })
    }

    /// Register a command whose handler is imported on first dispatch.
    pub fn register_lazy(
        &mut self,
        path: &[&str],
        descriptor: ImportDescriptor,
        options: CommandOptions,
    ) -> Result<NodeId, ConfigurationError> {
        let entry = Arc::new(LazyHandler::new(descriptor));
        self.insert(path, NodeKind::Lazy { entry, options })
    }

    fn insert(&mut self, path: &[&str], kind: NodeKind) -> Result<NodeId, ConfigurationError> {
        let Some((leaf, parents)) = path.split_last() else {
            return Err(ConfigurationError::EmptyPath);
        };
        let shown_path = path.join(" ");
        if path.iter().any(|segment| segment.is_empty()) {
            return Err(ConfigurationError::EmptySegment(shown_path));
        }

        let mut aliases: Vec<String> = Vec::new();
        for alias in kind.options().map(|o| o.aliases.as_slice()).unwrap_or_default() {
            if alias.is_empty() {
                return Err(ConfigurationError::EmptySegment(format!("{shown_path} (alias)")));
            }
            if alias.as_str() != *leaf && !aliases.contains(alias) {
                aliases.push(alias.clone());
            }
        }

        // Check everything before touching the arena
        if let Some(parent) = self.lookup(parents) {
            let parent = self.node(parent);
            if parent.child(leaf).is_some_and(|id| self.node(id).is_registered()) {
                return Err(ConfigurationError::Duplicate(shown_path));
            }
            for alias in &aliases {
                if parent.child(alias).is_some_and(|id| self.node(id).is_registered()) {
                    return Err(ConfigurationError::AliasConflict {
                        alias: alias.to_string(),
                        path: shown_path,
                    });
                }
            }
        }

        let mut parent = NodeId::ROOT;
        for segment in parents {
            parent = self.ensure_child(parent, segment);
        }

        let alias_kind = kind.as_alias();
        let id = self.ensure_child(parent, leaf);
        self.nodes[id.0].kind = kind;

        for alias in &aliases {
            let alias_id = self.ensure_child(parent, alias);
            self.nodes[alias_id.0].kind = alias_kind.clone();
        }

        if aliases.is_empty() {
            debug!("Registered command '{}'", shown_path);
        } else {
            debug!("Registered command '{}' (aliases: {})", shown_path, aliases.join(", "));
        }
        Ok(id)
    }

    fn ensure_child(&mut self, parent: NodeId, segment: &str) -> NodeId {
        if let Some(id) = self.nodes[parent.0].child(segment) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(CommandNode::new(segment));
        self.nodes[parent.0].children.insert(segment.to_string(), id);
        id
    }

    fn lookup(&self, path: &[&str]) -> Option<NodeId> {
        path.iter()
            .try_fold(NodeId::ROOT, |id, segment| self.node(id).child(segment))
    }

    /// Exact lookup of a full path.
    pub fn get(&self, path: &[&str]) -> Option<&CommandNode> {
        self.lookup(path).map(|id| self.node(id))
    }

    /// Longest prefix of `segments` that exists in the tree.
    ///
    /// Stops at the first segment with no matching child; never backtracks.
    /// The resulting node may be an unregistered group.
    pub fn traverse<S: AsRef<str>>(&self, segments: &[S]) -> Traversal<'_> {
        let mut id = NodeId::ROOT;
        let mut consumed = 0;
        for segment in segments {
            match self.node(id).child(segment.as_ref()) {
                Some(child) => {
                    id = child;
                    consumed += 1;
                }
                None => break,
            }
        }
        Traversal {
            id,
            node: self.node(id),
            consumed,
        }
    }

    /// Every registered command in pre-order, children sorted, hidden included.
    pub fn commands(&self) -> Vec<CommandEntry<'_>> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        self.collect(NodeId::ROOT, &mut path, &mut out);
        out
    }

    /// Registered commands shown in help.
    pub fn visible_commands(&self) -> Vec<CommandEntry<'_>> {
        self.commands()
            .into_iter()
            .filter(|entry| !entry.node.is_hidden())
            .collect()
    }

    fn collect<'a>(
        &'a self,
        id: NodeId,
        path: &mut Vec<&'a str>,
        out: &mut Vec<CommandEntry<'a>>,
    ) {
        let node = self.node(id);
        if node.is_registered() {
            out.push(CommandEntry {
                path: path.clone(),
                node,
            });
        }
        for (name, child) in &node.children {
            path.push(name.as_str());
            self.collect(*child, path, out);
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use pretty_assertions::assert_eq;

    fn noop() -> Arc<dyn CommandHandler> {
        Arc::new(handler_fn(|_args, _flags, _ctx| async { Ok(()) }))
    }

    fn paths(tree: &CommandTree) -> Vec<String> {
        tree.commands().iter().map(|e| e.display_path()).collect()
    }

    #[test]
    fn test_register_creates_groups() {
        let mut tree = CommandTree::new();
        tree.register(&["cluster", "node", "list"], noop(), CommandOptions::new()).unwrap();

        let group = tree.get(&["cluster", "node"]).unwrap();
        assert!(!group.is_registered());
        assert!(tree.get(&["cluster", "node", "list"]).unwrap().is_registered());
        assert_eq!(tree.len(), 1);
        assert!(!tree.root().is_registered());
    }

    #[test]
    fn test_group_can_be_registered_later() {
        let mut tree = CommandTree::new();
        tree.register(&["user", "add"], noop(), CommandOptions::new()).unwrap();
        tree.register(&["user"], noop(), CommandOptions::new()).unwrap();

        let user = tree.get(&["user"]).unwrap();
        assert!(user.is_registered());
        assert!(user.child("add").is_some());
        assert_eq!(paths(&tree), vec!["user", "user add"]);
    }

    #[test]
    fn test_invalid_paths() {
        let mut tree = CommandTree::new();
        assert_eq!(
            tree.register(&[], noop(), CommandOptions::new()).err(),
            Some(ConfigurationError::EmptyPath)
        );
        assert_eq!(
            tree.register(&["user", ""], noop(), CommandOptions::new()).err(),
            Some(ConfigurationError::EmptySegment("user ".to_string()))
        );
        assert!(tree.is_empty());
        assert!(tree.root().children().next().is_none());
    }

    #[test]
    fn test_duplicate() {
        let mut tree = CommandTree::new();
        tree.register(&["greet"], noop(), CommandOptions::new()).unwrap();
        let err = tree
            .register_lazy(&["greet"], ImportDescriptor::new("greet"), CommandOptions::new())
            .unwrap_err();
        assert_eq!(err, ConfigurationError::Duplicate("greet".to_string()));
    }

    #[test]
    fn test_aliases_share_handler() {
        let mut tree = CommandTree::new();
        tree.register(
            &["user", "remove"],
            noop(),
            CommandOptions::new().alias("rm").alias("rm").alias("remove"),
        )
        .unwrap();

        let primary = tree.get(&["user", "remove"]).unwrap();
        let alias = tree.get(&["user", "rm"]).unwrap();
        assert!(!primary.is_hidden());
        assert!(alias.is_hidden());
        assert!(Arc::ptr_eq(&primary.handler().unwrap(), &alias.handler().unwrap()));
        assert_eq!(paths(&tree), vec!["user remove", "user rm"]);
        assert_eq!(
            tree.visible_commands()
                .iter()
                .map(|e| e.display_path())
                .collect::<Vec<_>>(),
            vec!["user remove"]
        );
    }

    #[test]
    fn test_alias_conflict_leaves_tree_untouched() {
        let mut tree = CommandTree::new();
        tree.register(&["user", "list"], noop(), CommandOptions::new()).unwrap();
        let before = paths(&tree);

        let err = tree
            .register(
                &["user", "remove"],
                noop(),
                CommandOptions::new().alias("rm").alias("list"),
            )
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::AliasConflict {
                alias: "list".to_string(),
                path: "user remove".to_string(),
            }
        );
        assert_eq!(paths(&tree), before);
        assert!(tree.get(&["user", "rm"]).is_none());
    }

    #[test]
    fn test_lazy_alias_shares_entry() {
        let mut tree = CommandTree::new();
        tree.register_lazy(
            &["user", "list"],
            ImportDescriptor::new("users").export("list"),
            CommandOptions::new().alias("ls"),
        )
        .unwrap();

        let primary = tree.get(&["user", "list"]).unwrap();
        let alias = tree.get(&["user", "ls"]).unwrap();
        assert!(Arc::ptr_eq(primary.lazy_entry().unwrap(), alias.lazy_entry().unwrap()));
        assert_eq!(
            primary.pending_import(),
            Some(&ImportDescriptor::new("users").export("list"))
        );
        assert!(primary.handler().is_none());
    }

    #[test]
    fn test_traverse_longest_prefix() {
        let mut tree = CommandTree::new();
        tree.register(&["user", "add"], noop(), CommandOptions::new()).unwrap();

        let t = tree.traverse(&["user", "add", "bob", "extra"]);
        assert_eq!(t.consumed, 2);
        assert!(t.node.is_registered());

        let t = tree.traverse(&["user", "bogus"]);
        assert_eq!(t.consumed, 1);
        assert_eq!(t.node.name(), "user");
        assert!(!t.node.is_registered());

        let t = tree.traverse::<&str>(&[]);
        assert_eq!(t.consumed, 0);
        assert_eq!(t.id, NodeId::ROOT);
    }

    #[test]
    fn test_traverse_consumed_is_bounded() {
        let mut tree = CommandTree::new();
        tree.register(&["a", "b", "c"], noop(), CommandOptions::new()).unwrap();
        for input in [
            vec![],
            vec!["a"],
            vec!["a", "b", "c", "d"],
            vec!["x", "a"],
            vec!["a", "x", "b"],
        ] {
            let t = tree.traverse(&input);
            assert!(t.consumed <= input.len());
            let prefix: Vec<&str> = input[..t.consumed].to_vec();
            assert_eq!(tree.lookup(&prefix), Some(t.id));
        }
    }

    #[test]
    fn test_commands_preorder_lexicographic() {
        let mut tree = CommandTree::new();
        for path in [
            vec!["user", "remove"],
            vec!["config", "show"],
            vec!["user", "add"],
            vec!["greet"],
        ] {
            tree.register(&path, noop(), CommandOptions::new()).unwrap();
        }
        assert_eq!(paths(&tree), vec!["config show", "greet", "user add", "user remove"]);
    }

    #[test]
    fn test_options_debug_hides_validator() {
        let options = CommandOptions::new().description("Say hello").hidden();
        let text = format!("{options:?}");
        assert!(text.contains("Say hello"));
        assert!(text.contains("validator: false"));
    }
}
