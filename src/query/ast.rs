/// Index of a node in a `QueryTree`
pub type NodeId = usize;

/// The implicit top-level group
pub const ROOT: NodeId = 0;

/// Word leaf of a boolean query
#[derive(Debug, Clone, PartialEq)]
pub struct WordLeaf {
    pub parent: NodeId,
    pub word: Vec<u8>,  // Collation key
    pub yesno: i8,      // -1 must not, 0 optional, +1 must
    pub trunc: bool,    // Prefix match
    pub weight: f64,
    pub depth: u32,
}

/// Parenthesized group or quoted phrase
#[derive(Debug, Clone, PartialEq)]
pub struct GroupNode {
    pub parent: Option<NodeId>,  // None only for ROOT
    pub children: Vec<NodeId>,
    pub yesno: i8,
    pub weight: f64,
    pub yes_threshold: u32,  // Number of `+` children
    pub phrase: bool,
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    Word(WordLeaf),
    Group(GroupNode),
}

impl QueryNode {
    pub fn yesno(&self) -> i8 {
        match self {
            QueryNode::Word(w) => w.yesno,
            QueryNode::Group(g) => g.yesno,
        }
    }

    pub fn depth(&self) -> u32 {
        match self {
            QueryNode::Word(w) => w.depth,
            QueryNode::Group(g) => g.depth,
        }
    }
}

/// Boolean query tree kept in an arena; parents are referenced by index
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTree {
    nodes: Vec<QueryNode>,
}

impl Default for QueryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryTree {
    pub fn new() -> Self {
        QueryTree {
            nodes: vec![QueryNode::Group(GroupNode {
                parent: None,
                children: Vec::new(),
                yesno: 0,
                weight: 1.0,
                yes_threshold: 0,
                phrase: false,
                depth: 0,
            })],
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&QueryNode> {
        self.nodes.get(id)
    }

    pub fn group(&self, id: NodeId) -> Option<&GroupNode> {
        match self.nodes.get(id)? {
            QueryNode::Group(g) => Some(g),
            QueryNode::Word(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the query has no words left
    pub fn is_empty(&self) -> bool {
        self.group(ROOT).is_none_or(|g| g.children.is_empty())
    }

    pub fn add_group(&mut self, parent: NodeId, yesno: i8, weight: f64, phrase: bool) -> NodeId {
        let depth = self.attach(parent, yesno);
        self.nodes.push(QueryNode::Group(GroupNode {
            parent: Some(parent),
            children: Vec::new(),
            yesno,
            weight,
            yes_threshold: 0,
            phrase,
            depth,
        }));
        self.nodes.len() - 1
    }

    pub fn add_word(&mut self, parent: NodeId, word: Vec<u8>, yesno: i8, trunc: bool, weight: f64) -> NodeId {
        let depth = self.attach(parent, yesno);
        self.nodes.push(QueryNode::Word(WordLeaf { parent, word, yesno, trunc, weight, depth }));
        self.nodes.len() - 1
    }

    /// Register the node about to be pushed as a child of `parent`; returns its depth
    fn attach(&mut self, parent: NodeId, yesno: i8) -> u32 {
        let id = self.nodes.len();
        match self.nodes.get_mut(parent) {
            Some(QueryNode::Group(g)) => {
                g.children.push(id);
                if yesno > 0 {
                    g.yes_threshold += 1;
                }
                g.depth + 1
            }
            _ => 1,
        }
    }

    /// Remove `id` if it is a childless group that was the last node added
    pub fn drop_if_empty(&mut self, id: NodeId) -> bool {
        let removable = id + 1 == self.nodes.len()
            && matches!(&self.nodes[id], QueryNode::Group(g) if g.children.is_empty() && g.parent.is_some());
        if !removable {
            return false;
        }
        if let Some(QueryNode::Group(g)) = self.nodes.pop() {
            if let Some(QueryNode::Group(parent)) = g.parent.and_then(|p| self.nodes.get_mut(p)) {
                parent.children.retain(|&c| c != id);
                if g.yesno > 0 {
                    parent.yes_threshold -= 1;
                }
            }
        }
        true
    }

    /// Word leaves with their ids, in query order
    pub fn leaves(&self) -> impl Iterator<Item = (NodeId, &WordLeaf)> {
        self.nodes.iter().enumerate().filter_map(|(id, n)| match n {
            QueryNode::Word(w) => Some((id, w)),
            QueryNode::Group(_) => None,
        })
    }

    pub fn max_depth(&self) -> u32 {
        self.nodes.iter().map(QueryNode::depth).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_children_raise_threshold() {
        let mut tree = QueryTree::new();
        tree.add_word(ROOT, b"apple".to_vec(), 1, false, 1.5);
        tree.add_word(ROOT, b"banana".to_vec(), -1, false, -0.33);
        let group = tree.add_group(ROOT, 1, 1.5, false);
        tree.add_word(group, b"pear".to_vec(), 0, false, 1.0);

        let root = tree.group(ROOT).unwrap();
        assert_eq!(root.children, vec![1, 2, 3]);
        assert_eq!(root.yes_threshold, 2);
        assert_eq!(tree.node(4).unwrap().depth(), 2);
        assert_eq!(tree.leaves().count(), 3);
        assert_eq!(tree.max_depth(), 2);
    }

    #[test]
    fn empty_group_is_dropped() {
        let mut tree = QueryTree::new();
        let group = tree.add_group(ROOT, 1, 1.5, false);
        assert!(tree.drop_if_empty(group));
        assert!(tree.is_empty());
        assert_eq!(tree.group(ROOT).unwrap().yes_threshold, 0);
        assert!(!tree.drop_if_empty(ROOT));
    }

    #[test]
    fn non_empty_group_is_kept() {
        let mut tree = QueryTree::new();
        let group = tree.add_group(ROOT, 0, 1.0, true);
        tree.add_word(group, b"word".to_vec(), 1, false, 1.0);
        assert!(!tree.drop_if_empty(group));
        assert!(tree.group(group).unwrap().phrase);
    }
}
