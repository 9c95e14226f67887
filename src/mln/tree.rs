use integeriser::{HashIntegeriser, Integeriser};
use nom::{
    alt, call, char, complete, do_parse, is_not, map_res, named, opt,
    separated_nonempty_list,
};
use std::fmt;
use std::str::{from_utf8, FromStr};

/// Intermediate representation of a newick expression: a leaf label or a
/// parenthesised list of subtrees with an optional label.
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum Newick {
    Clade(Vec<Newick>, Option<String>),
    Leaf(String),
}

/// A rooted binary reference tree with a distinct name on every node.
///
/// Node names are interned once at construction; all queries and algorithms
/// work on the resulting dense `usize` ids and names only reappear when
/// output is written. Ids are assigned parent before child, so the root is
/// always id 0 and every child id is greater than its parent's.
pub struct Tree {
    names: HashIntegeriser<String>,
    parent: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    depth: Vec<usize>,
    tip_count: Vec<usize>,
}

impl Tree {
    /// Number of nodes (tips and interior nodes).
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn root(&self) -> usize {
        0
    }

    /// The name attached to a node id.
    pub fn name(&self, node: usize) -> &str {
        self.names.find_value(node).unwrap()
    }

    /// The node id carrying the given name, if any.
    pub fn node(&self, name: &str) -> Option<usize> {
        self.names.find_key(&name.to_string())
    }

    pub fn children(&self, node: usize) -> &[usize] {
        &self.children[node]
    }

    pub fn parent(&self, node: usize) -> Option<usize> {
        self.parent[node]
    }

    pub fn is_tip(&self, node: usize) -> bool {
        self.children[node].is_empty()
    }

    /// Number of tips dominated by a node (1 for a tip itself).
    pub fn tip_count(&self, node: usize) -> usize {
        self.tip_count[node]
    }

    /// The tips dominated by a node, in left-to-right tree order.
    pub fn tips(&self, node: usize) -> Vec<usize> {
        let mut stack = vec![node];
        let mut tips = Vec::new();
        while let Some(v) = stack.pop() {
            if self.is_tip(v) {
                tips.push(v);
            } else {
                for &c in self.children[v].iter().rev() {
                    stack.push(c);
                }
            }
        }
        tips
    }

    /// All interior nodes of the tree, root included, in id order.
    pub fn nontips(&self) -> Vec<usize> {
        (0..self.len()).filter(|&v| !self.is_tip(v)).collect()
    }

    /// The interior nodes of the subtree rooted at `node`, `node` included
    /// if it is interior itself; empty for a tip.
    pub fn internals(&self, node: usize) -> Vec<usize> {
        let mut stack = vec![node];
        let mut internals = Vec::new();
        while let Some(v) = stack.pop() {
            if !self.is_tip(v) {
                internals.push(v);
                for &c in self.children[v].iter().rev() {
                    stack.push(c);
                }
            }
        }
        internals
    }

    /// The lowest node dominating all of the given nodes.
    pub fn lca(&self, nodes: &[usize]) -> Option<usize> {
        let mut iter = nodes.iter();
        let mut acc = *iter.next()?;
        for &v in iter {
            acc = self.lca_pair(acc, v);
        }
        Some(acc)
    }

    fn lca_pair(&self, mut a: usize, mut b: usize) -> usize {
        while self.depth[a] > self.depth[b] {
            a = self.parent[a].unwrap();
        }
        while self.depth[b] > self.depth[a] {
            b = self.parent[b].unwrap();
        }
        while a != b {
            a = self.parent[a].unwrap();
            b = self.parent[b].unwrap();
        }
        a
    }

    /// Newick rendering of the subtree rooted at `node`, without the
    /// trailing semicolon.
    pub fn newick(&self, node: usize) -> String {
        if self.is_tip(node) {
            return self.name(node).to_string();
        }
        let inner = self.children[node]
            .iter()
            .map(|&c| self.newick(c))
            .collect::<Vec<String>>()
            .join(",");
        format!("({}){}", inner, self.name(node))
    }

    fn from_newick(newick: &Newick) -> Result<Tree, String> {
        let mut tree = Tree {
            names: HashIntegeriser::new(),
            parent: Vec::new(),
            children: Vec::new(),
            depth: Vec::new(),
            tip_count: Vec::new(),
        };
        let mut unnamed = 0;
        tree.insert(newick, None, &mut unnamed)?;
        tree.index();
        Ok(tree)
    }

    fn insert(
        &mut self,
        newick: &Newick,
        parent: Option<usize>,
        unnamed: &mut usize,
    ) -> Result<usize, String> {
        let name = match newick {
            Newick::Leaf(label) => label.clone(),
            Newick::Clade(_, Some(label)) => label.clone(),
            // unnamed interior nodes follow the naming scheme of the
            // reference trees this tool consumes
            Newick::Clade(_, None) => {
                if parent.is_none() {
                    String::from("root")
                } else {
                    let name = format!("edge.{}", unnamed);
                    *unnamed += 1;
                    name
                }
            }
        };
        if self.names.find_key(&name).is_some() {
            return Err(format!("duplicate node name in tree: {}", name));
        }
        let id = self.names.integerise(name);
        self.parent.push(parent);
        self.children.push(Vec::new());
        if let Some(p) = parent {
            self.children[p].push(id);
        }
        if let Newick::Clade(subtrees, _) = newick {
            if subtrees.len() != 2 {
                return Err(format!(
                    "node {} has {} children, only binary trees are \
                     supported",
                    self.name(id),
                    subtrees.len()
                ));
            }
            for subtree in subtrees {
                self.insert(subtree, Some(id), unnamed)?;
            }
        }
        Ok(id)
    }

    fn index(&mut self) {
        let n = self.parent.len();
        self.depth = vec![0; n];
        self.tip_count = vec![0; n];
        for v in 0..n {
            if let Some(p) = self.parent[v] {
                self.depth[v] = self.depth[p] + 1;
            }
        }
        // children carry larger ids than their parents, so a reverse pass
        // sees every subtree before its root
        for v in (0..n).rev() {
            if self.children[v].is_empty() {
                self.tip_count[v] = 1;
            }
            if let Some(p) = self.parent[v] {
                self.tip_count[p] += self.tip_count[v];
            }
        }
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{};", self.newick(self.root()))
    }
}

impl FromStr for Tree {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // newick labels never contain whitespace, so it can be stripped
        // wholesale before parsing
        let compact: String =
            s.chars().filter(|c| !c.is_whitespace()).collect();
        let input = compact.as_bytes();

        named!(label<&str>, map_res!(is_not!("(),:;"), from_utf8));

        // branch lengths are accepted and discarded
        named!(
            length<()>,
            do_parse!(char!(':') >> is_not!("(),;") >> (()))
        );

        named!(
            leaf<Newick>,
            do_parse!(l: label >> (Newick::Leaf(l.to_string())))
        );

        named!(
            clade<Newick>,
            do_parse!(
                char!('(')
                    >> subtrees:
                        separated_nonempty_list!(char!(','), subtree)
                    >> char!(')')
                    >> l: opt!(complete!(label))
                    >> (Newick::Clade(subtrees, l.map(|s| s.to_string())))
            )
        );

        named!(
            subtree<Newick>,
            do_parse!(
                n: alt!(clade | leaf)
                    >> opt!(complete!(length))
                    >> (n)
            )
        );

        named!(
            newick<Newick>,
            do_parse!(t: subtree >> opt!(complete!(char!(';'))) >> (t))
        );

        match newick(input) {
            Ok((rest, parsed)) if rest.is_empty() => {
                Tree::from_newick(&parsed)
            }
            Ok((rest, _)) => Err(format!(
                "trailing characters after newick tree: {}",
                from_utf8(rest).unwrap_or("<non-utf8>")
            )),
            Err(e) => Err(format!("could not parse newick tree: {:?}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_and_autonames() {
        let tree: Tree = "((a,b),c);".parse().unwrap();
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.name(tree.root()), "root");
        assert!(tree.node("edge.0").is_some());
        assert!(tree.node("a").is_some());
        assert!(tree.node("d").is_none());
    }

    #[test]
    fn test_parse_explicit_names_and_lengths() {
        let tree: Tree =
            "((a:0.1,b:0.2)left:0.3,(c,d)right)top;".parse().unwrap();
        assert_eq!(tree.name(tree.root()), "top");
        let left = tree.node("left").unwrap();
        assert_eq!(
            tree.tips(left)
                .iter()
                .map(|&v| tree.name(v))
                .collect::<Vec<&str>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_tip_counts_and_order() {
        let tree: Tree = "((a,b),(c,(d,e)));".parse().unwrap();
        assert_eq!(tree.tip_count(tree.root()), 5);
        assert_eq!(
            tree.tips(tree.root())
                .iter()
                .map(|&v| tree.name(v))
                .collect::<Vec<&str>>(),
            vec!["a", "b", "c", "d", "e"]
        );
        let inner = tree.node("edge.1").unwrap();
        assert_eq!(tree.tip_count(inner), 3);
    }

    #[test]
    fn test_lca() {
        let tree: Tree = "((a,b)x,(c,(d,e)y)z)r;".parse().unwrap();
        let a = tree.node("a").unwrap();
        let b = tree.node("b").unwrap();
        let d = tree.node("d").unwrap();
        let e = tree.node("e").unwrap();
        assert_eq!(tree.lca(&[a, b]), tree.node("x"));
        assert_eq!(tree.lca(&[d, e]), tree.node("y"));
        assert_eq!(tree.lca(&[a, d]), tree.node("r"));
        assert_eq!(tree.lca(&[d]), Some(d));
        assert_eq!(tree.lca(&[]), None);
    }

    #[test]
    fn test_internals_include_the_subtree_root() {
        let tree: Tree = "((a,b)x,(c,d)y)r;".parse().unwrap();
        let y = tree.node("y").unwrap();
        assert_eq!(tree.internals(y), vec![y]);
        let a = tree.node("a").unwrap();
        assert!(tree.internals(a).is_empty());
        assert_eq!(tree.internals(tree.root()).len(), 3);
    }

    #[test]
    fn test_reject_polytomies() {
        assert!("(a,b,c);".parse::<Tree>().is_err());
    }

    #[test]
    fn test_reject_duplicate_names() {
        assert!("((a,b)x,(c,a)y)r;".parse::<Tree>().is_err());
    }

    #[test]
    fn test_newick_roundtrip() {
        let tree: Tree = "((a,b)x,(c,d)y)r;".parse().unwrap();
        assert_eq!(tree.to_string(), "((a,b)x,(c,d)y)r;");
        let y = tree.node("y").unwrap();
        assert_eq!(tree.newick(y), "(c,d)y");
    }
}
