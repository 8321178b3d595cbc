//! Augmented self-balancing (AVL) interval tree, keyed by `[low, high]`.
//!
//! Grounded on `original_source/src/ibitree.c`/`.h`: each node carries its
//! subtree's maximum high endpoint (`max`) so that lookup can prune whole
//! branches, plus a `height` for AVL rebalancing. The reference
//! implementation stores nodes behind raw pointers with manual rotation and
//! free functions; here the tree lives in a single backing `Vec` ("arena")
//! addressed by index, removing the free-list entirely — nodes are only
//! ever appended for the lifetime of one tree (SPEC_FULL §9).
//!
//! The reference's callback-based `lookup(tree, low, high, fn, user_data)`
//! becomes `lookup` returning an owned `Vec<Hit>` (REDESIGN FLAGS: lazy
//! iteration over a callback).

#[derive(Debug, Clone)]
struct Node<T> {
    low: i64,
    high: i64,
    max: i64,
    height: i32,
    left: Option<usize>,
    right: Option<usize>,
    data: T,
}

/// Overlap-fraction parameters guarding each lookup hit (§4.1).
#[derive(Debug, Clone, Copy)]
pub struct OverlapParams {
    /// Minimum fraction of the *stored* interval that the query must cover.
    pub node_frac: f64,
    /// Minimum fraction of the *query* interval that the stored interval must cover.
    pub interval_frac: f64,
    /// When `true`, a hit needs either fraction to pass (OR); otherwise both (AND).
    pub either: bool,
}

impl Default for OverlapParams {
    /// Matches the reference's defaults: negative/zero thresholds fall back
    /// to an epsilon so that any non-empty overlap counts as a hit.
    fn default() -> Self {
        OverlapParams {
            node_frac: 1e-10,
            interval_frac: 1e-10,
            either: false,
        }
    }
}

/// One lookup hit: the matched node's data plus overlap geometry.
#[derive(Debug, Clone, Copy)]
pub struct Hit<'a, T> {
    pub data: &'a T,
    pub low: i64,
    pub high: i64,
    pub overlap_pos: i64,
    pub overlap_len: i64,
}

fn overlap_len(a_low: i64, a_high: i64, b_low: i64, b_high: i64) -> i64 {
    let lo = a_low.max(b_low);
    let hi = a_high.min(b_high);
    (hi - lo + 1).max(0)
}

fn passes(
    node_low: i64,
    node_high: i64,
    query_low: i64,
    query_high: i64,
    params: OverlapParams,
) -> bool {
    let ov = overlap_len(node_low, node_high, query_low, query_high);
    if ov <= 0 {
        return false;
    }
    let node_span = (node_high - node_low + 1).max(1) as f64;
    let query_span = (query_high - query_low + 1).max(1) as f64;
    let nf = ov as f64 / node_span;
    let qf = ov as f64 / query_span;
    if params.either {
        nf >= params.node_frac || qf >= params.interval_frac
    } else {
        nf >= params.node_frac && qf >= params.interval_frac
    }
}

/// An augmented interval tree over intervals `[low, high]`, arena-backed.
#[derive(Debug, Clone, Default)]
pub struct IntervalTree<T> {
    nodes: Vec<Node<T>>,
    root: Option<usize>,
}

impl<T> IntervalTree<T> {
    pub fn new() -> Self {
        IntervalTree {
            nodes: Vec::new(),
            root: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn height(&self, idx: Option<usize>) -> i32 {
        idx.map(|i| self.nodes[i].height).unwrap_or(0)
    }

    fn max_high(&self, idx: Option<usize>) -> i64 {
        idx.map(|i| self.nodes[i].max).unwrap_or(i64::MIN)
    }

    fn update(&mut self, idx: usize) {
        let (l, r) = (self.nodes[idx].left, self.nodes[idx].right);
        self.nodes[idx].height = 1 + self.height(l).max(self.height(r));
        let own_high = self.nodes[idx].high;
        self.nodes[idx].max = own_high.max(self.max_high(l)).max(self.max_high(r));
    }

    fn balance_factor(&self, idx: usize) -> i32 {
        self.height(self.nodes[idx].left) - self.height(self.nodes[idx].right)
    }

    fn rotate_left(&mut self, idx: usize) -> usize {
        let r = self.nodes[idx].right.expect("rotate_left needs right child");
        let rl = self.nodes[r].left;
        self.nodes[r].left = Some(idx);
        self.nodes[idx].right = rl;
        self.update(idx);
        self.update(r);
        r
    }

    fn rotate_right(&mut self, idx: usize) -> usize {
        let l = self.nodes[idx].left.expect("rotate_right needs left child");
        let lr = self.nodes[l].right;
        self.nodes[l].right = Some(idx);
        self.nodes[idx].left = lr;
        self.update(idx);
        self.update(l);
        l
    }

    fn rebalance(&mut self, idx: usize) -> usize {
        self.update(idx);
        let bf = self.balance_factor(idx);
        if bf > 1 {
            let l = self.nodes[idx].left.unwrap();
            if self.balance_factor(l) < 0 {
                let new_l = self.rotate_left(l);
                self.nodes[idx].left = Some(new_l);
            }
            self.rotate_right(idx)
        } else if bf < -1 {
            let r = self.nodes[idx].right.unwrap();
            if self.balance_factor(r) > 0 {
                let new_r = self.rotate_right(r);
                self.nodes[idx].right = Some(new_r);
            }
            self.rotate_left(idx)
        } else {
            idx
        }
    }

    /// Insert `[low, high]` with associated `data`. Returns the arena index
    /// (stable for the lifetime of the tree — nodes are never moved or freed).
    pub fn insert(&mut self, low: i64, high: i64, data: T) -> usize {
        let new_idx = self.nodes.len();
        self.nodes.push(Node {
            low,
            high,
            max: high,
            height: 1,
            left: None,
            right: None,
            data,
        });
        self.root = Some(self.insert_rec(self.root, new_idx));
        new_idx
    }

    fn insert_rec(&mut self, subtree: Option<usize>, new_idx: usize) -> usize {
        let Some(cur) = subtree else {
            return new_idx;
        };
        if self.nodes[new_idx].low < self.nodes[cur].low {
            let new_left = self.insert_rec(self.nodes[cur].left, new_idx);
            self.nodes[cur].left = Some(new_left);
        } else {
            let new_right = self.insert_rec(self.nodes[cur].right, new_idx);
            self.nodes[cur].right = Some(new_right);
        }
        self.rebalance(cur)
    }

    /// All intervals overlapping `[query_low, query_high]` under the given
    /// overlap-fraction parameters, pruning subtrees whose max high is below
    /// the query's low endpoint.
    pub fn lookup(&self, query_low: i64, query_high: i64, params: OverlapParams) -> Vec<Hit<'_, T>> {
        let mut out = Vec::new();
        self.lookup_rec(self.root, query_low, query_high, params, &mut out);
        out
    }

    fn lookup_rec<'a>(
        &'a self,
        subtree: Option<usize>,
        query_low: i64,
        query_high: i64,
        params: OverlapParams,
        out: &mut Vec<Hit<'a, T>>,
    ) {
        let Some(idx) = subtree else { return };
        let node = &self.nodes[idx];
        if node.max < query_low {
            return;
        }
        self.lookup_rec(node.left, query_low, query_high, params, out);
        if passes(node.low, node.high, query_low, query_high, params) {
            out.push(Hit {
                data: &node.data,
                low: node.low,
                high: node.high,
                overlap_pos: node.low.max(query_low),
                overlap_len: overlap_len(node.low, node.high, query_low, query_high),
            });
        }
        if node.low <= query_high {
            self.lookup_rec(node.right, query_low, query_high, params, out);
        }
    }

    /// Iterate all `(low, high, &data)` triples in ascending `low` order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64, &T)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.inorder(self.root, &mut out);
        out.into_iter()
    }

    fn inorder<'a>(&'a self, subtree: Option<usize>, out: &mut Vec<(i64, i64, &'a T)>) {
        let Some(idx) = subtree else { return };
        self.inorder(self.nodes[idx].left, out);
        out.push((self.nodes[idx].low, self.nodes[idx].high, &self.nodes[idx].data));
        self.inorder(self.nodes[idx].right, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn finds_overlapping_intervals() {
        let mut tree = IntervalTree::new();
        tree.insert(10, 20, "a");
        tree.insert(30, 40, "b");
        tree.insert(15, 25, "c");
        tree.insert(1, 5, "d");

        let hits = tree.lookup(18, 32, OverlapParams::default());
        let mut data: Vec<&str> = hits.iter().map(|h| *h.data).collect();
        data.sort();
        assert_eq!(data, vec!["a", "b", "c"]);
    }

    #[test]
    fn respects_overlap_fraction() {
        let mut tree = IntervalTree::new();
        tree.insert(0, 99, "big");
        // query covers only 10% of the stored interval.
        let params = OverlapParams {
            node_frac: 0.5,
            interval_frac: 1e-10,
            either: false,
        };
        assert!(tree.lookup(0, 9, params).is_empty());
        let params_loose = OverlapParams {
            node_frac: 0.05,
            interval_frac: 1e-10,
            either: false,
        };
        assert_eq!(tree.lookup(0, 9, params_loose).len(), 1);
    }

    #[test]
    fn stays_balanced_after_many_inserts() {
        let mut tree = IntervalTree::new();
        for i in 0..1000i64 {
            tree.insert(i, i + 1, i);
        }
        let root = tree.root.unwrap();
        let h = tree.nodes[root].height;
        // AVL height bound: h <= 1.44 * log2(n+2)
        assert!((h as f64) < 1.45 * (1002f64).log2());
    }

    #[test]
    fn empty_tree_has_no_hits() {
        let tree: IntervalTree<()> = IntervalTree::new();
        assert!(tree.lookup(0, 10, OverlapParams::default()).is_empty());
    }
}
