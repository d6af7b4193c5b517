use crate::histogram::ColorSample;

const MAX_DEPTH: usize = 8;

/// One octree node. Color sums live on leaves; reduction folds child sums
/// into the parent and turns it into a leaf.
#[derive(Debug, Clone)]
struct Node {
    children: [Option<usize>; 8],
    r_sum: u64,
    g_sum: u64,
    b_sum: u64,
    count: u64,
    is_leaf: bool,
}

impl Node {
    fn new() -> Self {
        Self {
            children: [None; 8],
            r_sum: 0,
            g_sum: 0,
            b_sum: 0,
            count: 0,
            is_leaf: false,
        }
    }
}

/// Octant index at `depth`: one bit from each channel, MSB first.
fn child_index(r: u8, g: u8, b: u8, depth: usize) -> usize {
    let shift = 7 - depth;
    (((r >> shift) & 1) as usize) << 2 | (((g >> shift) & 1) as usize) << 1 | ((b >> shift) & 1) as usize
}

/// Octree color reduction (Gervautz–Purgathofer).
///
/// Samples are inserted in histogram key order and reduction always folds the
/// most recently created node of the deepest populated level, so the result
/// is reproducible for identical input.
struct Octree {
    nodes: Vec<Node>,
    /// Internal nodes by depth, in creation order. Depth 0 is the root.
    reducible: Vec<Vec<usize>>,
    leaf_count: usize,
}

impl Octree {
    fn new() -> Self {
        let mut nodes = Vec::with_capacity(1024);
        nodes.push(Node::new());
        let mut reducible = vec![Vec::new(); MAX_DEPTH];
        reducible[0].push(0); // root folds last, down to a single color
        Self {
            nodes,
            reducible,
            leaf_count: 0,
        }
    }

    fn insert(&mut self, sample: &ColorSample) {
        let mut node = 0usize;
        for depth in 0..MAX_DEPTH {
            if self.nodes[node].is_leaf {
                break;
            }
            let idx = child_index(sample.r, sample.g, sample.b, depth);
            node = match self.nodes[node].children[idx] {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::new());
                    self.nodes[node].children[idx] = Some(child);
                    if depth + 1 == MAX_DEPTH {
                        self.nodes[child].is_leaf = true;
                        self.leaf_count += 1;
                    } else {
                        // Parent of the new child becomes reducible once it
                        // has any children; registering the child's parent
                        // level here keeps one entry per internal node.
                        self.reducible[depth + 1].push(child);
                    }
                    child
                }
            };
        }

        let n = &mut self.nodes[node];
        n.r_sum += sample.r as u64 * sample.count;
        n.g_sum += sample.g as u64 * sample.count;
        n.b_sum += sample.b as u64 * sample.count;
        n.count += sample.count;
    }

    /// Fold leaves upward until at most `max_colors` remain.
    fn reduce(&mut self, max_colors: usize) {
        while self.leaf_count > max_colors.max(1) {
            // Deepest level that still has internal nodes; its children are
            // guaranteed to be leaves.
            let Some(level) = (0..MAX_DEPTH).rev().find(|&d| !self.reducible[d].is_empty())
            else {
                break;
            };
            let node = self.reducible[level].pop().unwrap_or(0);

            let mut folded = 0usize;
            let children = self.nodes[node].children;
            for child in children.into_iter().flatten() {
                let c = self.nodes[child].clone();
                let n = &mut self.nodes[node];
                n.r_sum += c.r_sum;
                n.g_sum += c.g_sum;
                n.b_sum += c.b_sum;
                n.count += c.count;
                folded += 1;
            }

            let n = &mut self.nodes[node];
            n.children = [None; 8];
            n.is_leaf = true;
            self.leaf_count = self.leaf_count + 1 - folded;
        }
    }

    /// Collect leaf mean colors, depth-first in child index order.
    fn palette(&self) -> Vec<rgb::RGB<u8>> {
        let mut out = Vec::with_capacity(self.leaf_count);
        let mut stack = vec![0usize];
        while let Some(node) = stack.pop() {
            let n = &self.nodes[node];
            if n.is_leaf {
                if n.count > 0 {
                    out.push(rgb::RGB {
                        r: ((n.r_sum + n.count / 2) / n.count) as u8,
                        g: ((n.g_sum + n.count / 2) / n.count) as u8,
                        b: ((n.b_sum + n.count / 2) / n.count) as u8,
                    });
                }
                continue;
            }
            // Push in reverse so traversal visits child 0 first.
            for idx in (0..8).rev() {
                if let Some(child) = n.children[idx] {
                    stack.push(child);
                }
            }
        }
        out
    }
}

/// Reduce histogram samples to at most `max_colors` representative colors
/// using an octree. Deterministic alternative to [`crate::median_cut`].
pub fn octree_reduce(samples: &[ColorSample], max_colors: usize) -> Vec<rgb::RGB<u8>> {
    if samples.is_empty() || max_colors == 0 {
        return Vec::new();
    }

    let mut tree = Octree::new();
    for s in samples {
        tree.insert(s);
        // Keeping the tree near the budget bounds memory on color-rich input.
        if tree.leaf_count > max_colors * 4 {
            tree.reduce(max_colors * 2);
        }
    }
    tree.reduce(max_colors);
    tree.palette()
}
