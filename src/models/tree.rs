//! Second-order regression trees used as boosting rounds
//!
//! Each tree is grown on per-row gradients and hessians of the loss. Split
//! gain and leaf weights follow the usual regularised Newton step:
//! `weight = -G / (H + lambda)`. Numeric features split on a threshold,
//! categorical features split on a set of category codes. Rows with a
//! missing value follow the direction that scored best during training.

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// How a feature column may be split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    /// Ordered values, threshold splits
    Numeric,
    /// Category codes, set splits
    Categorical,
}

/// Routing rule of an internal node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SplitRule {
    /// Left when `value < threshold`
    Threshold(f64),
    /// Left when the category code is in the set (kept sorted)
    Categories(Vec<u32>),
}

impl SplitRule {
    fn goes_left(&self, value: f64) -> bool {
        match self {
            SplitRule::Threshold(t) => value < *t,
            SplitRule::Categories(codes) => codes.binary_search(&(value as u32)).is_ok(),
        }
    }
}

/// Tree node, children addressed by index into the node list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        weight: f64,
    },
    Split {
        feature: usize,
        rule: SplitRule,
        default_left: bool,
        left: usize,
        right: usize,
        gain: f64,
    },
}

/// Growth limits and regularisation for a single tree
#[derive(Debug, Clone)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_child_weight: f64,
    pub reg_lambda: f64,
    pub gamma: f64,
    /// Shrinkage folded into every leaf weight
    pub learning_rate: f64,
}

#[derive(Debug, Clone)]
struct SplitCandidate {
    feature: usize,
    rule: SplitRule,
    default_left: bool,
    gain: f64,
}

/// Regression tree over gradient statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct GrowContext<'a> {
    x: &'a Array2<f64>,
    kinds: &'a [FeatureKind],
    grad: &'a [f64],
    hess: &'a [f64],
    params: &'a TreeParams,
}

impl RegressionTree {
    /// Grow a tree on the given rows of `x`
    pub fn fit(
        x: &Array2<f64>,
        kinds: &[FeatureKind],
        grad: &[f64],
        hess: &[f64],
        rows: &[usize],
        params: &TreeParams,
    ) -> Self {
        let ctx = GrowContext {
            x,
            kinds,
            grad,
            hess,
            params,
        };
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(&ctx, rows.to_vec(), 0);
        tree
    }

    fn grow(&mut self, ctx: &GrowContext, rows: Vec<usize>, depth: usize) -> usize {
        let (g, h) = gradient_sums(ctx, &rows);
        let weight = -g / (h + ctx.params.reg_lambda) * ctx.params.learning_rate;

        let candidate = if depth < ctx.params.max_depth && rows.len() >= 2 {
            best_split(ctx, &rows, g, h)
        } else {
            None
        };

        let Some(split) = candidate else {
            return self.push(Node::Leaf { weight });
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows.into_iter().partition(|&r| {
            let value = ctx.x[[r, split.feature]];
            if value.is_nan() {
                split.default_left
            } else {
                split.rule.goes_left(value)
            }
        });

        if left_rows.is_empty() || right_rows.is_empty() {
            return self.push(Node::Leaf { weight });
        }

        // Reserve the slot so children come after their parent
        let idx = self.push(Node::Leaf { weight });
        let left = self.grow(ctx, left_rows, depth + 1);
        let right = self.grow(ctx, right_rows, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            rule: split.rule,
            default_left: split.default_left,
            left,
            right,
            gain: split.gain,
        };
        idx
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Leaf weight reached by one encoded row
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { weight } => return *weight,
                Node::Split {
                    feature,
                    rule,
                    default_left,
                    left,
                    right,
                    ..
                } => {
                    let value = row[*feature];
                    let go_left = if value.is_nan() {
                        *default_left
                    } else {
                        rule.goes_left(value)
                    };
                    idx = if go_left { *left } else { *right };
                }
            }
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Add this tree's split gains into a per-feature accumulator
    pub fn accumulate_gain(&self, totals: &mut [f64]) {
        for node in &self.nodes {
            if let Node::Split { feature, gain, .. } = node {
                totals[*feature] += gain;
            }
        }
    }
}

fn gradient_sums(ctx: &GrowContext, rows: &[usize]) -> (f64, f64) {
    rows.iter()
        .fold((0.0, 0.0), |(g, h), &r| (g + ctx.grad[r], h + ctx.hess[r]))
}

fn leaf_score(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda)
}

fn best_split(ctx: &GrowContext, rows: &[usize], g: f64, h: f64) -> Option<SplitCandidate> {
    let mut best: Option<SplitCandidate> = None;

    for (feature, kind) in ctx.kinds.iter().enumerate() {
        let candidate = match kind {
            FeatureKind::Numeric => numeric_split(ctx, rows, feature, g, h),
            FeatureKind::Categorical => categorical_split(ctx, rows, feature, g, h),
        };
        if let Some(c) = candidate {
            if best.as_ref().map_or(true, |b| c.gain > b.gain) {
                best = Some(c);
            }
        }
    }

    best
}

/// Scan prefix boundaries of ordered buckets `(g, h)`; returns
/// `(boundary, default_left, gain)` of the best boundary.
///
/// Boundary `i` puts buckets `0..=i` on the left.
fn scan_buckets(
    ctx: &GrowContext,
    buckets: &[(f64, f64)],
    missing: (f64, f64),
    total: (f64, f64),
) -> Option<(usize, bool, f64)> {
    let params = ctx.params;
    let parent = leaf_score(total.0, total.1, params.reg_lambda);

    let mut best: Option<(usize, bool, f64)> = None;
    let (mut gl, mut hl) = (0.0, 0.0);

    for (i, &(bg, bh)) in buckets.iter().enumerate().take(buckets.len().saturating_sub(1)) {
        gl += bg;
        hl += bh;

        for default_left in [true, false] {
            let (gl_d, hl_d) = if default_left {
                (gl + missing.0, hl + missing.1)
            } else {
                (gl, hl)
            };
            let (gr_d, hr_d) = (total.0 - gl_d, total.1 - hl_d);

            if hl_d < params.min_child_weight || hr_d < params.min_child_weight {
                continue;
            }

            let gain = 0.5
                * (leaf_score(gl_d, hl_d, params.reg_lambda)
                    + leaf_score(gr_d, hr_d, params.reg_lambda)
                    - parent)
                - params.gamma;

            if gain > 1e-12 && best.map_or(true, |(_, _, b)| gain > b) {
                best = Some((i, default_left, gain));
            }
        }
    }

    best
}

fn numeric_split(
    ctx: &GrowContext,
    rows: &[usize],
    feature: usize,
    g: f64,
    h: f64,
) -> Option<SplitCandidate> {
    let mut present: Vec<(f64, f64, f64)> = rows
        .iter()
        .filter_map(|&r| {
            let v = ctx.x[[r, feature]];
            (!v.is_nan()).then(|| (v, ctx.grad[r], ctx.hess[r]))
        })
        .collect();
    present.sort_by(|a, b| a.0.total_cmp(&b.0));

    // One bucket per distinct value
    let mut values: Vec<f64> = Vec::new();
    let mut buckets: Vec<(f64, f64)> = Vec::new();
    for (v, pg, ph) in present {
        match values.last() {
            Some(&last) if last == v => {
                let b = buckets.last_mut()?;
                b.0 += pg;
                b.1 += ph;
            }
            _ => {
                values.push(v);
                buckets.push((pg, ph));
            }
        }
    }
    if buckets.len() < 2 {
        return None;
    }

    let (present_g, present_h) = buckets
        .iter()
        .fold((0.0, 0.0), |(a, b), &(x, y)| (a + x, b + y));
    let missing = (g - present_g, h - present_h);

    let (i, default_left, gain) = scan_buckets(ctx, &buckets, missing, (g, h))?;
    let (lo, hi) = (values[i], values[i + 1]);
    let mid = lo + (hi - lo) / 2.0;
    let threshold = if mid > lo { mid } else { hi };

    Some(SplitCandidate {
        feature,
        rule: SplitRule::Threshold(threshold),
        default_left,
        gain,
    })
}

fn categorical_split(
    ctx: &GrowContext,
    rows: &[usize],
    feature: usize,
    g: f64,
    h: f64,
) -> Option<SplitCandidate> {
    let mut per_code: BTreeMap<u32, (f64, f64)> = BTreeMap::new();
    for &r in rows {
        let v = ctx.x[[r, feature]];
        if v.is_nan() {
            continue;
        }
        let entry = per_code.entry(v as u32).or_insert((0.0, 0.0));
        entry.0 += ctx.grad[r];
        entry.1 += ctx.hess[r];
    }
    if per_code.len() < 2 {
        return None;
    }

    // Order categories by their optimal leaf weight so a prefix split is optimal
    let lambda = ctx.params.reg_lambda;
    let mut ordered: Vec<(u32, (f64, f64))> = per_code.into_iter().collect();
    ordered.sort_by(|a, b| {
        let wa = a.1 .0 / (a.1 .1 + lambda);
        let wb = b.1 .0 / (b.1 .1 + lambda);
        wa.partial_cmp(&wb)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    let buckets: Vec<(f64, f64)> = ordered.iter().map(|(_, s)| *s).collect();
    let (present_g, present_h) = buckets
        .iter()
        .fold((0.0, 0.0), |(a, b), &(x, y)| (a + x, b + y));
    let missing = (g - present_g, h - present_h);

    let (i, default_left, gain) = scan_buckets(ctx, &buckets, missing, (g, h))?;
    let mut left_codes: Vec<u32> = ordered[..=i].iter().map(|(c, _)| *c).collect();
    left_codes.sort_unstable();

    Some(SplitCandidate {
        feature,
        rule: SplitRule::Categories(left_codes),
        default_left,
        gain,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn params() -> TreeParams {
        TreeParams {
            max_depth: 3,
            min_child_weight: 0.0,
            reg_lambda: 1.0,
            gamma: 0.0,
            learning_rate: 1.0,
        }
    }

    #[test]
    fn test_numeric_split_separates_gradients() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let grad = [-1.0, -1.0, 1.0, 1.0];
        let hess = [1.0; 4];
        let tree = RegressionTree::fit(&x, &[FeatureKind::Numeric], &grad, &hess, &[0, 1, 2, 3], &params());

        match &tree.nodes()[0] {
            Node::Split { rule, .. } => assert_eq!(rule, &SplitRule::Threshold(2.5)),
            other => panic!("expected split, got {:?}", other),
        }
        // -G/(H+lambda) = 2/3 on the left
        assert!((tree.predict_row(x.row(0)) - 2.0 / 3.0).abs() < 1e-12);
        assert!((tree.predict_row(x.row(3)) + 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_categorical_split_groups_codes() {
        // Codes 0 and 2 share negative gradients, code 1 positive
        let x = array![[0.0], [2.0], [1.0], [0.0], [2.0], [1.0]];
        let grad = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0];
        let hess = [1.0; 6];
        let tree = RegressionTree::fit(
            &x,
            &[FeatureKind::Categorical],
            &grad,
            &hess,
            &[0, 1, 2, 3, 4, 5],
            &params(),
        );

        match &tree.nodes()[0] {
            Node::Split { rule, .. } => assert_eq!(rule, &SplitRule::Categories(vec![0, 2])),
            other => panic!("expected split, got {:?}", other),
        }
        assert!(tree.predict_row(x.row(0)) > 0.0);
        assert!(tree.predict_row(x.row(2)) < 0.0);
    }

    #[test]
    fn test_missing_values_follow_learned_direction() {
        let x = array![[1.0], [2.0], [f64::NAN], [5.0], [6.0], [f64::NAN]];
        let grad = [1.0, 1.0, 1.0, -1.0, -1.0, 1.0];
        let hess = [1.0; 6];
        let tree = RegressionTree::fit(
            &x,
            &[FeatureKind::Numeric],
            &grad,
            &hess,
            &[0, 1, 2, 3, 4, 5],
            &params(),
        );

        // Missing rows look like the low values, so they go left with them
        let missing = array![f64::NAN];
        assert_eq!(tree.predict_row(missing.view()), tree.predict_row(x.row(0)));
    }

    #[test]
    fn test_depth_zero_is_single_leaf() {
        let x = array![[1.0], [2.0]];
        let mut p = params();
        p.max_depth = 0;
        let tree = RegressionTree::fit(&x, &[FeatureKind::Numeric], &[1.0, -1.0], &[1.0, 1.0], &[0, 1], &p);
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict_row(x.row(0)), 0.0);
    }
}
