/// Module for computing analytical metrics to evaluate control-flow obfuscation transforms.
///
/// Quantifies a procedure by instruction count, control flow complexity and dominator overlap
/// to assess transform potency (analyst effort). The module provides functions to collect
/// metrics from a `Procedure`, compare pre- and post-obfuscation states, and compute
/// dominator/post-dominator pairs for control flow analysis.
///
/// # Usage
/// ```rust,ignore
/// let metrics = metrics::collect_metrics(&procedure).unwrap();
/// println!("{}", serde_json::to_string_pretty(&metrics).unwrap());
/// ```
use petgraph::{
    algo::dominators::simple_fast,
    stable_graph::{NodeIndex, StableDiGraph},
    visit::Reversed,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thicket_core::cfg_ir::{Procedure, TerminatorKind};
use thicket_utils::errors::MetricsError;
use tracing::debug;

/// Represents a set of analytical metrics for evaluating control-flow obfuscation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    /// Number of live instructions.
    pub inst_cnt: usize,
    /// Number of basic blocks in the CFG.
    pub block_cnt: usize,
    /// Number of edges in the CFG.
    pub edge_cnt: usize,
    /// Fraction of nodes whose immediate dominator is also their immediate post-dominator.
    pub dom_overlap: f64,
    /// Composite potency score (heuristic based on nodes, edges, and overlap).
    pub potency: f64,
}

/// Collects metrics from a procedure's CFG.
///
/// # Returns
/// A `Metrics` struct, or an error if the procedure has no body.
pub fn collect_metrics(proc: &Procedure) -> Result<Metrics, MetricsError> {
    if proc.is_declaration() {
        return Err(MetricsError::NoBody);
    }
    let block_cnt = proc.block_count();
    if block_cnt == 0 || proc.cfg.node_count() != block_cnt {
        return Err(MetricsError::EmptyCfg);
    }

    let (doms, post_doms) = dominator_pairs(proc)?;
    let overlap = dom_overlap(&doms, &post_doms);
    let edge_cnt = proc.cfg.edge_count();
    debug!(
        "`{}`: {} blocks, {} edges, overlap {:.2}",
        proc.name, block_cnt, edge_cnt, overlap
    );

    Ok(Metrics {
        inst_cnt: proc.inst_count(),
        block_cnt,
        edge_cnt,
        dom_overlap: overlap,
        potency: score(overlap, block_cnt, edge_cnt),
    })
}

type DominatorMap = HashMap<NodeIndex, NodeIndex>;

/// Computes immediate dominators from the entry and immediate post-dominators from a virtual
/// exit joined to every returning block.
fn dominator_pairs(proc: &Procedure) -> Result<(DominatorMap, DominatorMap), MetricsError> {
    let entry = proc.entry().ok_or(MetricsError::NoBody)?;

    let doms = simple_fast(&proc.cfg, entry);
    let mut dom_map = HashMap::new();
    for &n in &proc.layout {
        if let Some(idom) = doms.immediate_dominator(n) {
            dom_map.insert(n, idom);
        }
    }

    let mut shape: StableDiGraph<(), ()> = proc.cfg.map(|_, _| (), |_, _| ());
    let exit = shape.add_node(());
    for &n in &proc.layout {
        if matches!(proc.terminator_kind(n), Ok(TerminatorKind::Return)) {
            shape.add_edge(n, exit, ());
        }
    }
    let post = simple_fast(Reversed(&shape), exit);
    let mut pdom_map = HashMap::new();
    for &n in &proc.layout {
        if let Some(ipdom) = post.immediate_dominator(n) {
            if ipdom != exit {
                pdom_map.insert(n, ipdom);
            }
        }
    }

    Ok((dom_map, pdom_map))
}

/// Computes the fraction of nodes whose immediate dominator equals their immediate
/// post-dominator.
///
/// A higher overlap suggests a more linear CFG, reducing obfuscation potency.
fn dom_overlap(doms: &DominatorMap, pdoms: &DominatorMap) -> f64 {
    let common = doms
        .iter()
        .filter(|(n, d)| pdoms.get(*n) == Some(*d))
        .count();
    if doms.is_empty() {
        0.0
    } else {
        common as f64 / doms.len() as f64
    }
}

/// Computes a composite potency score for the CFG.
///
/// Emphasizes control flow complexity (nodes, edges) while penalizing high overlap, which
/// indicates simpler CFGs.
fn score(overlap: f64, nodes: usize, edges: usize) -> f64 {
    5.0 * (nodes as f64).log2() + edges as f64 + 30.0 * (1.0 - overlap)
}

/// Compares two sets of metrics to evaluate an obfuscation transform.
///
/// The potency gain is discounted by instruction growth. A positive result indicates the
/// transform increases complexity without excessive size growth.
pub fn compare(before: &Metrics, after: &Metrics) -> f64 {
    after.potency - before.potency - 0.05 * (after.inst_cnt as f64 - before.inst_cnt as f64)
}
