//! Dominators, post-dominators, and control dependence.
//!
//! The immediate post-dominator tree is computed with the Cooper-Harvey-
//! Kennedy iterative intersect algorithm over the reversed CFG, with a
//! virtual exit node post-dominating every actual exit. Control dependence
//! follows the classic frontier walk: for every branching block `u` and
//! successor `v`, every node on the post-dominator-tree path from `v` up to
//! (and excluding) `ipdom(u)` is control-dependent on `u`.

use crate::graph::{Edge, EdgeKind, GraphStore};
use crate::ids;
use crate::progress::Progress;

use super::ir::{BlockData, FlowProgram};

/// Sentinel for "post-dominated only by the virtual exit" (or unreachable).
pub const NONE: i64 = -1;

pub fn extract_cdg(program: &FlowProgram, store: &mut GraphStore, prog: &Progress) {
    prog.log("Extracting CDG (control dependence)...");

    let mut cdg_edges = 0usize;
    let mut dom_edges = 0usize;
    let mut pdom_edges = 0usize;
    let mut funcs = 0usize;

    for func in &program.funcs {
        if func.blocks.len() < 2 {
            continue;
        }
        funcs += 1;

        let n = func.blocks.len();
        let block_ids: Vec<String> = (0..n).map(|i| ids::block_id(&func.node_id, i)).collect();

        let ipdom = post_dominators(&func.blocks);

        // CDG edges from post-dominance frontiers.
        for (u, block) in func.blocks.iter().enumerate() {
            if block.succs.len() < 2 {
                continue;
            }
            for &succ in &block.succs {
                let stop = ipdom[u];
                let mut w = succ as i64;
                while w != NONE && w != stop {
                    store.add_edge(Edge::plain(
                        block_ids[u].clone(),
                        block_ids[w as usize].clone(),
                        EdgeKind::Cdg,
                    ));
                    cdg_edges += 1;
                    w = ipdom[w as usize];
                }
            }
        }

        // Dominator tree over the forward CFG.
        let idom = dominators(&func.blocks);
        for (i, &d) in idom.iter().enumerate() {
            if d >= 0 && (d as usize) != i {
                store.add_edge(Edge::plain(
                    block_ids[d as usize].clone(),
                    block_ids[i].clone(),
                    EdgeKind::Dom,
                ));
                dom_edges += 1;
            }
        }

        // Post-dominator tree (virtual exit omitted).
        for (i, &d) in ipdom.iter().enumerate() {
            if d >= 0 && (d as usize) < n {
                store.add_edge(Edge::plain(
                    block_ids[d as usize].clone(),
                    block_ids[i].clone(),
                    EdgeKind::Pdom,
                ));
                pdom_edges += 1;
            }
        }
    }

    prog.log(format!(
        "Created {cdg_edges} CDG, {dom_edges} dom, {pdom_edges} pdom edges across {funcs} functions"
    ));
}

/// Immediate post-dominators. `result[i] == NONE` means block `i` is
/// post-dominated only by the virtual exit (exit blocks, unreachable
/// blocks) or the function has no exit at all (infinite loop).
pub fn post_dominators(blocks: &[BlockData]) -> Vec<i64> {
    let n = blocks.len();
    let v_exit = n;

    let exits: Vec<usize> = blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| b.succs.is_empty())
        .map(|(i, _)| i)
        .collect();

    if exits.is_empty() {
        return vec![NONE; n];
    }

    let total = n + 1;

    // Reversed CFG: edge (i → j) becomes (j → i); virtual exit → exits.
    let mut rev_adj: Vec<Vec<usize>> = vec![Vec::new(); total];
    for (i, b) in blocks.iter().enumerate() {
        for &succ in &b.succs {
            rev_adj[succ].push(i);
        }
    }
    rev_adj[v_exit].extend(&exits);

    let idom = chk_dominators(&rev_adj, v_exit, total);

    let mut result = vec![NONE; n];
    for i in 0..n {
        let d = idom[i];
        if d >= 0 && (d as usize) < n {
            result[i] = d;
        }
    }
    result
}

/// Immediate dominators over the forward CFG, rooted at block 0.
pub fn dominators(blocks: &[BlockData]) -> Vec<i64> {
    let n = blocks.len();
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, b) in blocks.iter().enumerate() {
        for &succ in &b.succs {
            adj[i].push(succ);
        }
    }
    let mut idom = chk_dominators(&adj, 0, n);
    if !idom.is_empty() {
        idom[0] = NONE;
    }
    idom
}

/// Cooper-Harvey-Kennedy iterative dominator computation on an arbitrary
/// graph rooted at `root`.
fn chk_dominators(adj: &[Vec<usize>], root: usize, total: usize) -> Vec<i64> {
    let rpo = reverse_postorder(adj, root, total);

    let mut rpo_pos = vec![usize::MAX; total];
    for (i, &node) in rpo.iter().enumerate() {
        rpo_pos[node] = i;
    }

    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); total];
    for (from, neighbors) in adj.iter().enumerate() {
        for &to in neighbors {
            preds[to].push(from);
        }
    }

    let mut idom = vec![NONE; total];
    idom[root] = root as i64;

    let mut changed = true;
    while changed {
        changed = false;
        for &b in &rpo {
            if b == root {
                continue;
            }

            let mut new_idom: i64 = NONE;
            for &p in &preds[b] {
                if idom[p] != NONE {
                    new_idom = p as i64;
                    break;
                }
            }
            if new_idom == NONE {
                continue; // unreachable
            }

            for &p in &preds[b] {
                if p as i64 == new_idom || idom[p] == NONE {
                    continue;
                }
                new_idom = intersect(&idom, &rpo_pos, p as i64, new_idom);
            }

            if idom[b] != new_idom {
                idom[b] = new_idom;
                changed = true;
            }
        }
    }

    idom
}

/// Nearest common ancestor of `a` and `b` in the dominator tree, walking by
/// reverse-postorder positions.
fn intersect(idom: &[i64], rpo_pos: &[usize], mut a: i64, mut b: i64) -> i64 {
    while a != b {
        while rpo_pos[a as usize] > rpo_pos[b as usize] {
            a = idom[a as usize];
        }
        while rpo_pos[b as usize] > rpo_pos[a as usize] {
            b = idom[b as usize];
        }
    }
    a
}

fn reverse_postorder(adj: &[Vec<usize>], root: usize, n: usize) -> Vec<usize> {
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);

    fn dfs(node: usize, adj: &[Vec<usize>], visited: &mut [bool], order: &mut Vec<usize>) {
        visited[node] = true;
        for &next in &adj[node] {
            if !visited[next] {
                dfs(next, adj, visited, order);
            }
        }
        order.push(node);
    }
    dfs(root, adj, &mut visited, &mut order);

    order.reverse();
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(succs: &[usize]) -> BlockData {
        BlockData {
            instrs: Vec::new(),
            succs: succs.to_vec(),
            is_if: succs.len() == 2,
        }
    }

    #[test]
    fn diamond_post_dominators() {
        // 0 → {1, 2} → 3 (exit)
        let blocks = vec![block(&[1, 2]), block(&[3]), block(&[3]), block(&[])];
        let ipdom = post_dominators(&blocks);
        assert_eq!(ipdom[0], 3);
        assert_eq!(ipdom[1], 3);
        assert_eq!(ipdom[2], 3);
        assert_eq!(ipdom[3], NONE); // virtual exit

        let idom = dominators(&blocks);
        assert_eq!(idom[1], 0);
        assert_eq!(idom[2], 0);
        assert_eq!(idom[3], 0);
    }

    #[test]
    fn infinite_loop_has_no_post_dominators() {
        // 0 → 1 → 0, no exits.
        let blocks = vec![block(&[1]), block(&[0])];
        assert_eq!(post_dominators(&blocks), vec![NONE, NONE]);
    }

    #[test]
    fn loop_post_dominators() {
        // 0 → 1 (header) → {2 (body), 3 (exit)}; 2 → 1.
        let blocks = vec![block(&[1]), block(&[2, 3]), block(&[1]), block(&[])];
        let ipdom = post_dominators(&blocks);
        assert_eq!(ipdom[0], 1);
        assert_eq!(ipdom[2], 1);
        assert_eq!(ipdom[1], 3);
    }
}
