//! 连通分量
//!
//! 忽略边方向的可达性遍历。隐藏元素同样参与遍历。

use crate::collections::{ElementAssociation, NodeSet};
use crate::error::Result;
use crate::graph::{Graph, Node};
use std::collections::VecDeque;

/// 从 `start` 出发做 BFS，`visit` 返回 false 的节点视为已访问而跳过
///
/// 返回新访问的节点数
fn traverse<F>(graph: &Graph, start: Node, mut visit: F) -> Result<usize>
where
    F: FnMut(Node) -> Result<bool>,
{
    if !visit(start)? {
        return Ok(0);
    }
    let mut count = 1;
    let mut queue = VecDeque::new();
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        for neighbor in graph.adjacent_nodes(current)? {
            if visit(neighbor)? {
                count += 1;
                queue.push_back(neighbor);
            }
        }
    }

    Ok(count)
}

/// 连通分量个数
pub fn number_connected_components(graph: &Graph) -> Result<usize> {
    Ok(component_sizes(graph)?.len())
}

/// 各连通分量的大小，按分量中首个节点的全局顺序排列
pub fn component_sizes(graph: &Graph) -> Result<Vec<usize>> {
    let mut marked = vec![false; graph.max_node_id()];
    let mut sizes = Vec::new();

    for v in graph.nodes_including_hidden() {
        if marked[v.id()] {
            continue;
        }
        let size = traverse(graph, v, |w| {
            let seen = std::mem::replace(&mut marked[w.id()], true);
            Ok(!seen)
        })?;
        sizes.push(size);
    }

    Ok(sizes)
}

/// 把 `start` 所在分量中尚未在 `visited` 里的节点加入 `visited`，返回加入的个数
pub fn visit_connected_component(
    graph: &Graph,
    start: Node,
    visited: &mut NodeSet,
) -> Result<usize> {
    traverse(graph, start, |w| visited.add(w))
}

/// 为每个节点写入分量编号（从 0 开始），返回分量个数
pub fn connected_components<A>(graph: &Graph, labels: &mut A) -> Result<usize>
where
    A: ElementAssociation<Node, usize>,
{
    let mut visited = NodeSet::new(graph);
    let mut component = 0;

    for v in graph.nodes_including_hidden() {
        if visited.contains(v)? {
            continue;
        }
        traverse(graph, v, |w| {
            if visited.add(w)? {
                labels.set(w, component)?;
                Ok(true)
            } else {
                Ok(false)
            }
        })?;
        component += 1;
    }

    Ok(component)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::{NodeArray, NodeMap};

    fn two_islands() -> (Graph, Vec<Node>) {
        let mut g = Graph::new();
        let v: Vec<Node> = (0..6).map(|_| g.new_node()).collect();
        // 0 -> 1 <- 2, 3 -> 4, 5 孤立
        g.new_edge(v[0], v[1]).unwrap();
        g.new_edge(v[2], v[1]).unwrap();
        g.new_edge(v[3], v[4]).unwrap();
        (g, v)
    }

    #[test]
    fn test_count_ignores_direction() {
        let (g, _) = two_islands();
        assert_eq!(number_connected_components(&g).unwrap(), 3);
        assert_eq!(component_sizes(&g).unwrap(), vec![3, 2, 1]);
    }

    #[test]
    fn test_empty_graph() {
        let g = Graph::new();
        assert_eq!(number_connected_components(&g).unwrap(), 0);
    }

    #[test]
    fn test_hidden_elements_still_connect() {
        let (mut g, v) = two_islands();
        let e = g.common_edge(v[3], v[4]).unwrap().unwrap();
        g.set_edge_hidden(e, true).unwrap();
        g.set_node_hidden(v[5], true).unwrap();
        assert_eq!(number_connected_components(&g).unwrap(), 3);
    }

    #[test]
    fn test_visit_component() {
        let (g, v) = two_islands();
        let mut visited = NodeSet::new(&g);

        assert_eq!(visit_connected_component(&g, v[2], &mut visited).unwrap(), 3);
        assert_eq!(visited.to_vec(&g).unwrap(), vec![v[0], v[1], v[2]]);
        assert_eq!(visit_connected_component(&g, v[0], &mut visited).unwrap(), 0);
        assert_eq!(visit_connected_component(&g, v[4], &mut visited).unwrap(), 2);
    }

    #[test]
    fn test_labels() {
        let (g, v) = two_islands();
        let mut labels: NodeArray<usize> = NodeArray::new(&g);
        assert_eq!(connected_components(&g, &mut labels).unwrap(), 3);
        assert_eq!(labels.get(v[2]).unwrap(), Some(0));
        assert_eq!(labels.get(v[3]).unwrap(), Some(1));
        assert_eq!(labels.get(v[5]).unwrap(), Some(2));

        let mut by_map: NodeMap<usize> = NodeMap::new(&g);
        connected_components(&g, &mut by_map).unwrap();
        assert_eq!(by_map.len(), 6);
    }

    #[test]
    fn test_foreign_start_rejected() {
        let (g, _) = two_islands();
        let mut other = Graph::new();
        let x = other.new_node();
        let mut visited = NodeSet::new(&g);
        assert!(visit_connected_component(&g, x, &mut visited)
            .unwrap_err()
            .is_not_owner());
    }
}
