//! 纯文本图交换格式
//!
//! ```text
//! graph nodes=<N> edges=<M>
//! node <id> [<json>]
//! edge <id> <source> <target> [special] [<json>]
//! end
//! ```
//!
//! 文件内编号只在文件内部有效。空行与 `#` 开头的注释行被忽略。
//! 读取时先完整解析并校验，再追加到图中；任何错误都不会留下部分结果。

use crate::collections::{EdgeSet, NodeSet};
use crate::error::{Error, Result};
use crate::graph::{Graph, Node};
use crate::types::Value;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// 读入统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReadStats {
    pub nodes_read: usize,
    pub edges_read: usize,
    pub duration_ms: u64,
}

struct NodeLine {
    id: u64,
    info: Option<Value>,
}

struct EdgeLine {
    line: usize,
    id: u64,
    source: u64,
    target: u64,
    special: bool,
    info: Option<Value>,
}

/// 已解析但尚未写入图的内容
struct Parsed {
    nodes: Vec<NodeLine>,
    edges: Vec<EdgeLine>,
}

fn parse_error(line: usize, msg: impl std::fmt::Display) -> Error {
    Error::ParseError(format!("第 {} 行: {}", line, msg))
}

/// 切出第一个空白分隔的词，返回 (词, 剩余部分)
fn split_token(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(pos) => (&s[..pos], s[pos..].trim_start()),
        None => (s, ""),
    }
}

fn parse_id(token: &str, line: usize, what: &str) -> Result<u64> {
    token
        .parse::<u64>()
        .map_err(|_| parse_error(line, format!("无效的{}编号 '{}'", what, token)))
}

fn parse_payload(rest: &str, line: usize) -> Result<Option<Value>> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(rest)
        .map(Some)
        .map_err(|e| parse_error(line, format!("负载 JSON 解析错误: {}", e)))
}

fn parse_count(token: &str, key: &str, line: usize) -> Result<usize> {
    token
        .strip_prefix(key)
        .and_then(|v| v.strip_prefix('='))
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| parse_error(line, format!("头部应包含 {}=<数量>, 实际为 '{}'", key, token)))
}

fn parse<R: BufRead>(input: R) -> Result<Parsed> {
    let mut header: Option<(usize, usize)> = None;
    let mut ended = false;
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut last_line = 0;

    for (idx, line) in input.lines().enumerate() {
        let line_no = idx + 1;
        last_line = line_no;
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if ended {
            return Err(parse_error(line_no, "end 之后仍有内容"));
        }

        let (keyword, rest) = split_token(line);
        match (keyword, header.is_some()) {
            ("graph", false) => {
                let (n, rest) = split_token(rest);
                let (m, rest) = split_token(rest);
                if !rest.is_empty() {
                    return Err(parse_error(line_no, "头部含多余内容"));
                }
                header = Some((
                    parse_count(n, "nodes", line_no)?,
                    parse_count(m, "edges", line_no)?,
                ));
            }
            ("graph", true) => return Err(parse_error(line_no, "重复的 graph 头部")),
            (_, false) => return Err(parse_error(line_no, "缺少 graph 头部")),
            ("node", true) => {
                let (id, rest) = split_token(rest);
                nodes.push(NodeLine {
                    id: parse_id(id, line_no, "节点")?,
                    info: parse_payload(rest, line_no)?,
                });
            }
            ("edge", true) => {
                let (id, rest) = split_token(rest);
                let (source, rest) = split_token(rest);
                let (target, rest) = split_token(rest);
                let (flag, after_flag) = split_token(rest);
                let (special, rest) = if flag == "special" {
                    (true, after_flag)
                } else {
                    (false, rest)
                };
                edges.push(EdgeLine {
                    line: line_no,
                    id: parse_id(id, line_no, "边")?,
                    source: parse_id(source, line_no, "节点")?,
                    target: parse_id(target, line_no, "节点")?,
                    special,
                    info: parse_payload(rest, line_no)?,
                });
            }
            ("end", true) => ended = true,
            (other, true) => {
                return Err(parse_error(line_no, format!("未知的行类型 '{}'", other)))
            }
        }
    }

    let (node_count, edge_count) =
        header.ok_or_else(|| parse_error(last_line, "缺少 graph 头部"))?;
    if !ended {
        return Err(parse_error(last_line, "缺少 end"));
    }
    if nodes.len() != node_count {
        return Err(Error::ParseError(format!(
            "头部声明 {} 个节点, 实际 {} 个",
            node_count,
            nodes.len()
        )));
    }
    if edges.len() != edge_count {
        return Err(Error::ParseError(format!(
            "头部声明 {} 条边, 实际 {} 条",
            edge_count,
            edges.len()
        )));
    }

    Ok(Parsed { nodes, edges })
}

/// 校验编号唯一、端点存在且不构成自环
fn validate(parsed: &Parsed) -> Result<()> {
    let mut node_ids = HashSet::with_capacity(parsed.nodes.len());
    for node in &parsed.nodes {
        if !node_ids.insert(node.id) {
            return Err(Error::ParseError(format!("重复的节点编号 {}", node.id)));
        }
    }

    let mut edge_ids = HashSet::with_capacity(parsed.edges.len());
    for edge in &parsed.edges {
        if !edge_ids.insert(edge.id) {
            return Err(parse_error(edge.line, format!("重复的边编号 {}", edge.id)));
        }
        for end in [edge.source, edge.target] {
            if !node_ids.contains(&end) {
                return Err(parse_error(edge.line, format!("未知的节点编号 {}", end)));
            }
        }
        if edge.source == edge.target {
            return Err(parse_error(
                edge.line,
                format!("边 {} 是自环 ({} -> {})", edge.id, edge.source, edge.target),
            ));
        }
    }

    Ok(())
}

/// 从文本读入并追加到图中，完成后通知 `graph_was_read`
pub fn read_graph<R: BufRead>(graph: &mut Graph, input: R) -> Result<ReadStats> {
    let start = std::time::Instant::now();
    let parsed = parse(input)?;
    validate(&parsed)?;

    let mut new_nodes = NodeSet::new(graph);
    let mut new_edges = EdgeSet::new(graph);
    let mut by_id: HashMap<u64, Node> = HashMap::with_capacity(parsed.nodes.len());

    for node in parsed.nodes {
        let v = match node.info {
            Some(info) => graph.new_node_with(info),
            None => graph.new_node(),
        };
        new_nodes.add(v)?;
        by_id.insert(node.id, v);
    }

    for edge in parsed.edges {
        let (source, target) = match (by_id.get(&edge.source), by_id.get(&edge.target)) {
            (Some(&s), Some(&t)) => (s, t),
            _ => return Err(parse_error(edge.line, "端点未创建")),
        };
        let e = graph.new_edge_at(source, None, target, None, edge.info)?;
        if edge.special {
            graph.set_special(e, true)?;
        }
        new_edges.add(e)?;
    }

    let stats = ReadStats {
        nodes_read: new_nodes.len(),
        edges_read: new_edges.len(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    debug!(
        graph = %graph.uid(),
        nodes = stats.nodes_read,
        edges = stats.edges_read,
        "graph read"
    );
    graph.fire_graph_was_read(&new_nodes, &new_edges);
    Ok(stats)
}

pub fn read_graph_file<P: AsRef<Path>>(graph: &mut Graph, path: P) -> Result<ReadStats> {
    let file = File::open(path)?;
    read_graph(graph, BufReader::new(file))
}

/// 按全局顺序写出全部节点与边（含隐藏元素）
pub fn write_graph<W: Write>(graph: &Graph, mut out: W) -> Result<()> {
    let mut local = vec![0usize; graph.max_node_id()];
    writeln!(
        out,
        "graph nodes={} edges={}",
        graph.number_of_nodes_including_hidden(),
        graph.number_of_edges_including_hidden()
    )?;

    for (i, v) in graph.nodes_including_hidden().enumerate() {
        local[v.id()] = i;
        match graph.node_info(v)? {
            Some(info) => writeln!(out, "node {} {}", i, serde_json::to_string(info)?)?,
            None => writeln!(out, "node {}", i)?,
        }
    }

    for (j, e) in graph.edges_including_hidden().enumerate() {
        let source = local[graph.source(e)?.id()];
        let target = local[graph.target(e)?.id()];
        write!(out, "edge {} {} {}", j, source, target)?;
        if graph.is_special(e)? {
            write!(out, " special")?;
        }
        if let Some(info) = graph.edge_info(e)? {
            write!(out, " {}", serde_json::to_string(info)?)?;
        }
        writeln!(out)?;
    }

    writeln!(out, "end")?;
    out.flush()?;
    debug!(
        graph = %graph.uid(),
        nodes = graph.number_of_nodes_including_hidden(),
        edges = graph.number_of_edges_including_hidden(),
        "graph written"
    );
    Ok(())
}

pub fn write_graph_file<P: AsRef<Path>>(graph: &Graph, path: P) -> Result<()> {
    let file = File::create(path)?;
    write_graph(graph, BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EventRecorder, GraphEvent};
    use std::sync::Arc;

    const SAMPLE: &str = "\
# 三角形加一条特殊边
graph nodes=4 edges=4
node 10 \"A\"
node 11 {\"nope\": 1}
node 12 [1, 2.5, \"x y\"]
node 13
edge 0 10 12
edge 1 12 13 special
edge 2 13 10 special 7

edge 3 11 10 \"spaced text\"
end
";

    fn read_str(graph: &mut Graph, text: &str) -> Result<ReadStats> {
        read_graph(graph, text.as_bytes())
    }

    #[test]
    fn test_object_payload_rejected() {
        // Value 不支持 JSON 对象
        let mut g = Graph::new();
        let err = read_str(&mut g, SAMPLE).unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
        assert!(g.is_empty());
    }

    #[test]
    fn test_read_sample() {
        let text = SAMPLE.replace("{\"nope\": 1}", "true");
        let mut g = Graph::new();
        let stats = read_str(&mut g, &text).unwrap();
        assert_eq!(stats.nodes_read, 4);
        assert_eq!(stats.edges_read, 4);

        let nodes: Vec<Node> = g.nodes().collect();
        assert_eq!(g.node_info(nodes[0]).unwrap(), Some(&Value::from("A")));
        assert_eq!(g.node_info(nodes[1]).unwrap(), Some(&Value::Bool(true)));
        assert_eq!(
            g.node_info(nodes[2]).unwrap(),
            Some(&Value::List(vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::from("x y")
            ]))
        );
        assert_eq!(g.node_info(nodes[3]).unwrap(), None);

        let edges: Vec<_> = g.edges().collect();
        assert_eq!(g.source(edges[0]).unwrap(), nodes[0]);
        assert_eq!(g.target(edges[0]).unwrap(), nodes[2]);
        assert!(g.is_special(edges[1]).unwrap());
        assert_eq!(g.edge_info(edges[2]).unwrap(), Some(&Value::Int(7)));
        assert_eq!(g.number_special_edges(), 2);
        assert_eq!(
            g.edge_info(edges[3]).unwrap(),
            Some(&Value::from("spaced text"))
        );
        g.assert_consistent();
    }

    #[test]
    fn test_round_trip_through_file() {
        let mut g = Graph::new();
        let a = g.new_node_with("a");
        let b = g.new_node();
        let c = g.new_node_with(3);
        let gap = g.new_node();
        g.delete_node(gap).unwrap();
        let ab = g.new_edge_with(a, b, 0.5).unwrap();
        let cb = g.new_edge(c, b).unwrap();
        g.set_special(cb, true).unwrap();
        g.set_edge_hidden(ab, true).unwrap();
        g.move_node_to_front(c).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.txt");
        write_graph_file(&g, &path).unwrap();

        let mut h = Graph::new();
        let stats = read_graph_file(&mut h, &path).unwrap();
        assert_eq!(stats.nodes_read, 3);
        assert_eq!(stats.edges_read, 2);

        let infos: Vec<Option<Value>> = h
            .nodes()
            .map(|v| h.node_info(v).unwrap().cloned())
            .collect();
        assert_eq!(infos, vec![Some(Value::Int(3)), Some(Value::from("a")), None]);
        let edges: Vec<_> = h.edges().collect();
        assert_eq!(h.edge_info(edges[0]).unwrap(), Some(&Value::Float(0.5)));
        assert!(h.is_special(edges[1]).unwrap());
        // 隐藏标志不写入文件
        assert_eq!(h.number_of_hidden_edges(), 0);
    }

    #[test]
    fn test_write_format() {
        let mut g = Graph::new();
        let a = g.new_node_with("A");
        let b = g.new_node();
        let e = g.new_edge(a, b).unwrap();
        g.set_special(e, true).unwrap();

        let mut out = Vec::new();
        write_graph(&g, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "graph nodes=2 edges=1\nnode 0 \"A\"\nnode 1\nedge 0 0 1 special\nend\n"
        );
    }

    #[test]
    fn test_invalid_input_leaves_graph_unchanged() {
        let cases = [
            "node 0\nend\n",
            "graph nodes=1 edges=0\nnode 0\n",
            "graph nodes=2 edges=0\nnode 0\nend\n",
            "graph nodes=1 edges=0\nnode 0\nnode 0\nend\n",
            "graph nodes=2 edges=1\nnode 0\nnode 1\nedge 0 0 5\nend\n",
            "graph nodes=1 edges=1\nnode 0\nedge 0 0 0\nend\n",
            "graph nodes=2 edges=2\nnode 0\nnode 1\nedge 0 0 1\nedge 0 1 0\nend\n",
            "graph nodes=1 edges=0\nnode x\nend\n",
            "graph nodes=1 edges=0\nnode 0 {bad\nend\n",
            "graph nodes=1 edges=0\nvertex 0\nend\n",
            "graph nodes=0 edges=0\nend\nnode 0\n",
            "graph nodes=a edges=0\nend\n",
        ];

        let mut g = Graph::new();
        let existing = g.new_node();
        for text in cases {
            let err = read_str(&mut g, text).unwrap_err();
            assert!(matches!(err, Error::ParseError(_)), "{}", text);
            assert_eq!(g.number_of_nodes(), 1, "{}", text);
            assert_eq!(g.number_of_edges(), 0, "{}", text);
        }
        assert!(g.contains_node(existing));
    }

    #[test]
    fn test_read_appends_and_notifies() {
        let mut g = Graph::new();
        g.new_node();
        let recorder = Arc::new(EventRecorder::new());
        g.add_listener(recorder.clone());

        read_str(&mut g, "graph nodes=2 edges=1\nnode 0\nnode 1\nedge 0 1 0\nend\n").unwrap();

        assert_eq!(g.number_of_nodes(), 3);
        assert_eq!(g.number_of_edges(), 1);
        let events = recorder.take();
        assert_eq!(events.last(), Some(&GraphEvent::Read { nodes: 2, edges: 1 }));
    }
}
