//! IncidenceGraph 命令行工具
//!
//! 读取纯文本图文件，输出统计、连通分量，或复制到新文件

use anyhow::Context;
use clap::{Parser, Subcommand};
use incigraph::algorithm::{component_sizes, number_connected_components};
use incigraph::config::GraphConfig;
use incigraph::graph::Graph;
use incigraph::io::{read_graph_file, write_graph_file};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "incigraph-cli")]
#[command(about = "IncidenceGraph 命令行工具")]
struct Args {
    /// 图构造配置（JSON）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 输出图的统计信息（JSON）
    Stats {
        /// 输入文件
        input: PathBuf,
    },
    /// 输出各连通分量的大小
    Components {
        input: PathBuf,
    },
    /// 读入后复制到新图并写出
    Copy {
        input: PathBuf,
        output: PathBuf,
    },
}

#[derive(Serialize)]
struct GraphStats {
    nodes: usize,
    edges: usize,
    hidden_nodes: usize,
    hidden_edges: usize,
    special_edges: usize,
    max_node_id: usize,
    max_edge_id: usize,
    components: usize,
}

impl GraphStats {
    fn of(graph: &Graph) -> incigraph::Result<Self> {
        Ok(Self {
            nodes: graph.number_of_nodes(),
            edges: graph.number_of_edges(),
            hidden_nodes: graph.number_of_hidden_nodes(),
            hidden_edges: graph.number_of_hidden_edges(),
            special_edges: graph.number_special_edges(),
            max_node_id: graph.max_node_id(),
            max_edge_id: graph.max_edge_id(),
            components: number_connected_components(graph)?,
        })
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path, config: &GraphConfig) -> anyhow::Result<Graph> {
    let mut graph = Graph::with_config(config);
    let stats = read_graph_file(&mut graph, path)
        .with_context(|| format!("读取 {} 失败", path.display()))?;
    info!(
        path = %path.display(),
        nodes = stats.nodes_read,
        edges = stats.edges_read,
        duration_ms = stats.duration_ms,
        "loaded"
    );
    Ok(graph)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => GraphConfig::from_json_file(path)
            .with_context(|| format!("加载配置 {} 失败", path.display()))?,
        None => GraphConfig::default(),
    };

    match &args.command {
        Command::Stats { input } => {
            let graph = load(input, &config)?;
            println!("{}", serde_json::to_string_pretty(&GraphStats::of(&graph)?)?);
        }
        Command::Components { input } => {
            let graph = load(input, &config)?;
            let sizes = component_sizes(&graph)?;
            println!("连通分量: {}", sizes.len());
            for (i, size) in sizes.iter().enumerate() {
                println!("  #{}: {} 个节点", i, size);
            }
        }
        Command::Copy { input, output } => {
            let source = load(input, &config)?;
            let mut copy = Graph::with_config(&config);
            copy.copy_from(&source)?;
            write_graph_file(&copy, output)
                .with_context(|| format!("写入 {} 失败", output.display()))?;
            println!(
                "已复制 {} 个节点, {} 条边到 {}",
                copy.number_of_nodes_including_hidden(),
                copy.number_of_edges_including_hidden(),
                output.display()
            );
        }
    }

    Ok(())
}
