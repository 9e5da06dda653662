//! mats: browse and edit MatsLogic technique graphs from the terminal
//!
//! Every invocation restores the stored session, bulk-loads the caller's
//! entities, runs one editor operation, flushes pending writes and exits.
//! A banner raised by the operation is printed to stderr with exit code 1.
//!
//! # Subcommands
//! - `register`, `login`, `logout`, `whoami`     session
//! - `graphs`, `new-graph`, `nodes`, `add-node`  browse and create
//! - `connect`, `set-edge`                       transitions
//! - `delete-nodes`, `delete-edges`              best-effort deletion
//! - `search`, `group`, `note`, `theme`          editor utilities

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mats_core::models::{
    Edge, EdgeId, EdgeType, EdgeUpdate, Graph, GraphId, Node, NodeId, Position, TechniqueNote,
    Theme, User,
};
use mats_core::{ApiClient, LocalStore, MatsConfig};
use mats_editor::{messages, EdgeKey, Editor, Session};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "mats",
    version,
    about = "MatsLogic technique graphs from the terminal"
)]
struct Cli {
    /// Config file (TOML, optional)
    #[arg(short, long, env = "MATS_CONFIG", default_value = "mats.toml", global = true)]
    config: String,

    /// API base URL (overrides the config file)
    #[arg(long, env = "MATS_API_URL", global = true)]
    server: Option<String>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create an account and sign in
    Register {
        name: String,
        email: String,
        #[arg(long, env = "MATS_PASSWORD")]
        password: String,
    },

    /// Sign in and store the access token
    Login {
        email: String,
        #[arg(long, env = "MATS_PASSWORD")]
        password: String,
    },

    /// Forget the stored access token
    Logout,

    /// Show the signed-in user
    Whoami,

    /// List your graphs
    Graphs,

    /// Create a graph
    NewGraph { title: String },

    /// List the techniques of a graph with their canvas positions
    Nodes { graph: i64 },

    /// Add a technique to a graph
    AddNode { graph: i64, name: String },

    /// Create a transition between two techniques of a graph
    Connect { graph: i64, from: i64, to: i64 },

    /// Change a transition's classification and/or label
    SetEdge {
        id: i64,
        /// positive | neutral | negative (or + 0 -)
        #[arg(long = "type")]
        edge_type: Option<EdgeType>,
        /// New label; an empty string clears it
        #[arg(long)]
        label: Option<String>,
    },

    /// Delete techniques (and their transitions)
    DeleteNodes {
        graph: i64,
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Delete transitions
    DeleteEdges {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Search techniques of a graph by name
    Search {
        graph: i64,
        query: String,
        /// Centre on the first result and show its notes
        #[arg(long)]
        focus: bool,
    },

    /// Arrange a graph's techniques in a grid
    Group { graph: i64 },

    /// Show or edit technique notes
    Note {
        #[command(subcommand)]
        action: NoteAction,
    },

    /// Show the theme, or toggle it
    Theme {
        #[arg(long)]
        toggle: bool,
    },
}

#[derive(Debug, Subcommand)]
enum NoteAction {
    Show {
        graph: i64,
        node: i64,
    },
    Set {
        graph: i64,
        node: i64,
        #[arg(long)]
        video_url: Option<String>,
        #[arg(long)]
        steps: Option<String>,
    },
}

impl Commands {
    /// The graph an operation works in, if any.
    fn graph(&self) -> Option<GraphId> {
        let id = match self {
            Commands::Nodes { graph }
            | Commands::AddNode { graph, .. }
            | Commands::Connect { graph, .. }
            | Commands::DeleteNodes { graph, .. }
            | Commands::Search { graph, .. }
            | Commands::Group { graph } => *graph,
            Commands::Note {
                action: NoteAction::Show { graph, .. } | NoteAction::Set { graph, .. },
            } => *graph,
            _ => return None,
        };
        Some(GraphId(id))
    }
}

// ============================================================================
// Text output
// ============================================================================

pub fn user_line(user: &User) -> String {
    format!("{} <{}>", user.name, user.email)
}

fn signed_in_line(user: &User) -> String {
    format!("Signed in as {}", user_line(user))
}

pub fn graph_line(graph: &Graph) -> String {
    format!("{:>5}  {}", graph.id, graph.title)
}

pub fn node_line(node: &Node, position: Option<&Position>) -> String {
    match position {
        Some(p) => format!("{:>5}  {:<30} ({:.0}, {:.0})", node.id, node.name, p.x, p.y),
        None => format!("{:>5}  {}", node.id, node.name),
    }
}

pub fn edge_line(edge: &Edge) -> String {
    let arrow = match edge.edge_type {
        EdgeType::Positive => "-(+)->",
        EdgeType::Neutral => "----->",
        EdgeType::Negative => "-(-)->",
    };
    match &edge.label {
        Some(label) => format!(
            "{:>5}  {} {} {}  \"{}\"",
            edge.id, edge.from_node_id, arrow, edge.to_node_id, label
        ),
        None => format!(
            "{:>5}  {} {} {}",
            edge.id, edge.from_node_id, arrow, edge.to_node_id
        ),
    }
}

pub fn note_text(note: &TechniqueNote) -> String {
    if note.is_empty() {
        return "(no notes)".to_string();
    }
    let video = if note.video_url.is_empty() {
        "-"
    } else {
        note.video_url.as_str()
    };
    format!("Video: {}\n\n{}", video, note.steps)
}

pub fn theme_name(theme: Theme) -> &'static str {
    match theme {
        Theme::Light => "light",
        Theme::Dark => "dark",
    }
}

fn emit<T: Serialize + ?Sized>(
    json: bool,
    value: &T,
    text: impl FnOnce(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        let rendered = text(value);
        if !rendered.is_empty() {
            println!("{}", rendered);
        }
    }
    Ok(())
}

// ============================================================================
// Operations
// ============================================================================

/// Run the command and return the process exit code.
async fn run(cli: Cli, mut config: MatsConfig) -> anyhow::Result<i32> {
    if let Some(server) = &cli.server {
        config.api.base_url = server.trim_end_matches('/').to_string();
    }
    let store = LocalStore::open(&config.store.path)
        .with_context(|| format!("opening local store at {}", config.store.path))?;
    let client = ApiClient::new(&config.api)?;
    let mut session = Session::restore(store.clone(), client).await;
    let json = cli.json;

    match &cli.command {
        Commands::Register {
            name,
            email,
            password,
        } => {
            let user = session.register(name, email, password).await?;
            return emit(json, user, signed_in_line).map(|_| 0);
        }
        Commands::Login { email, password } => {
            let user = session.login(email, password).await?;
            return emit(json, user, signed_in_line).map(|_| 0);
        }
        Commands::Logout => {
            session.logout()?;
            println!("Signed out");
            return Ok(0);
        }
        Commands::Whoami => {
            return match session.user() {
                Some(user) => {
                    emit(json, user, |u| format!("{} (id {})", user_line(u), u.id)).map(|_| 0)
                }
                None => {
                    eprintln!("mats: {}", messages::NOT_SIGNED_IN);
                    Ok(1)
                }
            };
        }
        Commands::Theme { toggle } => {
            let mut editor = Editor::new(
                Arc::new(session.client().clone()),
                store,
                config.editor,
            );
            let theme = if *toggle {
                editor.toggle_theme()?
            } else {
                editor.theme()
            };
            return emit(json, &theme, |t| theme_name(*t).to_string()).map(|_| 0);
        }
        _ => {}
    }

    let Some(user) = session.user().cloned() else {
        eprintln!("mats: {}", messages::NOT_SIGNED_IN);
        return Ok(1);
    };

    let mut editor = Editor::new(Arc::new(session.client().clone()), store, config.editor)
        .with_user(Some(user));
    let mut failure = None;
    if editor.load_all().await.is_ok() {
        if let Err(e) = execute(&mut editor, cli.command, json).await {
            tracing::debug!(error = %e, "Operation failed");
            failure = Some(e);
        }
    }

    editor.flush().await;
    if let Some(banner) = editor.banner() {
        eprintln!("mats: {}", banner.message);
        return Ok(1);
    }
    if let Some(e) = failure {
        eprintln!("mats: {}", e);
        return Ok(1);
    }
    Ok(0)
}

async fn execute(editor: &mut Editor, command: Commands, json: bool) -> anyhow::Result<()> {
    if let Some(graph) = command.graph() {
        editor.select_graph(graph)?;
    }

    match command {
        Commands::Graphs => {
            let graphs = editor.my_graphs();
            emit(json, &graphs, |gs| {
                gs.iter().map(|g| graph_line(g)).collect::<Vec<_>>().join("\n")
            })
        }
        Commands::NewGraph { title } => {
            let graph = editor.create_graph(&title).await?;
            emit(json, &graph, graph_line)
        }
        Commands::Nodes { .. } => {
            let view = editor.view();
            if json {
                return emit(true, view, |_| String::new());
            }
            for node in editor.graph_nodes() {
                println!("{}", node_line(node, editor.positions().get(&node.id)));
            }
            for edge in &editor.entities().edges {
                if view.edge(EdgeKey::Saved(edge.id)).is_some() {
                    println!("{}", edge_line(edge));
                }
            }
            Ok(())
        }
        Commands::AddNode { name, .. } => {
            let node = editor.create_node(&name).await?;
            let position = editor.positions().get(&node.id).copied();
            emit(json, &node, |n| node_line(n, position.as_ref()))
        }
        Commands::Connect { from, to, .. } => {
            let edge = editor.connect(NodeId(from), NodeId(to)).await?;
            emit(json, &edge, edge_line)
        }
        Commands::SetEdge {
            id,
            edge_type,
            label,
        } => {
            let update = EdgeUpdate { edge_type, label };
            let edge = editor.update_edge(EdgeId(id), update).await?;
            emit(json, &edge, edge_line)
        }
        Commands::DeleteNodes { ids, .. } => {
            let ids: Vec<NodeId> = ids.into_iter().map(NodeId).collect();
            let report = editor.delete_nodes(&ids).await;
            emit(json, &report, |r| {
                format!("Deleted {} technique(s), {} failed", r.requested - r.failed, r.failed)
            })
        }
        Commands::DeleteEdges { ids } => {
            let keys: Vec<EdgeKey> = ids.into_iter().map(|id| EdgeKey::Saved(EdgeId(id))).collect();
            let report = editor.delete_edges(&keys).await;
            emit(json, &report, |r| {
                format!("Deleted {} transition(s), {} failed", r.requested - r.failed, r.failed)
            })
        }
        Commands::Search { query, focus, .. } => {
            editor.set_search(&query);
            let first = editor.search_results().first().map(|n| n.id);
            let results: Vec<Node> = editor.search_results().into_iter().cloned().collect();
            emit(json, &results, |rs| {
                rs.iter().map(|n| node_line(n, None)).collect::<Vec<_>>().join("\n")
            })?;
            if let (true, Some(node)) = (focus, first) {
                editor.focus_result(node).await?;
                if let Some(panel) = editor.technique_panel() {
                    emit(json, &panel.draft, note_text)?;
                }
            }
            Ok(())
        }
        Commands::Group { .. } => {
            editor.group_nodes()?;
            emit(json, editor.positions(), |positions| {
                positions
                    .iter()
                    .map(|(id, p)| format!("{:>5}  ({:.0}, {:.0})", id, p.x, p.y))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Commands::Note { action } => match action {
            NoteAction::Show { node, .. } => {
                let panel = editor.open_technique(NodeId(node)).await?;
                emit(json, &panel.draft, note_text)
            }
            NoteAction::Set {
                node,
                video_url,
                steps,
                ..
            } => {
                editor.open_technique(NodeId(node)).await?;
                if let Some(url) = video_url {
                    editor.edit_video_url(&url)?;
                }
                if let Some(steps) = steps {
                    editor.edit_steps(&steps)?;
                }
                let saved = editor.save_technique_now().await?;
                emit(json, &saved, note_text)
            }
        },
        Commands::Register { .. }
        | Commands::Login { .. }
        | Commands::Logout
        | Commands::Whoami
        | Commands::Theme { .. } => Ok(()),
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .with_writer(std::io::stderr)
        .init();

    let config = match MatsConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("mats: failed to load config from {}: {}", cli.config, e);
            std::process::exit(1);
        }
    };

    match run(cli, config).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("mats: {}", e);
            std::process::exit(1);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mats_core::models::UserId;

    fn edge(label: Option<&str>, edge_type: EdgeType) -> Edge {
        Edge {
            id: EdgeId(7),
            from_node_id: NodeId(1),
            to_node_id: NodeId(2),
            edge_type,
            label: label.map(str::to_string),
        }
    }

    #[test]
    fn test_edge_line_shows_direction_and_label() {
        let line = edge_line(&edge(Some("sweep"), EdgeType::Positive));
        assert_eq!(line, "    7  1 -(+)-> 2  \"sweep\"");
        assert!(!edge_line(&edge(None, EdgeType::Neutral)).contains('"'));
    }

    #[test]
    fn test_node_line_rounds_position() {
        let node = Node {
            id: NodeId(3),
            name: "Armbar".to_string(),
            graph_id: GraphId(1),
        };
        let line = node_line(&node, Some(&Position::new(12.4, 99.6)));
        assert!(line.ends_with("(12, 100)"), "{}", line);
        assert_eq!(node_line(&node, None), "    3  Armbar");
    }

    #[test]
    fn test_graph_line() {
        let graph = Graph {
            id: GraphId(12),
            title: "Half guard".to_string(),
            user_id: UserId(1),
        };
        assert_eq!(graph_line(&graph), "   12  Half guard");
    }

    #[test]
    fn test_empty_note_text() {
        assert_eq!(note_text(&TechniqueNote::default()), "(no notes)");
        assert_eq!(
            note_text(&TechniqueNote::new("", "1) grip")),
            "Video: -\n\n1) grip"
        );
    }

    #[test]
    fn test_graph_scoped_commands() {
        let cli = Cli::parse_from(["mats", "connect", "4", "1", "2"]);
        assert_eq!(cli.command.graph(), Some(GraphId(4)));

        let cli = Cli::parse_from(["mats", "note", "show", "5", "9", "--json"]);
        assert_eq!(cli.command.graph(), Some(GraphId(5)));
        assert!(cli.json);

        let cli = Cli::parse_from(["mats", "delete-edges", "3", "4"]);
        assert_eq!(cli.command.graph(), None);
    }

    #[test]
    fn test_note_set_parses_optional_fields() {
        let cli = Cli::parse_from(["mats", "note", "set", "2", "8", "--steps", "1) grip"]);
        assert_eq!(cli.command.graph(), Some(GraphId(2)));
        match cli.command {
            Commands::Note {
                action:
                    NoteAction::Set {
                        node,
                        video_url,
                        steps,
                        ..
                    },
            } => {
                assert_eq!(node, 8);
                assert_eq!(video_url, None);
                assert_eq!(steps.as_deref(), Some("1) grip"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_set_edge_accepts_short_types() {
        let cli = Cli::parse_from(["mats", "set-edge", "7", "--type", "-", "--label", ""]);
        match cli.command {
            Commands::SetEdge {
                id,
                edge_type,
                label,
            } => {
                assert_eq!(id, 7);
                assert_eq!(edge_type, Some(EdgeType::Negative));
                assert_eq!(label.as_deref(), Some(""));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
