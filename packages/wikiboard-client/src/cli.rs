/// Command-line front end: every board operation as a one-shot command
/// that loads the document, applies the change and saves.
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use wikiboard_core::mutation::InsertAt;
use wikiboard_core::{Board, TaskNode};

use crate::config::{self, ClientConfig};
use crate::store::{AnyStore, DocumentStore, HttpStore, LocalStore};
use crate::sync::{BoardSync, SyncError};

#[derive(Debug, Parser)]
#[command(
    name = "wikiboard",
    about = "Kanban view over the task lists of wiki documents",
    version
)]
pub struct Cli {
    /// Wiki base URL (overrides the config file).
    #[arg(long, global = true)]
    pub server: Option<String>,
    /// Work on a local directory of documents instead of a server.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
    /// Config file path.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Enable debug logging.
    #[arg(long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the board of a document.
    Show {
        document: String,
        /// Emit JSON instead of an outline.
        #[arg(long)]
        json: bool,
    },

    /// Assign task IDs and write them into the document.
    Reconcile { document: String },

    /// Check (or uncheck) a task.
    Toggle {
        document: String,
        task_id: String,
        #[arg(long)]
        uncheck: bool,
    },

    /// Move a task with its subtasks.
    Move(MoveArgs),

    /// Make a task the first subtask of another.
    Nest {
        document: String,
        task_id: String,
        target: String,
    },

    /// Change a task's indent level.
    Indent {
        document: String,
        task_id: String,
        level: usize,
    },

    /// Delete a task with its subtasks.
    Delete {
        document: String,
        task_id: String,
        /// Do not ask for confirmation.
        #[arg(long)]
        yes: bool,
    },

    /// Add a task to a column.
    AddTask {
        document: String,
        column: String,
        text: String,
        #[arg(long, default_value_t = 0)]
        level: usize,
        /// Insert before this task instead of at the end of the column.
        #[arg(long)]
        before: Option<String>,
    },

    /// Replace a task's text.
    EditTask {
        document: String,
        task_id: String,
        text: String,
    },

    /// Append a column.
    AddColumn { document: String, title: String },

    /// Rename a column.
    RenameColumn {
        document: String,
        column: String,
        title: String,
    },
}

#[derive(Debug, Args)]
pub struct MoveArgs {
    pub document: String,
    pub task_id: String,
    /// Place before this task.
    #[arg(
        long,
        conflicts_with_all = ["after", "column"],
        required_unless_present_any = ["after", "column"]
    )]
    pub before: Option<String>,
    /// Place after this task and its subtasks.
    #[arg(long, conflicts_with = "column")]
    pub after: Option<String>,
    /// Append to this column.
    #[arg(long)]
    pub column: Option<String>,
    /// With --column, insert at the top instead.
    #[arg(long, requires = "column")]
    pub start: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Failed to write output: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to encode board: {0}")]
    Json(#[from] serde_json::Error),
}

/// Pick the store: a local root wins over a server URL.
pub fn select_store(cli: &Cli, config: &ClientConfig) -> AnyStore {
    match cli.root.as_ref().or(config.root.as_ref()) {
        Some(root) => AnyStore::Local(LocalStore::new(root.clone())),
        None => AnyStore::Http(HttpStore::new(
            cli.server.as_deref().unwrap_or(&config.server),
        )),
    }
}

pub async fn run(cli: Cli, out: &mut impl Write) -> Result<(), CliError> {
    let config = config::load_config(
        &cli.config
            .clone()
            .unwrap_or_else(config::default_config_path),
    );
    let store = select_store(&cli, &config);
    execute(cli.command, &config, store, out).await
}

async fn execute<S: DocumentStore>(
    command: Command,
    config: &ClientConfig,
    store: S,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        Command::Show { document, json } => {
            let sync = BoardSync::load(store, config.resolve_document(&document)).await?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(sync.board())?)?;
            } else {
                write_outline(sync.board(), out)?;
            }
        }
        Command::Reconcile { document } => {
            let mut sync = BoardSync::load(store, config.resolve_document(&document)).await?;
            let report = sync.persist().await?;
            writeln!(
                out,
                "{} tasks, {} changes{}",
                sync.board().nodes().count(),
                report.changes.len(),
                if report.written { "" } else { ", document unchanged" }
            )?;
        }
        Command::Toggle {
            document,
            task_id,
            uncheck,
        } => {
            let mut sync = BoardSync::load(store, config.resolve_document(&document)).await?;
            let node = sync.node_for(&task_id)?;
            if !sync.toggle(node, !uncheck).await? {
                writeln!(out, "{} already {}", task_id, if uncheck { "unchecked" } else { "checked" })?;
            }
        }
        Command::Move(args) => {
            let mut sync = BoardSync::load(store, config.resolve_document(&args.document)).await?;
            let node = sync.node_for(&args.task_id)?;
            let to = if let Some(before) = &args.before {
                InsertAt::Before(sync.node_for(before)?)
            } else if let Some(after) = &args.after {
                InsertAt::After(sync.node_for(after)?)
            } else {
                let column = sync.column_for(args.column.as_deref().unwrap_or_default())?;
                if args.start {
                    InsertAt::Start(column)
                } else {
                    InsertAt::End(column)
                }
            };
            report_move(sync.move_task(node, to).await?.is_moved(), out)?;
        }
        Command::Nest {
            document,
            task_id,
            target,
        } => {
            let mut sync = BoardSync::load(store, config.resolve_document(&document)).await?;
            let node = sync.node_for(&task_id)?;
            let target = sync.node_for(&target)?;
            report_move(sync.nest(node, target).await?.is_moved(), out)?;
        }
        Command::Indent {
            document,
            task_id,
            level,
        } => {
            let mut sync = BoardSync::load(store, config.resolve_document(&document)).await?;
            let node = sync.node_for(&task_id)?;
            report_move(sync.set_indent(node, level).await?.is_moved(), out)?;
        }
        Command::Delete {
            document,
            task_id,
            yes,
        } => {
            let mut sync = BoardSync::load(store, config.resolve_document(&document)).await?;
            let node = sync.node_for(&task_id)?;
            let removed = if yes {
                sync.delete(node, &|_: &TaskNode, _: usize| true).await?
            } else {
                sync.delete(node, &prompt_delete).await?
            };
            writeln!(out, "Deleted {} tasks", removed.len())?;
        }
        Command::AddTask {
            document,
            column,
            text,
            level,
            before,
        } => {
            let mut sync = BoardSync::load(store, config.resolve_document(&document)).await?;
            let column = sync.column_for(&column)?;
            let before = before.map(|id| sync.node_for(&id)).transpose()?;
            let node = sync.add_task(column, &text, level, before).await?;
            if let Some(task_id) = sync.board().node(node).and_then(|n| n.task_id.as_deref()) {
                writeln!(out, "{}", task_id)?;
            }
        }
        Command::EditTask {
            document,
            task_id,
            text,
        } => {
            let mut sync = BoardSync::load(store, config.resolve_document(&document)).await?;
            let node = sync.node_for(&task_id)?;
            sync.edit_task(node, &text).await?;
        }
        Command::AddColumn { document, title } => {
            let mut sync = BoardSync::load(store, config.resolve_document(&document)).await?;
            sync.add_column(&title).await?;
        }
        Command::RenameColumn {
            document,
            column,
            title,
        } => {
            let mut sync = BoardSync::load(store, config.resolve_document(&document)).await?;
            let column = sync.column_for(&column)?;
            sync.rename_column(column, &title).await?;
        }
    }
    Ok(())
}

fn report_move(moved: bool, out: &mut impl Write) -> io::Result<()> {
    if !moved {
        writeln!(out, "Nothing to move")?;
    }
    Ok(())
}

fn prompt_delete(task: &TaskNode, descendants: usize) -> bool {
    let mut stderr = io::stderr();
    let _ = write!(
        stderr,
        "Delete \"{}\" and {} subtasks? [y/N] ",
        task.display_text, descendants
    );
    let _ = stderr.flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}

fn write_outline(board: &Board, out: &mut impl Write) -> io::Result<()> {
    for (i, column) in board.columns().iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        writeln!(out, "{}", column.title)?;
        for node in &column.nodes {
            writeln!(
                out,
                "  {}[{}] {}  ({})",
                "  ".repeat(node.indent_level),
                if node.checked { 'x' } else { ' ' },
                node.display_text,
                node.task_id.as_deref().unwrap_or("-")
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const DOC: &str = "\
## Todo
- [ ] Buy milk <!-- task-id: task_1 -->
  - [ ] 2% preferred <!-- task-id: task_2 -->

## Done
- [x] Call mom <!-- task-id: task_3 -->
";

    fn cli(root: &std::path::Path, args: &[&str]) -> Cli {
        let mut argv = vec!["wikiboard", "--root", root.to_str().unwrap()];
        argv.extend_from_slice(args);
        argv.extend_from_slice(&["--config", "/nonexistent/wikiboard.json"]);
        Cli::parse_from(argv)
    }

    async fn run_in(root: &std::path::Path, args: &[&str]) -> Result<String, CliError> {
        let mut out = Vec::new();
        run(cli(root, args), &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn board_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("board.md"), DOC).unwrap();
        dir
    }

    fn read(dir: &tempfile::TempDir) -> String {
        fs::read_to_string(dir.path().join("board.md")).unwrap()
    }

    #[tokio::test]
    async fn test_show_outline() {
        let dir = board_dir();
        let out = run_in(dir.path(), &["show", "board.md"]).await.unwrap();
        assert_eq!(
            out,
            "Todo\n  [ ] Buy milk  (task_1)\n    [ ] 2% preferred  (task_2)\n\nDone\n  [x] Call mom  (task_3)\n"
        );
    }

    #[tokio::test]
    async fn test_show_json() {
        let dir = board_dir();
        let out = run_in(dir.path(), &["show", "board.md", "--json"]).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["columns"][1]["nodes"][0]["taskId"], "task_3");
    }

    #[tokio::test]
    async fn test_toggle_and_move() {
        let dir = board_dir();
        run_in(dir.path(), &["toggle", "board.md", "task_1"]).await.unwrap();
        run_in(dir.path(), &["move", "board.md", "task_3", "--column", "Todo", "--start"])
            .await
            .unwrap();
        assert_eq!(
            read(&dir),
            "## Todo\n- [x] Call mom <!-- task-id: task_3 -->\n- [x] Buy milk <!-- task-id: task_1 -->\n  - [ ] 2% preferred <!-- task-id: task_2 -->\n\n## Done\n"
        );
    }

    #[tokio::test]
    async fn test_unchanged_move_reports_nothing_to_move() {
        let dir = board_dir();
        let out = run_in(dir.path(), &["indent", "board.md", "task_2", "1"]).await.unwrap();
        assert_eq!(out, "Nothing to move\n");
        assert_eq!(read(&dir), DOC);
    }

    #[tokio::test]
    async fn test_delete_with_yes() {
        let dir = board_dir();
        let out = run_in(dir.path(), &["delete", "board.md", "task_1", "--yes"])
            .await
            .unwrap();
        assert_eq!(out, "Deleted 2 tasks\n");
        assert_eq!(read(&dir), "## Todo\n\n## Done\n- [x] Call mom <!-- task-id: task_3 -->\n");
    }

    #[tokio::test]
    async fn test_add_task_prints_new_id() {
        let dir = board_dir();
        let out = run_in(dir.path(), &["add-task", "board.md", "Done", "Write report"])
            .await
            .unwrap();
        let id = out.trim();
        assert!(id.starts_with("task_"));
        assert!(read(&dir).ends_with(&format!(
            "- [x] Call mom <!-- task-id: task_3 -->\n- [ ] Write report <!-- task-id: {} -->\n",
            id
        )));
    }

    #[tokio::test]
    async fn test_unknown_task_is_an_error() {
        let dir = board_dir();
        let err = run_in(dir.path(), &["toggle", "board.md", "task_9"])
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Sync(SyncError::UnknownTask(id)) if id == "task_9"));
    }

    #[test]
    fn test_move_requires_one_destination() {
        assert!(Cli::try_parse_from(["wikiboard", "move", "a.md", "t"]).is_err());
        assert!(Cli::try_parse_from([
            "wikiboard", "move", "a.md", "t", "--before", "x", "--after", "y"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["wikiboard", "move", "a.md", "t", "--start"]).is_err());
    }

    #[test]
    fn test_root_wins_over_server() {
        let cli = Cli::parse_from(["wikiboard", "--root", "/tmp/docs", "show", "a.md"]);
        assert!(matches!(
            select_store(&cli, &ClientConfig::default()),
            AnyStore::Local(_)
        ));
        let cli = Cli::parse_from(["wikiboard", "show", "a.md"]);
        assert!(matches!(
            select_store(&cli, &ClientConfig::default()),
            AnyStore::Http(_)
        ));
    }
}
