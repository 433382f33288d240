use std::sync::Arc;

use clap::{Args, Subcommand};
use serde_json::{Value, json};
use tracing::{error, info};

use crate::{
    api::{ApiError, HttpBoardApi},
    board::{Board, ColumnId, DragError, DropOutcome, DropTarget, Edge},
    notification::{BackendNotifier, BrowserSelfEvaluation},
    session::{BoardSession, SessionError},
    settings::Settings,
    sync::{MoveCoordinator, MoveOutcome, shared_cache},
    types::{ObjectiveId, TaskId},
};

const SCHEMA_VERSION: &str = "cli.v1";

#[derive(Debug, Clone, Subcommand)]
pub enum RootCommand {
    /// Print the objective's board.
    Show(ShowArgs),
    /// Drag one task to a column, optionally next to another task.
    Move(MoveArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ObjectiveArgs {
    #[arg(long, value_name = "OBJECTIVE_ID")]
    pub objective: String,

    #[arg(long, value_name = "TEXT")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct ShowArgs {
    #[command(flatten)]
    pub objective: ObjectiveArgs,
}

#[derive(Debug, Clone, Args)]
pub struct MoveArgs {
    #[command(flatten)]
    pub objective: ObjectiveArgs,

    #[arg(long, value_name = "TASK_ID")]
    pub task: String,

    #[arg(long, value_name = "COLUMN", value_parser = parse_column)]
    pub to: ColumnId,

    #[command(flatten)]
    pub anchor: AnchorArgs,
}

#[derive(Debug, Clone, Args)]
#[group(id = "anchor", multiple = false)]
pub struct AnchorArgs {
    #[arg(long, value_name = "TASK_ID", group = "anchor")]
    pub before: Option<String>,

    #[arg(long, value_name = "TASK_ID", group = "anchor")]
    pub after: Option<String>,
}

fn parse_column(raw: &str) -> Result<ColumnId, String> {
    raw.parse::<ColumnId>()
        .map_err(|()| format!("unknown column '{raw}' (expected todo, in-progress, paused, done)"))
}

pub async fn run(settings: &Settings, command: RootCommand, json_output: bool, quiet: bool) -> i32 {
    let result = match build_coordinator(settings, Settings::token_from_env()) {
        Ok(coordinator) => execute(coordinator, command).await,
        Err(err) => Err(api_error(err)),
    };

    match result {
        Ok(output) => {
            print_success(output, json_output, quiet);
            0
        }
        Err(err) => {
            print_error(&err, json_output);
            err.exit_code
        }
    }
}

pub fn build_coordinator(
    settings: &Settings,
    token: Option<String>,
) -> Result<MoveCoordinator, ApiError> {
    let api = HttpBoardApi::new(settings.api_config(token))?;
    Ok(MoveCoordinator::new(
        Arc::new(api),
        shared_cache(),
        Arc::new(BackendNotifier::new(
            settings.backend(),
            settings.notification_display_duration_ms,
        )),
        Arc::new(BrowserSelfEvaluation::new(
            settings.self_evaluation_url.clone(),
        )),
        settings.page_size,
    ))
}

#[derive(Debug)]
pub struct CommandOutput {
    pub command: &'static str,
    pub objective: String,
    pub data: Value,
    pub text: String,
}

#[derive(Debug)]
pub struct CliError {
    pub exit_code: i32,
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

type CliResult<T> = Result<T, CliError>;

pub async fn execute(coordinator: MoveCoordinator, command: RootCommand) -> CliResult<CommandOutput> {
    match command {
        RootCommand::Show(args) => show(coordinator, args).await,
        RootCommand::Move(args) => move_task(coordinator, args).await,
    }
}

async fn load(coordinator: MoveCoordinator, args: &ObjectiveArgs) -> CliResult<BoardSession> {
    let objective = args.objective.trim();
    if objective.is_empty() {
        return Err(usage_error(
            "OBJECTIVE_REQUIRED",
            "--objective cannot be empty",
        ));
    }
    let title = args.title.clone().unwrap_or_else(|| objective.to_string());

    BoardSession::load(coordinator, ObjectiveId::new(objective), title)
        .await
        .map_err(|err| match err {
            SessionError::Fetch(ApiError::Http { status: 404, .. }) => not_found_error(
                "OBJECTIVE_NOT_FOUND",
                format!("objective '{objective}' not found"),
            ),
            SessionError::Fetch(err) => api_error(err),
            SessionError::NoRuntime(message) => runtime_error(message),
        })
}

async fn show(coordinator: MoveCoordinator, args: ShowArgs) -> CliResult<CommandOutput> {
    let session = load(coordinator, &args.objective).await?;
    let board = session.board();

    Ok(CommandOutput {
        command: "show",
        objective: board.objective_id.to_string(),
        data: json!({ "board": board, "completion": completion_json(board) }),
        text: render_board_text(board),
    })
}

async fn move_task(coordinator: MoveCoordinator, args: MoveArgs) -> CliResult<CommandOutput> {
    let mut session = load(coordinator, &args.objective).await?;
    let task_id = TaskId::new(args.task.trim());

    session.begin_drag(&task_id).map_err(|err| match err {
        DragError::TaskNotFound(_) => {
            not_found_error("TASK_NOT_FOUND", format!("task {task_id} is not on this board"))
        }
        other => runtime_error(other),
    })?;

    let targets = drop_targets(session.board(), args.to, &args.anchor)?;
    session.hover(&targets);

    let command = match session.drop(&targets) {
        DropOutcome::Moved(command) => command,
        DropOutcome::Unchanged => {
            return Ok(CommandOutput {
                command: "move",
                objective: session.objective_id().to_string(),
                data: json!({ "moved": false, "task_id": task_id }),
                text: format!("task {task_id} is already there"),
            });
        }
        DropOutcome::Aborted(reason) => {
            return Err(CliError {
                exit_code: 1,
                code: "DROP_ABORTED",
                message: format!("drop ignored: {}", reason.as_str()),
                details: None,
            });
        }
        DropOutcome::NotDragging => {
            return Err(runtime_error("drag ended before the drop"));
        }
    };

    let settled = session.wait_idle().await;
    let outcome = settled
        .into_iter()
        .find(|settled| settled.command.task_id == task_id)
        .map(|settled| settled.outcome)
        .ok_or_else(|| runtime_error("move did not settle"))?;

    match outcome {
        MoveOutcome::Persisted(result) => {
            info!(%task_id, to = %command.to, "cli move persisted");
            let board = session.board();
            let placement = board.locate(&task_id);
            Ok(CommandOutput {
                command: "move",
                objective: board.objective_id.to_string(),
                data: json!({
                    "moved": true,
                    "task_id": task_id,
                    "from": command.from,
                    "to": command.to,
                    "new_position": command.new_position,
                    "reason": command.reason,
                    "server": result,
                    "completion": completion_json(board),
                }),
                text: match placement {
                    Some((column, index)) => format!(
                        "moved task {task_id} to {} at position {index}",
                        column.title()
                    ),
                    None => format!("moved task {task_id} to {}", command.to.title()),
                },
            })
        }
        MoveOutcome::SelfEvaluationRequired => Err(CliError {
            exit_code: 3,
            code: "SELF_EVALUATION_REQUIRED",
            message: format!("task {task_id} needs a self-evaluation before it can be completed"),
            details: Some(json!({ "task_id": task_id })),
        }),
        MoveOutcome::RolledBack(err) => Err(CliError {
            exit_code: 1,
            code: err.code(),
            message: err.to_string(),
            details: Some(json!({ "task_id": task_id, "rolled_back": true })),
        }),
    }
}

/// What the drag engine would report for a drop in `column`, optionally on
/// the upper half of `--before` or the lower half of `--after`.
fn drop_targets(board: &Board, column: ColumnId, anchor: &AnchorArgs) -> CliResult<Vec<DropTarget>> {
    let card = match (&anchor.before, &anchor.after) {
        (Some(before), _) => Some((before.trim(), Edge::Top)),
        (None, Some(after)) => Some((after.trim(), Edge::Bottom)),
        (None, None) => None,
    };

    let Some((anchor_id, edge)) = card else {
        return Ok(vec![DropTarget::column(column)]);
    };

    if board
        .column(column)
        .position_of(&TaskId::new(anchor_id))
        .is_none()
    {
        return Err(not_found_error(
            "ANCHOR_NOT_FOUND",
            format!("task {anchor_id} is not in {}", column.title()),
        ));
    }

    Ok(vec![
        DropTarget::card(anchor_id, edge),
        DropTarget::column(column),
    ])
}

fn completion_json(board: &Board) -> Value {
    let completion = board.completion();
    json!({
        "done": completion.done,
        "total": completion.total,
        "percent": completion.percent(),
    })
}

fn render_board_text(board: &Board) -> String {
    let completion = board.completion();
    let mut lines = vec![format!(
        "{} ({}): {}/{} done ({}%)",
        board.objective_title,
        board.objective_id,
        completion.done,
        completion.total,
        completion.percent()
    )];

    for column in board.columns() {
        lines.push(String::new());
        lines.push(format!("{} ({})", column.title, column.len()));
        if column.is_empty() {
            lines.push("  (empty)".to_string());
        }
        for task in &column.tasks {
            let mut line = format!("  {}  {} [{}]", task.id, task.title, task.priority.as_str());
            if let Some(due_date) = task.due_date {
                line.push_str(&format!(" due {due_date}"));
            }
            lines.push(line);
        }
    }

    lines.join("\n")
}

fn usage_error(code: &'static str, message: impl Into<String>) -> CliError {
    CliError {
        exit_code: 2,
        code,
        message: message.into(),
        details: None,
    }
}

fn not_found_error(code: &'static str, message: impl Into<String>) -> CliError {
    CliError {
        exit_code: 4,
        code,
        message: message.into(),
        details: None,
    }
}

fn runtime_error(err: impl std::fmt::Display) -> CliError {
    CliError {
        exit_code: 1,
        code: "RUNTIME_ERROR",
        message: err.to_string(),
        details: None,
    }
}

fn api_error(err: ApiError) -> CliError {
    CliError {
        exit_code: 1,
        code: err.code(),
        message: err.to_string(),
        details: None,
    }
}

fn print_success(output: CommandOutput, json_output: bool, quiet: bool) {
    if json_output {
        let payload = json!({
            "schema_version": SCHEMA_VERSION,
            "command": output.command,
            "objective": output.objective,
            "data": output.data
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(value) => println!("{value}"),
            Err(_) => println!("{}", payload),
        }
        return;
    }

    if quiet {
        return;
    }

    if output.text.is_empty() {
        println!("ok");
    } else {
        println!("{}", output.text);
    }
}

fn print_error(err: &CliError, json_output: bool) {
    error!(
        code = err.code,
        message = %err.message,
        details = ?err.details,
        "cli command failed"
    );

    if json_output {
        let payload = json!({
            "schema_version": SCHEMA_VERSION,
            "error": {
                "code": err.code,
                "message": err.message,
                "details": err.details
            }
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(value) => eprintln!("{value}"),
            Err(_) => eprintln!("{}", payload),
        }
        return;
    }

    eprintln!("error[{}]: {}", err.code, err.message);
}
