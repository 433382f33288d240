use std::panic;
use std::path::PathBuf;

use clap::Parser;

use objective_board::{
    cli::{self, RootCommand},
    logging::{init_logging, print_log_location},
    settings::Settings,
};

#[derive(Parser, Debug)]
#[command(
    name = "objective-board",
    about = "Drag-and-drop board for an objective's tasks",
    long_about = "Loads an objective's task board from the objectives API and moves tasks between its columns with optimistic updates and rollback.",
    version = env!("OBJECTIVE_BOARD_BUILD_VERSION"),
    author
)]
struct Cli {
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: RootCommand,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_path = match init_logging() {
        Ok(path) => Some(path),
        Err(err) => {
            eprintln!("warning: failed to initialize logging: {err}");
            None
        }
    };
    if let Some(path) = log_path.as_ref() {
        install_panic_hook_with_log(path.clone());
    }

    let mut settings = Settings::load();
    settings.apply_env();
    settings.override_api_url(cli.api_url.as_deref());

    let code = cli::run(&settings, cli.command, cli.json, cli.quiet).await;

    if code != 0
        && !cli.json
        && let Some(path) = log_path.as_ref()
    {
        print_log_location(path);
    }

    std::process::exit(code);
}

fn install_panic_hook_with_log(log_path: PathBuf) {
    let previous_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        eprintln!();
        print_log_location(&log_path);
        previous_hook(panic_info);
    }));
}
