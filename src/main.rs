use clap::{CommandFactory, Parser, Subcommand};
use promptshell::commands::{
    cmd_alias_list, cmd_alias_remove, cmd_alias_set, cmd_classify, cmd_config, cmd_doctor,
    cmd_history, cmd_query, cmd_run, cmd_shell,
};
use promptshell::config::load_config;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "promptshell", version, about = "Describe a task, get a shell command, run it safely")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Run commands that pass the safety checks without asking
    #[arg(short = 'y', long = "yes", global = true)]
    yes: bool,

    /// Explain the generated command without running it
    #[arg(short, long)]
    explain: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// What you want to do, in plain words
    #[arg(trailing_var_arg = true)]
    query: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive mode
    Shell,
    /// Check and run a literal command without the model
    Run {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Show the risk tier and description of a command
    Classify {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Show or clear past commands
    History {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        clear: bool,
    },
    /// Manage shortcuts from a phrase to a command
    Alias {
        #[command(subcommand)]
        action: AliasAction,
    },
    /// Open the config file in $EDITOR
    Config,
    /// Check the model backend and data files
    Doctor,
}

#[derive(Subcommand)]
enum AliasAction {
    List,
    Set {
        name: String,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    Remove {
        name: String,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("promptshell=debug")
    } else {
        EnvFilter::try_from_env("PROMPTSHELL_LOG")
            .unwrap_or_else(|_| EnvFilter::new("promptshell=warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config();

    let result = match cli.command {
        Some(Commands::Shell) => cmd_shell(config, cli.yes).await,
        Some(Commands::Run { command }) => cmd_run(&command.join(" "), config, cli.yes).await,
        Some(Commands::Classify { command }) => cmd_classify(&command.join(" "), &config),
        Some(Commands::History { limit, clear }) => cmd_history(&config, limit, clear),
        Some(Commands::Alias { action }) => match action {
            AliasAction::List => cmd_alias_list(),
            AliasAction::Set { name, command } => cmd_alias_set(&name, &command.join(" ")),
            AliasAction::Remove { name } => cmd_alias_remove(&name),
        },
        Some(Commands::Config) => cmd_config(),
        Some(Commands::Doctor) => cmd_doctor(&config).await,
        None => {
            let query = cli.query.join(" ");
            if query.trim().is_empty() {
                Cli::command().print_help().ok();
                return;
            }
            cmd_query(&query, config, cli.yes, cli.explain).await
        }
    };

    if let Err(e) = result {
        eprintln!("promptshell: {}", e);
        std::process::exit(1);
    }
}
