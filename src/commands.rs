use crate::alias::AliasStore;
use crate::config::{get_alias_path, get_config_path, get_history_path, save_config, Config};
use crate::error::Result;
use crate::history::HistoryStore;
use crate::llm::{Completion, OllamaClient};
use crate::safety::RiskClassifier;
use crate::session::Session;
use crate::ui;
use std::{
    env,
    io::{self, BufRead, Write},
    process::Command,
};

pub async fn cmd_query(
    query: &str,
    config: Config,
    yolo: bool,
    explain_only: bool,
) -> Result<()> {
    let mut session = Session::open(config)?;
    let result = session.resolve(query).await?;
    session.run(result, yolo, explain_only).await
}

pub async fn cmd_run(command: &str, config: Config, yolo: bool) -> Result<()> {
    let mut session = Session::open(config)?;
    let result = session.literal(command);
    session.run(result, yolo, false).await
}

pub async fn cmd_shell(config: Config, yolo: bool) -> Result<()> {
    let mut session = Session::open(config)?;
    let stdin = io::stdin();

    println!("promptshell: describe what you want to do. 'exit' to leave, '!cmd' runs cmd as typed.");

    loop {
        print!("{}> ", session.working_dir().get().display());
        io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }

        let input = line.trim();
        match input {
            "" => continue,
            "exit" | "quit" => break,
            "pwd" => {
                println!("{}", session.working_dir().get().display());
                continue;
            }
            "history" => {
                ui::print_history(session.history().recent(10));
                continue;
            }
            _ => {}
        }

        let outcome = match input.strip_prefix('!') {
            Some(command) => {
                let result = session.literal(command);
                session.run(result, yolo, false).await
            }
            None => match session.resolve(input).await {
                Ok(result) => session.run(result, yolo, false).await,
                Err(e) => Err(e),
            },
        };

        if let Err(e) = outcome {
            eprintln!("promptshell: {}", e);
        }
    }

    Ok(())
}

pub fn cmd_classify(command: &str, config: &Config) -> Result<()> {
    let classifier = RiskClassifier::new(&config.safety);
    let preview = classifier.describe(command);
    let explanation = classifier.explain(command);
    ui::print_preview(&preview, explanation.as_deref());
    Ok(())
}

pub fn cmd_history(config: &Config, limit: usize, clear: bool) -> Result<()> {
    let mut store = HistoryStore::open(get_history_path(), config.behavior.history_limit);

    if clear {
        store.clear()?;
        println!("history cleared.");
        return Ok(());
    }

    ui::print_history(store.recent(limit));
    Ok(())
}

pub fn cmd_alias_list() -> Result<()> {
    let store = AliasStore::open(get_alias_path());

    if store.is_empty() {
        println!("no aliases defined.");
        return Ok(());
    }

    for (name, command) in store.list() {
        println!("{:<20} {}", name, command);
    }
    Ok(())
}

pub fn cmd_alias_set(name: &str, command: &str) -> Result<()> {
    let mut store = AliasStore::open(get_alias_path());
    store.set(name, command)?;
    println!("alias {} -> {}", name.trim(), command.trim());
    Ok(())
}

pub fn cmd_alias_remove(name: &str) -> Result<()> {
    let mut store = AliasStore::open(get_alias_path());
    if store.remove(name)? {
        println!("removed alias {}", name.trim());
    } else {
        println!("no alias named {}", name.trim());
    }
    Ok(())
}

pub async fn cmd_doctor(config: &Config) -> Result<()> {
    println!("diagnostics:");
    println!();

    let client = OllamaClient::new(&config.llm)?;

    print!("  ollama ... ");
    io::stdout().flush().ok();
    let available = client.is_available().await;
    if available {
        println!("ok");
    } else {
        println!("failed");
        println!("    url: {}", client.endpoint());
        println!("    try: ollama serve");
    }

    print!("  model ({}) ... ", client.model());
    io::stdout().flush().ok();
    if available {
        match client.generate("Say 'ok' and nothing else.").await {
            Ok(_) => println!("ok"),
            Err(e) => {
                println!("failed");
                println!("    error: {}", e);
                println!("    try: ollama pull {}", client.model());
            }
        }
    } else {
        println!("skipped");
    }

    print!("  config ... ");
    io::stdout().flush().ok();
    if get_config_path().exists() {
        println!("ok");
    } else {
        println!("using defaults");
    }

    let history = HistoryStore::open(get_history_path(), config.behavior.history_limit);
    println!("  history ... {} entries", history.entries().len());
    println!("    path: {}", history.path().display());

    let aliases = AliasStore::open(get_alias_path());
    println!("  aliases ... {} defined", aliases.list().count());
    println!("    path: {}", aliases.path().display());

    println!(
        "  command timeout ... {}s",
        config.safety.command_timeout_secs
    );

    println!();
    Ok(())
}

pub fn cmd_config() -> Result<()> {
    let config_path = get_config_path();

    if !config_path.exists() {
        save_config(&Config::default())?;
    }

    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    Command::new(&editor).arg(&config_path).status()?;

    Ok(())
}
