use crate::alias::AliasStore;
use crate::config::{get_alias_path, get_history_path, Config};
use crate::error::Result;
use crate::executor::{ExecError, ExecutionOutcome, Executor, WorkingDir};
use crate::history::HistoryStore;
use crate::llm::{Completion, OllamaClient};
use crate::safety::{assess, RiskClassifier, Verdict};
use crate::translator::translate;
use crate::types::{CommandRequest, CommandResult};
use crate::ui::{self, Action};
use crate::worker::submit;
use std::{path::PathBuf, sync::Arc, time::Duration};

/// Everything one run of the assistant shares: the safety tables, the
/// working directory, the stores and the model backend.
pub struct Session {
    config: Config,
    classifier: RiskClassifier,
    executor: Executor,
    history: HistoryStore,
    aliases: AliasStore,
    client: Arc<dyn Completion>,
}

impl Session {
    pub fn open(config: Config) -> Result<Self> {
        let client = Arc::new(OllamaClient::new(&config.llm)?);
        Ok(Self::with_parts(
            config,
            client,
            WorkingDir::from_process(),
            get_history_path(),
            get_alias_path(),
        ))
    }

    pub fn with_parts(
        config: Config,
        client: Arc<dyn Completion>,
        cwd: WorkingDir,
        history_path: PathBuf,
        alias_path: PathBuf,
    ) -> Self {
        let classifier = RiskClassifier::new(&config.safety);
        let executor = Executor::new(
            cwd,
            Duration::from_secs(config.safety.command_timeout_secs.max(1)),
        );
        let history = HistoryStore::open(history_path, config.behavior.history_limit);
        let aliases = AliasStore::open(alias_path);

        Self {
            config,
            classifier,
            executor,
            history,
            aliases,
            client,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn classifier(&self) -> &RiskClassifier {
        &self.classifier
    }

    pub fn working_dir(&self) -> &WorkingDir {
        self.executor.working_dir()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn aliases(&self) -> &AliasStore {
        &self.aliases
    }

    pub fn aliases_mut(&mut self) -> &mut AliasStore {
        &mut self.aliases
    }

    /// Turn user input into a command result: an alias if one matches,
    /// otherwise a model translation run in the background.
    pub async fn resolve(&self, input: &str) -> Result<CommandResult> {
        let request = CommandRequest::new(input);

        if let Some(command) = self.aliases.lookup(request.text()) {
            tracing::debug!("alias {:?} -> {}", request.text(), command);
            return Ok(CommandResult::new(
                request.text(),
                command,
                format!("alias for `{}`", command),
                true,
            ));
        }

        let client = Arc::clone(&self.client);
        let cwd = self.working_dir().get().display().to_string();
        let pending = submit(async move { translate(client.as_ref(), &request, &cwd).await });
        pending.wait_with_spinner("thinking").await
    }

    /// A command typed by the user, bypassing the model but not the gate.
    pub fn literal(&self, command: &str) -> CommandResult {
        CommandResult::new(command.trim(), command, "command entered directly", true)
    }

    pub fn assess(&self, result: &CommandResult) -> Verdict {
        assess(result, &self.classifier)
    }

    /// Execute a result the caller has already gated, then record it.
    /// Refuses anything the gate would not let run. A history write error
    /// is logged and does not replace the outcome.
    pub async fn execute(&mut self, result: &CommandResult) -> Result<ExecutionOutcome> {
        if !self.assess(result).may_run() {
            tracing::warn!("refusing to execute {:?}", result.shell_command());
            return Ok(ExecutionOutcome::Failed(ExecError::NotCleared));
        }

        let executor = self.executor.clone();
        let command = result.shell_command().to_string();
        let outcome = submit(async move { executor.execute(&command, None).await })
            .wait()
            .await?;

        if let Err(e) = self.history.append(
            result.description(),
            result.shell_command(),
            outcome.succeeded(),
        ) {
            tracing::warn!(
                "could not record history at {}: {}",
                self.history.path().display(),
                e
            );
        }
        Ok(outcome)
    }

    /// Gate, confirm, execute and report one result. With `yolo` a
    /// `Clear` verdict runs without a prompt; nothing else does.
    pub async fn run(&mut self, result: CommandResult, yolo: bool, explain_only: bool) -> Result<()> {
        let mut current = result;
        let mut verdict = self.assess(&current);
        tracing::debug!("verdict for {:?}: {:?}", current.shell_command(), verdict);

        match &verdict {
            Verdict::NothingToRun { reason } => {
                ui::print_nothing_to_run(reason);
                return Ok(());
            }
            Verdict::Blocked { reason } => {
                ui::print_blocked(&current, reason);
                return Ok(());
            }
            _ => {}
        }

        if explain_only {
            ui::print_result(&current, &verdict);
            ui::show_explanation(&current);
            return Ok(());
        }

        let auto_run = yolo || self.config.behavior.auto_run;
        if auto_run && verdict == Verdict::Clear {
            return self.execute_and_print(&current).await;
        }

        ui::print_result(&current, &verdict);

        loop {
            let explicit = matches!(verdict, Verdict::NeedsConfirmation { .. });
            match ui::prompt_action(explicit) {
                Some(Action::Run) => return self.execute_and_print(&current).await,
                Some(Action::Edit) => {
                    let edited = match ui::edit_command(current.shell_command()) {
                        Some(edited) if !edited.trim().is_empty() => edited,
                        _ => continue,
                    };
                    let candidate = CommandResult::new(
                        current.description(),
                        edited.trim(),
                        "edited by user",
                        true,
                    );

                    match self.assess(&candidate) {
                        Verdict::Blocked { reason } => {
                            println!("refused: command blocked for safety");
                            println!("  {}", reason);
                        }
                        Verdict::Clear => {
                            println!("edited: {}", candidate.shell_command());
                            return self.execute_and_print(&candidate).await;
                        }
                        next => {
                            current = candidate;
                            verdict = next;
                            ui::print_result(&current, &verdict);
                        }
                    }
                }
                Some(Action::Explain) => ui::show_explanation(&current),
                Some(Action::Quit) | None => {
                    println!("cancelled.");
                    return Ok(());
                }
            }
        }
    }

    async fn execute_and_print(&mut self, result: &CommandResult) -> Result<()> {
        let outcome = self.execute(result).await?;
        ui::print_outcome(&outcome, self.config.output.max_output_lines);
        Ok(())
    }
}
