use crate::executor::ExecutionOutcome;
use crate::safety::{CommandPreview, Verdict};
use crate::types::{CommandResult, HistoryEntry, RiskTier};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal,
};
use std::{env, fs, io::Write, process::Command, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Run,
    Edit,
    Explain,
    Quit,
}

pub fn print_result(result: &CommandResult, verdict: &Verdict) {
    println!();
    println!("  {}", result.shell_command());

    if let Verdict::NeedsConfirmation { tier, reason } = verdict {
        println!();
        match tier {
            RiskTier::Safe => println!("  warning: {}", reason),
            _ => println!("  warning ({}): {}", tier, reason),
        }
    }
}

pub fn print_blocked(result: &CommandResult, reason: &str) {
    println!();
    println!("  {}", result.shell_command());
    println!();
    println!("  refused: command blocked for safety");
    println!("  {}", reason);
}

pub fn print_nothing_to_run(reason: &str) {
    println!("could not generate a command for this request.");
    println!("  {}", reason);
}

pub fn show_explanation(result: &CommandResult) {
    println!();
    if !result.description().is_empty() {
        println!("task: {}", result.description());
    }
    println!("explanation: {}", result.explanation());
    println!();

    for part in result.shell_command().split('|') {
        println!("  {}", part.trim());
    }
    println!();
}

pub fn print_preview(preview: &CommandPreview, explanation: Option<&str>) {
    println!("command: {}", preview.full_command);
    println!("  base:  {}", preview.command);
    println!("  does:  {}", preview.description);
    println!("  risk:  {}", preview.tier);
    if let Some(explanation) = explanation {
        println!("  why:   {}", explanation);
    }
}

pub fn print_outcome(outcome: &ExecutionOutcome, max_lines: usize) {
    let stdout = outcome.stdout();
    let stderr = outcome.stderr();

    if !stdout.is_empty() {
        println!("{}", truncate_lines(&stdout, max_lines));
    }
    if !stderr.is_empty() {
        eprintln!("{}", truncate_lines(&stderr, max_lines));
    }
    if let ExecutionOutcome::Completed {
        exit_code: Some(code),
        ..
    } = outcome
    {
        if *code != 0 {
            eprintln!("exit status {}", code);
        }
    }
}

pub fn print_history(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        println!("no history yet.");
        return;
    }

    println!("recent queries:");
    println!();
    for entry in entries {
        let status = if entry.success { "+" } else { "x" };
        let when = chrono::DateTime::parse_from_rfc3339(&entry.timestamp)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|_| entry.timestamp.clone());
        println!("{} {}  {}", status, when, entry.nlp);
        if !entry.command.is_empty() {
            println!("    {}", entry.command);
        }
    }
}

/// Keep the head and tail of long output.
pub fn truncate_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if max_lines == 0 || lines.len() <= max_lines {
        return text.to_string();
    }

    let head = max_lines / 2;
    let tail = max_lines - head;
    let mut kept: Vec<String> = lines[..head].iter().map(|l| l.to_string()).collect();
    kept.push(format!(
        "... [{} lines truncated] ...",
        lines.len() - max_lines
    ));
    kept.extend(lines[lines.len() - tail..].iter().map(|l| l.to_string()));
    kept.join("\n")
}

/// Read one keypress. With `explicit` set, Enter does not count as yes.
pub fn prompt_action(explicit: bool) -> Option<Action> {
    if explicit {
        eprint!("run anyway? [y]es [e]dit [?]explain [n]o ");
    } else {
        eprint!("[enter] run  [e] edit  [?] explain  [q] quit ");
    }
    std::io::stderr().flush().ok();

    terminal::enable_raw_mode().ok()?;
    let result = loop {
        match event::poll(Duration::from_millis(100)) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(_) => break None,
        }
        match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                if let Some(action) = map_key(key, explicit) {
                    break Some(action);
                }
            }
            Ok(_) => {}
            Err(_) => break None,
        }
    };
    terminal::disable_raw_mode().ok();
    eprintln!();
    result
}

fn map_key(key: KeyEvent, explicit: bool) -> Option<Action> {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Enter if !explicit => Some(Action::Run),
        KeyCode::Char('y') | KeyCode::Char('Y') => Some(Action::Run),
        KeyCode::Char('e') => Some(Action::Edit),
        KeyCode::Char('?') => Some(Action::Explain),
        KeyCode::Char('q') | KeyCode::Char('n') | KeyCode::Esc => Some(Action::Quit),
        _ => None,
    }
}

pub fn edit_command(cmd: &str) -> Option<String> {
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let temp_path = env::temp_dir().join(format!("promptshell_edit_{}.sh", std::process::id()));
    fs::write(&temp_path, cmd).ok()?;
    let status = Command::new(&editor).arg(&temp_path).status();
    let edited = fs::read_to_string(&temp_path).ok();
    fs::remove_file(&temp_path).ok();
    status.ok()?;
    edited
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_head_and_tail() {
        let text: String = (1..=10).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let truncated = truncate_lines(&text, 4);
        let lines: Vec<&str> = truncated.lines().collect();

        assert_eq!(lines, vec!["1", "2", "... [6 lines truncated] ...", "9", "10"]);
    }

    #[test]
    fn test_truncate_short_output_untouched() {
        assert_eq!(truncate_lines("a\nb", 5), "a\nb");
        assert_eq!(truncate_lines("a\nb\nc", 0), "a\nb\nc");
    }

    #[test]
    fn test_enter_needs_no_explicit_confirmation() {
        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(map_key(enter, false), Some(Action::Run));
        assert_eq!(map_key(enter, true), None);

        let yes = KeyEvent::new(KeyCode::Char('y'), KeyModifiers::NONE);
        assert_eq!(map_key(yes, true), Some(Action::Run));
    }

    #[test]
    fn test_ctrl_c_quits() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map_key(ctrl_c, true), Some(Action::Quit));
    }
}
