use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

use crate::QaError;
use crate::chain::Answer;
use crate::config::Config;
use crate::session::{CleanupReport, SessionController, SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    Clear,
    Upload,
    Process,
    Ask,
    Quit,
}

impl MenuAction {
    const ALL: [Self; 5] = [
        Self::Clear,
        Self::Upload,
        Self::Process,
        Self::Ask,
        Self::Quit,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::Clear => "Clear session",
            Self::Upload => "Upload PDF",
            Self::Process => "Process PDF",
            Self::Ask => "Ask a question",
            Self::Quit => "Quit",
        }
    }

    /// The action a user most likely wants next
    fn suggested(state: SessionState) -> Self {
        match state {
            SessionState::Empty => Self::Upload,
            SessionState::Uploaded => Self::Process,
            SessionState::Indexed | SessionState::Answering => Self::Ask,
        }
    }
}

/// Run the interactive question-answering session until the user quits
#[inline]
pub async fn run_session(config: &Config) -> Result<()> {
    let mut session =
        SessionController::from_config(config).context("Failed to set up providers")?;

    let report = session.open().await?;
    print_cleanup(&report);

    eprintln!("{}", style("📄 PDF Question Answering").bold().cyan());
    eprintln!(
        "Embeddings: {} {}  Generation: {} {}",
        style(config.embedding.backend).cyan(),
        style(&config.embedding.model).cyan(),
        style(config.generation.backend).cyan(),
        style(&config.generation.model).cyan()
    );
    eprintln!();

    let result = menu_loop(&mut session).await;

    let report = session.close().await;
    print_cleanup(&report);
    result
}

async fn menu_loop(session: &mut SessionController) -> Result<()> {
    let labels: Vec<&str> = MenuAction::ALL.iter().map(|a| a.label()).collect();

    loop {
        let state = session.state();
        let default_index = MenuAction::ALL
            .iter()
            .position(|&a| a == MenuAction::suggested(state))
            .unwrap_or(0);

        let choice = Select::new()
            .with_prompt(format!("Session is {}", style(state).bold()))
            .default(default_index)
            .items(&labels)
            .interact()?;

        match MenuAction::ALL[choice] {
            MenuAction::Clear => {
                let report = session.clear().await;
                print_cleanup(&report);
                eprintln!("{}", style("✓ Session cleared").green());
            }
            MenuAction::Upload => upload_action(session)?,
            MenuAction::Process => process_action(session).await,
            MenuAction::Ask => ask_action(session).await?,
            MenuAction::Quit => return Ok(()),
        }
        eprintln!();
    }
}

fn upload_action(session: &mut SessionController) -> Result<()> {
    let path: String = Input::new()
        .with_prompt("Path to a PDF file")
        .validate_with(|input: &String| -> Result<(), String> {
            let path = PathBuf::from(input.trim());
            if !is_pdf_path(&path) {
                Err("Only .pdf files can be uploaded".to_string())
            } else if !path.is_file() {
                Err(format!("{} is not a file", path.display()))
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let path = PathBuf::from(path.trim());
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            report_failure(&QaError::Io(e));
            return Ok(());
        }
    };
    let file_name = path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    );

    match session.upload(&file_name, &bytes) {
        Ok(()) => eprintln!(
            "{} {}",
            style("✓ Uploaded").green(),
            style(&file_name).cyan()
        ),
        Err(e) => report_failure(&e),
    }
    Ok(())
}

async fn process_action(session: &mut SessionController) {
    let name = session.upload_name().unwrap_or("document").to_string();
    let progress = spinner(format!("Indexing {}...", name));
    let result = session.process().await;
    progress.finish_and_clear();

    match result {
        Ok(pages) => {
            info!("Processed {} into {} pages", name, pages);
            eprintln!(
                "{} {} ({} pages indexed)",
                style("✓ Processed").green(),
                style(&name).cyan(),
                pages
            );
        }
        Err(e) => report_failure(&e),
    }
}

async fn ask_action(session: &mut SessionController) -> Result<()> {
    if session.indexed_pages().is_none() {
        report_failure(&QaError::IndexUnavailable(
            "process a PDF before asking questions".to_string(),
        ));
        return Ok(());
    }

    eprintln!("{}", style("Ask questions, or press Enter on an empty line to return.").dim());
    loop {
        let question: String = Input::new()
            .with_prompt("Question")
            .allow_empty(true)
            .interact_text()?;
        if question.trim().is_empty() {
            return Ok(());
        }

        let progress = spinner("Thinking...".to_string());
        let result = session.ask(&question).await;
        progress.finish_and_clear();

        match result {
            Ok(answer) => print_answer(&answer),
            Err(e) => report_failure(&e),
        }
    }
}

fn print_answer(answer: &Answer) {
    eprintln!();
    println!("{}", answer.answer);
    eprintln!();

    if !answer.has_context() {
        eprintln!(
            "{}",
            style("⚠ No relevant pages were found; the answer is not grounded in the document.")
                .yellow()
        );
        return;
    }

    eprintln!("{}", style("Sources:").bold().yellow());
    for line in source_lines(answer) {
        eprintln!("  {}", line);
    }
}

fn source_lines(answer: &Answer) -> Vec<String> {
    answer
        .sources
        .iter()
        .map(|source| {
            format!(
                "{} page {} (score {:.3})",
                source.source, source.page, source.score
            )
        })
        .collect()
}

fn print_cleanup(report: &CleanupReport) {
    for failure in &report.failures {
        eprintln!("{} {}", style("⚠ Cleanup:").yellow(), failure);
    }
}

fn report_failure(err: &QaError) {
    error!("Action failed: {}", err);
    eprintln!("{} {}", style("✗").red().bold(), style(err).red());
}

fn spinner(message: String) -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress.set_message(message);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Whether `path` names a PDF, judged by its extension in any case
fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}
