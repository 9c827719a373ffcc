use std::fmt;
use std::process::ExitCode;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use exam_api::HttpConfig;
use exam_core::model::{Credentials, ExamId, Question};
use services::{ActivityKind, AppServices, ExamSessionRuntime, SessionEvent};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    MissingCredentials,
    MissingExamId,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::MissingCredentials => {
                write!(f, "set EXAM_API_EMAIL and EXAM_API_PASSWORD or pass --email/--password")
            }
            ArgsError::MissingExamId => write!(f, "--exam-id is required"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- exams [--email <e>] [--password <p>]");
    eprintln!("  cargo run -p app -- take  --exam-id <id> [--email <e>] [--password <p>]");
    eprintln!("  cargo run -p app -- board --exam-id <id> [--email <e>] [--password <p>]");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_API_BASE_URL (default http://localhost:5000/api)");
    eprintln!("  EXAM_API_EMAIL, EXAM_API_PASSWORD");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Exams,
    Take,
    Board,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "exams" => Some(Self::Exams),
            "take" => Some(Self::Take),
            "board" => Some(Self::Board),
            _ => None,
        }
    }
}

struct Args {
    credentials: Credentials,
    exam_id: Option<ExamId>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut email = std::env::var("EXAM_API_EMAIL").ok();
        let mut password = std::env::var("EXAM_API_PASSWORD").ok();
        let mut exam_id = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--email" => email = Some(require_value(args, "--email")?),
                "--password" => password = Some(require_value(args, "--password")?),
                "--exam-id" => exam_id = Some(ExamId::new(require_value(args, "--exam-id")?)),
                other => return Err(ArgsError::UnknownArg(other.to_owned())),
            }
        }

        let (Some(email), Some(password)) = (email, password) else {
            return Err(ArgsError::MissingCredentials);
        };
        Ok(Self {
            credentials: Credentials { email, password },
            exam_id,
        })
    }

    fn exam_id(&self) -> Result<ExamId, ArgsError> {
        self.exam_id.clone().ok_or(ArgsError::MissingExamId)
    }
}

fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn print_question(questions: &[Question], index: usize) {
    let Some(question) = questions.get(index) else {
        return;
    };
    println!("Question {}/{}: {}", index + 1, questions.len(), question.text);
    for (i, option) in question.options.iter().enumerate() {
        println!("  [{i}] {option}");
    }
}

async fn list_exams(services: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let available = services.catalog().available_exams().await?;
    if available.is_empty() {
        println!("No exams available.");
    } else {
        println!("Available exams:");
        for exam in &available {
            println!(
                "  {}  {} ({} min, {} questions)",
                exam.id, exam.name, exam.duration_minutes, exam.question_count
            );
        }
    }

    let completed = services.catalog().completed_exams().await?;
    if !completed.is_empty() {
        println!("Completed exams:");
        for exam in &completed {
            let note = if exam.forced_submission { " [forced]" } else { "" };
            println!("  {}  {:.1}%{note}", exam.exam_name, exam.score);
        }
    }
    Ok(())
}

async fn show_board(
    services: &AppServices,
    exam_id: &ExamId,
) -> Result<(), Box<dyn std::error::Error>> {
    let students = services.proctor().active_students(exam_id).await?;
    if students.is_empty() {
        println!("No students currently taking {exam_id}.");
        return Ok(());
    }
    for student in &students {
        println!(
            "  {}  time left {}  warnings {}  question {}",
            student.student_name,
            format_clock(student.time_left_seconds),
            student.warning_count,
            student.current_question + 1
        );
    }
    Ok(())
}

/// Drives one attempt from the terminal. Stdin commands stand in for the
/// UI actions, `blur` and `hide` for the browser's visibility and focus
/// signals.
async fn take_exam(
    services: &AppServices,
    exam_id: ExamId,
) -> Result<(), Box<dyn std::error::Error>> {
    let (runtime, mut events) = services.start_exam(exam_id).await?;
    let questions = runtime.questions();
    println!(
        "Started. {} to go. Commands: show, a <option>, next, prev, goto <n>, blur, hide, submit, quit",
        format_clock(runtime.time_left_seconds())
    );
    print_question(&questions, runtime.current_question());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    SessionEvent::Tick { seconds_left } => {
                        if seconds_left % 60 == 0 || seconds_left <= 10 {
                            println!("time left {}", format_clock(seconds_left));
                        }
                    }
                    SessionEvent::WarningRaised { message, count } => {
                        println!("WARNING: {message} ({count}/3)");
                    }
                    SessionEvent::WarningDismissed => {}
                    SessionEvent::Submitted { score, forced } => {
                        if forced {
                            println!("Submitted after repeated violations. Score: {score:.1}%");
                        } else {
                            println!("Submitted. Score: {score:.1}%");
                        }
                        break;
                    }
                    SessionEvent::SubmissionFailed { message } => {
                        println!("Submission could not be confirmed: {message}");
                        break;
                    }
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                // after a submit the loop keeps draining events until the
                // submission result lands
                match handle_command(&runtime, &questions, line.trim()).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(err) => println!("{err}"),
                }
            }
        }
    }

    runtime.close().await;
    Ok(())
}

/// Returns `Ok(false)` when the attempt should stop accepting input.
async fn handle_command(
    runtime: &ExamSessionRuntime,
    questions: &[Question],
    line: &str,
) -> Result<bool, Box<dyn std::error::Error>> {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("show") => print_question(questions, runtime.current_question()),
        Some("a") => {
            let option: usize = parts.next().unwrap_or_default().parse()?;
            let index = runtime.current_question();
            if let Some(question) = questions.get(index) {
                runtime.select_answer(&question.id, option)?;
                println!("Answer recorded.");
            }
        }
        Some("next") => {
            let index = runtime.next_question()?;
            print_question(questions, index);
        }
        Some("prev") => {
            let index = runtime.previous_question()?;
            print_question(questions, index);
        }
        Some("goto") => {
            let index: usize = parts.next().unwrap_or_default().parse()?;
            runtime.goto_question(index.saturating_sub(1))?;
            print_question(questions, runtime.current_question());
        }
        Some("blur") => runtime.report_activity(ActivityKind::AppSwitch).await,
        Some("hide") => runtime.report_activity(ActivityKind::TabSwitch).await,
        Some("submit") => {
            runtime.submit().await?;
        }
        Some("quit") => {
            println!("Attempt abandoned.");
            return Ok(false);
        }
        Some(other) => println!("unknown command: {other}"),
        None => {}
    }
    Ok(true)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let Some(command) = args.next().as_deref().and_then(Command::from_arg) else {
        print_usage();
        return Err(Box::new(ArgsError::UnknownArg("missing command".into())));
    };
    let parsed = Args::parse(&mut args)?;

    let services = AppServices::http(HttpConfig::from_env());
    let user = services.auth().login(&parsed.credentials).await?;
    info!(user = %user.email, role = %user.role, "logged in");

    match command {
        Command::Exams => list_exams(&services).await,
        Command::Take => take_exam(&services, parsed.exam_id()?).await,
        Command::Board => show_board(&services, &parsed.exam_id()?).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
