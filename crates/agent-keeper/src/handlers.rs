use std::error::Error;
use std::path::Path;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;

use agent_keeper_daemon::DetectionHint;
use agent_keeper_daemon::FilePidRepository;
use agent_keeper_daemon::KeeperConfig;
use agent_keeper_daemon::PidStore;
use agent_keeper_daemon::ProcessDetector;
use agent_keeper_daemon::ProcessEntry;
use agent_keeper_daemon::PsProcessDetector;
use agent_keeper_daemon::calculate_resume_datetime;
use agent_keeper_daemon::detect_agent_pid;

use crate::commands::Cli;
use crate::commands::Commands;
use crate::commands::PidsCommand;

type HandlerResult = Result<(), Box<dyn Error>>;

/// Runs the parsed command and returns the process exit code.
pub async fn dispatch(cli: Cli) -> i32 {
    let mut config = KeeperConfig::from_env();
    if let Some(dir) = cli.state_dir {
        config = config.with_state_dir(dir);
    }

    let result = match cli.command {
        Commands::Pids { command } => handle_pids(&config, command).await,
        Commands::Alive { pid } => return handle_alive(pid).await,
        Commands::Ps => handle_ps().await,
        Commands::Detect {
            before,
            after,
            cwd,
            pattern,
        } => handle_detect(&before, after.as_deref(), &cwd, &pattern).await,
        Commands::ResumeAt { token, now } => handle_resume_at(&token, now.as_deref()),
    };

    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

async fn handle_pids(config: &KeeperConfig, command: PidsCommand) -> HandlerResult {
    let repo = FilePidRepository::new(config.pid_file_path());

    match command {
        PidsCommand::List => {
            let records = repo.get_all_pids().await;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        PidsCommand::Remove { session_process_id } => {
            match repo.remove_pid(&session_process_id).await? {
                Some(record) => println!(
                    "removed pid {} for session process {}",
                    record.pid, record.session_process_id
                ),
                None => println!("no record for session process {session_process_id}"),
            }
        }
        PidsCommand::Clear => {
            repo.clear_all_pids().await?;
            println!("cleared");
        }
    }

    Ok(())
}

async fn handle_alive(pid: u32) -> i32 {
    if PsProcessDetector.is_alive(pid).await {
        println!("alive");
        0
    } else {
        println!("not running");
        1
    }
}

async fn handle_ps() -> HandlerResult {
    let list = PsProcessDetector.current_process_list().await?;
    println!("{}", serde_json::to_string_pretty(&list)?);
    Ok(())
}

async fn handle_detect(
    before: &Path,
    after: Option<&Path>,
    cwd: &str,
    pattern: &str,
) -> HandlerResult {
    let before_list = read_snapshot(before).await?;
    let after = match after {
        Some(path) => read_snapshot(path).await?,
        None => PsProcessDetector.current_process_list().await?,
    };
    let hint = DetectionHint {
        cwd,
        command_pattern: pattern,
    };

    match detect_agent_pid(&before_list, &after, &hint) {
        Some(pid) => {
            println!("{pid}");
            Ok(())
        }
        None => Err("no new agent process found".into()),
    }
}

async fn read_snapshot(path: &Path) -> Result<Vec<ProcessEntry>, Box<dyn Error>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("cannot read snapshot {}: {e}", path.display()))?;
    let entries =
        serde_json::from_str(&raw).map_err(|e| format!("malformed snapshot: {e}"))?;
    Ok(entries)
}

fn handle_resume_at(token: &str, now: Option<&str>) -> HandlerResult {
    let now = match now {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map_err(|e| format!("invalid --now value: {e}"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let resume = calculate_resume_datetime(token, now)
        .ok_or_else(|| format!("unrecognized reset token: {token:?}"))?;

    println!("{}", resume.to_rfc3339_opts(SecondsFormat::Millis, true));
    Ok(())
}
