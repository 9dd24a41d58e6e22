use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

const LONG_ABOUT: &str = r#"agent-keeper tracks externally spawned coding-agent processes and
computes auto-resume timestamps after session rate limits.

WORKFLOW:
    1. Snapshot the process table before launching an agent: agent-keeper ps > before.json
    2. Launch the agent from its host application
    3. Re-identify it: agent-keeper detect --before before.json --cwd "$PWD"
    4. Inspect tracked records: agent-keeper pids list
    5. When a session hits its limit, compute when to resume:
       agent-keeper resume-at 7pm

EXAMPLES:
    agent-keeper ps > before.json
    agent-keeper detect --before before.json --cwd /work/my-project
    agent-keeper pids list
    agent-keeper alive 48213
    agent-keeper resume-at 11pm"#;

#[derive(Parser)]
#[command(name = "agent-keeper")]
#[command(author, version)]
#[command(about = "Track coding-agent session processes and schedule rate-limit resumes")]
#[command(long_about = LONG_ABOUT)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// State directory for persisted files (default: $AGENT_KEEPER_STATE_DIR
    /// or ~/.agent-keeper)
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect or edit the tracked process records
    Pids {
        #[command(subcommand)]
        command: PidsCommand,
    },

    /// Probe whether a pid is still running (exit 0 = alive, 1 = gone)
    Alive {
        /// OS process id to probe
        pid: u32,
    },

    /// Snapshot the current process table as JSON
    Ps,

    /// Re-identify a freshly spawned agent process against a saved snapshot
    Detect {
        /// JSON snapshot taken before the spawn (output of `agent-keeper ps`)
        #[arg(long)]
        before: PathBuf,

        /// JSON snapshot taken after the spawn (default: the live table)
        #[arg(long)]
        after: Option<PathBuf>,

        /// Working directory the agent was launched from
        #[arg(long)]
        cwd: String,

        /// Substring the agent's command line must contain
        #[arg(long, env = "AGENT_KEEPER_COMMAND_PATTERN", default_value = "claude")]
        pattern: String,
    },

    /// Compute the auto-resume timestamp for a reset token like "7pm"
    ResumeAt {
        /// Reset hour token from the rate-limit notice, e.g. 7pm, 12am
        token: String,

        /// Reference instant as RFC 3339 (default: the current time)
        #[arg(long)]
        now: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PidsCommand {
    /// List every tracked record as JSON
    List,

    /// Remove one record by its session process id
    Remove {
        /// Logical id the record was saved under
        session_process_id: String,
    },

    /// Drop all tracked records
    Clear,
}
