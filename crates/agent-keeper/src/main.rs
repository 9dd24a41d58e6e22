use clap::Parser;

use agent_keeper::commands::Cli;
use agent_keeper::handlers;
use agent_keeper::telemetry;

fn main() {
    let cli = Cli::parse();
    let _guard = telemetry::init_tracing("warn");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {e}");
            std::process::exit(74); // EX_IOERR
        }
    };

    let code = runtime.block_on(handlers::dispatch(cli));
    std::process::exit(code);
}
