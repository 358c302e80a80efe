use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use simplefeed::deploy::{self, DeployArgs, Outcome};
use simplefeed::telemetry;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    telemetry::init_tracing();
    let args = DeployArgs::parse();

    let source_root = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            error!("[!] Unable to resolve the current directory: {}", e);
            return ExitCode::from(1);
        }
    };

    match deploy::run(args, &source_root, |k| std::env::var(k).ok()).await {
        Ok(Outcome::EnvironmentSet(count)) => {
            info!("Environment set ({} variables), exiting", count);
            ExitCode::SUCCESS
        }
        Ok(Outcome::Deployed) => {
            info!("Deployment complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("[!] {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
