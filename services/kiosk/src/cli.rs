use crate::{scan, server};
use academy_desk::error::AppError;
use academy_desk::intake::{InputMode, IntakeChannel};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Academy Desk Kiosk",
    about = "Front-desk card intake for attendance scanning and assistant login",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Read card presentations from stdin, one per line
    Scan(ScanArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct ScanArgs {
    /// Intake channel: attendance or assistant-login
    #[arg(long, value_parser = crate::infra::parse_channel)]
    pub(crate) channel: IntakeChannel,
    /// Override the channel's input mode (scanner or manual)
    #[arg(long, value_parser = crate::infra::parse_mode)]
    pub(crate) mode: Option<InputMode>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Scan(args) => scan::run(args).await,
    }
}
