pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "vaxline",
    about = "Vaxline operator CLI",
    long_about = "Operate the Vaxline SMS health assistant: preflight checks, migrations, knowledge-base seeding, config inspection, and one-off conversations.",
    after_help = "Examples:\n  vaxline doctor --json\n  vaxline seed\n  vaxline ask --from +15551234567 \"tell me about measles\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run startup preflight checks and return structured status output")]
    Start,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the built-in knowledge-base entries (idempotent upsert)")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Dialogflow credentials, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Send one message through the full pipeline and print the TwiML reply")]
    Ask {
        #[arg(long, help = "Sender identity, as a carrier would report it in `From`")]
        from: String,
        #[arg(help = "Message text")]
        text: Vec<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Start => commands::start::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Ask { from, text } => commands::ask::run(&from, &text.join(" ")),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
