pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "attendance-admin")]
#[command(about = "Operator tasks for the school attendance service")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply the database schema (idempotent)")]
    Migrate,

    #[command(about = "Create the demo accounts and school if missing")]
    Seed,

    #[command(about = "Issue a bearer token for an existing account")]
    Token {
        #[arg(long, help = "Account email")]
        email: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::database::migrate(output_format).await,
        Commands::Seed => commands::database::seed(output_format).await,
        Commands::Token { email } => commands::token::issue(&email, output_format).await,
    }
}
