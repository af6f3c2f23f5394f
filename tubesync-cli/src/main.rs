use clap::Parser;
use std::error::Error;

mod cli;

use cli::{handle_command, Args};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    handle_command(args).await
}
