use anyhow::Result;
use clap::Parser;
use is_it_fake::cli::{self, Cli};
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::run(&cli)
}
