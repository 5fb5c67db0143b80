use clap::Parser;

use stockcast_cli::Args;

fn main() -> anyhow::Result<()> {
    stockcast_observability::init();

    let args = Args::parse();
    let summary = stockcast_cli::run(&args)?;

    println!(
        "planned {} of {} products ({} skipped, {} issues)",
        summary.products_planned,
        summary.products_seen,
        summary.products_skipped,
        summary.issues.len()
    );
    Ok(())
}
