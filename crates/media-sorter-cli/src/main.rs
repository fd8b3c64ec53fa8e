use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use media_sorter_core::{RunConfig, SortAction};

#[derive(Parser)]
#[command(name = "media-sorter", version, about = "Sort photos and videos into YYYY-MM folders by capture date")]
struct Cli {
    /// Folder to sort; results go to <SOURCE>/sorted_output
    source: PathBuf,

    /// Copy files, or move them out of the source folder
    #[arg(short, long, value_enum, default_value_t = SortAction::Copy)]
    action: SortAction,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "media_sorter=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let t_total = std::time::Instant::now();

    let handle = media_sorter_core::spawn_run(RunConfig::new(cli.source, cli.action))?;
    for event in handle.events() {
        println!("{event}");
    }

    let report = handle
        .join()
        .map_err(|_| anyhow::anyhow!("sorting thread panicked"))?
        .context("sorting failed")?;

    tracing::info!(
        "{} media files, {} sorted, {} quarantined, {} skipped ({:.2}s)",
        report.files_seen,
        report.transferred,
        report.quarantined,
        report.failed,
        t_total.elapsed().as_secs_f64()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let cli = Cli::try_parse_from(["media-sorter", "/photos"]).unwrap();
        assert_eq!(cli.source, PathBuf::from("/photos"));
        assert_eq!(cli.action, SortAction::Copy);

        let cli = Cli::try_parse_from(["media-sorter", "/photos", "--action", "move"]).unwrap();
        assert_eq!(cli.action, SortAction::Move);

        assert!(Cli::try_parse_from(["media-sorter", "/photos", "--action", "link"]).is_err());
        assert!(Cli::try_parse_from(["media-sorter"]).is_err());
    }
}
