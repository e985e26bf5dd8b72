use clap::Parser;
use tracing_subscriber::EnvFilter;

use sky_overlay::cli::{Cli, Commands};
use sky_overlay::commands::{read_fits, region_stats, render_overlay, RenderRequest};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Render {
            optical,
            ra,
            dec,
            size,
            lofar,
            first,
            vlass,
            catalogue,
            positions,
            region,
            config,
            output,
            retries,
            style,
        } => {
            render_overlay(RenderRequest {
                optical,
                ra,
                dec,
                size,
                lofar,
                first,
                vlass,
                catalogue,
                positions,
                region,
                config,
                output,
                retries,
                style,
            })?;
        }
        Commands::Noise {
            file,
            ra,
            dec,
            size,
            channel,
            format,
        } => {
            region_stats(&file, ra, dec, size, channel, &format)?;
        }
        Commands::ReadFits {
            path,
            all_keywords,
            format,
        } => {
            read_fits(&path, all_keywords, &format)?;
        }
    }

    Ok(())
}
