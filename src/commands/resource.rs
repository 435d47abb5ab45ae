use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use ckan_explorer::client::download::partial_path;
use ckan_explorer::client::DownloadOptions;
use ckan_explorer::model::Resource;
use ckan_explorer::{CatalogClient, ClientError};

use super::{format_datetime, format_size, or_na};

pub async fn run(client: &CatalogClient, resource_id: &str, download: Option<&Path>) -> Result<()> {
    println!(
        "{} Getting resource '{}'...",
        "::".bright_blue(),
        resource_id.bright_white()
    );

    let resource = client.resource_show(resource_id).await?;
    print_resource(&resource);

    if let Some(dest) = download {
        println!();
        println!(
            "{} Downloading to {}",
            "::".bright_blue(),
            dest.display().to_string().bright_white()
        );
        fetch(client, &resource, dest).await?;
    }

    Ok(())
}

fn print_resource(res: &Resource) {
    println!();
    println!("{}", "Resource Details:".bright_white());
    println!("  Name: {}", res.display_name());
    println!("  Format: {}", or_na(&res.format));
    println!("  Size: {}", format_size(res.size));
    println!("  URL: {}", or_na(&res.url).bright_cyan());
    println!("  Package: {}", or_na(&res.package_id));
    println!("  Created: {}", format_datetime(res.created));
    println!("  Modified: {}", format_datetime(res.last_modified));
}

fn progress_bar(size: Option<u64>) -> Result<ProgressBar> {
    let pb = match size.filter(|s| *s > 0) {
        Some(total) => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
                    .progress_chars("#>-"),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {bytes} {msg}")?);
            pb
        }
    };
    Ok(pb)
}

async fn fetch(client: &CatalogClient, resource: &Resource, dest: &Path) -> Result<()> {
    let pb = progress_bar(resource.size)?;
    let counter = pb.clone();
    let options = DownloadOptions::new().on_progress(move |n| counter.inc(n));

    let interrupted = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // no signal handler available; never cancel
            std::future::pending::<()>().await;
        }
    };

    match client
        .resource_download_to(&resource.id, dest, interrupted, &options)
        .await
    {
        Ok(report) => {
            pb.finish_with_message("Downloaded");
            println!(
                "{} Download complete: {}",
                "::".bright_green(),
                format_size(Some(report.bytes_written))
            );
            Ok(())
        }
        Err(e @ ClientError::Incomplete { .. }) => {
            pb.abandon();
            eprintln!(
                "{} Partial file kept at {}",
                "::".bright_yellow(),
                partial_path(dest).display()
            );
            Err(e.into())
        }
        Err(e) => {
            pb.abandon();
            Err(e.into())
        }
    }
}
