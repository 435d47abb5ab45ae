use anyhow::Result;
use colored::Colorize;

use ckan_explorer::CatalogClient;

pub async fn run(client: &CatalogClient) -> Result<()> {
    println!("{} Portal statistics", "::".bright_blue());

    let stats = client.statistics().await?;
    println!();
    println!(
        "  {}: {}",
        "Total Packages".bright_white(),
        stats.total_packages.to_string().bright_green()
    );
    println!(
        "  {}: {}",
        "Total Organizations".bright_white(),
        stats.total_organizations.to_string().bright_green()
    );
    println!(
        "  {}: {}",
        "Total Tags".bright_white(),
        stats.total_tags.to_string().bright_green()
    );
    println!(
        "  {}: {}",
        "CKAN Version".bright_white(),
        super::or_na(&stats.ckan_version)
    );

    Ok(())
}
