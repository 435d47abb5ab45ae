use anyhow::Result;
use colored::Colorize;

use ckan_explorer::model::Organization;
use ckan_explorer::query::ShowQuery;
use ckan_explorer::{CatalogClient, ClientError};

use super::{format_date, or_na, truncate};

async fn fetch(client: &CatalogClient, org_id: &str) -> Result<Option<Organization>, ClientError> {
    let query = ShowQuery::new(org_id).include_datasets(true);
    match client.organization_show(&query).await {
        Ok(org) => Ok(Some(org)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Organization details followed by its dataset titles
pub async fn run(client: &CatalogClient, org_id: &str) -> Result<()> {
    println!(
        "{} Organization '{}'...",
        "::".bright_blue(),
        org_id.bright_white()
    );

    let Some(org) = fetch(client, org_id).await? else {
        println!("{} Organization '{}' not found", "::".bright_yellow(), org_id);
        return Ok(());
    };

    println!();
    println!("{}: {}", "Organization".bright_white(), org.display_name());
    println!("{}: {}", "Name".bright_white(), or_na(&org.name));
    println!(
        "{}: {}",
        "Description".bright_white(),
        or_na(&truncate(org.description.trim(), 200))
    );
    println!("{}: {}", "Created".bright_white(), format_date(org.created));
    println!(
        "{}: {}",
        "Package Count".bright_white(),
        org.package_count.unwrap_or(0)
    );

    let packages = org.packages.unwrap_or_default();
    if !packages.is_empty() {
        println!();
        println!("{} Datasets ({}):", "::".bright_blue(), packages.len());
        for (i, pkg) in packages.iter().enumerate() {
            println!("  {}. {}", i + 1, pkg.display_name());
        }
    }

    Ok(())
}

/// Datasets of one organization, one summary block each
pub async fn datasets(client: &CatalogClient, org_id: &str) -> Result<()> {
    println!(
        "{} Your datasets (org: {}):",
        "::".bright_blue(),
        org_id.bright_white()
    );

    let Some(org) = fetch(client, org_id).await? else {
        println!(
            "{} Organization '{}' not found or no access",
            "::".bright_yellow(),
            org_id
        );
        return Ok(());
    };

    let packages = org.packages.unwrap_or_default();
    if packages.is_empty() {
        println!("{}", "No datasets found in this organization".yellow());
        return Ok(());
    }

    println!();
    println!("Found {} datasets in '{}':", packages.len(), org_id);
    println!();
    for (i, pkg) in packages.iter().enumerate() {
        super::search::print_summary(i + 1, pkg);
    }

    Ok(())
}
