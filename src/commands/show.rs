use anyhow::Result;
use colored::Colorize;

use ckan_explorer::model::Package;
use ckan_explorer::query::ShowQuery;
use ckan_explorer::CatalogClient;

use super::{format_date, format_size, or_na, truncate};

pub async fn run(client: &CatalogClient, package_id: &str, detailed: bool) -> Result<()> {
    println!(
        "{} Fetching details for '{}'...",
        "::".bright_blue(),
        package_id.bright_white()
    );

    let query = ShowQuery::new(package_id).full_details(detailed);
    let pkg = match client.package_show(&query).await {
        Ok(pkg) => pkg,
        Err(e) if e.is_not_found() => {
            println!("{} Package '{}' not found", "::".bright_yellow(), package_id);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    print_package(&pkg, detailed);
    Ok(())
}

fn field(label: &str, value: &str) {
    println!("{}: {}", label.bright_white(), value);
}

pub fn print_package(pkg: &Package, detailed: bool) {
    let rule = "=".repeat(60);
    println!();
    println!("{}", rule.bright_blue());
    println!("{} {}", "Package:".bright_blue(), pkg.display_name().bright_white());
    println!("{}", rule.bright_blue());

    field("ID/Name", or_na(&pkg.name));
    field("Title", or_na(&pkg.title));
    field(
        "Organization",
        pkg.organization
            .as_ref()
            .map(|o| o.display_name())
            .unwrap_or("N/A"),
    );
    field("Author", or_na(&pkg.author));
    field("Maintainer", or_na(&pkg.maintainer));
    field("License", or_na(&pkg.license));
    field("State", or_na(&pkg.state));
    if pkg.metadata_created.is_some() {
        field("Created", &format_date(pkg.metadata_created));
    }
    if pkg.metadata_modified.is_some() {
        field("Modified", &format_date(pkg.metadata_modified));
    }

    if !pkg.notes.trim().is_empty() {
        println!();
        println!("{}", "Description:".bright_white());
        println!("  {}", truncate(pkg.notes.trim(), 500));
    }

    if !pkg.tags.is_empty() {
        println!();
        field("Tags", &pkg.tag_names().join(", "));
    }

    if !pkg.resources.is_empty() {
        println!();
        println!(
            "{} Resources ({} files):",
            "::".bright_blue(),
            pkg.resources.len()
        );
        println!("{}", "-".repeat(40).dimmed());
        for (i, res) in pkg.resources.iter().enumerate() {
            println!();
            println!("  {} {}:", "Resource".bright_white(), i + 1);
            println!("    Name: {}", res.display_name());
            println!("    Format: {}", or_na(&res.format));
            println!("    Size: {}", format_size(res.size));
            println!("    URL: {}", or_na(&res.url).bright_cyan());
            if !res.description.trim().is_empty() {
                println!("    Description: {}", truncate(res.description.trim(), 200));
            }
            if detailed {
                println!("    ID: {}", or_na(&res.id));
                println!("    Created: {}", format_date(res.created));
                println!("    Modified: {}", format_date(res.last_modified));
            }
        }
    }

    if let Some(extras) = pkg.extras.as_ref().filter(|e| detailed && !e.is_empty()) {
        println!();
        println!("{} Custom fields:", "::".bright_blue());
        println!("{}", "-".repeat(40).dimmed());
        for (key, value) in extras {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            println!("  {}: {}", key, value);
        }
    }
}
