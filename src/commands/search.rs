use anyhow::Result;
use colored::Colorize;

use ckan_explorer::model::Package;
use ckan_explorer::query::{parse_timestamp, SearchQuery, Sort};
use ckan_explorer::CatalogClient;

use super::{format_date, or_na};

pub struct SearchOptions {
    pub rows: i64,
    pub start: i64,
    pub organizations: Vec<String>,
    pub tags: Vec<String>,
    pub sort: Option<String>,
    pub facets: Vec<String>,
    pub since: Option<String>,
    pub until: Option<String>,
}

pub async fn run(client: &CatalogClient, query: &str, options: SearchOptions) -> Result<()> {
    println!(
        "{} Searching for '{}'...",
        "::".bright_blue(),
        query.bright_white()
    );
    if !options.organizations.is_empty() {
        println!(
            "{} Organization filter: {}",
            "::".bright_blue(),
            options.organizations.join(", ")
        );
    }
    if !options.tags.is_empty() {
        println!("{} Tags filter: {}", "::".bright_blue(), options.tags.join(", "));
    }

    let mut search = SearchQuery::new()
        .query(query)
        .rows(options.rows)
        .start(options.start)
        .filter("organization", options.organizations)
        .filter("tags", options.tags)
        .facets(options.facets);
    let since = options
        .since
        .as_deref()
        .map(|s| parse_timestamp("since", s))
        .transpose()?;
    let until = options
        .until
        .as_deref()
        .map(|s| parse_timestamp("until", s))
        .transpose()?;
    search = search.created_between(since, until)?;
    if let Some(sort) = options.sort {
        search = search.sort(sort.parse::<Sort>()?);
    }

    let found = client.package_search(&search).await?;

    if found.results.is_empty() {
        println!("{}", "No datasets found".yellow());
        return Ok(());
    }

    println!();
    println!(
        "{} Found {} total results, showing {}:",
        "::".bright_blue(),
        found.count.to_string().bright_green(),
        found.results.len()
    );
    println!();

    let offset = options.start.max(0) as usize;
    for (i, pkg) in found.results.iter().enumerate() {
        print_summary(offset + i + 1, pkg);
    }

    for (field, counts) in &found.facets {
        println!("{} Facet {}:", "::".bright_blue(), field.bright_white());
        let mut counts: Vec<_> = counts.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (value, count) in counts {
            println!("    {} {}", value, format!("({})", count).dimmed());
        }
    }

    Ok(())
}

pub fn print_summary(position: usize, pkg: &Package) {
    println!("{}. {}", position, pkg.display_name().bright_white());
    println!("   {}: {}", "Name".dimmed(), or_na(&pkg.name));
    println!(
        "   {}: {}",
        "Org".dimmed(),
        pkg.organization
            .as_ref()
            .map(|o| o.display_name())
            .unwrap_or("N/A")
    );
    println!("   {}: {}", "Resources".dimmed(), pkg.num_resources);
    println!(
        "   {}: {}",
        "Modified".dimmed(),
        format_date(pkg.metadata_modified)
    );
    println!();
}
