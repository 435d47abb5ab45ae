use anyhow::Result;
use colored::Colorize;

use ckan_explorer::query::ListQuery;
use ckan_explorer::CatalogClient;

use crate::Entity;

pub async fn run(client: &CatalogClient, entity: Entity, number: i64) -> Result<()> {
    let query = ListQuery::new().limit(number);

    match entity {
        Entity::Packages => {
            println!(
                "{} Listing packages (first {}):",
                "::".bright_blue(),
                number
            );
            for (i, name) in client.package_list(&query).await?.iter().enumerate() {
                println!("  {}. {}", i + 1, name.bright_white());
            }
        }
        Entity::Orgs | Entity::Groups => {
            let label = if entity == Entity::Orgs {
                "organizations"
            } else {
                "groups"
            };
            println!("{} Listing {}:", "::".bright_blue(), label);

            let query = query.all_fields(true);
            let groups = if entity == Entity::Orgs {
                client.organization_list(&query).await?
            } else {
                client.group_list(&query).await?
            };
            for (i, group) in groups.iter().enumerate() {
                match group.package_count {
                    Some(n) => println!(
                        "  {}. {} {}",
                        i + 1,
                        group.display_name().bright_white(),
                        format!("({} datasets)", n).dimmed()
                    ),
                    None => println!("  {}. {}", i + 1, group.display_name().bright_white()),
                }
            }
        }
        Entity::Tags => {
            println!("{} Listing tags:", "::".bright_blue());
            for (i, tag) in client.tag_list(&query).await?.iter().enumerate() {
                println!("  {}. {}", i + 1, tag.name.bright_white());
            }
        }
    }

    Ok(())
}
