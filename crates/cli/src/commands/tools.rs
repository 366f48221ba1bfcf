//! `clawloop tools` — Inspect the built-in tool registry.

use super::CliResult;

pub fn run(category: Option<&str>, describe: bool) -> CliResult {
    let registry = clawloop_tools::default_registry();
    let stats = registry.stats();

    println!("🧰 {} tools registered", stats.count);
    for category in &stats.categories {
        let count = registry.list_by_category(category).len();
        println!("   {category:<8} {count}");
    }
    println!();

    let tools = match category {
        Some(category) => registry.list_by_category(category),
        None => registry.list_tools(),
    };
    if tools.is_empty() {
        println!("   (no tools match)");
    }
    for tool in tools {
        if describe {
            println!("{}", tool.describe());
        } else {
            println!("   {:<12} {}", tool.name(), tool.description());
        }
    }
    Ok(())
}
