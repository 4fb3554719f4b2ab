//! Version command implementation.

use console::style;
use qmesh_ir::Component;

/// Workspace crates, as recorded in their manifests.
pub fn components() -> [Component; 4] {
    [
        qmesh_ir::COMPONENT,
        qmesh_hal::COMPONENT,
        qmesh_adapter_sim::COMPONENT,
        Component {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
        },
    ]
}

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - distributed quantum circuit batches",
        style("qmesh").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    let components = components();
    let width = components.iter().map(|c| c.name.len()).max().unwrap_or(0);
    for component in &components {
        println!(
            "  {:<width$}  {:<7} {}",
            component.name,
            component.version,
            component.description
        );
    }
    println!();
    println!(
        "Repository: {}",
        style(env!("CARGO_PKG_REPOSITORY")).underlined()
    );
    println!("License:    {}", style(env!("CARGO_PKG_LICENSE")).dim());
}
