use std::path::Path;

use noderank_core::SchedulerPolicy;
use noderank_priorities::PriorityRegistry;

pub fn policy(check: Option<&Path>) -> anyhow::Result<()> {
    let Some(path) = check else {
        print!("{}", SchedulerPolicy::default().to_toml_string()?);
        return Ok(());
    };

    let policy = SchedulerPolicy::from_file(path)?;
    // Resolving against the registry catches names the file format cannot.
    let configs = PriorityRegistry::with_defaults().build(&policy)?;

    println!("✓ {} is valid ({} priorities enabled)", path.display(), configs.len());
    for config in &configs {
        println!("  {:<32} weight {}", config.name, config.weight);
    }
    Ok(())
}
