use std::path::Path;

use fnstage_core::config::CONFIG_FILE;

const CONFIG_TEMPLATE: &str = r#"[project]
# gcp_project_id = "your-project-id"
# region = "us-central1"

[defaults]
runtime = "nodejs20"
# memory = "256MB"
# timeout = "60s"
# gen2 = false

[deploy]
# max_parallel = 4
# fail_fast = false

[cloud_build]
# builder_image = "gcr.io/google.com/cloudsdktool/cloud-sdk"
# substitutions = { _TIER = "standard" }

[[functions]]
name = "func1"
entry_point = "helloWorld"
source = "functions/func1"
"#;

const ENV_TEMPLATE: &str = "FNSTAGE_PREFIX=dev\n# RUST_LOG=fnstage=debug\n";

/// Initialize fnstage in the current directory.
pub async fn init_project() -> anyhow::Result<()> {
    let mut created = Vec::new();

    let config_path = Path::new(CONFIG_FILE);
    if config_path.exists() {
        eprintln!("{CONFIG_FILE} already exists, skipping");
    } else {
        std::fs::write(config_path, CONFIG_TEMPLATE)?;
        created.push(CONFIG_FILE);
    }

    let env_example_path = Path::new(".env.example");
    if env_example_path.exists() {
        eprintln!(".env.example already exists, skipping");
    } else {
        std::fs::write(env_example_path, ENV_TEMPLATE)?;
        created.push(".env.example");
    }

    if created.is_empty() {
        println!("Nothing to create, already initialized.");
    } else {
        for f in &created {
            println!("Created {f}");
        }
    }

    println!();
    println!("Next steps:");
    println!();
    println!("  1. Set [project].gcp_project_id and declare your functions in {CONFIG_FILE}");
    println!();
    println!("  2. Pick a prefix for this checkout:");
    println!("     cp .env.example .env");
    println!();
    println!("  3. Check your GCP setup:");
    println!("     fnstage doctor");
    println!();
    println!("  4. Deploy, and tear down when done:");
    println!("     fnstage deploy");
    println!("     fnstage delete");
    println!();
    println!("Add .fnstage-bundle/ and .fnstage/generated/ to .gitignore.");

    Ok(())
}
