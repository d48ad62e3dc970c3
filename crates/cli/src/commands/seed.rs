use crate::commands::{with_database, CommandResult};
use hrflow_db::{DemoSeedDataset, SeedResult};

pub fn run() -> CommandResult {
    let result = with_database("seed", |_config, pool| async move {
        let seed_result = DemoSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
        if !verification.all_present {
            return Err(("seed_verification", failed_checks_message(&verification.checks), 6u8));
        }
        Ok(seed_result)
    });

    match result {
        Ok(seed_result) => CommandResult::success("seed", render(&seed_result)),
        Err(failure) => failure,
    }
}

fn render(seed_result: &SeedResult) -> String {
    let chains: Vec<String> = seed_result
        .chains_seeded
        .iter()
        .map(|chain| {
            format!("  - {}: {} level(s) ({})", chain.request_type, chain.levels, chain.description)
        })
        .collect();
    format!(
        "demo dataset loaded: {} departments, {} projects, {} role holders, approval chains:\n{}",
        seed_result.departments,
        seed_result.projects,
        seed_result.role_holders,
        chains.join("\n")
    )
}

fn failed_checks_message(checks: &[(&'static str, bool)]) -> String {
    let failed_checks =
        checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
