use crate::commands::{with_database, CommandResult};
use hrflow_core::workflow::{ApprovalChainCatalog, ApprovalChainStep};
use hrflow_db::repositories::SqlApprovalChainRepository;

pub fn run() -> CommandResult {
    let result = with_database("chains", |_config, pool| async move {
        SqlApprovalChainRepository::new(pool)
            .load_catalog()
            .await
            .map_err(|error| ("catalog_load", error.to_string(), 6u8))
    });

    match result {
        Ok(catalog) => CommandResult::success("chains", render(&catalog)),
        Err(failure) => failure,
    }
}

fn render(catalog: &ApprovalChainCatalog) -> String {
    let mut lines = Vec::new();
    for request_type in catalog.request_types() {
        let steps = catalog.steps(request_type);
        if steps.is_empty() {
            lines.push(format!("{request_type}: auto-approve (no levels)"));
            continue;
        }
        let levels: Vec<String> = steps.iter().map(render_step).collect();
        lines.push(format!("{request_type}: {}", levels.join(" -> ")));
    }

    if lines.is_empty() {
        return "no approval chains configured".to_string();
    }
    lines.join("\n")
}

fn render_step(step: &ApprovalChainStep) -> String {
    let rule = match step.rule.param() {
        Some(param) => format!("{}({param})", step.rule.kind()),
        None => step.rule.kind().to_string(),
    };
    match &step.level_name {
        Some(name) => format!("{}. {name} [{rule}]", step.level),
        None => format!("{}. [{rule}]", step.level),
    }
}
