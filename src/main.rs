use agentic_browser::actions::ActionRegistry;
use agentic_browser::agent::NextActionPlanner;
use agentic_browser::context::AgentConfig;
use agentic_browser::llm::build_client;
use agentic_browser::protocol::parse_response;
use agentic_browser::telemetry;
use anyhow::{Context, Result, bail};
use colored::Colorize;
use std::env;
use std::fs;

fn main() -> Result<()> {
    telemetry::init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 2 {
        bail!("usage: agentic-browser <instructions> <page-file> [registry.json]");
    }
    let instructions = &args[0];
    let page = fs::read_to_string(&args[1])
        .with_context(|| format!("failed to read page content from {}", args[1]))?;
    let registry = match args.get(2) {
        Some(path) => ActionRegistry::load(path)?,
        None => ActionRegistry::default(),
    };

    let config = AgentConfig::from_env();
    let client = build_client(&config)?;
    let planner = NextActionPlanner::new(config, registry, client);

    let mut notify = |message: &str| eprintln!("{} {}", "retrying:".yellow(), message);
    let Some(next) = planner.determine_next_action(instructions, &[], &page, &mut notify)? else {
        bail!("no API key configured; set AGENT_API_KEY");
    };

    match parse_response(&next.response, planner.registry()) {
        Ok(parsed) => {
            println!("{} {}", "--- THOUGHT ---".cyan().bold(), parsed.thought);
            println!("{} {}", "--- ACTION ---".green().bold(), parsed.action);
            println!("{:#?}", parsed.parsed_action);
            println!("{} {} tokens", "--- USAGE ---".dimmed(), next.usage.total_tokens);
        }
        Err(err) => {
            println!("{} {}", "--- INVALID RESPONSE ---".red().bold(), err);
            println!("{}", next.response);
        }
    }

    Ok(())
}
