//! Administrative command handlers.
//!
//! These inspect the application without serving requests: the stage order
//! for the configured environment, the service registrations, and the routes.

use crate::config::Config;
use crate::controllers::ControllerRegistry;
use crate::error::AppResult;
use crate::pages::PageRegistry;
use crate::pipeline;
use crate::routing::{RoutePattern, DEFAULT_ROUTE};
use crate::startup::Startup;
use clap::Subcommand;

/// Administrative commands available via CLI.
#[derive(Subcommand, Debug)]
pub enum AdminCommands {
    /// Print the request pipeline stages in order
    Pipeline,

    /// Print service registrations and their lifetimes
    Services,

    /// Print the conventional route, controller actions and page routes
    Routes,
}

/// Run an administrative command with the given configuration.
pub fn run(config: Config, admin_command: AdminCommands) -> AppResult<()> {
    let output = match admin_command {
        AdminCommands::Pipeline => pipeline_report(&config),
        AdminCommands::Services => services_report(config),
        AdminCommands::Routes => routes_report()?,
    };
    print!("{}", output);
    Ok(())
}

fn pipeline_report(config: &Config) -> String {
    let mut out = format!("\n=== Pipeline ({}) ===\n", config.environment.name);
    for (position, stage) in pipeline::stages_for(&config.environment).iter().enumerate() {
        out.push_str(&format!("{:>2}. {}\n", position + 1, stage));
    }
    if config.web.https_port.is_none() {
        out.push_str("\nHTTPS_PORT is not set; HttpsRedirection passes requests through.\n");
    }
    out
}

fn services_report(config: Config) -> String {
    let startup = Startup::new(config);
    let mut out = String::from("\n=== Services ===\n");
    for descriptor in startup.services().descriptors() {
        out.push_str(&format!(
            "{:<24} {:<32} {}\n",
            descriptor.service, descriptor.implementation, descriptor.lifetime
        ));
    }
    out
}

fn routes_report() -> AppResult<String> {
    let pattern = RoutePattern::parse(DEFAULT_ROUTE)?;
    let mut out = format!("\n=== Routes ===\nConventional: {}\n", pattern.template());

    for controller in ControllerRegistry::discover().iter() {
        for action in controller.actions() {
            out.push_str(&format!(
                "  {}.{:<10} [{}]{}\n",
                controller.name(),
                action.name,
                action.verbs.allow_header(),
                if action.authorize { " (authorize)" } else { "" }
            ));
        }
    }

    out.push_str("Pages:\n");
    for page in PageRegistry::discover().iter() {
        out.push_str(&format!(
            "  {:<34} [{}]\n",
            page.path(),
            page.verbs().allow_header()
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(environment: &str) -> Config {
        let values = HashMap::from([("APP_ENVIRONMENT", environment.to_string())]);
        Config::from_source(|key| values.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_pipeline_report_lists_environment_stages() {
        let report = pipeline_report(&config("Development"));
        assert!(report.contains(" 1. DeveloperExceptionPage"));
        assert!(report.contains("10. Endpoints"));
        assert!(!report.contains("Hsts"));
    }

    #[test]
    fn test_services_report_shows_transient_repositories() {
        let report = services_report(config("Production"));
        assert!(report.contains("PresentationRepository"));
        assert!(report.contains("transient"));
    }

    #[test]
    fn test_run_prints_without_a_runtime() {
        assert!(run(config("Production"), AdminCommands::Pipeline).is_ok());
        assert!(run(config("Development"), AdminCommands::Routes).is_ok());
    }

    #[test]
    fn test_routes_report() {
        let report = routes_report().unwrap();
        assert!(report.contains("{controller=Home}/{action=Index}/{id?}"));
        assert!(report.contains("/Identity/Account/Login"));
        assert!(report.contains("(authorize)"));
    }
}
