use anyhow::Context;
use clap::Parser;
use park_assign::core::workflow::{Confirmation, WorkflowState};
use park_assign::core::Registry;
use park_assign::utils::error::{AssignError, ErrorSeverity};
use park_assign::utils::{logger, validation::Validate};
use park_assign::{CliConfig, ConfigProvider, HttpRegistry, TomlConfig, Workflow};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let toml = match &cli.config {
        Some(path) => Some(
            TomlConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
        ),
        None => None,
    };

    // Logging
    let json_logs = cli.json_logs || toml.as_ref().and_then(|t| t.log_format()) == Some("json");
    if json_logs {
        logger::init_json_logger(toml.as_ref().and_then(|t| t.log_level()));
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting park-assign");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // Validate configuration
    let validated = match &toml {
        Some(toml) => cli.validate().and_then(|_| toml.validate()),
        None => cli.validate(),
    };
    if let Err(e) = validated {
        tracing::error!("❌ Configuration validation failed: {}", e);
        exit_with(&e);
    }

    let provider: &dyn ConfigProvider = match &toml {
        Some(toml) => toml,
        None => &cli,
    };
    let settings = provider.workflow_settings();

    let registry = match HttpRegistry::from_config(provider) {
        Ok(registry) => Arc::new(registry),
        Err(e) => exit_with(&e),
    };
    let mut workflow = Workflow::new(registry, settings);

    workflow.scan(&cli.plate).await?;
    match workflow.state() {
        WorkflowState::Confirming(_) => {}
        WorkflowState::Scanning {
            pending_registration: Some(_),
        } => {
            if let Some(link) = workflow.registration_link() {
                println!("📝 Register the vehicle at: {}", link);
            }
            exit_with_last_error(&workflow);
        }
        _ => exit_with_last_error(&workflow),
    }

    if let Some(yard_id) = cli.yard {
        workflow.select_yard(yard_id).await?;
    }
    workflow.select_slot(cli.slot_choice())?;

    if let WorkflowState::Confirming(confirmation) = workflow.state() {
        print_confirmation(confirmation);
    }
    if let Err(e) = ready_to_confirm(&workflow) {
        exit_with(e);
    }

    if cli.dry_run {
        tracing::info!("Dry run: nothing assigned");
        return Ok(());
    }

    workflow.confirm().await?;
    match workflow.state() {
        WorkflowState::Done(assignment) => {
            tracing::info!(
                "✅ {} parked in {} (session {})",
                assignment.session.plate,
                assignment.session.slot.name,
                assignment.session.id
            );
            println!(
                "✅ {} parked in {} / {}",
                assignment.session.plate, assignment.session.yard.name, assignment.session.slot.name
            );
            println!("🗺️  {}", assignment.link);
            Ok(())
        }
        _ => exit_with_last_error(&workflow),
    }
}

fn print_confirmation(confirmation: &Confirmation) {
    println!(
        "🚗 {} {} ({})",
        confirmation.plate,
        confirmation.vehicle.model.as_deref().unwrap_or("-"),
        confirmation.vehicle.status
    );
    if let Some(session) = &confirmation.already_parked {
        println!(
            "ℹ️  Already parked in {} / {}",
            session.yard.name, session.slot.name
        );
    }
    if confirmation.parked_check_failed {
        println!("⚠️  Could not check whether the vehicle is already parked");
    }
    match confirmation.selected_yard() {
        Some(yard) => println!("📍 Yard {} ({})", yard.name, yard.id),
        None => println!("📍 No yard selected"),
    }
    let names: Vec<&str> = confirmation
        .free_slots
        .iter()
        .map(|s| s.name.as_str())
        .collect();
    println!("🅿️  {} free slot(s): {}", names.len(), names.join(", "));
}

/// Any recorded error blocks the commit: a failed yard load or an unknown
/// `--yard` keeps a different yard selected.
fn ready_to_confirm<R: Registry + ?Sized>(workflow: &Workflow<R>) -> Result<(), &AssignError> {
    match workflow.last_error() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn exit_with_last_error<R: Registry + ?Sized>(workflow: &Workflow<R>) -> ! {
    match workflow.last_error() {
        Some(e) => exit_with(e),
        None => {
            eprintln!("❌ Workflow stopped in state {}", workflow.state().name());
            std::process::exit(1);
        }
    }
}

fn exit_with(e: &AssignError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    // Exit code by severity
    let exit_code = match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use park_assign::adapters::memory::Operation;
    use park_assign::domain::model::{Slot, Vehicle, Yard};
    use park_assign::{InMemoryRegistry, WorkflowSettings};

    async fn one_yard() -> InMemoryRegistry {
        let registry = InMemoryRegistry::new();
        registry
            .add_vehicle(Vehicle {
                id: 1,
                plate: "ABC1234".to_string(),
                model: None,
                manufacturer: None,
                status: "OPERACIONAL".to_string(),
            })
            .await;
        registry
            .add_yard(Yard {
                id: 1,
                name: "Guarulhos".to_string(),
                status: "A".to_string(),
            })
            .await;
        registry
            .add_slot(Slot {
                id: 11,
                name: "G001".to_string(),
                yard_id: 1,
                status: "L".to_string(),
            })
            .await;
        registry
    }

    #[tokio::test]
    async fn test_unknown_yard_blocks_confirmation() {
        let registry = one_yard().await;
        let mut workflow = Workflow::new(Arc::new(registry.clone()), WorkflowSettings::default());

        workflow.scan("ABC1234").await.unwrap();
        assert!(ready_to_confirm(&workflow).is_ok());

        workflow.select_yard(42).await.unwrap();
        assert!(matches!(
            ready_to_confirm(&workflow),
            Err(AssignError::UnknownYard { yard_id: 42 })
        ));
        assert_eq!(registry.calls(Operation::CreateSession).await, 0);
    }

    #[tokio::test]
    async fn test_failed_yard_load_blocks_confirmation() {
        let registry = one_yard().await;
        registry
            .fail_next(
                Operation::ListYards,
                park_assign::utils::error::RegistryError::Timeout,
            )
            .await;
        let mut workflow = Workflow::new(Arc::new(registry), WorkflowSettings::default());

        workflow.scan("ABC1234").await.unwrap();

        assert!(matches!(workflow.state(), WorkflowState::Confirming(_)));
        assert!(matches!(
            ready_to_confirm(&workflow),
            Err(AssignError::Transport { .. })
        ));
    }
}
