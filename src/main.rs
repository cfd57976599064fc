use anyhow::Context;
use clap::Parser;
use cycling_portal::utils::error::ErrorCategory;
use cycling_portal::utils::{logger, validation::parse_time_of_day, validation::Validate};
use cycling_portal::{
    CliConfig, Command, CyclingPortal, LocalStorage, PortalError, RiderId, ScoringConfig, StageId,
};

fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    if config.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }
    tracing::debug!("CLI config: {:?}", config);

    let scoring = match &config.scoring {
        Some(path) => ScoringConfig::from_file(path)
            .with_context(|| format!("failed to load scoring config '{}'", path))?,
        None => ScoringConfig::default(),
    };

    if let Err(e) = scoring.validate() {
        tracing::error!("❌ Scoring configuration validation failed: {}", e);
        exit_with(&e);
    }

    let storage = LocalStorage::new(".".to_string());
    let mut portal = CyclingPortal::with_scoring(scoring);

    if let Err(e) = run(&config, &storage, &mut portal) {
        tracing::error!("❌ {} (Category: {:?})", e, e.category());
        exit_with(&e);
    }

    Ok(())
}

fn run(config: &CliConfig, storage: &LocalStorage, portal: &mut CyclingPortal) -> Result<(), PortalError> {
    if std::path::Path::new(&config.portal).exists() {
        portal.load(storage, &config.portal)?;
        tracing::info!("📁 Loaded portal from {}", config.portal);
    } else {
        tracing::warn!("⚠️ No portal file at {}, starting empty", config.portal);
    }

    match &config.command {
        Command::Summary => print_summary(portal),
        Command::Classify { stage, format } => {
            let report = portal.stage_report(StageId(*stage))?;
            print!("{}", report.render(*format)?);
            Ok(())
        }
        Command::Register {
            stage,
            rider,
            times,
        } => {
            let times = times
                .iter()
                .map(|value| parse_time_of_day(value))
                .collect::<Result<Vec<_>, _>>()?;
            portal.register_result(StageId(*stage), RiderId(*rider), times)?;
            portal.save(storage, &config.portal)?;
            tracing::info!("✅ Registered result for rider {} in stage {}", rider, stage);
            Ok(())
        }
        Command::DeleteResult { stage, rider } => {
            portal.delete_result(StageId(*stage), RiderId(*rider))?;
            portal.save(storage, &config.portal)?;
            tracing::info!("✅ Deleted result for rider {} in stage {}", rider, stage);
            Ok(())
        }
    }
}

fn print_summary(portal: &CyclingPortal) -> Result<(), PortalError> {
    for race_id in portal.get_race_ids() {
        println!("{}", portal.view_race_details(race_id)?);
        for stage_id in portal.get_race_stages(race_id)? {
            let stage = portal.store().stage(stage_id)?;
            println!(
                "  Stage {} {} [{}] {:?}: {} checkpoints, {} results",
                stage.id,
                stage.name,
                stage.stage_type,
                stage.state,
                stage.checkpoint_count(),
                portal.result_count(stage_id)
            );
        }
    }
    Ok(())
}

fn exit_with(error: &PortalError) -> ! {
    eprintln!("❌ {}", error.user_friendly_message());
    eprintln!("💡 Suggestion: {}", error.recovery_suggestion());

    let exit_code = match error.category() {
        ErrorCategory::Validation | ErrorCategory::Config => 2,
        ErrorCategory::Lookup | ErrorCategory::State => 1,
        ErrorCategory::Io => 3,
    };
    std::process::exit(exit_code);
}
