use clap::Parser;
use leadcheck::utils::error::{ErrorSeverity, LeadCheckError};
use leadcheck::utils::{logger, validation::Validate};
use leadcheck::{
    AppConfig, AppState, CliConfig, Command, FileValidationPipeline, LocalStorage,
    ValidationEngine, ValidationOrchestrator,
};
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let app_config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    // 初始化日誌
    match &cli.command {
        Command::Serve { .. } => {
            logger::init_server_logger(cli.verbose, app_config.server.json_logs)
        }
        Command::Validate { .. } => logger::init_cli_logger(cli.verbose),
    }

    tracing::info!("Starting leadcheck");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 驗證配置
    if let Err(e) = app_config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let outcome = match cli.command {
        Command::Serve { port } => {
            let port = port.unwrap_or(app_config.server.port);
            leadcheck::start_server(AppState::new(app_config), port).await
        }
        Command::Validate {
            input,
            service,
            output_dir,
            format,
            monitor,
        } => run_batch(&app_config, &input, service, output_dir, format, monitor).await,
    };

    if let Err(e) = outcome {
        report_failure(&e);
    }

    Ok(())
}

async fn run_batch(
    app_config: &AppConfig,
    input: &Path,
    service: leadcheck::ServiceType,
    output_dir: String,
    format: leadcheck::ExportFormat,
    monitor: bool,
) -> leadcheck::Result<()> {
    if monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let input_dir = input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string());
    let input_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| LeadCheckError::InvalidRequest {
            message: format!("Input path has no file name: {}", input.display()),
        })?;

    let orchestrator = ValidationOrchestrator::for_service(service, app_config)?;
    let pipeline = FileValidationPipeline::new(
        LocalStorage::new(input_dir),
        LocalStorage::new(output_dir.clone()),
        input_name,
        output_dir,
        format,
        orchestrator,
    );

    let engine = ValidationEngine::new_with_monitoring(pipeline, monitor);
    let report = engine.run().await?;

    tracing::info!("✅ Validation completed successfully!");
    tracing::info!(
        "📊 total={}, valid={}, invalid={}",
        report.summary.total,
        report.summary.valid,
        report.summary.invalid
    );
    tracing::info!("📁 Output saved to: {}", report.output_path);
    println!("✅ Validation completed successfully!");
    println!(
        "📊 Total: {}  Valid: {}  Invalid: {}",
        report.summary.total, report.summary.valid, report.summary.invalid
    );
    println!("📁 Output saved to: {}", report.output_path);

    Ok(())
}

fn report_failure(e: &LeadCheckError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
