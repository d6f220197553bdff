use anyhow::Context;
use clap::Parser;
use landlord::utils::error::ErrorSeverity;
use landlord::utils::logger;
use landlord::{CliArgs, CommandToolRunner, LandlordEngine, RedisConnector, Settings, TomlConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 載入並驗證配置；日誌尚未初始化，錯誤直接輸出到 stderr
    let settings = match TomlConfig::from_file(&args.config).and_then(|c| c.settings()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    if args.dry_run {
        logger::init_cli_logger(args.verbose);
        display_config_summary(&settings, &args.config);
        return Ok(());
    }

    logger::init_service_logger(args.verbose, &settings.log_path)
        .with_context(|| format!("Unable to open log file {}", settings.log_path.display()))?;
    tracing::info!("📁 Configuration loaded from {}", args.config);

    let connector = RedisConnector::new(&settings.store_url, &settings.store_password)
        .with_context(|| format!("Invalid store address {}", settings.store_url))?;
    let runner = CommandToolRunner::new(&settings.tool_path, settings.use_sudo);
    let engine = LandlordEngine::new(connector, runner, settings);

    if let Err(e) = engine.run().await {
        tracing::error!(
            "❌ Landlord stopped: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e);

        let exit_code = match e.severity() {
            ErrorSeverity::Low | ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        std::process::exit(exit_code);
    }

    println!("Good bye.");
    Ok(())
}

fn display_config_summary(settings: &Settings, source: &str) {
    println!("📋 Configuration Summary ({}):", source);
    println!("  Provisioning tool: {}", settings.tool_path.display());
    println!("  Use sudo: {}", settings.use_sudo);
    println!("  Coordination store: {}", settings.store_url);
    println!(
        "  Tenant ports: {}..={} ({} tenants)",
        settings.pool.tenant_port_base,
        settings.pool.tenant_port_base as u32 + settings.pool.max_tenants as u32 - 1,
        settings.pool.max_tenants
    );
    println!("  Listen port: {}", settings.listen_port);
    println!("  Log file: {}", settings.log_path.display());
    println!();
    println!("✅ Configuration is valid. Dry run complete.");
}
