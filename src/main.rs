use clap::Parser;

use servicehost::app::{validate_config, Runtime};
use servicehost::builtin::{builtin_catalog, register_builtins};
use servicehost::cli::{Cli, Command};
use servicehost::config::{expand_path, ConfigLoader};
use servicehost::infrastructure::ImplementationRegistry;
use servicehost::logging::{init_logging, LoggingConfig};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::with_path(&cli.config)
        .with_environment(cli.env.clone())
        .load()?;

    let preset = config
        .global
        .logging
        .preset
        .clone()
        .or_else(|| config.environment.clone())
        .unwrap_or_else(|| "development".to_string());
    let mut logging = LoggingConfig::for_environment(&preset);
    if let Some(level) = cli.log_level.as_ref().or(config.global.logging.level.as_ref()) {
        logging = logging.with_level(level);
    }
    init_logging(logging).map_err(|e| anyhow::anyhow!("初始化日志失败: {}", e))?;

    let mut registry = ImplementationRegistry::new();
    register_builtins(&mut registry);

    match cli.command {
        Command::Validate => {
            let problems = validate_config(&config, &registry);
            if problems.is_empty() {
                println!("✅ {} 校验通过 ({} 个服务)", cli.config, config.services.len());
                return Ok(());
            }
            for problem in &problems {
                println!("❌ {}", problem);
            }
            anyhow::bail!("配置校验失败: {} 个问题", problems.len());
        }
        Command::Services { json } => {
            let mut runtime = Runtime::bootstrap(config, registry, builtin_catalog())?;
            let summaries = runtime.service_summaries()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                for skipped in &runtime.report().skipped {
                    println!("⚠️  跳过可选服务: {}", skipped);
                }
                for summary in &summaries {
                    println!(
                        "{:<20} {:<10} deps=[{}] instantiated={} running={}",
                        summary.name,
                        summary.lifetime,
                        summary.dependencies.join(", "),
                        summary.instantiated,
                        summary.running
                    );
                }
                println!("{}", runtime.container().stats().performance_summary());
            }
            runtime.shutdown()?;
        }
        Command::Plugins { json } => {
            let mut runtime = Runtime::bootstrap(config, registry, builtin_catalog())?;
            runtime.add_plugin_directories(cli.plugin_dirs.iter().map(|d| expand_path(d)));

            let results = runtime.plugins_mut().load_all_plugins();
            let listing = runtime.plugins().list_plugins();
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                for (name, ok) in &results {
                    let icon = if *ok { "✅" } else { "❌" };
                    let info = listing.get(name);
                    let status = info.map(|i| i.metadata.status.to_string()).unwrap_or_default();
                    println!("{} {:<20} {}", icon, name, status);
                    if let Some(message) = info.and_then(|i| i.metadata.error_message.as_ref()) {
                        println!("   {}", message);
                    }
                    if let Some(plugin) = runtime.plugins().get_plugin(name) {
                        for command in plugin.commands() {
                            println!("   - {}: {}", command.name, command.description);
                        }
                    }
                }
                println!("加载顺序: {}", runtime.plugins().load_order().join(" -> "));
            }
            runtime.shutdown()?;
        }
    }

    Ok(())
}
