//! furha CLI: maternal-health engagement prototype.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use chrono::Local;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use furha::config::FurhaConfig;
use furha::dashboard::DashboardSummary;
use furha::record::RiskAssessment;
use furha::registry::MotherRegistry;
use furha::risk::{RiskEngine, RiskEngineConfig};
use furha::synth::synthetic_cohort;
use furha::ussd::UssdSimulator;
use furha::voice::VoiceSystem;

#[derive(Parser)]
#[command(name = "furha", version, about = "Maternal-health engagement prototype")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "furha.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config (if absent) and seed the registry.
    Init {
        /// Also add this many synthetic mothers to the registry.
        #[arg(long)]
        synthetic: Option<usize>,

        /// Seed for the synthetic cohort.
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Train the risk model and persist the artifact.
    Train {
        /// Training CSV (defaults to the registry file).
        #[arg(long)]
        data: Option<PathBuf>,
    },

    /// Predict the risk category of a registered mother.
    Predict {
        /// Phone number the mother registered with.
        phone: String,

        /// Store the predicted category on her record.
        #[arg(long)]
        save: bool,
    },

    /// List mothers predicted high risk.
    HighRisk,

    /// Print the dashboard summary.
    Dashboard {
        /// Emit JSON instead of the text report.
        #[arg(long)]
        json: bool,
    },

    /// Run the interactive USSD simulator on stdin.
    Ussd,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = FurhaConfig::load_or_default(&cli.config)?;
    let engine = RiskEngine::new(RiskEngineConfig::from(&config));
    let today = Local::now().date_naive();

    match cli.command {
        Commands::Init { synthetic, seed } => {
            if !cli.config.exists() {
                config.save(&cli.config)?;
                println!("Wrote default config to {}", cli.config.display());
            }
            let mut registry = MotherRegistry::open(&config.paths.data_file)?;
            if let Some(n) = synthetic {
                registry.extend(synthetic_cohort(n, seed, today))?;
                println!("Added {n} synthetic mothers (seed {seed})");
            }
            println!(
                "Registry {} holds {} mothers",
                registry.path().display(),
                registry.len()
            );
        }

        Commands::Train { data } => {
            let data = data.unwrap_or_else(|| config.paths.data_file.clone());
            let report = engine.train(&data)?;
            println!("{report}");
            for (level, count) in &report.label_counts {
                println!("  {level}: {count} rows");
            }
        }

        Commands::Predict { phone, save } => {
            let mut registry = MotherRegistry::open(&config.paths.data_file)?;
            let assessment = if save {
                engine.assess_and_record(&mut registry, &phone)?
            } else {
                registry.get(&phone).map(|m| engine.predict_risk(m))
            };
            let Some(assessment) = assessment else {
                miette::bail!("no mother registered with phone number {phone}");
            };
            println!("{phone}: {assessment}");
            if assessment == RiskAssessment::Unknown {
                println!("No trained model available. Run `furha train` first.");
            }
        }

        Commands::HighRisk => {
            let registry = MotherRegistry::open(&config.paths.data_file)?;
            let high_risk = engine.identify_high_risk(registry.mothers());
            println!("High-risk mothers needing attention: {}", high_risk.len());
            for mother in high_risk {
                println!("  {} ({})", mother.phone_number, mother.language);
            }
        }

        Commands::Dashboard { json } => {
            let registry = MotherRegistry::open(&config.paths.data_file)?;
            let summary = DashboardSummary::build(&registry, &engine);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
            } else {
                print!("{}", summary.render_text());
            }
        }

        Commands::Ussd => run_ussd(&config, &engine)?,
    }

    Ok(())
}

/// Interactive session loop: phone number, then inputs until `END`.
fn run_ussd(config: &FurhaConfig, engine: &RiskEngine) -> Result<()> {
    let mut registry = MotherRegistry::open(&config.paths.data_file)?;

    if engine.load_model()? {
        println!("Risk assessment model loaded");
    } else {
        println!("Model not found. Training risk assessment model...");
        println!("{}", engine.train(&config.paths.data_file)?);
    }

    let dashboard_url = format!("http://localhost:{}", config.dashboard.port);
    let mut ussd = UssdSimulator::new(config.ussd.clone(), dashboard_url);
    let voice = VoiceSystem::new();

    println!("\nUSSD simulator. Dial {} to start.", ussd.code());
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        println!("\n{}", "=".repeat(50));
        let Some(phone) = prompt(&mut lines, "Enter phone number (or 'quit' to exit): ")? else {
            break;
        };
        if phone.eq_ignore_ascii_case("quit") {
            break;
        }

        loop {
            let Some(input) = prompt(&mut lines, "Enter USSD input: ")? else {
                return Ok(());
            };
            let today = Local::now().date_naive();
            let reply = ussd.handle(&phone, &input, &mut registry, today)?;
            println!("System response: {}", reply.response);

            if let Some(call) = reply
                .voice
                .and_then(|kind| voice.call(&registry, &phone, kind, today))
            {
                println!("{call}");
            }
            if input.trim() == "5" {
                print!("{}", DashboardSummary::build(&registry, engine).render_text());
            }
            if reply.response.is_end() {
                break;
            }
        }
    }
    Ok(())
}

fn prompt<B: BufRead>(lines: &mut std::io::Lines<B>, message: &str) -> Result<Option<String>> {
    print!("{message}");
    std::io::stdout().flush().into_diagnostic()?;
    match lines.next() {
        Some(line) => Ok(Some(line.into_diagnostic()?.trim().to_string())),
        None => Ok(None),
    }
}
