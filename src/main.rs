use chrono::Utc;
use clap::Parser;
use intrack::cli::{Cli, Command};
use intrack::config::{self, Config};
use intrack::dates;
use intrack::service::Service;
use intrack::store::Store;
use std::path::PathBuf;

fn type_label(type_name: &str) -> &str {
    match type_name {
        "injection" => "CSS/JS injection",
        "ua_override" => "User Agent override",
        other => other,
    }
}

fn platform_label(platform: &str) -> &str {
    match platform {
        "all" => "All platforms",
        "desktop" => "Desktop",
        "android" => "Android",
        other => other,
    }
}

fn open_service(cli: &Cli) -> Service {
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config {}: {e}", cli.config.display());
            std::process::exit(1);
        }
    };

    let db_path: PathBuf = match &cli.db {
        Some(path) => path.clone(),
        None => match config::default_db_path() {
            Ok(path) => path,
            Err(e) => {
                eprintln!("Failed to resolve database path: {e}");
                std::process::exit(1);
            }
        },
    };

    let store = match Store::open(&db_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to open database {}: {e}", db_path.display());
            std::process::exit(1);
        }
    };

    Service::new(config, store)
}

fn serve(service: &Service) {
    // An empty database means this is a fresh deployment; run a full import
    // right away so the reports have something to show.
    match service.count_active_interventions() {
        Ok(count) if count < 1 => {
            log::info!("no active interventions, running bootstrap import");
            if let Err(e) = service.run_import_and_count() {
                log::error!("bootstrap import failed: {e}");
            }
        }
        Ok(_) => {}
        Err(e) => {
            eprintln!("Failed to query database: {e}");
            std::process::exit(1);
        }
    }

    // Once a day at midnight UTC. Frequent enough to track current
    // development, rare enough to keep the history series small.
    loop {
        let wait = dates::until_next_midnight(Utc::now());
        log::info!(
            "next import in {}",
            humantime::format_duration(std::time::Duration::from_secs(wait.as_secs()))
        );
        std::thread::sleep(wait);

        if let Err(e) = service.run_import_and_count() {
            log::error!("scheduled import failed: {e}");
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let service = open_service(&cli);

    match &cli.command {
        Command::Serve => serve(&service),
        Command::Import => {
            if let Err(e) = service.run_import_and_count() {
                eprintln!("Import failed: {e}");
                std::process::exit(1);
            }
            match service.count_active_interventions() {
                Ok(count) => println!("Imported {count} active interventions."),
                Err(e) => {
                    eprintln!("Import succeeded but count query failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::List(args) => match service.get_interventions_for_distribution(&args.distribution) {
            Ok(rows) => {
                if rows.is_empty() {
                    println!(
                        "No interventions for '{}'. Run 'intrack import' first.",
                        args.distribution
                    );
                } else {
                    println!(
                        "{:<40} {:<22} {:<14} {:<10}",
                        "Domain", "Type", "Platform", "Bug"
                    );
                    println!("{}", "-".repeat(88));
                    for row in rows {
                        println!(
                            "{:<40} {:<22} {:<14} {:<10}",
                            row.domain,
                            type_label(&row.type_name),
                            platform_label(&row.platform),
                            row.bug
                        );
                    }
                }
            }
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        },
        Command::Counts => match service.get_latest_counts() {
            Ok(Some(point)) => {
                println!(
                    "Counts from {}:",
                    point.datetime.format("%Y-%m-%d %H:%M:%S UTC")
                );
                for (distribution, types) in &point.counters {
                    for (type_name, platforms) in types {
                        for (platform, count) in platforms {
                            println!(
                                "  {distribution:<10} {:<22} {:<14} {count}",
                                type_label(type_name),
                                platform_label(platform)
                            );
                        }
                    }
                }
            }
            Ok(None) => {
                println!("No history yet. Run 'intrack import' first.");
            }
            Err(e) => {
                eprintln!("Failed to load latest counts: {e}");
                std::process::exit(1);
            }
        },
        Command::History(args) => {
            let now = Utc::now();

            // an omitted or unparseable date means "use the default range",
            // same as the reporting endpoint this mirrors
            let start = dates::start_or_default(args.start.as_deref(), now);
            let end = dates::end_or_default(args.end.as_deref(), now);

            match service.get_historical_data(start, end, &args.distribution, &args.r#type) {
                Ok(points) => match serde_json::to_string_pretty(&points) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("Failed to serialize history: {e}");
                        std::process::exit(1);
                    }
                },
                Err(e) => {
                    eprintln!("{e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
