use std::error::Error;

use canopeum_config::Config;
use canopeum_db::seed::{DEMO_ACCOUNTS, Seeder};
use canopeum_db::{Database, MigrationRunner, mask_password};
use canopeum_server::auth::password::hash_password;
use canopeum_server::{AppState, init_tracing, serve};
use facet::Facet;
use facet_args as args;
use owo_colors::OwoColorize;

/// Backend for the Canopeum tree-planting platform.
#[derive(Facet, Debug)]
struct Cli {
    /// Show version information
    #[facet(args::named, args::short = 'V')]
    version: bool,

    /// Command to run
    #[facet(default, args::subcommand)]
    command: Option<Commands>,
}

/// Available commands
#[derive(Facet, Debug)]
#[repr(u8)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to bind, e.g. 0.0.0.0:8000
        #[facet(default, args::named)]
        listen: Option<String>,
    },
    /// Run pending migrations
    Migrate {
        /// Database connection URL
        #[facet(default, args::named)]
        database_url: Option<String>,
    },
    /// Show migration status
    Status {
        /// Database connection URL
        #[facet(default, args::named)]
        database_url: Option<String>,
    },
    /// Fill an empty database with demo data
    Seed {
        /// Database connection URL
        #[facet(default, args::named)]
        database_url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args_ref: Vec<&str> = args.iter().map(|s| s.as_str()).collect();

    let cli: Cli = match args::from_slice(&args_ref) {
        Ok(cli) => cli,
        Err(err) if err.is_help_request() => {
            print!("{}", err.help_text().unwrap_or(""));
            return;
        }
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "error:".red().bold(), e);
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  {} {}", "caused by:".dimmed(), cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

/// Config with the command-line database URL applied over it.
fn load_config(database_url: Option<String>) -> Result<Config, Box<dyn Error>> {
    let (mut config, path) = Config::load()?;
    if let Some(path) = path {
        tracing::debug!(path = %path.display(), "loaded config");
    }
    if database_url.is_some() {
        config.database.url = database_url;
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if cli.version {
        println!("canopeum {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let Some(command) = cli.command else {
        let config = args::HelpConfig {
            program_name: Some("canopeum".to_string()),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            ..Default::default()
        };
        print!("{}", args::generate_help::<Cli>(&config));
        return Ok(());
    };

    init_tracing();

    match command {
        Commands::Serve { listen } => {
            let mut config = load_config(None)?;
            if listen.is_some() {
                config.server.listen = listen;
            }
            let db = Database::connect(&config.database)?;
            let geocoder = canopeum_remote::geocoder(&config)?;
            let weather = canopeum_remote::weather_provider(&config)?;
            let state = AppState::new(config, db, geocoder, weather)?;
            serve(state).await?;
        }
        Commands::Migrate { database_url } => {
            let config = load_config(database_url)?;
            println!("{} {}", "database:".dimmed(), mask_password(config.database.url()));
            let db = Database::connect(&config.database)?;
            let mut conn = db.get().await?;
            let applied = MigrationRunner::new(&mut conn).migrate().await?;
            if applied.is_empty() {
                println!("{}", "up to date".green());
            }
            for migration in applied {
                println!("{} {} {}", "applied".green(), migration.version, migration.name);
            }
        }
        Commands::Status { database_url } => {
            let config = load_config(database_url)?;
            println!("{} {}", "database:".dimmed(), mask_password(config.database.url()));
            let db = Database::connect(&config.database)?;
            let mut conn = db.get().await?;
            for status in MigrationRunner::new(&mut conn).status().await? {
                match status.applied_at {
                    Some(at) => println!(
                        "{} {} {} {}",
                        "applied".green(),
                        status.version,
                        status.name,
                        at.dimmed()
                    ),
                    None => println!("{} {} {}", "pending".yellow(), status.version, status.name),
                }
            }
        }
        Commands::Seed { database_url } => {
            let config = load_config(database_url)?;
            let db = Database::connect(&config.database)?;
            let mut accounts = Vec::with_capacity(DEMO_ACCOUNTS.len());
            for account in DEMO_ACCOUNTS {
                accounts.push((*account, hash_password(account.password)?));
            }

            let mut conn = db.get().await?;
            let tx = conn.transaction().await?;
            match Seeder::default().run(&tx, &accounts).await? {
                Some(report) => {
                    tx.commit().await?;
                    println!(
                        "{} {} users, {} sites, {} batches, {} posts",
                        "seeded".green(),
                        report.users,
                        report.sites,
                        report.batches,
                        report.posts
                    );
                }
                None => println!("{}", "users already exist, nothing to do".yellow()),
            }
        }
    }
    Ok(())
}
