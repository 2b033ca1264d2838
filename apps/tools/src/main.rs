use std::{fs, path::PathBuf, str::FromStr};

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use query::{compute_kpis, filter_controls, FilterSpec, SearchScope};
use shared::{
    domain::{Control, Role, CONTROL_TEMPLATE_COLUMNS},
    protocol::SessionClaims,
};
use storage::{seed, AdminStore, SqliteAdminStore};

#[derive(Parser, Debug)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the bulk-upload CSV header.
    Template,
    /// Print generated controls as a JSON array.
    MockData {
        #[arg(long, default_value_t = 100)]
        count: usize,
        #[arg(long, default_value_t = 2025)]
        seed: u64,
    },
    /// KPI aggregate over a JSON file of controls.
    Kpis {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        business_unit: Option<String>,
        #[arg(long)]
        quarter: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Sign a session token for the server's jwt auth mode.
    MintToken {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "Viewer")]
        role: String,
        /// Must match the server's `auth.jwt_secret`.
        #[arg(long)]
        secret: String,
        #[arg(long, default_value_t = 3600)]
        ttl_seconds: i64,
    },
    /// Add a user to the admin directory database.
    AddUser {
        #[arg(long, default_value = "sqlite://data/admin.db")]
        database_url: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "Viewer")]
        role: String,
    },
    ListUsers {
        #[arg(long, default_value = "sqlite://data/admin.db")]
        database_url: String,
    },
}

fn parse_role(raw: &str) -> Result<Role> {
    Role::from_str(raw).with_context(|| {
        let known: Vec<&str> = Role::ALL.iter().map(|r| r.as_str()).collect();
        format!("expected one of: {}", known.join(", "))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Template => {
            println!("{}", CONTROL_TEMPLATE_COLUMNS.join(","));
        }
        Command::MockData {
            count,
            seed: rng_seed,
        } => {
            let controls = seed::mock_controls(count, rng_seed);
            println!("{}", serde_json::to_string_pretty(&controls)?);
        }
        Command::Kpis {
            file,
            business_unit,
            quarter,
            status,
            search,
        } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("failed to read '{}'", file.display()))?;
            let controls: Vec<Control> = serde_json::from_str(&raw)
                .with_context(|| format!("'{}' is not a JSON array of controls", file.display()))?;
            let filter = FilterSpec {
                business_unit,
                quarter,
                status,
                search,
                ..FilterSpec::default()
            };
            let kpis = compute_kpis(filter_controls(&controls, &filter, SearchScope::Kpi));
            println!("{}", serde_json::to_string_pretty(&kpis)?);
        }
        Command::MintToken {
            email,
            name,
            role,
            secret,
            ttl_seconds,
        } => {
            let claims = SessionClaims {
                sub: email,
                name,
                role: parse_role(&role)?,
                exp: (Utc::now() + Duration::seconds(ttl_seconds)).timestamp(),
            };
            let token = encode(
                &Header::new(Algorithm::HS256),
                &claims,
                &EncodingKey::from_secret(secret.as_bytes()),
            )?;
            println!("{token}");
        }
        Command::AddUser {
            database_url,
            email,
            role,
        } => {
            let store = SqliteAdminStore::connect(&database_url).await?;
            match store.add_user(&email, parse_role(&role)?).await? {
                Some(user) => println!("created user id={} email={}", user.id, user.email),
                None => println!("user {email} already exists"),
            }
        }
        Command::ListUsers { database_url } => {
            let store = SqliteAdminStore::connect(&database_url).await?;
            for user in store.list_users().await? {
                println!("{}\t{}\t{}\t{}", user.id, user.email, user.role, user.name);
            }
        }
    }

    Ok(())
}
