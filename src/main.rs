//! ksdb - keyless signature ledger

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ksdb::{
    auth::{AuthGate, IdentityStore, InMemoryIdentityStore, MongoIdentityStore},
    authority::{HttpSigningAuthority, SigningAuthority, UnconfiguredAuthority},
    config::Args,
    db::MongoClient,
    ledger::{InMemoryLedgerStore, LedgerService, LedgerStore, MongoLedgerStore},
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ksdb={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let schema = args.load_param_schema()?;

    info!("======================================");
    info!("  ksdb - keyless signature ledger");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {} (database '{}')", args.mongodb_uri, args.mongodb_db);
    info!(
        "Signer: {}",
        args.signer_url.as_deref().unwrap_or("(not configured)")
    );
    info!(
        "Verifier: {}",
        args.verifier_url.as_deref().unwrap_or("(not configured)")
    );
    info!(
        "Parameters: {} ({} retrievable)",
        schema.len(),
        schema.retrievable_count()
    );
    info!("Request timeout: {}ms", args.request_timeout_ms);
    info!("======================================");

    // Connect to MongoDB (optional in dev mode)
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Some(client)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory stores): {}", e);
                None
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let (ledger_store, identity_store): (Arc<dyn LedgerStore>, Arc<dyn IdentityStore>) =
        match mongo {
            Some(ref mongo) => (
                Arc::new(MongoLedgerStore::new(mongo, &args.ledger_collection).await?),
                Arc::new(
                    MongoIdentityStore::new(mongo, &args.user_collection, &args.ip_collection)
                        .await?,
                ),
            ),
            None => {
                let identities = InMemoryIdentityStore::dev_loopback(&args.trusted_proxy_header)?;
                (
                    Arc::new(InMemoryLedgerStore::new()),
                    Arc::new(identities),
                )
            }
        };

    let authority: Arc<dyn SigningAuthority> = match (&args.signer_url, &args.verifier_url) {
        (Some(signer), Some(verifier)) => Arc::new(HttpSigningAuthority::new(
            signer.as_str(),
            verifier.as_str(),
            args.request_timeout(),
        )?),
        _ => {
            warn!("Signing authority not configured (dev mode); sign and verify will fail");
            Arc::new(UnconfiguredAuthority)
        }
    };

    let ledger = LedgerService::new(ledger_store, authority, schema, args.request_timeout());
    let gate = AuthGate::new(identity_store, args.request_timeout());
    let state = Arc::new(AppState::new(args, ledger, gate));

    server::run(state).await?;

    Ok(())
}
