//! HTTP server

pub mod http;

pub use http::{run, AppState};

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    use clap::Parser;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::auth::{AuthGate, InMemoryIdentityStore};
    use crate::authority::mock::MockAuthority;
    use crate::ledger::{InMemoryLedgerStore, LedgerService};
    use crate::schema::ParamSchema;

    let args = crate::config::Args::try_parse_from(["ksdb", "--dev-mode"]).unwrap();

    let identities = InMemoryIdentityStore::new();
    identities.add_credential("alice", "wonderland").unwrap();
    identities.allow_address("10.0.0.7", "build-server").unwrap();

    let schema = ParamSchema::from_json(
        r#"{"tag": {"required": true, "databaseField": "Tag", "retrievable": true}}"#,
    )
    .unwrap();

    let ledger = LedgerService::new(
        Arc::new(InMemoryLedgerStore::new()),
        Arc::new(MockAuthority::new()),
        schema,
        Duration::from_secs(5),
    );

    AppState::new(
        args,
        ledger,
        AuthGate::new(Arc::new(identities), Duration::from_secs(5)),
    )
}
