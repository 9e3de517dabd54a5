//! Request-scoped composition via the Partsmith SDK.
//!
//! Demonstrates a root-shared configuration, a per-request session opened
//! through a boundary factory, teardown on scope disposal, the dependency
//! graph, and how an invalid composition is reported.
//!
//! Run with:
//! ```bash
//! cargo run --example request_scopes
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use partsmith_common::error::CompositionError;
use partsmith_common::types::{ContractIdentity, TypeRef};
use partsmith_compose::descriptor::ImportDescriptor;
use partsmith_runtime::factory::ExportFactory;
use partsmith_sdk::builder::PartBuilder;
use partsmith_sdk::host::CompositionHost;

struct Settings {
    greeting: String,
}

struct Session {
    id: usize,
    settings: Arc<Settings>,
}

struct Server {
    sessions: ExportFactory,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    tracing::info!("=== Partsmith SDK: Request Scopes ===");

    let next_session = Arc::new(AtomicUsize::new(1));
    let host = CompositionHost::builder()
        .part(PartBuilder::of::<Settings>().shared().instance(Settings {
            greeting: "hello".into(),
        }))
        .part(
            PartBuilder::of::<Session>()
                .shared_within("request")
                .imports::<Settings>("settings")
                .activate(move |imports| {
                    Ok(Arc::new(Session {
                        id: next_session.fetch_add(1, Ordering::SeqCst),
                        settings: imports.instance("settings")?,
                    }))
                })
                .on_release(|instance| {
                    if let Some(session) = instance.downcast_ref::<Session>() {
                        tracing::info!(session = session.id, "Session closed");
                    }
                }),
        )
        .part(
            PartBuilder::of::<Server>()
                .shared()
                .import(
                    ImportDescriptor::new(
                        "sessions",
                        ContractIdentity::of::<Session>(),
                        TypeRef::of::<Session>(),
                    )
                    .boundary("request"),
                )
                .activate(|imports| {
                    Ok(Arc::new(Server {
                        sessions: imports.get("sessions")?.factory()?,
                    }))
                }),
        )
        .build()?;

    tracing::info!(graph = %host.graph().to_dot(), "Composition graph");

    let server = host.get::<Server>()?;
    for request in 1..=2 {
        let scoped = server.sessions.create()?;
        let session = scoped.downcast::<Session>()?;
        tracing::info!(
            request,
            session = session.id,
            scope = %scoped.scope().id(),
            greeting = %session.settings.greeting,
            "Handling request"
        );
        scoped.dispose()?;
    }

    match host.get::<Session>() {
        Ok(_) => tracing::warn!("Expected an error outside a request scope"),
        Err(CompositionError::BoundaryNotFound { part, boundary }) => {
            tracing::info!(%part, boundary, "Correctly rejected session outside its boundary");
        }
        Err(e) => tracing::error!(%e, "Unexpected error type"),
    }

    let invalid = CompositionHost::builder()
        .part(
            PartBuilder::of::<Server>()
                .imports::<Settings>("settings")
                .activate(|_| Ok(Arc::new(()))),
        )
        .build();
    match invalid {
        Ok(_) => tracing::warn!("Expected a validation failure"),
        Err(CompositionError::Validation(failure)) => {
            for violation in failure.violations() {
                tracing::info!(%violation, "Correctly caught violation");
            }
        }
        Err(e) => tracing::error!(%e, "Unexpected error type"),
    }

    host.dispose()?;
    tracing::info!("=== Request scopes demo complete ===");
    Ok(())
}
