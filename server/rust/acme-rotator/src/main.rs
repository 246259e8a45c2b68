use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use acme_dns_challenge::{DnsProvider, HickoryTxtResolver, HttpDnsProvider, InMemoryDns, TxtResolver};
use tracing::info;

use acme_rotator_server::adapter::gateway::HttpAcmeClientFactory;
use acme_rotator_server::adapter::handler::{self, AppState};
use acme_rotator_server::adapter::repository::{HttpSecretStore, InMemorySecretStore};
use acme_rotator_server::domain::repository::SecretStore;
use acme_rotator_server::infrastructure::config::Config;
use acme_rotator_server::infrastructure::key_generator::PemKeyGenerator;
use acme_rotator_server::infrastructure::logging::init_logger;
use acme_rotator_server::infrastructure::parameters::{merge_parameters, parameters_from_env};
use acme_rotator_server::usecase::{
    AccountRotationWorkflow, AccountSettings, CertificateRotationWorkflow, RotateSecretUseCase,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Config
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/config.yaml".to_string());
    let mut cfg = Config::load(&config_path)?;
    let params = parameters_from_env(&cfg.parameters.env_prefix);
    merge_parameters(&mut cfg.acme, &params)?;
    cfg.validate()?;

    // Logging
    init_logger(&cfg.app.environment, &cfg.log.format);

    info!(
        app_name = %cfg.app.name,
        version = %cfg.app.version,
        environment = %cfg.app.environment,
        parameters = params.len(),
        "starting acme rotator server"
    );

    // Secret store
    let store: Arc<dyn SecretStore> = if let Some(ref endpoint) = cfg.secret_store {
        info!(base_url = %endpoint.base_url, "using HTTP secret store");
        Arc::new(HttpSecretStore::new(
            &endpoint.base_url,
            endpoint.token.clone(),
            endpoint.timeout(),
        )?)
    } else {
        tracing::warn!("no secret store configured, using in-memory secret store");
        Arc::new(InMemorySecretStore::new())
    };

    // DNS provider / resolver
    let dns_provider: Arc<dyn DnsProvider> = if let Some(ref endpoint) = cfg.dns.provider {
        info!(base_url = %endpoint.base_url, "using HTTP DNS provider");
        Arc::new(HttpDnsProvider::new(
            &endpoint.base_url,
            endpoint.token.clone(),
            endpoint.timeout(),
        )?)
    } else {
        tracing::warn!("no DNS provider configured, TXT records are kept in memory");
        Arc::new(InMemoryDns::new())
    };
    let nameservers = cfg.dns.nameserver_addrs()?;
    let resolver: Arc<dyn TxtResolver> = if nameservers.is_empty() {
        Arc::new(HickoryTxtResolver::from_system_conf())
    } else {
        info!(count = nameservers.len(), "using configured nameservers for propagation checks");
        Arc::new(HickoryTxtResolver::with_nameservers(nameservers))
    };

    // ACME / key generation
    let acme = Arc::new(HttpAcmeClientFactory::new(Duration::from_secs(
        cfg.acme.http_timeout_secs,
    ))?);
    let keys = Arc::new(PemKeyGenerator::new());

    // Use cases
    let account = AccountRotationWorkflow::new(
        store.clone(),
        keys.clone(),
        acme.clone(),
        AccountSettings {
            email: cfg.acme.email.clone(),
            directory_url: cfg.acme.directory_url.clone(),
            key_config: cfg.acme.account_key.clone(),
        },
    );
    let certificate =
        CertificateRotationWorkflow::new(store.clone(), keys, acme, dns_provider, resolver)
            .with_challenge_config(cfg.dns.challenge_config())
            .with_default_key_config(cfg.acme.certificate_key.clone());

    let state = AppState {
        account_rotation: Arc::new(RotateSecretUseCase::new(store.clone(), Arc::new(account))),
        certificate_rotation: Arc::new(RotateSecretUseCase::new(store, Arc::new(certificate))),
    };
    let app = handler::router(state);

    // REST server
    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port).parse()?;
    info!("REST server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("acme rotator server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
