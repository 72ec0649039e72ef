use tracing::info;

use koneko_dns::{ClientConfig, DnsClient, RecordClass, RecordType};

/// Tiny dig-style lookup tool:
/// koneko-dig NAME [TYPE] [@SERVER ...]
///
/// Set KONEKO_DIG_CONFIG to a TOML file to load servers, timeout and
/// transport flags from it; @SERVER arguments override its server list.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "koneko_dns=info".into()),
        )
        .init();

    let mut name: Option<String> = None;
    let mut rtype = RecordType::A;
    let mut servers: Vec<String> = Vec::new();

    for arg in std::env::args().skip(1) {
        if let Some(server) = arg.strip_prefix('@') {
            servers.push(server.to_string());
        } else if name.is_none() {
            name = Some(arg);
        } else if let Some(t) = RecordType::from_name(&arg) {
            rtype = t;
        } else {
            anyhow::bail!("Unrecognized argument '{}'", arg);
        }
    }

    let name = name.ok_or_else(|| anyhow::anyhow!("Usage: koneko-dig NAME [TYPE] [@SERVER ...]"))?;

    let client = if let Ok(path) = std::env::var("KONEKO_DIG_CONFIG") {
        let mut config = ClientConfig::load(&path)?;
        if !servers.is_empty() {
            config.servers = servers.clone();
        }
        servers = config.servers.clone();
        DnsClient::from_config(&config)?
    } else {
        if servers.is_empty() {
            servers.push("1.1.1.1".to_string());
        }
        DnsClient::new(&servers, 5000)?
    };

    info!("🐾 {} {} via {}", name, rtype.name(), servers.join(", "));

    let response = client
        .resolve(&name, rtype, RecordClass::IN, None)
        .await?;

    println!(
        ";; id {:04x}, status {}, answers {}, authorities {}, additionals {}",
        response.id,
        response.rcode().name(),
        response.answers.len(),
        response.authorities.len(),
        response.additionals.len()
    );
    for record in &response.answers {
        println!("{}", record);
    }
    if response.answers.is_empty() {
        for record in &response.authorities {
            println!(";; {}", record);
        }
    }

    Ok(())
}
