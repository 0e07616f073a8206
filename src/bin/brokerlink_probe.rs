//! brokerlink-probe: fetch a paged resource and print it
//!
//! Connects to the configured MQTT broker, runs one paginated query and
//! prints every row as a JSON array on stdout.
//!
//! ## Usage
//! ```text
//! brokerlink-probe <resource> [config.yaml]
//! ```
//!
//! ## Configuration
//! - BROKERLINK_CONFIG: config file path (optional)
//! - BROKERLINK__BROKER__HOST, BROKERLINK__BROKER__TOKEN, ...: overrides
//! - BROKERLINK_LOG: log filter (default: info)

use std::time::Duration;

use tracing::{info, warn};

use brokerlink::config::Config;
use brokerlink::envelope::Resource;
use brokerlink::query::QueryPaged;
use brokerlink::utils::bootstrap::init_tracing;
use brokerlink::{BrokerClient, Outcome};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let resource = args
        .next()
        .ok_or("usage: brokerlink-probe <resource> [config.yaml]")?;
    let config_path = args.next();

    let config = Config::load(config_path.as_deref())?;
    let client = BrokerClient::connect_mqtt(&config, CONNECT_TIMEOUT).await?;

    info!(%resource, page_size = client.page_size(), "Querying");
    match client
        .query_paged(QueryPaged::new(Resource::new(resource.clone())), None)
        .await?
    {
        Outcome::Completed(result) => {
            info!(pages = result.page_count(), "Query complete");
            println!("{}", serde_json::to_string_pretty(&result.into_rows())?);
            Ok(())
        }
        Outcome::TimedOut => {
            warn!(%resource, "No answer before the deadline");
            Err(format!("query for {} timed out", resource).into())
        }
    }
}
