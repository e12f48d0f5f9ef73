//! Roadview server binary.
//!
//! Configuration comes from the environment (a `.env` file is honored):
//! `HOST`, `PORT`, `DATA_DIR`, `TMAP_APP_KEY`, `API_KEY`, and optionally
//! `VIDEO_MODEL_ID`. Logging is controlled through `RUST_LOG`.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use roadview::server::{serve, AppState, ServerConfig};
use roadview::MemoryStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = ServerConfig::from_env()?;
    let host: IpAddr = config.host.parse()?;
    let addr = SocketAddr::new(host, config.port);

    let state = AppState::new(&config, Arc::new(MemoryStore::new()))?;
    serve(state, addr).await?;

    Ok(())
}
