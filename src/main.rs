use std::io::{self, Write};

use anyhow::Context;
use log::info;
use model::{Estimator, Model};
use tokio::signal;

use model_server::{loader, ModelServer, ServerConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = ServerConfig::from_env()?;
    let (model, capability) = loader::load::<Estimator>(&config.snapshot, config.expect)
        .await
        .context("failed to load the model snapshot")?;
    info!("serving a {capability:?} model");

    let server = ModelServer::bind(model, &config)?;

    // Launchers wait for this line, it must be the only one on stdout.
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "Listening on port {}", server.port())?;
    stdout.flush()?;
    drop(stdout);

    tokio::select! {
        ret = server.serve() => {
            let model = ret?;
            info!("stopped serving {}", model.describe());
        }
        _ = signal::ctrl_c() => {
            info!("received SIGINT");
        }
    }

    Ok(())
}
