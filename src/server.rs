use std::{io, net::SocketAddr};

use model::Model;
use serde::Serialize;

use crate::{
    config::ServerConfig,
    context::ServerContext,
    port,
    session::{Dispatcher, SessionConfig},
    ServerErr,
};

/// A model server bound to its port, ready to serve.
pub struct ModelServer<M> {
    dispatcher: Dispatcher<M>,
    addr: SocketAddr,
}

impl<M> ModelServer<M>
where
    M: Model + Clone + Serialize,
{
    /// Binds the first free port of the configured range.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// `ServerErr::NoPortAvailable` if the whole range is taken.
    pub fn bind(model: M, config: &ServerConfig) -> Result<Self, ServerErr> {
        let (listener, port) = port::allocate(config.host, config.ports)?;
        let addr = SocketAddr::new(config.host, port);

        let ctx = ServerContext::new(model, config.encoding);
        let session = SessionConfig {
            command_match: config.command_match,
            limits: config.limits,
        };

        Ok(Self {
            dispatcher: Dispatcher::new(listener, ctx, session),
            addr,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves until a client sends `exit`.
    ///
    /// # Returns
    /// The model as it was at shutdown.
    pub async fn serve(self) -> io::Result<M> {
        let ctx = self.dispatcher.serve().await?;
        Ok(ctx.into_model())
    }
}
