use std::io;

use comms::{Command, CommandMatch, LineReceiver, LineSender, Limits};
use log::{debug, info, warn};
use model::Model;
use serde::Serialize;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
};

use crate::{context::ServerContext, SessionErr};

/// What the accept loop does after a connection is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

/// Per connection settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionConfig {
    pub command_match: CommandMatch,
    pub limits: Limits,
}

/// Accepts connections one at a time and dispatches their command.
pub struct Dispatcher<M> {
    listener: TcpListener,
    ctx: ServerContext<M>,
    config: SessionConfig,
}

impl<M> Dispatcher<M>
where
    M: Model + Clone + Serialize,
{
    /// Creates a new `Dispatcher`.
    ///
    /// # Arguments
    /// * `listener` - The bound listener to accept from.
    /// * `ctx` - The server state.
    /// * `config` - Per connection settings.
    pub fn new(listener: TcpListener, ctx: ServerContext<M>, config: SessionConfig) -> Self {
        Self {
            listener,
            ctx,
            config,
        }
    }

    pub fn context(&self) -> &ServerContext<M> {
        &self.ctx
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves connections until one of them sends `exit`.
    ///
    /// Connections are handled strictly in order, the next one is only accepted
    /// after the current one was closed. A failing connection is logged and
    /// closed, the server keeps going.
    ///
    /// # Returns
    /// The server state at shutdown.
    ///
    /// # Errors
    /// Returns an io error if accepting fails.
    pub async fn serve(mut self) -> io::Result<ServerContext<M>> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            debug!("accepted connection from {addr}");

            let (rx, tx) = stream.into_split();
            match self.session(rx, tx).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Shutdown) => {
                    info!("exit received from {addr}, shutting down");
                    return Ok(self.ctx);
                }
                Err(e) => warn!("connection from {addr} aborted: {e}"),
            }
        }
    }

    /// Handles a whole connection: reads its command line, runs the command and
    /// closes the connection, whatever the outcome.
    ///
    /// # Errors
    /// Returns the `SessionErr` that aborted the command.
    pub async fn session<R, W>(&mut self, rx: R, tx: W) -> Result<Flow, SessionErr>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (mut rx, mut tx) = comms::channel_with_limits(rx, tx, self.config.limits);
        let flow = self.dispatch(&mut rx, &mut tx).await;

        if let Err(e) = tx.close().await {
            debug!("failed to close connection: {e}");
        }

        flow
    }

    async fn dispatch<R, W>(
        &mut self,
        rx: &mut LineReceiver<R>,
        tx: &mut LineSender<W>,
    ) -> Result<Flow, SessionErr>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let Some(line) = rx.recv_line().await? else {
            debug!("connection closed before sending a command");
            return Ok(Flow::Continue);
        };

        let command = match Command::parse(&line, self.config.command_match) {
            Ok(command) => command,
            Err(e) => {
                debug!("{e}, closing without an answer");
                return Ok(Flow::Continue);
            }
        };

        debug!(command = command.keyword(); "dispatching");
        match command {
            Command::Train => self.ctx.train(rx, tx).await?,
            Command::Run => {
                self.ctx.run(rx, tx).await?;
            }
            Command::Type => self.ctx.describe(tx).await?,
            Command::Exit => return Ok(Flow::Shutdown),
        }

        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use comms::SnapshotEncoding;
    use model::{Estimator, MeanRegressor, NearestCentroid};
    use tokio::{
        io::{self, AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
    };

    use super::*;
    use crate::{config::PortRange, port};

    async fn dispatcher(command_match: CommandMatch) -> Dispatcher<Estimator> {
        let (listener, _) = port::allocate(Ipv4Addr::LOCALHOST.into(), PortRange::single(0)).unwrap();
        let ctx = ServerContext::new(Estimator::from(MeanRegressor::default()), SnapshotEncoding::Raw);
        let config = SessionConfig {
            command_match,
            limits: Limits::default(),
        };
        Dispatcher::new(listener, ctx, config)
    }

    /// Runs one session with `request` as the whole client input and returns the
    /// flow and everything the server sent.
    async fn exchange(
        dispatcher: &mut Dispatcher<Estimator>,
        request: &[u8],
    ) -> (Result<Flow, SessionErr>, Vec<u8>) {
        let (server, mut client) = io::duplex(4096);
        client.write_all(request).await.unwrap();
        client.shutdown().await.unwrap();

        let (rx, tx) = io::split(server);
        let flow = dispatcher.session(rx, tx).await;

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        (flow, response)
    }

    #[tokio::test]
    async fn type_answers_with_the_description() {
        let mut dispatcher = dispatcher(CommandMatch::Substring).await;

        let (flow, response) = exchange(&mut dispatcher, b"type\n").await;
        assert_eq!(flow.unwrap(), Flow::Continue);
        assert_eq!(response, b"MeanRegressor(unfitted)\n");
    }

    #[tokio::test]
    async fn unrecognized_command_closes_silently() {
        let mut dispatcher = dispatcher(CommandMatch::Substring).await;

        let (flow, response) = exchange(&mut dispatcher, b"hello\n").await;
        assert_eq!(flow.unwrap(), Flow::Continue);
        assert!(response.is_empty());

        let (flow, response) = exchange(&mut dispatcher, b"").await;
        assert_eq!(flow.unwrap(), Flow::Continue);
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn exact_matching_rejects_decorated_commands() {
        let mut dispatcher = dispatcher(CommandMatch::Exact).await;

        let (flow, response) = exchange(&mut dispatcher, b">> type <<\n").await;
        assert_eq!(flow.unwrap(), Flow::Continue);
        assert!(response.is_empty());

        let mut dispatcher = self::dispatcher(CommandMatch::Substring).await;
        let (_, response) = exchange(&mut dispatcher, b">> type <<\n").await;
        assert_eq!(response, b"MeanRegressor(unfitted)\n");
    }

    #[tokio::test]
    async fn train_then_run_in_separate_sessions() {
        let mut dispatcher = dispatcher(CommandMatch::Substring).await;

        let (flow, snapshot) = exchange(&mut dispatcher, b"train\n2\n3 0\n5 0\n").await;
        assert_eq!(flow.unwrap(), Flow::Continue);
        let trained: Estimator = SnapshotEncoding::Raw.decode(&snapshot).unwrap();
        assert_eq!(&trained, dispatcher.context().model());

        let (flow, response) = exchange(&mut dispatcher, b"run\n2\n1\n-1\n").await;
        assert_eq!(flow.unwrap(), Flow::Continue);
        assert_eq!(response, b"4.0\n4.0\n");
    }

    #[tokio::test]
    async fn malformed_payload_aborts_only_the_connection() {
        let mut dispatcher = dispatcher(CommandMatch::Substring).await;

        let (flow, response) = exchange(&mut dispatcher, b"train\n2\n3 0\n").await;
        assert!(matches!(flow, Err(SessionErr::MalformedPayload(_))));
        assert!(response.is_empty());

        let (flow, response) = exchange(&mut dispatcher, b"type\n").await;
        assert_eq!(flow.unwrap(), Flow::Continue);
        assert_eq!(response, b"MeanRegressor(unfitted)\n");
    }

    #[tokio::test]
    async fn exit_stops_the_loop() {
        let mut dispatcher = dispatcher(CommandMatch::Substring).await;

        let (flow, response) = exchange(&mut dispatcher, b"exit\n").await;
        assert_eq!(flow.unwrap(), Flow::Shutdown);
        assert!(response.is_empty());
    }

    async fn request(addr: std::net::SocketAddr, request: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn serves_a_classifier_from_a_spawned_task() {
        let (listener, _) = port::allocate(Ipv4Addr::LOCALHOST.into(), PortRange::single(0)).unwrap();
        let ctx = ServerContext::new(Estimator::from(NearestCentroid::new()), SnapshotEncoding::Raw);
        let config = SessionConfig {
            command_match: CommandMatch::Exact,
            limits: Limits::default(),
        };
        let dispatcher = Dispatcher::new(listener, ctx, config);
        let addr = dispatcher.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        let server = tokio::spawn(dispatcher.serve());

        let snapshot = request(addr, b"train\n4\n0 0\n0 1\n1 9\n1 10\n").await;
        assert!(!snapshot.is_empty());

        let response = request(addr, b"run\n2\n0.5\n9.5\n").await;
        let rows: Vec<Vec<f64>> = response
            .lines()
            .map(|line| line.split_whitespace().map(|v| v.parse().unwrap()).collect())
            .collect();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.len() == 2));
        assert!(rows[0][0] > 0.5);
        assert!(rows[1][1] > 0.5);

        assert!(request(addr, b"exit\n").await.is_empty());
        let ctx = server.await.unwrap().unwrap();
        assert_eq!(ctx.model().capability(), model::Capability::Probabilistic);
    }
}
