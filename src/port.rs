use std::{
    io,
    net::{IpAddr, SocketAddr},
};

use log::{debug, info};
use tokio::net::{TcpListener, TcpSocket};

use crate::{config::PortRange, ServerErr};

/// At most one connection waits to be accepted while another is served.
const BACKLOG: u32 = 1;

/// Binds the first free port of `ports` on `host`, scanning upwards.
///
/// Must be called from within a tokio runtime.
///
/// # Returns
/// The listener and the port it's bound to. For a range of just port `0` this
/// is whatever port the OS picked.
///
/// # Errors
/// `ServerErr::NoPortAvailable` if no port of the range could be bound.
pub fn allocate(host: IpAddr, ports: PortRange) -> Result<(TcpListener, u16), ServerErr> {
    for port in ports.start..=ports.end {
        match bind(SocketAddr::new(host, port)) {
            Ok(listener) => {
                let port = listener.local_addr()?.port();
                info!(port = port, backlog = BACKLOG; "listening at {host}");
                return Ok((listener, port));
            }
            Err(e) => debug!(port = port; "unavailable: {e}"),
        }
    }

    Err(ServerErr::NoPortAvailable {
        start: ports.start,
        end: ports.end,
    })
}

fn bind(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };

    socket.bind(addr)?;
    socket.listen(BACKLOG)
}
