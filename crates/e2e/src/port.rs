//! Free port allocation

use std::net::TcpListener;

/// Ask the OS for a free TCP port.
///
/// The socket is released before returning, so another process may grab the
/// port before the caller binds it. Bind promptly.
pub fn pick_unused_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
