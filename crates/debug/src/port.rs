// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Debug-port probing

use std::net::TcpListener;

/// Bind-and-close loop starting at `start`, incrementing while the port is
/// taken. Returns the first bindable port.
pub fn find_available_port(start: u16) -> std::io::Result<u16> {
    let mut port = start;
    loop {
        match TcpListener::bind(("127.0.0.1", port)) {
            Ok(listener) => {
                drop(listener);
                return Ok(port);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                port = port.checked_add(1).ok_or_else(|| {
                    std::io::Error::other("no available port above start")
                })?;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returned_port_is_bindable() {
        let port = find_available_port(39000).unwrap();
        let listener = TcpListener::bind(("127.0.0.1", port)).unwrap();
        drop(listener);
    }

    #[test]
    fn skips_a_taken_port() {
        let taken = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let start = taken.local_addr().unwrap().port();
        let port = find_available_port(start).unwrap();
        assert!(port > start);
    }
}
