// Copyright (c) The socktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The category registry and its test bodies.
//!
//! The bodies exercise the host socket stack through `std::net`, strictly
//! sequentially: a test either records a boolean outcome with a description,
//! or skips. Operations documented as crash-prone on some backend are guarded
//! with the reporter's crash query before being attempted.

use socktest_runner::{
    errors::WriteEventError,
    reporter::Reporter,
    runner::{CategoryEntry, Tier},
};
use std::{
    io::{Read, Write},
    net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs, UdpSocket},
    time::Duration,
};

/// Parameters threaded into the test bodies.
#[derive(Clone, Debug)]
pub(crate) struct SuiteConfig {
    /// The helper peer host used by network-tier categories.
    pub(crate) host: String,

    /// The first port of the helper peer's port range.
    pub(crate) base_port: u16,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            base_port: 7677,
        }
    }
}

/// The ordered category registry.
pub(crate) fn categories(config: &SuiteConfig) -> Vec<CategoryEntry<'_>> {
    vec![
        CategoryEntry::new("socket", Tier::Loopback, |reporter: &mut Reporter<'_>| {
            socket_lifecycle(reporter)
        }),
        CategoryEntry::new("sendrecv", Tier::Loopback, |reporter: &mut Reporter<'_>| {
            send_recv(reporter)
        }),
        CategoryEntry::new("sockopt", Tier::Loopback, |reporter: &mut Reporter<'_>| {
            socket_options(reporter)
        }),
        CategoryEntry::new("dns", Tier::Loopback, |reporter: &mut Reporter<'_>| {
            name_resolution(reporter)
        }),
        CategoryEntry::new("peer", Tier::Network, move |reporter: &mut Reporter<'_>| {
            peer_reachability(reporter, config)
        }),
    ]
}

/// A connected loopback TCP pair: the client end and the accepted server end.
fn tcp_pair() -> std::io::Result<(TcpStream, TcpStream)> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let client = TcpStream::connect(listener.local_addr()?)?;
    let (server, _) = listener.accept()?;
    Ok((client, server))
}

fn socket_lifecycle(reporter: &mut Reporter<'_>) -> Result<(), WriteEventError> {
    let listener = TcpListener::bind("127.0.0.1:0");
    reporter.record(listener.is_ok(), "bind a TCP listener to an ephemeral port")?;
    let Ok(listener) = listener else {
        return Ok(());
    };

    let addr = listener.local_addr();
    reporter.record(
        addr.as_ref().is_ok_and(|addr| addr.port() != 0),
        "bound listener reports a nonzero local port",
    )?;
    let Ok(addr) = addr else {
        return Ok(());
    };

    let client = TcpStream::connect(addr);
    reporter.record(client.is_ok(), "connect to the listening socket")?;
    let Ok(client) = client else {
        return Ok(());
    };

    let accepted = listener.accept();
    reporter.record(accepted.is_ok(), "accept the pending connection")?;

    if let Ok((server, peer)) = accepted {
        reporter.record(
            client.local_addr().is_ok_and(|local| local == peer),
            "accepted peer address matches the client's local address",
        )?;
        reporter.record(
            server.shutdown(Shutdown::Both).is_ok(),
            "shut down the accepted connection",
        )?;
    }

    reporter.record(
        UdpSocket::bind("127.0.0.1:0").is_ok(),
        "bind a UDP socket to an ephemeral port",
    )?;
    Ok(())
}

fn send_recv(reporter: &mut Reporter<'_>) -> Result<(), WriteEventError> {
    let pair = tcp_pair();
    reporter.record(pair.is_ok(), "set up a connected loopback pair")?;
    let Ok((mut client, mut server)) = pair else {
        return Ok(());
    };

    let payload = b"socktest payload, 32 bytes long!";
    let sent = client.write_all(payload).and_then(|()| client.flush());
    reporter.record(sent.is_ok(), "send a small payload from the client")?;

    let mut buf = [0u8; 32];
    let received = server.read_exact(&mut buf);
    reporter.record(
        received.is_ok() && buf == *payload,
        "receive the same bytes on the server",
    )?;

    let echoed = server.write_all(&buf);
    let mut back = [0u8; 32];
    reporter.record(
        echoed.is_ok() && client.read_exact(&mut back).is_ok() && back == *payload,
        "echo the payload back to the client",
    )?;
    reporter.note(format!("echoed {} bytes over loopback", payload.len()))?;

    // Half-close is fatal on some backends; consult the catalog first.
    let id = reporter.next_test_id();
    match reporter.crash(id) {
        Some(reason) => reporter.skip(format!("not exercised: {reason}"))?,
        None => {
            let eof = client
                .shutdown(Shutdown::Write)
                .and_then(|()| server.read(&mut buf));
            reporter.record(
                matches!(eof, Ok(0)),
                "half-close delivers EOF to the peer",
            )?;
        }
    }
    Ok(())
}

fn socket_options(reporter: &mut Reporter<'_>) -> Result<(), WriteEventError> {
    let pair = tcp_pair();
    reporter.record(pair.is_ok(), "set up a connected loopback pair")?;
    let Ok((client, _server)) = pair else {
        return Ok(());
    };

    reporter.record(
        client.set_nodelay(true).is_ok() && client.nodelay().is_ok_and(|on| on),
        "TCP_NODELAY set/get round-trip",
    )?;

    reporter.record(
        client.set_ttl(64).is_ok() && client.ttl().is_ok_and(|ttl| ttl == 64),
        "IP_TTL set/get round-trip",
    )?;

    let timeout = Duration::from_millis(250);
    reporter.record(
        client.set_read_timeout(Some(timeout)).is_ok()
            && client.read_timeout().is_ok_and(|got| got.is_some()),
        "receive timeout is set and readable",
    )?;
    reporter.record(
        client.set_read_timeout(None).is_ok()
            && client.read_timeout().is_ok_and(|got| got.is_none()),
        "receive timeout can be cleared",
    )?;

    let udp = UdpSocket::bind("127.0.0.1:0");
    reporter.record(
        udp.is_ok_and(|udp| {
            udp.set_broadcast(true).is_ok() && udp.broadcast().is_ok_and(|on| on)
        }),
        "SO_BROADCAST set/get round-trip on UDP",
    )?;
    Ok(())
}

fn name_resolution(reporter: &mut Reporter<'_>) -> Result<(), WriteEventError> {
    let addrs: Vec<SocketAddr> = match "localhost:7".to_socket_addrs() {
        Ok(addrs) => addrs.collect(),
        Err(_) => Vec::new(),
    };
    reporter.record(
        !addrs.is_empty(),
        "localhost resolves to at least one address",
    )?;
    if !addrs.is_empty() {
        reporter.note(format!("localhost resolved to {} address(es)", addrs.len()))?;
        reporter.record(
            addrs.iter().all(|addr| addr.ip().is_loopback()),
            "every resolved localhost address is a loopback address",
        )?;
    }

    reporter.record(
        "127.0.0.1:7".parse::<SocketAddr>().is_ok(),
        "numeric address parses without a resolver",
    )?;

    reporter.record(
        "127.0.0.1:7"
            .to_socket_addrs()
            .is_ok_and(|mut addrs| addrs.next().is_some()),
        "numeric address passes through the resolver",
    )?;
    Ok(())
}

fn peer_reachability(
    reporter: &mut Reporter<'_>,
    config: &SuiteConfig,
) -> Result<(), WriteEventError> {
    let target = (config.host.as_str(), config.base_port);
    let addr = match target.to_socket_addrs().map(|mut addrs| addrs.next()) {
        Ok(Some(addr)) => addr,
        _ => {
            return reporter.bail(format!(
                "cannot resolve test host {}:{}",
                config.host, config.base_port
            ));
        }
    };
    reporter.record(true, "resolve the helper peer address")?;
    reporter.diag(format!("peer address {addr}"))?;

    match TcpStream::connect_timeout(&addr, Duration::from_secs(5)) {
        Ok(stream) => {
            reporter.record(
                stream.peer_addr().is_ok_and(|peer| peer == addr),
                "connect to the helper peer",
            )?;
        }
        Err(error) => {
            reporter.diag(format!("connect to {addr} failed: {error}"))?;
            reporter.bail(format!(
                "cannot reach test host {}:{}",
                config.host, config.base_port
            ))?;
        }
    }
    Ok(())
}
