//! Real-socket end-to-end coverage of the testable properties: add2,
//! find-on-empty-registry, registry replacement, oversize rejection,
//! concurrent multi-client load, and framing recovery.

use std::io::Write;
use std::net::TcpStream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use kestrel::{call, close_client, find, init_client, init_server, register, serve_all};
use kestrel_registry::Handler;
use kestrel_wire::Payload;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn add2_handler() -> Arc<dyn Handler> {
    Arc::new(|p: Payload| {
        let blob = p.blob.unwrap_or_default();
        let a = p.scalar as i8;
        let b = *blob.first().unwrap_or(&0) as i8;
        Payload::new(a.wrapping_add(b) as i64, None).ok()
    })
}

#[test]
fn add2_scenario_matches_scripted_reply() {
    init_tracing();
    let server = init_server("127.0.0.1:0").unwrap();
    let addr = server.local_addr().unwrap();
    register(&server, "add2", add2_handler()).unwrap();
    let server_thread = thread::spawn(move || serve_all(&server));

    let mut client = init_client(addr).unwrap();
    let handle = find(&mut client, "add2").unwrap().expect("registered");
    let payload = Payload::new(3, Some(vec![100])).unwrap();
    let reply = call(&mut client, &handle, payload).unwrap().unwrap();
    assert_eq!(reply.scalar, 103);
    assert_eq!(reply.blob, None);

    let payload = Payload::new(0, Some(vec![100])).unwrap();
    let reply = call(&mut client, &handle, payload).unwrap().unwrap();
    assert_eq!(reply.scalar, 100);

    shutdown_and_join(&mut client, server_thread);
}

#[test]
fn find_on_empty_registry_returns_absent_handle() {
    init_tracing();
    let server = init_server("127.0.0.1:0").unwrap();
    let addr = server.local_addr().unwrap();
    let server_thread = thread::spawn(move || serve_all(&server));

    let mut client = init_client(addr).unwrap();
    assert!(find(&mut client, "missing").unwrap().is_none());

    shutdown_and_join(&mut client, server_thread);
}

#[test]
fn re_registration_replaces_the_active_handler() {
    init_tracing();
    let server = init_server("127.0.0.1:0").unwrap();
    let addr = server.local_addr().unwrap();
    let add: Arc<dyn Handler> = Arc::new(|p: Payload| {
        let blob = p.blob.unwrap_or_default();
        Payload::new(p.scalar + *blob.first().unwrap_or(&0) as i64, None).ok()
    });
    let sub: Arc<dyn Handler> = Arc::new(|p: Payload| {
        let blob = p.blob.unwrap_or_default();
        Payload::new(p.scalar - *blob.first().unwrap_or(&0) as i64, None).ok()
    });
    register(&server, "op", add).unwrap();
    register(&server, "op", sub).unwrap();
    let server_thread = thread::spawn(move || serve_all(&server));

    let mut client = init_client(addr).unwrap();
    let handle = find(&mut client, "op").unwrap().unwrap();
    let payload = Payload::new(5, Some(vec![2])).unwrap();
    let reply = call(&mut client, &handle, payload).unwrap().unwrap();
    assert_eq!(reply.scalar, 3);

    shutdown_and_join(&mut client, server_thread);
}

#[test]
fn oversize_blob_len_claim_closes_the_connection() {
    init_tracing();
    let server = init_server("127.0.0.1:0").unwrap();
    let addr = server.local_addr().unwrap();
    register(&server, "add2", add2_handler()).unwrap();
    let server_thread = thread::spawn(move || serve_all(&server));

    // Hand-craft a gamma-coded size prefix claiming an envelope of exactly
    // one byte over the limit, then a matching echo round and garbage
    // envelope bytes. The server must reject this before ever decoding a
    // full envelope and must close the connection.
    let mut raw = TcpStream::connect(addr).unwrap();
    let oversize = kestrel_wire::MAX_MESSAGE_BYTE_SIZE + 1;
    let mut len_buf = kestrel_wire::GrowableBuffer::new(8);
    kestrel_wire::gamma::encode(&mut len_buf, oversize);
    raw.write_all(len_buf.as_produced()).unwrap();
    raw.flush().unwrap();

    // The server should close without ever echoing back, or if it does
    // echo, the subsequent read must observe EOF rather than a reply.
    let mut discard = [0u8; 1];
    use std::io::Read;
    let _ = raw.set_read_timeout(Some(Duration::from_secs(2)));
    loop {
        match raw.read(&mut discard) {
            Ok(0) => break,
            Ok(_) => continue,
            Err(_) => break,
        }
    }

    // A fresh, well-behaved client must still be served normally: the
    // earlier connection's failure must not have taken the server down.
    let mut client = init_client(addr).unwrap();
    let handle = find(&mut client, "add2").unwrap().expect("still registered");
    let reply = call(&mut client, &handle, Payload::new(1, Some(vec![1])).unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(reply.scalar, 2);

    shutdown_and_join(&mut client, server_thread);
}

#[test]
fn concurrent_clients_each_see_their_own_replies_in_order() {
    init_tracing();
    let server = init_server("127.0.0.1:0").unwrap();
    let addr = server.local_addr().unwrap();
    let invocations = Arc::new(AtomicUsize::new(0));
    let invocations_for_handler = invocations.clone();
    let sleepy: Arc<dyn Handler> = Arc::new(move |p: Payload| {
        thread::sleep(Duration::from_millis(200));
        invocations_for_handler.fetch_add(1, Ordering::SeqCst);
        Some(p)
    });
    register(&server, "sleepy", sleepy).unwrap();
    let server_thread = thread::spawn(move || serve_all(&server));

    let workers: Vec<_> = ["A", "B"]
        .iter()
        .map(|label| {
            let label = label.to_string();
            thread::spawn(move || {
                let mut client = init_client(addr).unwrap();
                let handle = find(&mut client, "sleepy").unwrap().unwrap();
                for i in 0..5i64 {
                    let payload = Payload::new(i, None).unwrap();
                    let reply = call(&mut client, &handle, payload).unwrap().unwrap();
                    assert_eq!(reply.scalar, i, "{label} call {i} out of order");
                }
                close_client(&mut client);
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }
    assert_eq!(invocations.load(Ordering::SeqCst), 10);

    let mut client = init_client(addr).unwrap();
    shutdown_and_join(&mut client, server_thread);
}

#[test]
fn truncated_frame_kills_only_that_connection() {
    init_tracing();
    let server = init_server("127.0.0.1:0").unwrap();
    let addr = server.local_addr().unwrap();
    register(&server, "add2", add2_handler()).unwrap();
    let server_thread = thread::spawn(move || serve_all(&server));

    // Announce a modest size, complete the echo handshake, then close
    // before supplying the promised envelope bytes.
    let mut raw = TcpStream::connect(addr).unwrap();
    let mut len_buf = kestrel_wire::GrowableBuffer::new(8);
    kestrel_wire::gamma::encode(&mut len_buf, 50);
    raw.write_all(len_buf.as_produced()).unwrap();
    raw.flush().unwrap();
    drop(raw); // close before the server can read 50 envelope bytes

    thread::sleep(Duration::from_millis(100));

    let mut client = init_client(addr).unwrap();
    let handle = find(&mut client, "add2").unwrap().expect("server still serving");
    let reply = call(&mut client, &handle, Payload::new(1, Some(vec![1])).unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(reply.scalar, 2);

    shutdown_and_join(&mut client, server_thread);
}

fn shutdown_and_join(
    client: &mut kestrel::ClientEngine,
    server_thread: thread::JoinHandle<kestrel::EngineResult<()>>,
) {
    let shutdown_handle = find(client, "shutdown").unwrap().expect("builtin shutdown verb");
    call(client, &shutdown_handle, Payload::empty()).unwrap();
    close_client(client);
    server_thread
        .join()
        .expect("server thread panicked")
        .expect("serve_all returned an error");
}
