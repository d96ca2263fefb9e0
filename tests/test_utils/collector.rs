//! In-process stand-in for a forward-protocol collector.
//!
//! Accepts any number of connections, decodes `[tag, time, record]` arrays
//! from each stream and appends them to a shared list in arrival order.

use std::{
    io::BufReader,
    net::{Shutdown, SocketAddr, TcpListener, TcpStream},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use fluent_sender::{Record, Value};

pub type Event = (String, Value, Record);

pub struct MockCollector {
    addr: SocketAddr,
    events: Arc<Mutex<Vec<Event>>>,
    streams: Arc<Mutex<Vec<TcpStream>>>,
    stopping: Arc<AtomicBool>,
    acceptor: Option<thread::JoinHandle<()>>,
}

impl MockCollector {
    /// Listen on an ephemeral loopback port.
    pub fn start() -> Self {
        Self::start_on(0)
    }

    /// Listen on `port`, which may be one a previous collector released.
    pub fn start_on(port: u16) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", port)).expect("bind collector");
        let addr = listener.local_addr().expect("collector address");
        let events = Arc::new(Mutex::new(Vec::new()));
        let streams = Arc::new(Mutex::new(Vec::new()));
        let stopping = Arc::new(AtomicBool::new(false));
        let acceptor = {
            let events = Arc::clone(&events);
            let streams = Arc::clone(&streams);
            let stopping = Arc::clone(&stopping);
            thread::spawn(move || accept_loop(listener, events, streams, stopping))
        };
        Self {
            addr,
            events,
            streams,
            stopping,
            acceptor: Some(acceptor),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Snapshot of everything received so far.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("events lock").clone()
    }

    /// Wait until at least `count` events arrived, returning them all.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<Event> {
        self.wait_until(timeout, |events| events.len() >= count)
    }

    /// Poll until `done` accepts the received events or `timeout` passes.
    pub fn wait_until(&self, timeout: Duration, done: impl Fn(&[Event]) -> bool) -> Vec<Event> {
        let deadline = Instant::now() + timeout;
        loop {
            let events = self.events();
            if done(&events) || Instant::now() >= deadline {
                return events;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Stop listening and sever every open connection.
    pub fn stop(mut self) -> Vec<Event> {
        self.shutdown();
        self.events()
    }

    fn shutdown(&mut self) {
        let Some(acceptor) = self.acceptor.take() else {
            return;
        };
        self.stopping.store(true, Ordering::SeqCst);
        // Wake the blocking accept.
        let _ = TcpStream::connect(self.addr);
        let _ = acceptor.join();
        for stream in self.streams.lock().expect("streams lock").drain(..) {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for MockCollector {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn accept_loop(
    listener: TcpListener,
    events: Arc<Mutex<Vec<Event>>>,
    streams: Arc<Mutex<Vec<TcpStream>>>,
    stopping: Arc<AtomicBool>,
) {
    for stream in listener.incoming() {
        if stopping.load(Ordering::SeqCst) {
            return;
        }
        let Ok(stream) = stream else {
            continue;
        };
        if let Ok(clone) = stream.try_clone() {
            streams.lock().expect("streams lock").push(clone);
        }
        let events = Arc::clone(&events);
        thread::spawn(move || read_events(stream, &events));
    }
}

fn read_events(stream: TcpStream, events: &Mutex<Vec<Event>>) {
    let mut reader = BufReader::new(stream);
    while let Ok(event) = rmp_serde::from_read::<_, Event>(&mut reader) {
        events.lock().expect("events lock").push(event);
    }
}
