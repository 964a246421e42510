use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use groupcart_core::RoomId;
use groupcart_events::{RoomScoped, RoomTransport, Subscription};

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Tick used when none is configured.
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// Inbound message pump for one room.
///
/// Drains a room subscription on its own thread and hands each message to
/// the handler (the `on_receive` callback), one at a time. Messages for other
/// rooms are skipped, which lets several rooms share one channel. The tick
/// bounds how long a shutdown request waits on an idle room.
#[derive(Debug, Clone)]
pub struct RoomWorker {
    name: String,
    tick: Duration,
}

impl RoomWorker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tick: DEFAULT_TICK,
        }
    }

    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(Duration::from_millis(1));
        self
    }

    /// Subscribe to `room_id` on `transport` and start pumping it.
    ///
    /// The subscription exists before this returns, so nothing sent to the room
    /// afterwards is missed.
    pub fn subscribe<M, T, H, E>(
        self,
        transport: &T,
        room_id: RoomId,
        handler: H,
    ) -> io::Result<WorkerHandle>
    where
        M: RoomScoped + Send + 'static,
        T: RoomTransport<M> + ?Sized,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let sub = transport.subscribe(&room_id);
        self.spawn(sub, room_id, handler)
    }

    /// Pump an existing subscription. The handler must tolerate duplicates.
    pub fn spawn<M, H, E>(
        self,
        sub: Subscription<M>,
        room_id: RoomId,
        mut handler: H,
    ) -> io::Result<WorkerHandle>
    where
        M: RoomScoped + Send + 'static,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let join = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || self.run(&room_id, sub, shutdown_rx, &mut handler))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }

    fn run<M, H, E>(
        &self,
        room_id: &RoomId,
        sub: Subscription<M>,
        shutdown_rx: mpsc::Receiver<()>,
        handler: &mut H,
    ) where
        M: RoomScoped,
        H: FnMut(M) -> Result<(), E>,
        E: core::fmt::Debug,
    {
        let mut handled = 0usize;
        let mut failed = 0usize;

        while shutdown_rx.try_recv().is_err() {
            let msg = match sub.recv_timeout(self.tick) {
                Ok(msg) => msg,
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    debug!(worker = %self.name, room_id = %room_id, "room subscription closed");
                    break;
                }
            };

            if msg.room_id() != room_id {
                continue;
            }

            handled += 1;
            if let Err(err) = handler(msg) {
                failed += 1;
                warn!(worker = %self.name, room_id = %room_id, error = ?err, "room message rejected");
            }
        }

        debug!(worker = %self.name, room_id = %room_id, handled, failed, "room worker stopped");
    }
}
