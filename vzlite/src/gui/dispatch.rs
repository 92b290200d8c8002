//! Main-thread dispatch.
//!
//! The UI toolkit requires every window mutation to happen on one designated
//! thread. [`MainThreadDispatcher`] abstracts that thread; [`main_queue`]
//! builds a concrete one backed by an unbounded queue drained by
//! [`MainLoop::run`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use vzlite_shared::{VzError, VzResult};

/// Unit of work executed on the main thread.
pub type MainTask = Box<dyn FnOnce() + Send + 'static>;

/// The designated UI-affine execution context.
pub trait MainThreadDispatcher: Send + Sync {
    /// Whether the calling thread is the main thread.
    fn is_main_thread(&self) -> bool;

    /// Queue a task for execution on the main thread.
    ///
    /// Tasks run in the order they were queued.
    fn dispatch(&self, task: MainTask) -> VzResult<()>;
}

/// Run `f` on the main thread and wait for its result.
///
/// Runs inline when already on the main thread, so a main-thread caller never
/// deadlocks waiting on itself. The wait parks the calling thread without
/// entering any async runtime, so it is safe from inside a tokio task.
pub fn run_on_main<D, F, R>(dispatcher: &D, f: F) -> VzResult<R>
where
    D: MainThreadDispatcher + ?Sized,
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if dispatcher.is_main_thread() {
        return Ok(f());
    }

    let (tx, rx) = oneshot::channel();
    dispatcher.dispatch(Box::new(move || {
        let _ = tx.send(f());
    }))?;
    futures::executor::block_on(rx)
        .map_err(|_| VzError::Internal("main thread dropped a synchronous task".into()))
}

/// Queue `f` on the main thread without waiting for it.
pub fn dispatch_to_main<D, F>(dispatcher: &D, f: F) -> VzResult<()>
where
    D: MainThreadDispatcher + ?Sized,
    F: FnOnce() + Send + 'static,
{
    dispatcher.dispatch(Box::new(f))
}

enum Message {
    Run(MainTask),
    Quit,
}

/// Create a main-thread queue and the loop that drains it.
///
/// The thread that calls [`MainLoop::run`] becomes the main thread.
pub fn main_queue() -> (MainQueue, MainLoop) {
    let (tx, rx) = mpsc::unbounded_channel();
    let thread = Arc::new(OnceLock::new());
    (
        MainQueue {
            tx,
            thread: Arc::clone(&thread),
        },
        MainLoop { rx, thread },
    )
}

/// Sending side of the main-thread queue.
#[derive(Clone)]
pub struct MainQueue {
    tx: UnboundedSender<Message>,
    thread: Arc<OnceLock<ThreadId>>,
}

impl MainQueue {
    /// Run a main loop on a dedicated named thread and return its queue.
    ///
    /// For hosts without a UI toolkit of their own (headless runs, tests).
    pub fn spawn(name: &str) -> VzResult<MainQueue> {
        let (queue, main_loop) = main_queue();
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || main_loop.run())?;
        Ok(queue)
    }

    /// Ask the loop to exit after the tasks already queued.
    pub fn quit(&self) {
        let _ = self.tx.send(Message::Quit);
    }
}

impl MainThreadDispatcher for MainQueue {
    fn is_main_thread(&self) -> bool {
        self.thread.get() == Some(&thread::current().id())
    }

    fn dispatch(&self, task: MainTask) -> VzResult<()> {
        self.tx
            .send(Message::Run(task))
            .map_err(|_| VzError::Internal("main loop is not running".into()))
    }
}

/// Receiving side of the main-thread queue.
pub struct MainLoop {
    rx: UnboundedReceiver<Message>,
    thread: Arc<OnceLock<ThreadId>>,
}

impl MainLoop {
    /// Drain the queue on the calling thread until `quit` or until every
    /// [`MainQueue`] is dropped.
    ///
    /// A panicking task is logged and does not stop the loop.
    pub fn run(mut self) {
        let _ = self.thread.set(thread::current().id());
        tracing::debug!("Main loop running");

        while let Some(message) = self.rx.blocking_recv() {
            match message {
                Message::Run(task) => {
                    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                        tracing::error!("Main-thread task panicked");
                    }
                }
                Message::Quit => break,
            }
        }

        tracing::debug!("Main loop exited");
    }
}
