use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, select};
use tracing::{debug, trace, warn};

use crate::backend::{Client, ReadWriteTransaction};
use crate::error::DriverError;

use super::TxHandle;
use super::channel::{BoxedOperation, BoxedResponse, Command};

type Outcome = Result<(), DriverError>;

/// State shared between the caller side and the worker thread.
#[derive(Default)]
struct BridgeState {
    running: AtomicBool,
    failure: OnceLock<DriverError>,
}

impl BridgeState {
    /// Keeps the first failure; later ones are ignored.
    fn record_failure(&self, err: &DriverError) {
        let _ = self.failure.set(err.clone());
    }
}

/// Caller side of one bridged transaction.
pub(crate) struct TransactionBridge {
    id: u64,
    read_only: bool,
    // Closing this channel asks the loop to drain and commit.
    commands: Mutex<Option<Sender<Command>>>,
    // Never sent on; dropping the sender is the rollback signal.
    rollback: Mutex<Option<Sender<()>>>,
    outcome_rx: Receiver<Outcome>,
    outcome: OnceLock<Outcome>,
    // Disconnects once the worker thread has exited.
    worker_done: Receiver<()>,
    state: Arc<BridgeState>,
}

impl TransactionBridge {
    /// Start the backend transaction on a worker thread and return without waiting for the
    /// callback to begin.
    ///
    /// # Errors
    /// Returns [`DriverError::ConnectionError`] if the worker thread cannot be spawned.
    pub(crate) fn start(
        client: Arc<dyn Client>,
        id: u64,
        read_only: bool,
    ) -> Result<Self, DriverError> {
        let (command_tx, command_rx) = bounded::<Command>(1);
        let (rollback_tx, rollback_rx) = bounded::<()>(1);
        let (outcome_tx, outcome_rx) = bounded::<Outcome>(1);
        let (done_tx, done_rx) = bounded::<()>(0);
        let state = Arc::new(BridgeState::default());
        state.running.store(true, Ordering::SeqCst);

        let worker_state = Arc::clone(&state);
        thread::Builder::new()
            .name(format!("spanner-txn-{id}"))
            .spawn(move || {
                let _done = done_tx;
                let result = if read_only {
                    run_read_only(client.as_ref(), &command_rx, &rollback_rx, &worker_state)
                } else {
                    run_read_write(client.as_ref(), &command_rx, &rollback_rx, &worker_state)
                };
                if let Err(err) = &result {
                    worker_state.record_failure(err);
                }
                debug!(txn = id, ok = result.is_ok(), "transaction callback returned");
                let _ = outcome_tx.send(result);
            })
            .map_err(|err| {
                DriverError::ConnectionError(format!("failed to spawn transaction worker: {err}"))
            })?;

        debug!(txn = id, read_only, "transaction started");
        Ok(Self {
            id,
            read_only,
            commands: Mutex::new(Some(command_tx)),
            rollback: Mutex::new(Some(rollback_tx)),
            outcome_rx,
            outcome: OnceLock::new(),
            worker_done: done_rx,
            state,
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn read_only(&self) -> bool {
        self.read_only
    }

    /// True until commit or rollback has torn the bridge down.
    pub(crate) fn running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// True once a failure has been recorded, possibly before teardown.
    pub(crate) fn failed(&self) -> bool {
        self.state.failure.get().is_some()
    }

    /// Run `op` inside the transaction and block until it has completed.
    ///
    /// # Errors
    /// [`DriverError::TxnFailed`] if the transaction already failed or finished,
    /// [`DriverError::TxnReadOnly`] for a write on a read-only transaction, otherwise
    /// whatever `op` returns.
    pub(crate) fn submit<T, F>(&self, needs_write: bool, op: F) -> Result<T, DriverError>
    where
        T: Send + 'static,
        F: FnOnce(&mut TxHandle<'_>) -> Result<T, DriverError> + Send + 'static,
    {
        if self.failed() {
            return Err(DriverError::TxnFailed);
        }
        if needs_write && self.read_only {
            return Err(DriverError::TxnReadOnly);
        }
        let sender = {
            let guard = self.commands.lock().map_err(|_| poisoned())?;
            guard.clone().ok_or(DriverError::TxnFailed)?
        };

        let (respond_to, reply) = bounded::<BoxedResponse>(1);
        let command = Command {
            op: boxed(move |handle| {
                op(handle).map(|value| Box::new(value) as Box<dyn Any + Send>)
            }),
            respond_to,
        };
        trace!(txn = self.id, needs_write, "submitting command");
        sender.send(command).map_err(|_| DriverError::TxnFailed)?;
        drop(sender);

        let response = select! {
            recv(reply) -> msg => msg.map_err(|_| DriverError::TxnFailed)?,
            recv(self.worker_done) -> _ => reply.try_recv().map_err(|_| DriverError::TxnFailed)?,
        };
        let boxed = response?;
        boxed
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| DriverError::ConnectionError("unexpected command response type".into()))
    }

    /// Ask the loop to commit and wait for the terminal outcome.
    ///
    /// # Errors
    /// [`DriverError::TxnFailed`] for any failed outcome; the cause is logged.
    pub(crate) fn commit(&self) -> Result<(), DriverError> {
        self.commands.lock().map_err(|_| poisoned())?.take();
        match self.finish()? {
            Ok(()) => {
                debug!(txn = self.id, "transaction committed");
                Ok(())
            }
            Err(cause) => {
                warn!(txn = self.id, error = %cause, "commit of failed transaction");
                Err(DriverError::TxnFailed)
            }
        }
    }

    /// Signal rollback and wait for the terminal outcome.
    ///
    /// # Errors
    /// The terminal outcome when it is anything other than the rolled-back sentinel, e.g. a
    /// command failure that raced with the rollback.
    pub(crate) fn rollback(&self) -> Result<(), DriverError> {
        self.rollback.lock().map_err(|_| poisoned())?.take();
        match self.finish()? {
            Ok(()) | Err(DriverError::RolledBack) => {
                debug!(txn = self.id, "transaction rolled back");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn finish(&self) -> Result<Outcome, DriverError> {
        let outcome = self
            .outcome
            .get_or_init(|| self.outcome_rx.recv().unwrap_or(Err(DriverError::TxnFailed)))
            .clone();
        self.commands.lock().map_err(|_| poisoned())?.take();
        self.rollback.lock().map_err(|_| poisoned())?.take();
        self.state.running.store(false, Ordering::SeqCst);
        Ok(outcome)
    }
}

impl Drop for TransactionBridge {
    fn drop(&mut self) {
        // Signal rollback before the command channel closes, or the loop would commit.
        if let Ok(mut guard) = self.rollback.lock() {
            guard.take();
        }
        if let Ok(mut guard) = self.commands.lock() {
            guard.take();
        }
    }
}

fn boxed<F>(op: F) -> BoxedOperation
where
    F: FnOnce(&mut TxHandle<'_>) -> BoxedResponse + Send + 'static,
{
    Box::new(op)
}

fn poisoned() -> DriverError {
    DriverError::ConnectionError("transaction state lock poisoned".into())
}

fn run_read_write(
    client: &dyn Client,
    commands: &Receiver<Command>,
    rollback: &Receiver<()>,
    state: &BridgeState,
) -> Outcome {
    let mut invoked = false;
    client.read_write_transaction(&mut |tx: &mut dyn ReadWriteTransaction| {
        if invoked {
            debug!("backend retried the transaction callback");
            return Err(DriverError::RetryUnsupported);
        }
        invoked = true;
        let mut handle = TxHandle::ReadWrite(tx);
        command_loop(&mut handle, commands, rollback, state)
    })
}

fn run_read_only(
    client: &dyn Client,
    commands: &Receiver<Command>,
    rollback: &Receiver<()>,
    state: &BridgeState,
) -> Outcome {
    let mut tx = client.read_only_transaction()?;
    let result = {
        let mut handle = TxHandle::ReadOnly(tx.as_mut());
        command_loop(&mut handle, commands, rollback, state)
    };
    tx.close();
    result
}

fn command_loop(
    handle: &mut TxHandle<'_>,
    commands: &Receiver<Command>,
    rollback: &Receiver<()>,
    state: &BridgeState,
) -> Outcome {
    loop {
        select! {
            recv(rollback) -> _ => return Err(DriverError::RolledBack),
            recv(commands) -> msg => {
                let Ok(Command { op, respond_to }) = msg else {
                    // Command channel closed: commit, unless rollback fired at the same time.
                    if matches!(rollback.try_recv(), Err(TryRecvError::Disconnected)) {
                        return Err(DriverError::RolledBack);
                    }
                    return Ok(());
                };
                match op(&mut *handle) {
                    Ok(value) => {
                        let _ = respond_to.send(Ok(value));
                    }
                    Err(err) => {
                        state.record_failure(&err);
                        let _ = respond_to.send(Err(err.clone()));
                        return Err(err);
                    }
                }
            }
        }
    }
}
