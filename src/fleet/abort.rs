use tokio::sync::watch;

pub fn abort_signal() -> (AbortHandle, AbortSignal) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle { tx }, AbortSignal { rx })
}

#[derive(Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }
}

/// Observed by jobs to stop early. Dropping the handle without aborting never fires the signal.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    pub fn never() -> Self {
        let (_, signal) = abort_signal();
        signal
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    pub async fn aborted(&mut self) {
        let closed = self.rx.wait_for(|aborted| *aborted).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}
