use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::domain::gateways::{Cache, MailJob, Mailer};

pub const MAX_WORKERS: i64 = 50;
pub const SCALE_UP_THRESHOLD: i64 = 20;
pub const SCALE_DOWN_THRESHOLD: i64 = 5;
pub const SCALE_DOWN_FLOOR: i64 = 5;
pub const SCALE_STEP_UP: i64 = 5;
pub const SCALE_DOWN_COOLDOWN: Duration = Duration::from_secs(10);

const MONITOR_TICK: Duration = Duration::from_secs(1);
const LEN_POLL_TIMEOUT: Duration = Duration::from_secs(5);
const POP_TIMEOUT: Duration = Duration::from_secs(2);
const BACKOFF_START: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Espera hasta que el watch de stop pase a `true`, sin retener el guard de
/// lectura interno a través de un punto `.await` (necesario para que los
/// futuros que lo usan dentro de `select!` sigan siendo `Send`).
async fn wait_for_stop(rx: &mut watch::Receiver<bool>) -> Result<(), watch::error::RecvError> {
    loop {
        if *rx.borrow() {
            return Ok(());
        }
        rx.changed().await?;
    }
}

/// Pool elástico de consumidores de la cola de correos.
///
/// El handle es clonable; todos los clones comparten el mismo estado: el
/// contador atómico de workers activos y el vector de cancel handles bajo
/// un mutex (que nunca se sostiene a través de I/O). Cada worker posee un
/// canal oneshot; soltar el sender lo cancela. El `watch` de stop apaga
/// monitor y workers de una vez.
///
/// La entrega es at-least-once y pierde el orden en cuanto hay más de un
/// worker activo; un payload indescifrable se descarta (pérdida documentada
/// para notificaciones no críticas).
#[derive(Clone)]
pub struct WorkerPool {
    cache: Arc<dyn Cache>,
    mailer: Arc<dyn Mailer>,
    active_workers: Arc<AtomicI64>,
    next_worker_id: Arc<AtomicI64>,
    cancel_handles: Arc<Mutex<Vec<oneshot::Sender<()>>>>,
    stop_tx: watch::Sender<bool>,
}

impl WorkerPool {
    pub fn new(cache: Arc<dyn Cache>, mailer: Arc<dyn Mailer>) -> Self {
        let (stop_tx, _stop_rx) = watch::channel(false);
        Self {
            cache,
            mailer,
            active_workers: Arc::new(AtomicI64::new(0)),
            next_worker_id: Arc::new(AtomicI64::new(0)),
            cancel_handles: Arc::new(Mutex::new(Vec::new())),
            stop_tx,
        }
    }

    pub fn active_workers(&self) -> i64 {
        self.active_workers.load(Ordering::SeqCst)
    }

    /// Apagado cooperativo e idempotente: señala stop y suelta todos los
    /// cancel handles.
    pub fn stop(&self) {
        if *self.stop_tx.borrow() {
            return;
        }
        let _ = self.stop_tx.send(true);

        let handles = {
            let mut guard = self.cancel_handles.lock().unwrap();
            std::mem::take(&mut *guard)
        };
        drop(handles);
        info!("worker pool stopped");
    }

    /// Arranca `count` workers, nunca por encima de `MAX_WORKERS`.
    ///
    /// El slot se reserva en el contador ANTES del spawn: la cota
    /// `active <= MAX_WORKERS` se sostiene aun con ticks concurrentes.
    pub fn start_email_workers(&self, count: i64) {
        for _ in 0..count {
            let previous = self.active_workers.fetch_add(1, Ordering::SeqCst);
            if previous >= MAX_WORKERS {
                self.active_workers.fetch_sub(1, Ordering::SeqCst);
                return;
            }

            let (cancel_tx, cancel_rx) = oneshot::channel();
            self.cancel_handles.lock().unwrap().push(cancel_tx);

            let pool = self.clone();
            tokio::spawn(async move { pool.run_worker(cancel_rx).await });
        }
    }

    /// Monitor de escalado: cada tick lee el largo de la cola y decide.
    pub fn start_queue_monitor(&self) -> JoinHandle<()> {
        let pool = self.clone();
        tokio::spawn(async move {
            let mut stop_rx = pool.stop_tx.subscribe();
            let mut ticker = tokio::time::interval(MONITOR_TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_scale_down: Option<Instant> = None;

            info!("email queue monitor started");
            loop {
                tokio::select! {
                    _ = wait_for_stop(&mut stop_rx) => {
                        info!("email queue monitor stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        pool.monitor_tick(&mut last_scale_down).await;
                    }
                }
            }
        })
    }

    async fn monitor_tick(&self, last_scale_down: &mut Option<Instant>) {
        let queue_len = match tokio::time::timeout(LEN_POLL_TIMEOUT, self.cache.email_queue_len())
            .await
        {
            Ok(Ok(len)) => len,
            Ok(Err(e)) => {
                error!(error = %e, "error fetching queue length");
                return;
            }
            Err(_) => {
                error!("queue length poll timed out");
                return;
            }
        };

        let active = self.active_workers();

        if queue_len > SCALE_UP_THRESHOLD && active < MAX_WORKERS {
            let deploying = SCALE_STEP_UP.min(MAX_WORKERS - active);
            info!(queue_len, active, deploying, "scaling up email workers");
            self.start_email_workers(deploying);
            return;
        }

        if queue_len <= SCALE_DOWN_THRESHOLD && active > SCALE_DOWN_FLOOR {
            let cooldown_elapsed =
                last_scale_down.is_none_or(|at| at.elapsed() >= SCALE_DOWN_COOLDOWN);
            if !cooldown_elapsed {
                return;
            }

            let tail = {
                let mut handles = self.cancel_handles.lock().unwrap();
                let surplus = (active - SCALE_DOWN_FLOOR).min(handles.len() as i64);
                if surplus <= 0 {
                    return;
                }
                let keep = handles.len() - surplus as usize;
                handles.split_off(keep)
            };

            info!(queue_len, active, stopping = tail.len(), "scaling down email workers");
            // Soltar los senders cierra los canales de cancelación.
            drop(tail);
            *last_scale_down = Some(Instant::now());
        }
    }

    async fn run_worker(&self, mut cancel_rx: oneshot::Receiver<()>) {
        let worker_id = self.next_worker_id.fetch_add(1, Ordering::SeqCst) + 1;
        info!(worker_id, "email worker started");

        let mut stop_rx = self.stop_tx.subscribe();
        let mut backoff = BACKOFF_START;

        loop {
            tokio::select! {
                _ = &mut cancel_rx => {
                    info!(worker_id, "worker received scale-down signal, exiting");
                    break;
                }
                _ = wait_for_stop(&mut stop_rx) => {
                    warn!(worker_id, "worker received shutdown signal");
                    break;
                }
                popped = self.cache.blocking_pop_email(POP_TIMEOUT) => match popped {
                    Ok(Some(payload)) => {
                        backoff = BACKOFF_START;
                        self.process_job(worker_id, &payload).await;
                    }
                    // Timeout del BRPOP: no hay trabajo, reintenta ya.
                    Ok(None) => {}
                    Err(e) => {
                        error!(worker_id, error = %e, "queue pop failed, backing off");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(BACKOFF_MAX);
                    }
                }
            }
        }

        self.active_workers.fetch_sub(1, Ordering::SeqCst);
        self.prune_closed_handles();
        info!(worker_id, "email worker stopped");
    }

    async fn process_job(&self, worker_id: i64, payload: &str) {
        let job: MailJob = match serde_json::from_str(payload) {
            Ok(job) => job,
            Err(e) => {
                error!(worker_id, error = %e, payload, "failed to decode mail job, skipping");
                return;
            }
        };

        match self
            .mailer
            .send(&job.recipient, &job.template_file, &job.template_data)
            .await
        {
            Ok(()) => info!(worker_id, recipient = %job.recipient, "mail sent"),
            Err(e) => error!(
                worker_id,
                recipient = %job.recipient,
                template = %job.template_file,
                error = %e,
                "final mail delivery failed"
            ),
        }
    }

    /// Un worker que salió por error o stop deja su sender huérfano en el
    /// vector; se poda por `is_closed` al salir cada worker.
    fn prune_closed_handles(&self) {
        self.cancel_handles
            .lock()
            .unwrap()
            .retain(|tx| !tx.is_closed());
    }
}
