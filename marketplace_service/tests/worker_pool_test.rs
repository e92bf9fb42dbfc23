use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use marketplace_service::domain::error::Error;
use marketplace_service::domain::gateways::{Cache, Mailer};
use marketplace_service::jobs::email_worker::{WorkerPool, MAX_WORKERS, SCALE_DOWN_FLOOR};

/// Cola en memoria con la semántica del contrato: BRPOP con latencia
/// simulada y timeout. El trabajo se toma DESPUÉS de la latencia, así una
/// cancelación durante la espera no pierde jobs.
struct ScriptedQueue {
    jobs: Mutex<Vec<String>>,
    pop_latency: Duration,
}

impl ScriptedQueue {
    fn with_jobs(count: usize, pop_latency: Duration) -> Self {
        let jobs = (0..count).map(job_payload).collect();
        Self {
            jobs: Mutex::new(jobs),
            pop_latency,
        }
    }

    fn with_payloads(payloads: Vec<String>, pop_latency: Duration) -> Self {
        Self {
            jobs: Mutex::new(payloads),
            pop_latency,
        }
    }
}

#[async_trait]
impl Cache for ScriptedQueue {
    async fn add_to_cart(&self, _: i64, _: i64, _: i64) -> Result<(), Error> {
        unimplemented!("not used by the worker pool")
    }
    async fn set_cart_quantity(&self, _: i64, _: i64, _: i64) -> Result<(), Error> {
        unimplemented!("not used by the worker pool")
    }
    async fn remove_cart_item(&self, _: i64, _: i64) -> Result<(), Error> {
        unimplemented!("not used by the worker pool")
    }
    async fn clear_cart(&self, _: i64) -> Result<(), Error> {
        unimplemented!("not used by the worker pool")
    }
    async fn get_cart(&self, _: i64) -> Result<HashMap<String, String>, Error> {
        unimplemented!("not used by the worker pool")
    }
    async fn cart_count(&self, _: i64) -> Result<i64, Error> {
        unimplemented!("not used by the worker pool")
    }
    async fn set_verification_token(&self, _: &str, _: i64, _: Duration) -> Result<(), Error> {
        unimplemented!("not used by the worker pool")
    }
    async fn get_user_id_by_token_hash(&self, _: &str) -> Result<Option<i64>, Error> {
        unimplemented!("not used by the worker pool")
    }
    async fn get_token_hash_by_user_id(&self, _: i64) -> Result<Option<String>, Error> {
        unimplemented!("not used by the worker pool")
    }
    async fn delete_verification_token(&self, _: &str, _: i64) -> Result<(), Error> {
        unimplemented!("not used by the worker pool")
    }

    async fn enqueue_email(&self, payload: String) -> Result<(), Error> {
        self.jobs.lock().unwrap().insert(0, payload);
        Ok(())
    }

    async fn blocking_pop_email(&self, timeout: Duration) -> Result<Option<String>, Error> {
        tokio::time::sleep(self.pop_latency).await;
        let popped = self.jobs.lock().unwrap().pop();
        match popped {
            Some(payload) => Ok(Some(payload)),
            None => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }

    async fn email_queue_len(&self) -> Result<i64, Error> {
        Ok(self.jobs.lock().unwrap().len() as i64)
    }
}

#[derive(Default)]
struct CountingMailer {
    sent: AtomicI64,
}

impl CountingMailer {
    fn sent(&self) -> i64 {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mailer for CountingMailer {
    async fn send(
        &self,
        _recipient: &str,
        _template_file: &str,
        _template_data: &serde_json::Value,
    ) -> Result<(), Error> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn job_payload(i: usize) -> String {
    serde_json::to_string(&serde_json::json!({
        "recipient": format!("user{i}@example.com"),
        "template_file": "user_welcome.tmpl",
        "template_data": {"name": "User", "verification_token": "123456"}
    }))
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_pool_scales_up_drains_queue_and_settles_at_floor() {
    // Arrange: 100 jobs encolados, un worker semilla y el monitor activo.
    let queue = Arc::new(ScriptedQueue::with_jobs(100, Duration::from_millis(230)));
    let mailer = Arc::new(CountingMailer::default());
    let pool = WorkerPool::new(queue.clone(), mailer.clone());

    let _monitor = pool.start_queue_monitor();
    pool.start_email_workers(1);

    // Act: dejar correr 90 s virtuales muestreando el máximo de workers.
    let mut max_active = 0;
    for _ in 0..900 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        max_active = max_active.max(pool.active_workers());
    }

    // Assert: escaló, nunca pasó la cota, drenó todo y volvió al piso.
    assert!(max_active > 1, "monitor never scaled up (max {max_active})");
    assert!(max_active <= MAX_WORKERS);
    assert_eq!(mailer.sent(), 100);
    assert_eq!(pool.active_workers(), SCALE_DOWN_FLOOR);

    // Stop apaga también a los workers del piso.
    pool.stop();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(pool.active_workers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_active_workers_never_exceed_max() {
    let queue = Arc::new(ScriptedQueue::with_jobs(0, Duration::from_millis(10)));
    let mailer = Arc::new(CountingMailer::default());
    let pool = WorkerPool::new(queue, mailer);

    // Pedir muchos más workers que la cota.
    pool.start_email_workers(3 * MAX_WORKERS);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(pool.active_workers(), MAX_WORKERS);

    pool.stop();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(pool.active_workers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_poison_payload_is_discarded_and_worker_survives() {
    let payloads = vec![
        job_payload(1),
        "this is not json".to_string(),
        job_payload(2),
    ];
    let queue = Arc::new(ScriptedQueue::with_payloads(
        payloads,
        Duration::from_millis(50),
    ));
    let mailer = Arc::new(CountingMailer::default());
    let pool = WorkerPool::new(queue, mailer.clone());

    pool.start_email_workers(1);
    tokio::time::sleep(Duration::from_secs(10)).await;

    // El payload envenenado se descarta; los válidos se entregan y el
    // worker sigue vivo.
    assert_eq!(mailer.sent(), 2);
    assert_eq!(pool.active_workers(), 1);

    pool.stop();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(pool.active_workers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let queue = Arc::new(ScriptedQueue::with_jobs(0, Duration::from_millis(10)));
    let mailer = Arc::new(CountingMailer::default());
    let pool = WorkerPool::new(queue, mailer);

    pool.start_email_workers(5);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(pool.active_workers(), 5);

    pool.stop();
    pool.stop();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(pool.active_workers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failing_queue_backs_off_instead_of_spinning() {
    struct FailingQueue {
        pop_calls: AtomicI64,
    }

    #[async_trait]
    impl Cache for FailingQueue {
        async fn add_to_cart(&self, _: i64, _: i64, _: i64) -> Result<(), Error> {
            unimplemented!()
        }
        async fn set_cart_quantity(&self, _: i64, _: i64, _: i64) -> Result<(), Error> {
            unimplemented!()
        }
        async fn remove_cart_item(&self, _: i64, _: i64) -> Result<(), Error> {
            unimplemented!()
        }
        async fn clear_cart(&self, _: i64) -> Result<(), Error> {
            unimplemented!()
        }
        async fn get_cart(&self, _: i64) -> Result<HashMap<String, String>, Error> {
            unimplemented!()
        }
        async fn cart_count(&self, _: i64) -> Result<i64, Error> {
            unimplemented!()
        }
        async fn set_verification_token(&self, _: &str, _: i64, _: Duration) -> Result<(), Error> {
            unimplemented!()
        }
        async fn get_user_id_by_token_hash(&self, _: &str) -> Result<Option<i64>, Error> {
            unimplemented!()
        }
        async fn get_token_hash_by_user_id(&self, _: i64) -> Result<Option<String>, Error> {
            unimplemented!()
        }
        async fn delete_verification_token(&self, _: &str, _: i64) -> Result<(), Error> {
            unimplemented!()
        }
        async fn enqueue_email(&self, _: String) -> Result<(), Error> {
            unimplemented!()
        }
        async fn blocking_pop_email(&self, _: Duration) -> Result<Option<String>, Error> {
            self.pop_calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::internal(
                "cache.blocking_pop_email",
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "cache down"),
            ))
        }
        async fn email_queue_len(&self) -> Result<i64, Error> {
            Ok(0)
        }
    }

    let queue = Arc::new(FailingQueue {
        pop_calls: AtomicI64::new(0),
    });
    let mailer = Arc::new(CountingMailer::default());
    let pool = WorkerPool::new(queue.clone(), mailer);

    pool.start_email_workers(1);
    tokio::time::sleep(Duration::from_secs(60)).await;

    // Backoff exponencial 1s -> 30s: en 60 s caben pocos intentos
    // (1+2+4+8+16+30... ), jamás cientos.
    let calls = queue.pop_calls.load(Ordering::SeqCst);
    assert!(calls >= 2, "worker should keep retrying (calls={calls})");
    assert!(calls <= 12, "worker is spinning without backoff (calls={calls})");

    pool.stop();
    tokio::time::sleep(Duration::from_secs(35)).await;
    assert_eq!(pool.active_workers(), 0);
}
