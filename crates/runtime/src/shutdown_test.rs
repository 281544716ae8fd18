#[cfg(test)]
mod tests {
    use crate::shutdown::{ShutdownSignal, run_until_shutdown_graceful};
    use std::{
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        time::Duration,
    };
    use tokio::{sync::oneshot, time};

    #[tokio::test]
    async fn test_future_completes_before_signal() {
        let future = async {
            time::sleep(Duration::from_millis(10)).await;
            "completed"
        };

        let shutdown = ShutdownSignal::new().unwrap();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        let result =
            run_until_shutdown_graceful(future, shutdown, Duration::from_secs(1), move || {
                flag.store(true, Ordering::SeqCst)
            })
            .await;

        assert_eq!(result, "completed");
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_lets_future_finish() {
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        // stands in for a loop that stops when told to
        let future = async move {
            stop_rx.await.ok();
            "stopped"
        };

        let result = run_until_shutdown_graceful(
            future,
            async {},
            Duration::from_secs(5),
            move || {
                stop_tx.send(()).unwrap();
            },
        )
        .await;

        assert_eq!(result, "stopped");
    }
}
