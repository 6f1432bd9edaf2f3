//! Status records produced by the bridging executor.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::json;

use pile_scheduler::{
    from_fn, Completion, Fault, PumpPool, QueueExecutor, Scheduler, SchedulerConfig, Signal, Step,
    StepReport, WaitTarget,
};

fn executor_with_pump() -> (QueueExecutor, PumpPool) {
    let scheduler = Arc::new(Scheduler::new(SchedulerConfig::default()));
    let pool = PumpPool::spawn(Arc::clone(&scheduler), 1).unwrap();
    (QueueExecutor::with_scheduler(scheduler), pool)
}

async fn finish(executor: QueueExecutor, pool: PumpPool) {
    executor.shutdown(true, false);
    tokio::task::spawn_blocking(move || pool.join())
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_yield_then_done() {
    let (executor, pool) = executor_with_pump();
    let mut yielded = false;
    let reports = executor.exec_on_queue(
        &tokio::runtime::Handle::current(),
        from_fn(move |_| {
            if !yielded {
                yielded = true;
                return Step::Yield;
            }
            Step::Complete("done")
        }),
    );

    let records: Vec<_> = reports
        .map(|r| serde_json::to_value(r).unwrap())
        .collect()
        .await;

    assert_eq!(
        records,
        vec![json!({"status": "yielding"}), json!({"status": "done", "value": "done"})]
    );
    finish(executor, pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn raised_error_ends_sequence() {
    let (executor, pool) = executor_with_pump();
    let reports = executor
        .exec_on_queue(
            &tokio::runtime::Handle::current(),
            from_fn(|_| -> Step<()> { Step::Raise(Fault::error("bad state")) }),
        )
        .collect_all()
        .await;

    assert_eq!(reports.len(), 1);
    match &reports[0] {
        StepReport::Raised { exception } => assert_eq!(exception, "bad state"),
        other => panic!("unexpected report: {other:?}"),
    }
    finish(executor, pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_reports_the_target() {
    let (executor, pool) = executor_with_pump();
    let gate: Arc<Completion<()>> = Arc::new(Completion::new());
    let target = WaitTarget::from(Arc::clone(&gate));

    let mut reports = executor.exec_on_queue(
        &tokio::runtime::Handle::current(),
        from_fn(move |_| {
            if target.is_ready() {
                Step::Complete(1)
            } else {
                Step::Block(target.clone())
            }
        }),
    );

    // The gate is still closed, so the first step must block on it.
    let first = reports.recv().await.unwrap();
    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        json!({"status": "blocking", "on": "completion (Pending)"})
    );

    gate.set_result(());
    let rest = reports.collect_all().await;

    let (last, blocked) = rest.split_last().unwrap();
    match last {
        StepReport::Done { value } => assert_eq!(*value, 1),
        other => panic!("unexpected report: {other:?}"),
    }
    for report in blocked {
        assert_eq!(report.status(), "blocking");
        let json = serde_json::to_value(report).unwrap();
        assert!(json["on"].as_str().unwrap().starts_with("completion"));
    }
    finish(executor, pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_on_a_task_names_it() {
    let (executor, pool) = executor_with_pump();
    let release: Arc<Completion<()>> = Arc::new(Completion::new());
    let gate_release = WaitTarget::from(Arc::clone(&release));
    let gate = executor
        .scheduler()
        .submit(from_fn(move |_| {
            if gate_release.is_ready() {
                Step::Complete(())
            } else {
                Step::Yield
            }
        }))
        .unwrap();
    let target = gate.wait_target();

    let mut reports = executor.exec_on_queue(
        &tokio::runtime::Handle::current(),
        from_fn(move |_| {
            if target.is_ready() {
                Step::Complete("through")
            } else {
                Step::Block(target.clone())
            }
        }),
    );

    let first = serde_json::to_value(reports.recv().await.unwrap()).unwrap();
    assert_eq!(first["status"], "blocking");
    assert!(first["on"].as_str().unwrap().starts_with(&gate.id().to_string()));

    release.set_result(());
    let rest = reports.collect_all().await;
    assert_eq!(rest.last().unwrap().status(), "done");
    finish(executor, pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_step_ends_sequence() {
    let (executor, pool) = executor_with_pump();
    let reports: Vec<_> = executor
        .exec_on_queue(
            &tokio::runtime::Handle::current(),
            from_fn(|_| -> Step<u8> { Step::Cancelled }),
        )
        .map(|r| serde_json::to_value(r).unwrap())
        .collect()
        .await;

    assert_eq!(reports, vec![json!({"status": "cancelled"})]);
    finish(executor, pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_stream_cancels_computation() {
    let (executor, pool) = executor_with_pump();
    let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();

    let mut reports = executor.exec_on_queue(
        &tokio::runtime::Handle::current(),
        from_fn(move |signal| -> Step<()> {
            let _ = seen_tx.send(signal);
            match signal {
                Signal::Resume => Step::Yield,
                Signal::Cancel => Step::Cancelled,
            }
        }),
    );

    assert_eq!(reports.recv().await.unwrap().status(), "yielding");
    drop(reports);

    let mut last = Signal::Resume;
    while let Some(signal) = seen_rx.recv().await {
        last = signal;
    }
    assert_eq!(last, Signal::Cancel);
    finish(executor, pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn jobs_await_on_the_host() {
    let (executor, pool) = executor_with_pump();
    let sum = executor.submit(|| Ok((1..=10).sum::<u32>())).unwrap();
    let text = executor.submit(|| Ok("pumped".to_string())).unwrap();

    assert_eq!(sum.await, Ok(55));
    assert_eq!(text.await, Ok("pumped".to_string()));
    finish(executor, pool).await;
}
