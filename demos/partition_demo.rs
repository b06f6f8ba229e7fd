//! # Example: partition_demo
//!
//! Runs one stream processor per partition this node is primary for.
//!
//! Demonstrates how to:
//! - Distribute partitions over members with [`PartitionDistributor`].
//! - Open a [`StreamProcessorService`] per owned partition on a shared [`ActorScheduler`].
//! - Inject a write failure into the target log and watch the processor recover.
//! - Plan a rebalance after the assignment changes.
//!
//! ## Flow
//! ```text
//! AssignmentTable ──► distribute_partitions() ──► owned partitions
//!     └─► per partition: InMemoryLog + StreamProcessorService
//!           ├─► open_async().wait()
//!           ├─► append deposits ──► processor writes running totals
//!           ├─► log.fail() ──► Failed ──► log.recover() ──► Recovering ──► PollStream
//!           └─► close_async().wait()
//! ActorScheduler::shutdown()
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=streamvisor=debug cargo run --example partition_demo
//! ```

use std::sync::Arc;
use std::time::Duration;

use streamvisor::{
    ActorScheduler, AssignmentTable, ControllerState, EventWriter, InMemoryLog, LoggedEvent,
    MemberId, PartitionDistributor, ProcessingError, ProcessorConfig, SchedulerConfig,
    StreamProcessor, StreamProcessorContext, StreamProcessorService, Subscribe, TraceWriter,
    plan_rebalance,
};

const LOCAL_MEMBER: MemberId = 1;

/// Sums `deposit:<n>` events and appends the running balance.
#[derive(Default)]
struct Balance {
    total: i64,
}

impl StreamProcessor for Balance {
    fn on_event(
        &mut self,
        event: &LoggedEvent,
        writer: &mut EventWriter,
    ) -> Result<(), ProcessingError> {
        if event.source_position.is_some() {
            return Ok(());
        }
        let text = std::str::from_utf8(&event.payload)
            .map_err(|e| ProcessingError::fatal(e.to_string()))?;
        let Some(amount) = text.strip_prefix("deposit:") else {
            return Ok(());
        };
        let amount: i64 = amount
            .parse()
            .map_err(|e: std::num::ParseIntError| ProcessingError::fatal(e.to_string()))?;
        self.total += amount;
        writer.write(format!("balance:{}", self.total).as_bytes());
        Ok(())
    }
}

async fn wait_until(what: &str, cond: impl Fn() -> bool) -> anyhow::Result<()> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("timed out waiting for {what}"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streamvisor=info".into()),
        )
        .init();

    let table = AssignmentTable::new()
        .assign(1, 1, 3)
        .assign(1, 2, 1)
        .assign(2, 2, 3)
        .assign(2, 3, 1)
        .assign(3, 3, 2)
        .assign(3, 1, 2)
        .assign(4, 1, 5)
        .assign(4, 3, 1);
    let members = [1, 2, 3];
    let layout = PartitionDistributor::new(table).distribute_partitions(&members, 2)?;
    for meta in &layout {
        println!(
            "partition {} members={:?} primary={:?}",
            meta.partition,
            meta.member_ids().collect::<Vec<_>>(),
            meta.primary
        );
    }

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(TraceWriter::new())];
    let scheduler = ActorScheduler::builder(SchedulerConfig::default())
        .with_subscribers(subs)
        .build();

    let mut partitions = Vec::new();
    for meta in layout.iter().filter(|m| m.primary == Some(LOCAL_MEMBER)) {
        let log = InMemoryLog::new(format!("partition-{}", meta.partition));
        let ctx = StreamProcessorContext::builder(
            format!("balance-{}", meta.partition),
            Arc::new(log.clone()),
            Arc::new(log.clone()),
        )
        .with_partition_id(meta.partition)
        .build();
        let service = StreamProcessorService::new(
            &scheduler,
            ProcessorConfig::default(),
            ctx,
            Balance::default(),
            log.reader(),
            log.writer(),
        );
        service.open_async().wait().await?;
        partitions.push((log, service));
    }

    for (log, service) in &partitions {
        log.append("deposit:10");
        log.append("deposit:25");
        wait_until("deposits processed", || service.position() == Some(4)).await?;

        log.fail();
        wait_until("failure observed", || service.state() == ControllerState::Failed).await?;
        log.append("deposit:5");
        log.recover();
        wait_until("recovery", || service.position() == Some(6)).await?;

        let last = log.events().pop().map(|e| e.payload).unwrap_or_default();
        println!("{} -> {}", service.role_name(), String::from_utf8_lossy(&last));
    }

    // member 3 is replaced by member 4
    let next = AssignmentTable::new()
        .assign(1, 1, 3)
        .assign(1, 2, 1)
        .assign(2, 2, 3)
        .assign(2, 4, 1)
        .assign(3, 4, 3)
        .assign(3, 1, 2)
        .assign(4, 1, 5)
        .assign(4, 4, 1);
    let next_layout = PartitionDistributor::new(next).distribute_partitions(&[1, 2, 4], 2)?;
    for op in plan_rebalance(&layout, &next_layout) {
        println!("rebalance: {op:?}");
    }

    for (_, service) in &partitions {
        service.close_async().wait().await?;
    }
    scheduler.shutdown().await?;
    Ok(())
}
