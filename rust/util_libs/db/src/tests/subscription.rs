use anyhow::Result;
use bson::doc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

use super::{contact, contacts};
use crate::repository::QueryOptions;
use crate::store::MemoryStore;

const WAIT: Duration = Duration::from_secs(2);

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(WAIT, rx.recv())
        .await
        .expect("callback did not fire in time")
        .expect("subscription channel closed")
}

#[tokio::test]
async fn document_subscription_reports_current_value_then_changes() -> Result<()> {
    let repo = contacts(&MemoryStore::new());
    let created = repo.create(contact("A", "Ana")).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = repo
        .subscribe_to_document(&created.id, move |record| {
            let _ = tx.send(record);
        })
        .await?;

    // The first value is delivered before subscribe returns.
    let initial = rx.try_recv()?.expect("current record");
    assert_eq!(initial.data.first_name, "Ana");

    // Changes to other documents are not reported.
    repo.create(contact("A", "Bea")).await?;
    repo.update(&created.id, doc! { "firstName": "Ann" }).await?;
    let changed = next(&mut rx).await.expect("updated record");
    assert_eq!(changed.data.first_name, "Ann");

    repo.delete(&created.id).await?;
    assert!(next(&mut rx).await.is_none());

    assert!(subscription.is_active());
    subscription.unsubscribe();
    Ok(())
}

#[tokio::test]
async fn collection_subscription_relists_on_change() -> Result<()> {
    let repo = contacts(&MemoryStore::new());
    repo.create(contact("A", "Ana")).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = repo
        .subscribe_to_collection(QueryOptions::new().scoped_to("A")?, move |records| {
            let _ = tx.send(records.len());
        })
        .await?;
    assert_eq!(rx.try_recv()?, 1);

    repo.create(contact("A", "Bea")).await?;
    assert_eq!(next(&mut rx).await, 2);

    let other = repo.create(contact("B", "Cid")).await?;
    assert_eq!(next(&mut rx).await, 2);

    repo.soft_delete(&other.id).await?;
    assert_eq!(next(&mut rx).await, 2);

    subscription.unsubscribe();
    Ok(())
}

#[tokio::test]
async fn unsubscribe_stops_callbacks() -> Result<()> {
    let repo = contacts(&MemoryStore::new());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = repo
        .subscribe_to_collection(QueryOptions::new(), move |records| {
            let _ = tx.send(records.len());
        })
        .await?;
    assert_eq!(rx.try_recv()?, 0);

    subscription.unsubscribe();
    tokio::task::yield_now().await;
    repo.create(contact("A", "Ana")).await?;

    // The callback (and its sender) are dropped with the aborted task.
    assert!(timeout(WAIT, rx.recv()).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn subscription_ends_when_store_fails() -> Result<()> {
    let store = MemoryStore::new();
    let repo = contacts(&store);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = repo
        .subscribe_to_collection(QueryOptions::new(), move |records| {
            let _ = tx.send(records.len());
        })
        .await?;
    assert_eq!(rx.try_recv()?, 0);

    repo.create(contact("A", "Ana")).await?;
    store.set_unavailable(true);

    // The relisting fails, so the listener stops and drops its callback.
    assert!(timeout(WAIT, rx.recv()).await?.is_none());
    assert!(!subscription.is_active());
    Ok(())
}
