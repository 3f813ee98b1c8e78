use anyhow::Result;
use bson::doc;
use crm_mocks::{fixtures::day, mongodb_runner::MongodRunner};
use dotenv::dotenv;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{contact, init_logging, invoice};
use crate::mongodb::MongoStore;
use crate::query::{Filter, Sort};
use crate::repository::{BatchOp, PageRequest, QueryOptions, Repository};
use crate::schemas::invoice::INVOICE_STATUS_FIELD;
use crate::schemas::{Attendance, Contact, Invoice, InvoiceStatus, Payment};
use crate::store::Patch;

const TEST_DATABASE_NAME: &str = "estate_crm_test";

#[tokio::test]
async fn test_repository_on_mongodb() -> Result<()> {
    dotenv().ok();
    init_logging();

    let mongod = MongodRunner::run_replica_set().await?;
    let client = mongod.client()?;
    let store = MongoStore::new(&client, TEST_DATABASE_NAME);

    let contacts: Repository<Contact, MongoStore> = Repository::new(store.clone());
    contacts.ensure_indexes().await?;

    // create and list per company
    for name in ["a1", "a2", "a3"] {
        contacts.create(contact("A", name)).await?;
    }
    for name in ["b1", "b2"] {
        contacts.create(contact("B", name)).await?;
    }
    let company_a = contacts.get_all_by_company("A", &QueryOptions::new()).await?;
    assert_eq!(company_a.len(), 3);
    assert!(company_a.iter().all(|r| !r.meta.is_deleted && r.meta.created_at.is_some()));
    assert_eq!(
        contacts
            .get_all_by_company("B", &QueryOptions::new())
            .await?
            .len(),
        2
    );

    // soft delete and restore
    let deleted = contacts.soft_delete(&company_a[0].id).await?;
    assert!(deleted.meta.deleted_at.is_some());
    assert_eq!(
        contacts
            .get_all_by_company("A", &QueryOptions::new())
            .await?
            .len(),
        2
    );
    let restored = contacts.restore(&company_a[0].id).await?;
    assert_eq!(restored.meta.deleted_at, None);
    assert_eq!(restored.data, company_a[0].data);

    // keyset resume
    let sorted = QueryOptions::new()
        .scoped_to("A")?
        .sort(Sort::desc("firstName"));
    let all = contacts.get_all(&sorted).await?;
    let rest = contacts
        .get_all(&sorted.clone().resume_after(&all[0])?)
        .await?;
    assert_eq!(rest.len(), 2);
    assert_eq!(rest[0].id, all[1].id);

    // pagination uses the server-side skip
    let page = contacts
        .get_paginated(&PageRequest::new(2, 2).with_options(sorted))
        .await?;
    assert_eq!(page.pagination.total_pages, 2);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, all[2].id);

    // delete
    assert!(contacts.delete(&all[2].id).await?);
    assert!(contacts.get_by_id(&all[2].id).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_invoices_batch_and_push_on_mongodb() -> Result<()> {
    dotenv().ok();
    init_logging();

    let mongod = MongodRunner::run_replica_set().await?;
    let client = mongod.client()?;
    let store = MongoStore::new(&client, TEST_DATABASE_NAME);
    let invoices: Repository<Invoice, MongoStore> = Repository::new(store);

    let ids = invoices
        .batch_write(vec![
            BatchOp::Create(invoice("A", "INV-1", InvoiceStatus::Pending)),
            BatchOp::Create(invoice("A", "INV-2", InvoiceStatus::Paid)),
            BatchOp::CreateWithId("inv-3".into(), invoice("A", "INV-3", InvoiceStatus::Pending)),
        ])
        .await?;
    assert_eq!(ids.len(), 3);
    assert_eq!(ids[2], "inv-3");

    let pending = invoices
        .get_all_by_company(
            "A",
            &QueryOptions::new().filter(Filter::eq(INVOICE_STATUS_FIELD, "Pending")?),
        )
        .await?;
    assert_eq!(pending.len(), 2);

    // a batch touching a missing document is rolled back as a whole
    let err = invoices
        .batch_write(vec![
            BatchOp::SoftDelete("inv-3".into()),
            BatchOp::Update("missing".into(), doc! { "amount": 1.0 }),
        ])
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    let untouched = invoices.get_by_id("inv-3").await?.expect("inv-3");
    assert!(!untouched.meta.is_deleted);

    // atomic appends
    let payment = bson::to_bson(&Payment {
        amount: 40.0,
        ..Default::default()
    })?;
    invoices
        .apply("inv-3", Patch::new().push("paymentHistory", payment.clone()))
        .await?;
    let paid = invoices
        .apply("inv-3", Patch::new().push("paymentHistory", payment))
        .await?;
    assert_eq!(paid.data.payment_history.len(), 2);
    assert_eq!(paid.data.amount_paid(), 80.0);

    Ok(())
}

#[tokio::test]
async fn test_document_subscription_on_mongodb() -> Result<()> {
    dotenv().ok();
    init_logging();

    let mongod = MongodRunner::run_replica_set().await?;
    let client = mongod.client()?;
    let contacts: Repository<Contact, MongoStore> =
        Repository::new(MongoStore::new(&client, TEST_DATABASE_NAME));
    let created = contacts.create(contact("A", "Ana")).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = contacts
        .subscribe_to_document(&created.id, move |record| {
            let _ = tx.send(record.map(|r| r.data.first_name));
        })
        .await?;
    assert_eq!(rx.recv().await.flatten().as_deref(), Some("Ana"));

    contacts
        .update(&created.id, doc! { "firstName": "Ann" })
        .await?;
    let changed = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await?;
    assert_eq!(changed.flatten().as_deref(), Some("Ann"));

    subscription.unsubscribe();
    Ok(())
}

#[tokio::test]
async fn test_resume_across_missing_sort_keys_on_mongodb() -> Result<()> {
    dotenv().ok();
    init_logging();

    let mongod = MongodRunner::run_replica_set().await?;
    let client = mongod.client()?;
    let invoices: Repository<Invoice, MongoStore> =
        Repository::new(MongoStore::new(&client, TEST_DATABASE_NAME));

    for (number, due) in [("INV-1", None), ("INV-2", Some(3)), ("INV-3", None), ("INV-4", Some(1))] {
        let mut data = invoice("A", number, InvoiceStatus::Pending);
        data.due_date = due.map(day);
        invoices.create(data).await?;
    }

    for sort in [Sort::asc("dueDate"), Sort::desc("dueDate")] {
        let sorted = QueryOptions::new().scoped_to("A")?.sort(sort);
        let all = invoices.get_all(&sorted).await?;
        assert_eq!(all.len(), 4);
        for (position, record) in all.iter().enumerate() {
            let rest = invoices
                .get_all(&sorted.clone().resume_after(record)?)
                .await?;
            let expected: Vec<_> = all[position + 1..].iter().map(|r| &r.id).collect();
            let actual: Vec<_> = rest.iter().map(|r| &r.id).collect();
            assert_eq!(actual, expected);
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_commit_times_come_from_the_server_on_mongodb() -> Result<()> {
    dotenv().ok();
    init_logging();

    let mongod = MongodRunner::run_replica_set().await?;
    let client = mongod.client()?;
    let store = MongoStore::new(&client, TEST_DATABASE_NAME);
    let contacts: Repository<Contact, MongoStore> = Repository::new(store.clone());

    let before = store.server_time().await?;
    let created = contacts.create(contact("A", "Ana")).await?;
    let after = store.server_time().await?;

    let created_at = created.meta.created_at.expect("created_at");
    assert!(before <= created_at && created_at <= after);
    assert_eq!(created.meta.updated_at, Some(created_at));
    Ok(())
}

#[tokio::test]
async fn test_duplicate_attendance_is_rejected_on_mongodb() -> Result<()> {
    dotenv().ok();
    init_logging();

    let mongod = MongodRunner::run_replica_set().await?;
    let client = mongod.client()?;
    let attendance: Repository<Attendance, MongoStore> =
        Repository::new(MongoStore::new(&client, TEST_DATABASE_NAME));
    attendance.ensure_indexes().await?;

    let day_one = Attendance {
        company_id: "A".into(),
        employee_id: "emp-1".into(),
        date: Some(day(1)),
        ..Default::default()
    };
    attendance.create(day_one.clone()).await?;
    let err = attendance.create(day_one.clone()).await.unwrap_err();
    assert!(err.is_validation());

    // another tenant may reuse the employee id
    attendance
        .create(Attendance {
            company_id: "B".into(),
            ..day_one
        })
        .await?;
    Ok(())
}
