use anyhow::Result;
use std::collections::HashSet;

use super::{contact, contacts, init_logging};
use crate::query::{Filter, Sort};
use crate::repository::{PageRequest, QueryOptions};
use crate::store::MemoryStore;

async fn seed(store: &MemoryStore, count: usize) -> Result<()> {
    let repo = contacts(store);
    for i in 0..count {
        let mut data = contact("A", &format!("contact-{:02}", i));
        // Few distinct sort keys so the id tie-break matters.
        data.last_name = format!("family-{}", i % 3);
        repo.create(data).await?;
    }
    repo.create(contact("B", "other-tenant")).await?;
    Ok(())
}

fn stores() -> [MemoryStore; 2] {
    [MemoryStore::new(), MemoryStore::with_native_offset()]
}

#[tokio::test]
async fn pages_have_expected_sizes() -> Result<()> {
    init_logging();
    for store in stores() {
        seed(&store, 25).await?;
        let repo = contacts(&store);
        let options = QueryOptions::new().scoped_to("A")?;

        let first = repo
            .get_paginated(&PageRequest::new(1, 10).with_options(options.clone()))
            .await?;
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.pagination.total_items, 25);
        assert_eq!(first.pagination.total_pages, 3);

        let last = repo
            .get_paginated(&PageRequest::new(3, 10).with_options(options))
            .await?;
        assert_eq!(last.items.len(), 5);
        assert_eq!(last.pagination.page, 3);
    }
    Ok(())
}

#[tokio::test]
async fn concatenated_pages_cover_every_item_once() -> Result<()> {
    for store in stores() {
        seed(&store, 23).await?;
        let repo = contacts(&store);
        let options = QueryOptions::new()
            .scoped_to("A")?
            .sort(Sort::desc("lastName"));

        let first = repo
            .get_paginated(&PageRequest::new(1, 4).with_options(options.clone()))
            .await?;
        let mut seen = Vec::new();
        for page in 1..=first.pagination.total_pages {
            let result = repo
                .get_paginated(&PageRequest::new(page, 4).with_options(options.clone()))
                .await?;
            seen.extend(result.items.into_iter().map(|r| r.id));
        }

        let expected: Vec<String> = repo
            .get_all(&options)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(seen.len(), 23);
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 23);
        assert_eq!(seen, expected);
    }
    Ok(())
}

#[tokio::test]
async fn out_of_range_pages_are_clamped() -> Result<()> {
    for store in stores() {
        seed(&store, 12).await?;
        let repo = contacts(&store);
        let options = QueryOptions::new().scoped_to("A")?;

        let beyond = repo
            .get_paginated(&PageRequest::new(9, 5).with_options(options.clone()))
            .await?;
        assert_eq!(beyond.pagination.page, 3);
        assert_eq!(beyond.items.len(), 2);

        let before = repo
            .get_paginated(&PageRequest::new(0, 5).with_options(options))
            .await?;
        assert_eq!(before.pagination.page, 1);
        assert_eq!(before.items.len(), 5);
    }
    Ok(())
}

#[tokio::test]
async fn empty_listing_is_a_single_empty_page() -> Result<()> {
    let repo = contacts(&MemoryStore::new());
    let page = repo.get_paginated(&PageRequest::new(2, 10)).await?;
    assert!(page.items.is_empty());
    assert_eq!(page.pagination.page, 1);
    assert_eq!(page.pagination.total_items, 0);
    assert_eq!(page.pagination.total_pages, 0);
    Ok(())
}

#[tokio::test]
async fn pagination_respects_filters_and_soft_delete() -> Result<()> {
    let store = MemoryStore::new();
    seed(&store, 10).await?;
    let repo = contacts(&store);

    let family = QueryOptions::new()
        .scoped_to("A")?
        .filter(Filter::eq("lastName", "family-0")?);
    let all_family = repo.get_all(&family).await?;
    assert_eq!(all_family.len(), 4);
    repo.soft_delete(&all_family[0].id).await?;

    let page = repo
        .get_paginated(&PageRequest::new(2, 2).with_options(family))
        .await?;
    assert_eq!(page.pagination.total_items, 3);
    assert_eq!(page.items.len(), 1);
    assert!(page.items.iter().all(|r| r.data.last_name == "family-0"));
    Ok(())
}

#[tokio::test]
async fn zero_page_size_is_rejected() {
    let repo = contacts(&MemoryStore::new());
    let err = repo
        .get_paginated(&PageRequest::new(1, 0))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}
