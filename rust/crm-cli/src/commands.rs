use anyhow::{Context, Result};
use bson::Bson;
use crm_db::{
    mongodb::MongoStore,
    query::Filter,
    repository::{PageRequest, QueryOptions, Repository, TenantRepository},
    schemas::{
        Application, Attendance, Contact, Deal, Entity, History, Invoice, Lead, Meeting, Property,
        Record, Todo,
    },
};
use serde_json::{json, Value};

use crate::cli::{Collection, CrmCommand, ListArgs};

pub async fn run(
    store: MongoStore,
    company_id: &str,
    default_page_size: u64,
    command: CrmCommand,
) -> Result<()> {
    match command.collection() {
        Collection::Contacts => execute::<Contact>(store, company_id, default_page_size, command).await,
        Collection::Leads => execute::<Lead>(store, company_id, default_page_size, command).await,
        Collection::Deals => execute::<Deal>(store, company_id, default_page_size, command).await,
        Collection::Properties => {
            execute::<Property>(store, company_id, default_page_size, command).await
        }
        Collection::Invoices => execute::<Invoice>(store, company_id, default_page_size, command).await,
        Collection::Meetings => execute::<Meeting>(store, company_id, default_page_size, command).await,
        Collection::Todos => execute::<Todo>(store, company_id, default_page_size, command).await,
        Collection::Attendance => {
            execute::<Attendance>(store, company_id, default_page_size, command).await
        }
        Collection::Applications => {
            execute::<Application>(store, company_id, default_page_size, command).await
        }
        Collection::History => execute::<History>(store, company_id, default_page_size, command).await,
    }
}

async fn execute<E: Entity>(
    store: MongoStore,
    company_id: &str,
    default_page_size: u64,
    command: CrmCommand,
) -> Result<()> {
    let repo: TenantRepository<E, MongoStore> = Repository::new(store).for_company(company_id);

    match command {
        CrmCommand::List { filters, limit, .. } => {
            let mut options = query_options(&filters)?;
            if let Some(limit) = limit {
                options = options.limit(limit);
            }
            let records = repo.get_all(&options).await?;
            print_json(&Value::Array(to_json_list(&records)?))
        }
        CrmCommand::Page {
            filters,
            page,
            page_size,
            ..
        } => {
            let request = PageRequest::new(page, page_size.unwrap_or(default_page_size))
                .with_options(query_options(&filters)?);
            let page = repo.get_paginated(&request).await?;
            print_json(&json!({
                "items": to_json_list(&page.items)?,
                "pagination": page.pagination,
            }))
        }
        CrmCommand::Get { id, .. } => {
            let record = repo
                .get_by_id(&id)
                .await?
                .with_context(|| format!("no {} record with id {}", E::COLLECTION, id))?;
            print_json(&to_json(&record)?)
        }
        CrmCommand::SoftDelete { id, .. } => {
            let record = repo.soft_delete(&id).await?;
            log::info!("Soft-deleted {}/{}", E::COLLECTION, id);
            print_json(&to_json(&record)?)
        }
        CrmCommand::Restore { id, .. } => {
            let record = repo.restore(&id).await?;
            print_json(&to_json(&record)?)
        }
        CrmCommand::Watch { id, filters, .. } => {
            let subscription = match id {
                Some(id) => {
                    repo.subscribe_to_document(&id, |record: Option<Record<E>>| {
                        let printed = match record {
                            Some(record) => to_json(&record).and_then(|v| print_json(&v)),
                            None => print_json(&Value::Null),
                        };
                        if let Err(e) = printed {
                            log::error!("Failed to print change: {:?}", e);
                        }
                    })
                    .await?
                }
                None => {
                    repo.subscribe_to_collection(query_options(&filters)?, |records: Vec<Record<E>>| {
                        let printed = to_json_list(&records).and_then(|v| print_json(&Value::Array(v)));
                        if let Err(e) = printed {
                            log::error!("Failed to print change: {:?}", e);
                        }
                    })
                    .await?
                }
            };

            // Only exit when explicitly requested
            tokio::signal::ctrl_c().await?;
            log::debug!("Closing {} watch", E::COLLECTION);
            subscription.unsubscribe();
            Ok(())
        }
    }
}

fn query_options(args: &ListArgs) -> Result<QueryOptions> {
    let mut options = QueryOptions::new().include_deleted(args.include_deleted);
    for condition in &args.conditions {
        options = options.filter(Filter::eq(
            condition.field.as_str(),
            condition.value.clone(),
        )?);
    }
    Ok(options)
}

fn to_json<E: Entity>(record: &Record<E>) -> Result<Value> {
    Ok(Bson::Document(record.to_document()?).into_relaxed_extjson())
}

fn to_json_list<E: Entity>(records: &[Record<E>]) -> Result<Vec<Value>> {
    records.iter().map(to_json).collect()
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Condition;

    #[test]
    fn list_args_become_scoped_filters() -> Result<()> {
        let options = query_options(&ListArgs {
            conditions: vec![
                Condition {
                    field: "zipCode".to_string(),
                    value: Bson::String("00123".to_string()),
                },
                Condition {
                    field: "bedrooms".to_string(),
                    value: Bson::Int64(3),
                },
            ],
            include_deleted: false,
        })?;
        assert_eq!(options.filters.len(), 2);
        assert!(options.filters[0].matches(&bson::doc! { "zipCode": "00123" }));
        assert!(!options.filters[0].matches(&bson::doc! { "zipCode": 123 }));
        assert!(options.filters[1].matches(&bson::doc! { "bedrooms": 3 }));
        assert!(!options.include_deleted);
        Ok(())
    }
}
