use anyhow::Result;
use crm_mocks::fixtures::{day, mock_contact, mock_deal, mock_lead, mock_property};
use futures::future::try_join_all;

use super::{services, COMPANY, OTHER_COMPANY};
use crate::{CrmServices, CrmService};
use crm_db::schemas::{Activity, ContactStatus, DealStage, LeadStatus, Note, PropertyStatus};

#[tokio::test]
async fn contacts_are_created_under_the_tenant_and_listed_by_status() -> Result<()> {
    let (_, crm) = services();
    let ana = crm.contacts.create(mock_contact("", "Ana")).await?;
    assert_eq!(ana.data.company_id, COMPANY);
    crm.contacts.create(mock_contact(COMPANY, "Ben")).await?;
    crm.contacts.update_status(&ana.id, "Client").await?;

    let clients = crm.contacts.by_status(ContactStatus::Client).await?;
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].data.first_name, "Ana");
    assert_eq!(crm.contacts.by_status(ContactStatus::Active).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn contact_requires_first_name() {
    let (_, crm) = services();
    let err = crm.contacts.create(mock_contact(COMPANY, " ")).await.unwrap_err();
    assert!(err.is_validation());
    assert!(err.message().contains("firstName"));
}

#[tokio::test]
async fn unknown_status_is_rejected_without_writing() -> Result<()> {
    let (_, crm) = services();
    let lead = crm.leads.create(mock_lead(COMPANY, "Carla", "website")).await?;
    let err = crm.leads.update_status(&lead.id, "Archived").await.unwrap_err();
    assert!(err.is_validation());
    assert!(err.message().contains("unknown lead status 'Archived'"));

    let stored = crm.leads.repo().get_by_id(&lead.id).await?.unwrap();
    assert_eq!(stored.data.status, LeadStatus::New);
    Ok(())
}

#[tokio::test]
async fn status_update_of_missing_record_is_not_found() {
    let (_, crm) = services();
    let err = crm.leads.update_status("missing", "Qualified").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn concurrent_notes_are_all_kept() -> Result<()> {
    let (_, crm) = services();
    let contact = crm.contacts.create(mock_contact(COMPANY, "Dora")).await?;

    try_join_all((0..6).map(|i| {
        crm.contacts.add_note(
            &contact.id,
            Note {
                text: format!("call #{}", i),
                ..Default::default()
            },
        )
    }))
    .await?;

    let stored = crm.contacts.repo().get_by_id(&contact.id).await?.unwrap();
    assert_eq!(stored.data.notes.len(), 6);
    Ok(())
}

#[tokio::test]
async fn contacts_are_found_by_tag_and_assignee() -> Result<()> {
    let (_, crm) = services();
    let mut vip = mock_contact(COMPANY, "Eve");
    vip.tags = vec!["vip".to_string(), "buyer".to_string()];
    vip.assigned_to = Some("agent-1".to_string());
    crm.contacts.create(vip).await?;
    crm.contacts.create(mock_contact(COMPANY, "Fay")).await?;

    let tagged = crm.contacts.with_tag("vip").await?;
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].data.first_name, "Eve");
    assert_eq!(crm.contacts.assigned_to("agent-1").await?.len(), 1);
    assert!(crm.contacts.with_tag("seller").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn lead_activities_are_stamped_and_appended() -> Result<()> {
    let (_, crm) = services();
    let lead = crm.leads.create(mock_lead(COMPANY, "Gus", "referral")).await?;
    let updated = crm
        .leads
        .add_activity(
            &lead.id,
            Activity {
                kind: "call".to_string(),
                description: "Intro call".to_string(),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(updated.data.activities.len(), 1);
    assert!(updated.data.activities[0].occurred_at.is_some());

    assert!(crm
        .leads
        .add_activity(&lead.id, Activity::default())
        .await
        .unwrap_err()
        .is_validation());
    assert_eq!(crm.leads.by_source("referral").await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn deals_move_through_stages_and_close_in_range() -> Result<()> {
    let (_, crm) = services();
    let mut first = mock_deal(COMPANY, "Loft", DealStage::Prospecting);
    first.expected_close_date = Some(day(20));
    let mut second = mock_deal(COMPANY, "Villa", DealStage::Negotiation);
    second.expected_close_date = Some(day(5));
    let mut late = mock_deal(COMPANY, "Barn", DealStage::Prospecting);
    late.expected_close_date = Some(day(90));
    let first = crm.deals.create(first).await?;
    crm.deals.create(second).await?;
    crm.deals.create(late).await?;

    crm.deals.update_stage(&first.id, "UnderContract").await?;
    assert_eq!(crm.deals.by_stage(DealStage::UnderContract).await?.len(), 1);
    assert!(crm.deals.update_stage(&first.id, "Done").await.unwrap_err().is_validation());

    let closing = crm.deals.closing_between(day(0), day(30)).await?;
    let titles: Vec<_> = closing.iter().map(|r| r.data.title.as_str()).collect();
    assert_eq!(titles, vec!["Villa", "Loft"]);

    assert!(crm
        .deals
        .closing_between(day(30), day(0))
        .await
        .unwrap_err()
        .is_validation());
    Ok(())
}

#[tokio::test]
async fn properties_are_listed_by_price_range_cheapest_first() -> Result<()> {
    let (_, crm) = services();
    for (title, price) in [("Castle", 2_000_000.0), ("Studio", 150_000.0), ("House", 450_000.0)] {
        crm.properties.create(mock_property(COMPANY, title, price)).await?;
    }

    let affordable = crm.properties.in_price_range(100_000.0, 500_000.0).await?;
    let titles: Vec<_> = affordable.iter().map(|r| r.data.title.as_str()).collect();
    assert_eq!(titles, vec!["Studio", "House"]);

    assert!(crm
        .properties
        .create(mock_property(COMPANY, "Bad", -1.0))
        .await
        .unwrap_err()
        .is_validation());
    assert!(crm
        .properties
        .in_price_range(10.0, 1.0)
        .await
        .unwrap_err()
        .is_validation());
    assert_eq!(crm.properties.by_status(PropertyStatus::Available).await?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn services_of_different_tenants_do_not_see_each_other() -> Result<()> {
    let (store, crm) = services();
    let other = CrmServices::new(store, OTHER_COMPANY);
    let theirs = other.contacts.create(mock_contact("", "Hal")).await?;
    crm.contacts.create(mock_contact("", "Ida")).await?;

    assert_eq!(crm.contacts.by_status(ContactStatus::Active).await?.len(), 1);
    assert!(crm
        .contacts
        .update_status(&theirs.id, "Inactive")
        .await
        .unwrap_err()
        .is_not_found());
    assert!(crm
        .contacts
        .add_note(
            &theirs.id,
            Note {
                text: "hello".to_string(),
                ..Default::default()
            }
        )
        .await
        .unwrap_err()
        .is_not_found());
    Ok(())
}
