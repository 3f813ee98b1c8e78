use crm_db::store::MemoryStore;

use crate::CrmServices;

mod config;
mod pipeline;
mod scheduling;

pub(crate) const COMPANY: &str = "agency-a";
pub(crate) const OTHER_COMPANY: &str = "agency-b";

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Services for [`COMPANY`] and a fresh store they share with any other tenant.
pub(crate) fn services() -> (MemoryStore, CrmServices<MemoryStore>) {
    init_logging();
    let store = MemoryStore::new();
    let services = CrmServices::new(store.clone(), COMPANY);
    (store, services)
}
