use bson::Bson;
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Clap definitions for the `crm` command line. Every command works inside
/// one company, given with `--company` or `CRM_COMPANY_ID`.
#[derive(Parser)]
#[command(
    version,
    about,
    long_about = "Inspect and maintain the collections of the estate CRM"
)]
pub struct Root {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Company (tenant) every command is scoped to.
    #[arg(long, env = "CRM_COMPANY_ID")]
    pub company: String,

    #[command(subcommand)]
    pub command: CrmCommand,
}

#[derive(Args, Clone, Debug)]
pub struct ConnectionArgs {
    /// Overrides the configured MongoDB connection string.
    #[arg(long, env = "MONGO_URL")]
    pub mongo_url: Option<String>,

    /// Overrides the configured database name.
    #[arg(long, env = "DATABASE_NAME")]
    pub database: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Collection {
    Contacts,
    Leads,
    Deals,
    Properties,
    Invoices,
    Meetings,
    Todos,
    Attendance,
    Applications,
    History,
}

#[derive(Args, Clone, Debug, Default)]
pub struct ListArgs {
    /// Equality filter, repeatable. `field=value` matches text as given;
    /// `field:=value` matches a boolean, number or null.
    #[arg(long = "where", value_parser = parse_condition)]
    pub conditions: Vec<Condition>,

    /// Include soft-deleted records.
    #[arg(long, default_value_t = false)]
    pub include_deleted: bool,
}

#[derive(Subcommand, Clone, Debug)]
pub enum CrmCommand {
    /// List the company's records.
    List {
        collection: Collection,
        #[command(flatten)]
        filters: ListArgs,
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Show one page of the company's records.
    Page {
        collection: Collection,
        #[command(flatten)]
        filters: ListArgs,
        #[arg(long, default_value_t = 1)]
        page: u64,
        /// Defaults to the configured page size.
        #[arg(long)]
        page_size: Option<u64>,
    },
    /// Show one record.
    Get { collection: Collection, id: String },
    /// Hide a record from listings without removing it.
    SoftDelete { collection: Collection, id: String },
    /// Bring a soft-deleted record back.
    Restore { collection: Collection, id: String },
    /// Print a record, or the listing, every time it changes. Needs a replica set.
    Watch {
        collection: Collection,
        /// Watch this record instead of the whole listing.
        #[arg(long)]
        id: Option<String>,
        #[command(flatten)]
        filters: ListArgs,
    },
}

impl CrmCommand {
    pub fn collection(&self) -> Collection {
        match self {
            CrmCommand::List { collection, .. }
            | CrmCommand::Page { collection, .. }
            | CrmCommand::Get { collection, .. }
            | CrmCommand::SoftDelete { collection, .. }
            | CrmCommand::Restore { collection, .. }
            | CrmCommand::Watch { collection, .. } => *collection,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub field: String,
    pub value: Bson,
}

fn parse_condition(raw: &str) -> Result<Condition, String> {
    let malformed = || format!("expected field=value or field:=value, got '{}'", raw);
    let (field, value) = raw.split_once('=').ok_or_else(malformed)?;
    let (field, value) = match field.strip_suffix(':') {
        Some(field) => (field, typed_value(value)?),
        None => (field, Bson::String(value.to_string())),
    };
    let field = field.trim();
    if field.is_empty() {
        return Err(malformed());
    }
    Ok(Condition {
        field: field.to_string(),
        value,
    })
}

fn typed_value(raw: &str) -> Result<Bson, String> {
    let raw = raw.trim();
    if raw == "null" {
        return Ok(Bson::Null);
    }
    if let Ok(flag) = raw.parse::<bool>() {
        return Ok(Bson::Boolean(flag));
    }
    if let Ok(number) = raw.parse::<i64>() {
        return Ok(Bson::Int64(number));
    }
    match raw.parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(Bson::Double(number)),
        _ => Err(format!(
            "'{}' is not a boolean, number or null; use field=value to match text",
            raw
        )),
    }
}
