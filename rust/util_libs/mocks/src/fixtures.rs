use bson::DateTime;
use crm_db::schemas::{
    Application, Attendance, Contact, Deal, DealStage, Invoice, InvoiceStatus, Lead, Meeting,
    Property, PropertyStatus, Todo,
};

/// Milliseconds in one day, for building date ranges.
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Midnight UTC `days` days after the epoch.
pub fn day(days: i64) -> DateTime {
    DateTime::from_millis(days * DAY_MS)
}

pub fn mock_contact(company_id: &str, first_name: &str) -> Contact {
    Contact {
        company_id: company_id.to_string(),
        first_name: first_name.to_string(),
        last_name: "Tester".to_string(),
        email: Some(format!("{}@example.com", first_name.to_lowercase())),
        ..Default::default()
    }
}

pub fn mock_lead(company_id: &str, name: &str, source: &str) -> Lead {
    Lead {
        company_id: company_id.to_string(),
        name: name.to_string(),
        source: Some(source.to_string()),
        ..Default::default()
    }
}

pub fn mock_deal(company_id: &str, title: &str, stage: DealStage) -> Deal {
    Deal {
        company_id: company_id.to_string(),
        title: title.to_string(),
        stage,
        value: 250_000.0,
        ..Default::default()
    }
}

pub fn mock_property(company_id: &str, title: &str, price: f64) -> Property {
    Property {
        company_id: company_id.to_string(),
        title: title.to_string(),
        price,
        status: PropertyStatus::Available,
        ..Default::default()
    }
}

pub fn mock_invoice(company_id: &str, number: &str, amount: f64) -> Invoice {
    Invoice {
        company_id: company_id.to_string(),
        invoice_number: number.to_string(),
        status: InvoiceStatus::Pending,
        amount,
        ..Default::default()
    }
}

pub fn mock_meeting(company_id: &str, title: &str, start: DateTime) -> Meeting {
    Meeting {
        company_id: company_id.to_string(),
        title: title.to_string(),
        start_time: Some(start),
        end_time: Some(DateTime::from_millis(start.timestamp_millis() + 60 * 60 * 1000)),
        ..Default::default()
    }
}

pub fn mock_todo(company_id: &str, title: &str, assigned_to: Option<&str>) -> Todo {
    Todo {
        company_id: company_id.to_string(),
        title: title.to_string(),
        assigned_to: assigned_to.map(str::to_string),
        ..Default::default()
    }
}

pub fn mock_attendance(company_id: &str, employee_id: &str, date: DateTime) -> Attendance {
    Attendance {
        company_id: company_id.to_string(),
        employee_id: employee_id.to_string(),
        date: Some(date),
        ..Default::default()
    }
}

pub fn mock_application(company_id: &str, applicant_name: &str, position: &str) -> Application {
    Application {
        company_id: company_id.to_string(),
        applicant_name: applicant_name.to_string(),
        email: format!("{}@example.com", applicant_name.to_lowercase()),
        position: position.to_string(),
        ..Default::default()
    }
}
