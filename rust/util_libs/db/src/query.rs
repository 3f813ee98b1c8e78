//! Typed query expressions.
//!
//! A [`Filter`] can only be built through its constructors, which reject
//! operator/value combinations the store would silently mis-evaluate
//! (ranges over arrays, empty `in` lists, nested arrays in `array_contains`).
//! Filters render to MongoDB filter documents and can also be evaluated
//! in-process against a `bson::Document`, which is what the memory store does.
use bson::{doc, Bson, Document};
use std::cmp::Ordering;

use crate::error::{DbError, DbResult};

/// Upper bound on the number of values in a disjunctive filter (`in`, `not_in`,
/// `array_contains_any`).
pub const MAX_DISJUNCTION_VALUES: usize = 30;

/// Name of the identity field every document carries.
pub const ID_FIELD: &str = "_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    Lt,
    Lte,
    Gt,
    Gte,
}

impl RangeOp {
    fn mongo_operator(self) -> &'static str {
        match self {
            RangeOp::Lt => "$lt",
            RangeOp::Lte => "$lte",
            RangeOp::Gt => "$gt",
            RangeOp::Gte => "$gte",
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            RangeOp::Lt => ordering == Ordering::Less,
            RangeOp::Lte => ordering != Ordering::Greater,
            RangeOp::Gt => ordering == Ordering::Greater,
            RangeOp::Gte => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Eq(String, Bson),
    Ne(String, Bson),
    Range(String, RangeOp, Bson),
    In(String, Vec<Bson>),
    NotIn(String, Vec<Bson>),
    ArrayContains(String, Bson),
    ArrayContainsAny(String, Vec<Bson>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

/// A validated filter expression. Multiple filters passed to a query are
/// combined by conjunction.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter(Expr);

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> DbResult<Self> {
        Ok(Self(Expr::Eq(checked_field(field)?, value.into())))
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> DbResult<Self> {
        Ok(Self(Expr::Ne(checked_field(field)?, value.into())))
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> DbResult<Self> {
        Self::range(field, RangeOp::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> DbResult<Self> {
        Self::range(field, RangeOp::Lte, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> DbResult<Self> {
        Self::range(field, RangeOp::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> DbResult<Self> {
        Self::range(field, RangeOp::Gte, value)
    }

    /// Range comparison. Only numbers, strings and dates are comparable.
    pub fn range(field: impl Into<String>, op: RangeOp, value: impl Into<Bson>) -> DbResult<Self> {
        let field = checked_field(field)?;
        let value = value.into();
        if !is_comparable(&value) {
            return Err(DbError::invalid_query(format!(
                "range filter on '{}' requires a number, string or date, got {:?}",
                field,
                value.element_type()
            )));
        }
        Ok(Self(Expr::Range(field, op, value)))
    }

    /// Inclusive range `low <= field <= high`.
    pub fn between(
        field: impl Into<String>,
        low: impl Into<Bson>,
        high: impl Into<Bson>,
    ) -> DbResult<Self> {
        let field = field.into();
        Self::and(vec![
            Self::gte(field.clone(), low)?,
            Self::lte(field, high)?,
        ])
    }

    pub fn in_list<I, V>(field: impl Into<String>, values: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        let field = checked_field(field)?;
        let values = checked_values(&field, values)?;
        Ok(Self(Expr::In(field, values)))
    }

    pub fn not_in<I, V>(field: impl Into<String>, values: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        let field = checked_field(field)?;
        let values = checked_values(&field, values)?;
        Ok(Self(Expr::NotIn(field, values)))
    }

    pub fn array_contains(field: impl Into<String>, value: impl Into<Bson>) -> DbResult<Self> {
        let field = checked_field(field)?;
        let value = value.into();
        if is_container(&value) {
            return Err(DbError::invalid_query(format!(
                "array_contains on '{}' takes a single element, not an array or document",
                field
            )));
        }
        Ok(Self(Expr::ArrayContains(field, value)))
    }

    pub fn array_contains_any<I, V>(field: impl Into<String>, values: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        let field = checked_field(field)?;
        let values = checked_values(&field, values)?;
        Ok(Self(Expr::ArrayContainsAny(field, values)))
    }

    /// Conjunction. An empty conjunction matches every document.
    pub fn and(filters: Vec<Filter>) -> DbResult<Self> {
        let mut exprs = Vec::with_capacity(filters.len());
        for filter in filters {
            match filter.0 {
                Expr::And(inner) => exprs.extend(inner),
                other => exprs.push(other),
            }
        }
        Ok(Self(Expr::And(exprs)))
    }

    pub fn or(filters: Vec<Filter>) -> DbResult<Self> {
        if filters.is_empty() {
            return Err(DbError::invalid_query("or() needs at least one filter"));
        }
        if filters.len() > MAX_DISJUNCTION_VALUES {
            return Err(DbError::invalid_query(format!(
                "or() accepts at most {} filters",
                MAX_DISJUNCTION_VALUES
            )));
        }
        Ok(Self(Expr::Or(filters.into_iter().map(|f| f.0).collect())))
    }

    /// Renders the filter as a MongoDB query document.
    pub fn to_document(&self) -> Document {
        expr_to_document(&self.0)
    }

    /// Evaluates the filter against a raw document.
    pub fn matches(&self, document: &Document) -> bool {
        expr_matches(&self.0, document)
    }
}

fn checked_field(field: impl Into<String>) -> DbResult<String> {
    let field = field.into();
    if field.trim().is_empty() || field.split('.').any(str::is_empty) {
        return Err(DbError::invalid_query(format!(
            "invalid field path '{}'",
            field
        )));
    }
    Ok(field)
}

fn checked_values<I, V>(field: &str, values: I) -> DbResult<Vec<Bson>>
where
    I: IntoIterator<Item = V>,
    V: Into<Bson>,
{
    let values: Vec<Bson> = values.into_iter().map(Into::into).collect();
    if values.is_empty() {
        return Err(DbError::invalid_query(format!(
            "filter on '{}' needs at least one value",
            field
        )));
    }
    if values.len() > MAX_DISJUNCTION_VALUES {
        return Err(DbError::invalid_query(format!(
            "filter on '{}' accepts at most {} values, got {}",
            field,
            MAX_DISJUNCTION_VALUES,
            values.len()
        )));
    }
    if values.iter().any(is_container) {
        return Err(DbError::invalid_query(format!(
            "filter on '{}' takes scalar values only",
            field
        )));
    }
    Ok(values)
}

fn is_comparable(value: &Bson) -> bool {
    match value {
        Bson::Double(d) => !d.is_nan(),
        Bson::Int32(_) | Bson::Int64(_) | Bson::String(_) | Bson::DateTime(_) => true,
        _ => false,
    }
}

fn is_container(value: &Bson) -> bool {
    matches!(value, Bson::Array(_) | Bson::Document(_))
}

fn expr_to_document(expr: &Expr) -> Document {
    match expr {
        Expr::Eq(field, value) => doc! { field: { "$eq": value.clone() } },
        Expr::Ne(field, value) => doc! { field: { "$ne": value.clone() } },
        Expr::Range(field, op, value) => doc! { field: { op.mongo_operator(): value.clone() } },
        Expr::In(field, values) => doc! { field: { "$in": values.clone() } },
        Expr::NotIn(field, values) => doc! { field: { "$nin": values.clone() } },
        Expr::ArrayContains(field, value) => {
            doc! { field: { "$elemMatch": { "$eq": value.clone() } } }
        }
        Expr::ArrayContainsAny(field, values) => {
            doc! { field: { "$elemMatch": { "$in": values.clone() } } }
        }
        Expr::And(inner) if inner.is_empty() => Document::new(),
        Expr::And(inner) => {
            let parts: Vec<Document> = inner.iter().map(expr_to_document).collect();
            doc! { "$and": parts }
        }
        Expr::Or(inner) => {
            let parts: Vec<Document> = inner.iter().map(expr_to_document).collect();
            doc! { "$or": parts }
        }
    }
}

fn expr_matches(expr: &Expr, document: &Document) -> bool {
    match expr {
        Expr::Eq(field, value) => field_equals(document, field, value),
        Expr::Ne(field, value) => !field_equals(document, field, value),
        Expr::Range(field, op, value) => lookup(document, field)
            .and_then(|found| compare_same_kind(found, value))
            .map(|ordering| op.accepts(ordering))
            .unwrap_or(false),
        Expr::In(field, values) => values.iter().any(|v| field_equals(document, field, v)),
        Expr::NotIn(field, values) => !values.iter().any(|v| field_equals(document, field, v)),
        Expr::ArrayContains(field, value) => match lookup(document, field) {
            Some(Bson::Array(items)) => items.iter().any(|item| values_equal(item, value)),
            _ => false,
        },
        Expr::ArrayContainsAny(field, values) => match lookup(document, field) {
            Some(Bson::Array(items)) => items
                .iter()
                .any(|item| values.iter().any(|v| values_equal(item, v))),
            _ => false,
        },
        Expr::And(inner) => inner.iter().all(|e| expr_matches(e, document)),
        Expr::Or(inner) => inner.iter().any(|e| expr_matches(e, document)),
    }
}

// A missing field compares equal to null, as it does in MongoDB.
fn field_equals(document: &Document, field: &str, value: &Bson) -> bool {
    match lookup(document, field) {
        Some(found) => values_equal(found, value),
        None => matches!(value, Bson::Null),
    }
}

/// Resolves a dotted field path against a document.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }
    Some(current)
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(i) => Some(*i as f64),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(d) => Some(*d),
        _ => None,
    }
}

/// Equality with numeric widening (`Int32(1) == Double(1.0)`).
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare_same_kind(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.cmp(y)),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

// BSON cross-type sort order, with missing fields sorting as null.
fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null) | Some(Bson::Undefined) => 1,
        Some(Bson::Int32(_)) | Some(Bson::Int64(_)) | Some(Bson::Double(_)) => 2,
        Some(Bson::Decimal128(_)) => 2,
        Some(Bson::String(_)) | Some(Bson::Symbol(_)) => 3,
        Some(Bson::Document(_)) => 4,
        Some(Bson::Array(_)) => 5,
        Some(Bson::Binary(_)) => 6,
        Some(Bson::ObjectId(_)) => 7,
        Some(Bson::Boolean(_)) => 8,
        Some(Bson::DateTime(_)) => 9,
        Some(Bson::Timestamp(_)) => 10,
        Some(_) => 11,
    }
}

/// Total order over optional values used when sorting in-process.
pub fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let (rank_a, rank_b) = (type_rank(a), type_rank(b));
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }
    match (a, b) {
        (Some(x), Some(y)) => compare_same_kind(x, y).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

/// Appends the `_id` tie-break to a sort specification unless it is already
/// present, so every ordering is total and resume cursors are unambiguous.
pub fn with_tie_break(sort: &[Sort]) -> Vec<Sort> {
    let mut ordering = sort.to_vec();
    if !ordering.iter().any(|s| s.field == ID_FIELD) {
        ordering.push(Sort::asc(ID_FIELD));
    }
    ordering
}

pub fn sort_document(sort: &[Sort]) -> Document {
    let mut rendered = Document::new();
    for spec in sort {
        let direction = match spec.direction {
            Direction::Asc => 1,
            Direction::Desc => -1,
        };
        rendered.insert(spec.field.clone(), direction);
    }
    rendered
}

/// Orders two documents by a (tie-broken) sort specification.
pub fn compare_documents(a: &Document, b: &Document, sort: &[Sort]) -> Ordering {
    for spec in sort {
        let ordering = compare_values(lookup(a, &spec.field), lookup(b, &spec.field));
        let ordering = match spec.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Builds the MongoDB keyset predicate selecting documents strictly after
/// `cursor` in `sort` order:
/// `(k1 > c1) OR (k1 == c1 AND k2 > c2) OR ...`, with `<` for descending keys.
///
/// Comparison operators never match across BSON types, so null and missing
/// keys, which sort first, get explicit branches.
pub fn keyset_document(sort: &[Sort], cursor: &Document) -> Document {
    let mut branches: Vec<Document> = Vec::with_capacity(sort.len());
    for (i, spec) in sort.iter().enumerate() {
        let mut branch = Document::new();
        for prior in &sort[..i] {
            let value = lookup(cursor, &prior.field).cloned().unwrap_or(Bson::Null);
            branch.insert(prior.field.clone(), doc! { "$eq": value });
        }
        let value = lookup(cursor, &spec.field).cloned().unwrap_or(Bson::Null);
        let is_null = matches!(value, Bson::Null | Bson::Undefined);
        match (spec.direction, is_null) {
            (Direction::Asc, true) => {
                branch.insert(spec.field.clone(), doc! { "$ne": Bson::Null });
            }
            // nothing follows null in descending order
            (Direction::Desc, true) => continue,
            (Direction::Asc, false) => {
                branch.insert(spec.field.clone(), doc! { "$gt": value });
            }
            (Direction::Desc, false) => {
                let mut before = Document::new();
                before.insert(spec.field.clone(), doc! { "$lt": value });
                let mut null = Document::new();
                null.insert(spec.field.clone(), Bson::Null);
                branch.insert("$or", vec![before, null]);
            }
        }
        branches.push(branch);
    }
    doc! { "$or": branches }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::DateTime;

    fn invoice(status: &str, amount: i64, tags: Vec<&str>) -> Document {
        doc! {
            "_id": bson::oid::ObjectId::new().to_hex(),
            "Status": status,
            "amount": amount,
            "tags": tags,
            "address": { "city": "Lisbon" },
        }
    }

    #[test]
    fn range_rejects_non_scalar_values() {
        let err = Filter::gt("amount", vec![1, 2]).unwrap_err();
        assert!(err.is_invalid_query());
        assert!(Filter::lt("flag", true).is_err());
        assert!(Filter::gte("amount", f64::NAN).is_err());
        assert!(Filter::gte("amount", 10).is_ok());
        assert!(Filter::lte("due", DateTime::now()).is_ok());
    }

    #[test]
    fn in_list_bounds_are_enforced() {
        assert!(Filter::in_list("Status", Vec::<String>::new()).is_err());
        assert!(Filter::in_list("Status", (0..31).map(|i| i.to_string())).is_err());
        assert!(Filter::in_list("Status", ["Pending", "Paid"]).is_ok());
        assert!(Filter::array_contains("tags", vec!["a"]).is_err());
    }

    #[test]
    fn field_paths_are_validated() {
        assert!(Filter::eq("", 1).is_err());
        assert!(Filter::eq("address..city", 1).is_err());
        assert!(Filter::eq("address.city", "Lisbon").is_ok());
    }

    #[test]
    fn filters_evaluate_like_the_store() {
        let doc = invoice("Pending", 120, vec!["vip", "rent"]);

        assert!(Filter::eq("Status", "Pending").unwrap().matches(&doc));
        assert!(Filter::ne("Status", "Paid").unwrap().matches(&doc));
        assert!(Filter::gt("amount", 100.5).unwrap().matches(&doc));
        assert!(!Filter::lt("amount", 120).unwrap().matches(&doc));
        assert!(Filter::between("amount", 100, 120).unwrap().matches(&doc));
        assert!(Filter::array_contains("tags", "vip").unwrap().matches(&doc));
        assert!(Filter::array_contains_any("tags", ["x", "rent"]).unwrap().matches(&doc));
        assert!(Filter::eq("address.city", "Lisbon").unwrap().matches(&doc));
        assert!(Filter::eq("missing", Bson::Null).unwrap().matches(&doc));
        assert!(!Filter::gt("Status", 3).unwrap().matches(&doc));

        let either = Filter::or(vec![
            Filter::eq("Status", "Paid").unwrap(),
            Filter::in_list("amount", [1, 120]).unwrap(),
        ])
        .unwrap();
        assert!(either.matches(&doc));
    }

    #[test]
    fn conjunctions_flatten_and_render() {
        let filter = Filter::and(vec![
            Filter::eq("company_id", "A").unwrap(),
            Filter::and(vec![Filter::eq("isDeleted", false).unwrap()]).unwrap(),
        ])
        .unwrap();
        let rendered = filter.to_document();
        assert_eq!(rendered.get_array("$and").unwrap().len(), 2);
        assert!(filter.matches(&doc! { "company_id": "A", "isDeleted": false }));
        assert!(!filter.matches(&doc! { "company_id": "B", "isDeleted": false }));
        assert!(Filter::and(vec![]).unwrap().to_document().is_empty());
    }

    #[test]
    fn documents_sort_with_tie_break() {
        let a = doc! { "_id": "a", "amount": 5 };
        let b = doc! { "_id": "b", "amount": 5 };
        let c = doc! { "_id": "c", "amount": 1.5 };
        let order = with_tie_break(&[Sort::desc("amount")]);

        let mut docs = vec![c.clone(), b.clone(), a.clone()];
        docs.sort_by(|x, y| compare_documents(x, y, &order));
        let ids: Vec<&str> = docs.iter().map(|d| d.get_str("_id").unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn keyset_document_branches_per_sort_key() {
        let order = with_tie_break(&[Sort::asc("amount")]);
        let rendered = keyset_document(&order, &doc! { "_id": "k", "amount": 3 });
        let branches = rendered.get_array("$or").unwrap();
        assert_eq!(branches.len(), 2);
        assert_eq!(
            branches[1].as_document().unwrap().get_document("amount").unwrap(),
            &doc! { "$eq": 3 }
        );
    }

    #[test]
    fn keyset_document_resumes_past_null_keys() {
        let order = with_tie_break(&[Sort::asc("dueDate")]);
        let cursor = doc! { "_id": "a", "dueDate": Bson::Null };
        let rendered = keyset_document(&order, &cursor);
        let branches = rendered.get_array("$or").unwrap();
        assert_eq!(
            branches[0].as_document().unwrap(),
            &doc! { "dueDate": { "$ne": Bson::Null } }
        );

        assert_eq!(
            branches[1].as_document().unwrap(),
            &doc! { "dueDate": { "$eq": Bson::Null }, "_id": { "$gt": "a" } }
        );

        // the in-process order agrees: dated documents follow a null cursor
        let dated = doc! { "_id": "0", "dueDate": DateTime::from_millis(5) };
        assert_eq!(compare_documents(&dated, &cursor, &order), Ordering::Greater);
    }

    #[test]
    fn descending_keyset_keeps_trailing_nulls() {
        let order = with_tie_break(&[Sort::desc("dueDate")]);
        let cursor = doc! { "_id": "a", "dueDate": DateTime::from_millis(10) };
        let rendered = keyset_document(&order, &cursor);
        let first = rendered.get_array("$or").unwrap()[0].as_document().unwrap().clone();
        assert!(first.contains_key("$or"));

        let null_cursor = doc! { "_id": "a" };
        let rendered = keyset_document(&order, &null_cursor);
        let branches = rendered.get_array("$or").unwrap();
        assert_eq!(branches.len(), 1);
    }
}
