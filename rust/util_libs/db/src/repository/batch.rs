use bson::Document;

/// One operation of an atomic batch write.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp<E> {
    Create(E),
    CreateWithId(String, E),
    /// Merge fields into an existing document. The batch fails if it is absent.
    Update(String, Document),
    Delete(String),
    SoftDelete(String),
}
