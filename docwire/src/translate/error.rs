use crate::bson::Tag;

/// An error when translating a query description to SQL.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranslateError {
    #[error("invalid field path `{0}`")]
    InvalidPath(String),
    #[error("unsupported value type `{}` for field `{field}`", tag.name())]
    UnsupportedType { field: String, tag: Tag },
    #[error("operator `{0}` is not supported")]
    UnsupportedOperator(String),
    #[error("cannot mix operators and fields in the value of `{0}`")]
    MixedOperator(String),
    #[error("operator `{op}` on `{field}` needs an array, found `{}`", tag.name())]
    InvalidOperand { op: String, field: String, tag: Tag },
    #[error("negative limit values are not supported, found {0}")]
    NegativeLimit(i64),
    #[error("Cannot do exclusion on field {0} in inclusion projection")]
    InclusionConflict(String),
    #[error("Cannot do inclusion on field {0} in exclusion projection")]
    ExclusionConflict(String),
    #[error("sort order for `{field}` must be a number, found `{}`", tag.name())]
    InvalidSortOrder { field: String, tag: Tag },
    #[error("projection value for `{field}` of type `{}` is not supported", tag.name())]
    InvalidProjection { field: String, tag: Tag },
    #[error("translation has fewer arguments than placeholders ({0})")]
    ArgumentCount(usize),
    #[error("argument of type `{}` does not fit its placeholder", .0.name())]
    ArgumentKind(Tag),
}
