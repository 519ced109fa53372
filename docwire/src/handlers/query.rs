//! `find` and `count`.
use super::{CommandError, Fields};
use crate::{
    Error, Result, ResultExt,
    backend::Backend,
    bson::{Array, Document, Value},
    common::{span, verbose},
    doc,
    translate::{self, Shape},
};

pub async fn find<B: Backend>(backend: &B, fields: &Fields<'_>) -> Result<Document> {
    let collection = fields.collection()?;
    let db = fields.database()?;
    let filter = fields.document("filter")?;
    let projection = fields.document("projection")?;
    let sort = fields.document("sort")?;
    let limit = fields.integer("limit")?;

    let translation = translate::find(collection, &filter, &projection, &sort, limit)
        .map_err(CommandError::from)?;
    let Shape::Find { projection } = translation.shape() else {
        return Err(Error::internal("find translated to a count"));
    };
    let sql = translation.render().map_err(CommandError::from)?;

    verbose!("{sql}");

    let mut rows = backend.query(&sql).await.context(|| format!("find on {collection:?}"))?;
    let docs = {
        span!("shape", collection, rows = rows.len());
        let mut docs = Array::with_capacity(rows.len());
        while let Some(row) = rows.next_row() {
            docs.push(Value::Document(projection.shape(&row)?));
        }
        rows.close();
        docs
    };

    Ok(doc! {
        "cursor" => doc! {
            "firstBatch" => docs,
            "id" => 0i64,
            "ns" => format!("{db}.{collection}"),
        },
        "ok" => 1.0,
    })
}

pub async fn count<B: Backend>(backend: &B, fields: &Fields<'_>) -> Result<Document> {
    let collection = fields.collection()?;
    let filter = fields.document("query")?;
    let limit = fields.integer("limit")?;

    let translation = translate::count(collection, &filter, limit).map_err(CommandError::from)?;
    let sql = translation.render().map_err(CommandError::from)?;

    verbose!("{sql}");

    let mut rows = backend.query(&sql).await.context(|| format!("count on {collection:?}"))?;
    let mut count = 0i64;
    while let Some(row) = rows.next_row() {
        count = row.try_get(0)?;
    }
    rows.close();

    let n = translation.shape().count(count);
    let n = match i32::try_from(n) {
        Ok(n) => Value::Int32(n),
        Err(_) => Value::Int64(n),
    };
    Ok(doc! {
        "n" => n,
        "ok" => 1.0,
    })
}
