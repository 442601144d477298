//! Read-only queries over literal text.

use crate::columns::ColumnVisibility;
use crate::context::Context;
use crate::pipeline::Pipeline;
use crate::row::ReadOnlyRow;
use quarry_core::Result;
use std::ops::Deref;
use std::rc::Rc;

/// A read-only query whose text never changes.
///
/// It re-executes when one of its channels is published, when its
/// connection is lost, or when [`refresh`](Pipeline::refresh) is called.
pub struct Query {
    pipeline: Pipeline<ReadOnlyRow>,
}

impl Query {
    /// Builds a query from literal text, subscribed to `channels`.
    pub fn new<I, S>(context: &Rc<Context>, text: impl Into<String>, channels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let text = context.graph().constant("query.text", text.into());
        let pipeline = Pipeline::new(
            context,
            "query",
            text,
            Vec::new(),
            channels,
            ColumnVisibility::new(),
            Box::new(ReadOnlyRow::materialize),
        )?;
        Ok(Self { pipeline })
    }
}

impl Deref for Query {
    type Target = Pipeline<ReadOnlyRow>;

    fn deref(&self) -> &Pipeline<ReadOnlyRow> {
        &self.pipeline
    }
}
